//! Dotted/bracketed property paths over JSON values.
//!
//! Paths look like `content[0].text`, `meta.tags[2]` or `items.length`.
//! They are used by expectation expressions (to read values) and by snapshot
//! projection (to copy or delete sub-trees).
//!
//! Traversal never fails loudly: a missing key, a `null` intermediate or an
//! index into a non-array simply resolves to `None`, the equivalent of an
//! undefined value.

use serde_json::{Map, Value};
use std::fmt;

/// One step of a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object key (or a pseudo-property such as `length`).
    Key(String),
    /// Array index.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "{key}"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Parse a property path into segments.
///
/// Bracket contents that are all digits become [`Segment::Index`]; quoted
/// bracket contents (`['a.b']`) and bare words become [`Segment::Key`]. Empty
/// segments (leading dots, `a..b`) are ignored, so `""` is the root path.
#[must_use]
pub fn parse_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => flush_key(&mut current, &mut segments),
            '[' => {
                flush_key(&mut current, &mut segments);
                let mut inner = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                segments.push(bracket_segment(inner.trim()));
            }
            _ => current.push(c),
        }
    }
    flush_key(&mut current, &mut segments);
    segments
}

fn flush_key(current: &mut String, segments: &mut Vec<Segment>) {
    let key = current.trim();
    if !key.is_empty() {
        segments.push(Segment::Key(key.to_string()));
    }
    current.clear();
}

fn bracket_segment(inner: &str) -> Segment {
    if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(index) = inner.parse() {
            return Segment::Index(index);
        }
    }
    let unquoted = inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(inner);
    Segment::Key(unquoted.to_string())
}

/// Render segments back into path syntax (`a.b[0].c`).
#[must_use]
pub fn format_path(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            Segment::Index(index) => out.push_str(&format!("[{index}]")),
        }
    }
    out
}

/// Look up a path without any pseudo-properties.
///
/// This is the plain structural lookup used by snapshot projection.
#[must_use]
pub fn lookup<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(key)?,
            (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
            (Segment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
            (Segment::Key(key), Value::Array(items)) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a path for expectation evaluation.
///
/// On top of [`lookup`], `length` and `count` evaluate to the number of
/// elements of an array, and `length` to the character count of a string.
/// On objects they are ordinary keys, so a missing `count` is undefined.
#[must_use]
pub fn resolve(value: &Value, path: &str) -> Option<Value> {
    let segments = parse_path(path);
    let mut current = value.clone();
    for segment in &segments {
        current = match (segment, &current) {
            (Segment::Key(key), Value::Array(items)) if is_size_key(key) => {
                Value::from(items.len())
            }
            (Segment::Key(key), Value::String(text)) if key == "length" => {
                Value::from(text.chars().count())
            }
            _ => lookup(&current, std::slice::from_ref(segment))?.clone(),
        };
    }
    Some(current)
}

fn is_size_key(key: &str) -> bool {
    key == "length" || key == "count"
}

/// Copy the value at `segments` in `source` into `target`.
///
/// Containers along the way are rebuilt with the kind they have in `source`:
/// an object stays an object even when the segment is a numeric index, and an
/// array is padded with `null` only up to an index that exists in `source`.
/// Returns `false` when the path does not resolve in `source` or when
/// `target` already holds a different kind of value on the way.
pub fn copy_path(source: &Value, target: &mut Value, segments: &[Segment]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        *target = source.clone();
        return true;
    };
    let Some(child) = lookup(source, std::slice::from_ref(first)) else {
        return false;
    };

    if target.is_null() {
        *target = match source {
            Value::Array(_) => Value::Array(Vec::new()),
            _ => Value::Object(Map::new()),
        };
    }

    let slot = match (source, target) {
        (Value::Object(_), Value::Object(map)) => {
            let key = match first {
                Segment::Key(key) => key.clone(),
                Segment::Index(index) => index.to_string(),
            };
            map.entry(key).or_insert(Value::Null)
        }
        (Value::Array(_), Value::Array(items)) => {
            let index = match first {
                Segment::Index(index) => *index,
                Segment::Key(key) => match key.parse::<usize>() {
                    Ok(index) => index,
                    Err(_) => return false,
                },
            };
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            match items.get_mut(index) {
                Some(slot) => slot,
                None => return false,
            }
        }
        _ => return false,
    };
    copy_path(child, slot, rest)
}

/// Delete the value at `segments`. Returns whether anything was removed.
///
/// Removing an array element shifts the following elements down.
pub fn remove(target: &mut Value, segments: &[Segment]) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = target;
    for segment in parents {
        current = match (segment, current) {
            (Segment::Key(key), Value::Object(map)) => match map.get_mut(key) {
                Some(next) => next,
                None => return false,
            },
            (Segment::Index(index), Value::Array(items)) => match items.get_mut(*index) {
                Some(next) => next,
                None => return false,
            },
            (Segment::Index(index), Value::Object(map)) => match map.get_mut(&index.to_string()) {
                Some(next) => next,
                None => return false,
            },
            _ => return false,
        };
    }

    match (last, current) {
        (Segment::Key(key), Value::Object(map)) => map.remove(key).is_some(),
        (Segment::Index(index), Value::Object(map)) => map.remove(&index.to_string()).is_some(),
        (Segment::Index(index), Value::Array(items)) if *index < items.len() => {
            items.remove(*index);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_mixed_path() {
        assert_eq!(
            parse_path("content[0].text"),
            vec![
                Segment::Key("content".into()),
                Segment::Index(0),
                Segment::Key("text".into()),
            ]
        );
        assert_eq!(parse_path("a['b.c']"), vec![
            Segment::Key("a".into()),
            Segment::Key("b.c".into()),
        ]);
        assert!(parse_path("").is_empty());
    }

    #[test]
    fn test_format_roundtrips_display_form() {
        assert_eq!(format_path(&parse_path("a.b[2].c")), "a.b[2].c");
        assert_eq!(format_path(&parse_path("[1].x")), "[1].x");
    }

    #[test]
    fn test_resolve_nested() {
        let value = json!({ "content": [{ "text": "8" }] });
        assert_eq!(resolve(&value, "content[0].text"), Some(json!("8")));
        assert_eq!(resolve(&value, "content[1].text"), None);
        assert_eq!(resolve(&value, "content.0.text"), Some(json!("8")));
    }

    #[test]
    fn test_resolve_through_null_is_undefined() {
        let value = json!({ "a": null });
        assert_eq!(resolve(&value, "a.b"), None);
        assert_eq!(resolve(&value, "a"), Some(Value::Null));
    }

    #[test]
    fn test_resolve_length_pseudo_properties() {
        let value = json!({ "items": [1, 2, 3], "name": "héllo", "map": { "x": 1 } });
        assert_eq!(resolve(&value, "items.length"), Some(json!(3)));
        assert_eq!(resolve(&value, "items.count"), Some(json!(3)));
        assert_eq!(resolve(&value, "name.length"), Some(json!(5)));
        assert_eq!(resolve(&value, "map.count"), None);
        assert_eq!(resolve(&json!({ "count": 7 }), "count"), Some(json!(7)));
    }

    #[test]
    fn test_copy_path_builds_containers() {
        let source = json!({ "content": [{ "text": "a" }, { "text": "hi", "type": "text" }] });
        let mut target = Value::Null;
        assert!(copy_path(&source, &mut target, &parse_path("content[1].text")));
        assert_eq!(target, json!({ "content": [null, { "text": "hi" }] }));
    }

    #[test]
    fn test_copy_path_keeps_objects_with_numeric_keys() {
        let source = json!({ "scores": { "2": "b", "x": 1 } });
        let mut target = Value::Null;
        assert!(copy_path(&source, &mut target, &parse_path("scores[2]")));
        assert_eq!(target, json!({ "scores": { "2": "b" } }));

        let source = json!({ "ids": { "4000000000": true } });
        let mut target = Value::Null;
        assert!(copy_path(&source, &mut target, &parse_path("ids[4000000000]")));
        assert_eq!(target, json!({ "ids": { "4000000000": true } }));
    }

    #[test]
    fn test_copy_path_missing_in_source() {
        let source = json!({ "a": 1 });
        let mut target = Value::Null;
        assert!(!copy_path(&source, &mut target, &parse_path("a.b")));
        assert!(!copy_path(&source, &mut target, &parse_path("list[9]")));
    }

    #[test]
    fn test_remove_key_and_index() {
        let mut target = json!({ "x": { "y": { "z": 1, "w": 2 } }, "list": [1, 2, 3] });
        assert!(remove(&mut target, &parse_path("x.y.z")));
        assert!(remove(&mut target, &parse_path("list[0]")));
        assert!(!remove(&mut target, &parse_path("missing.key")));
        assert_eq!(target, json!({ "x": { "y": { "w": 2 } }, "list": [2, 3] }));
    }
}

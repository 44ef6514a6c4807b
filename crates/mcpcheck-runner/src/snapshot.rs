//! The snapshot store.
//!
//! A snapshot is a named, previously accepted output. Values are projected
//! (allow-list, then exclusions) and normalized (object keys sorted
//! recursively) before they are stored or compared, so only the declared
//! relevant part of an output is ever persisted and key order never matters.
//!
//! Each snapshot lives in its own `<name>.snap.json` file under the store's
//! directory, which is created on demand. Update mode is an explicit argument
//! to [`SnapshotStore::compare`]; the store holds no run state.
//!
//! # Example
//!
//! ```no_run
//! use mcpcheck_core::declaration::SnapshotProjection;
//! use mcpcheck_runner::snapshot::SnapshotStore;
//! use serde_json::json;
//!
//! # async fn example() -> mcpcheck_core::Result<()> {
//! let store = SnapshotStore::new("__snapshots__");
//! let projection = SnapshotProjection::default();
//!
//! // First run in update mode captures the baseline.
//! store.compare("tool-add", &json!({ "a": 1 }), &projection, true).await?;
//!
//! // Later runs compare against it.
//! let comparison = store.compare("tool-add", &json!({ "a": 2 }), &projection, false).await?;
//! assert!(!comparison.matched());
//! println!("{}", comparison.diff.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use mcpcheck_core::declaration::SnapshotProjection;
use mcpcheck_core::error::{CheckError, Result};
use mcpcheck_core::path::{self, Segment};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Version written into snapshot metadata.
pub const SNAPSHOT_FORMAT_VERSION: &str = "1";

/// Snapshot file suffix.
pub const SNAPSHOT_EXTENSION: &str = ".snap.json";

/// Default snapshot directory name.
pub const DEFAULT_SNAPSHOT_DIR: &str = "__snapshots__";

/// A stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot name.
    pub name: String,
    /// When the snapshot was captured.
    pub timestamp: DateTime<Utc>,
    /// Normalized, projected value.
    pub data: Value,
    /// How the data was produced.
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

/// Snapshot metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Snapshot format version.
    #[serde(default)]
    pub version: String,
    /// Allow-list used when capturing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
    /// Exclusions used when capturing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// What a comparison concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOutcome {
    /// The stored data equals the actual data.
    Matched,
    /// No snapshot existed; one was captured (update mode).
    Created,
    /// The stored data differed and was overwritten (update mode).
    Updated,
    /// No snapshot exists and update mode is off.
    Missing,
    /// The stored data differs and update mode is off.
    Mismatched,
}

/// Result of [`SnapshotStore::compare`].
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotComparison {
    /// What happened.
    pub outcome: ComparisonOutcome,
    /// Explanation for `Missing`, or `-`/`+` diff lines for `Mismatched`.
    pub diff: Option<String>,
    /// The snapshot that was on disk before the comparison.
    pub existing: Option<Snapshot>,
}

impl SnapshotComparison {
    /// Whether the comparison counts as a pass.
    #[must_use]
    pub const fn matched(&self) -> bool {
        matches!(
            self.outcome,
            ComparisonOutcome::Matched | ComparisonOutcome::Created | ComparisonOutcome::Updated
        )
    }
}

/// File-backed snapshot storage rooted at one directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at `dir`. Nothing is touched on disk yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file that holds snapshot `name`.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}{SNAPSHOT_EXTENSION}", sanitize_name(name)))
    }

    /// Load a snapshot; `None` if it does not exist.
    pub async fn load(&self, name: &str) -> Result<Option<Snapshot>> {
        let path = self.path_for(name);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CheckError::snapshot(
                    name,
                    format!("failed to read {}", path.display()),
                    e,
                ));
            }
        };

        let snapshot: Snapshot = serde_json::from_str(&text).map_err(|e| {
            CheckError::snapshot(name, format!("{} is not a valid snapshot", path.display()), e)
        })?;
        ensure_owner(name, &path, &snapshot.name)?;
        Ok(Some(snapshot))
    }

    /// Project, normalize and write `value` as snapshot `name`.
    ///
    /// Refuses to overwrite a file that holds a different snapshot.
    pub async fn save(
        &self,
        name: &str,
        value: &Value,
        projection: &SnapshotProjection,
    ) -> Result<Snapshot> {
        self.check_slot(name, &self.path_for(name)).await?;
        let snapshot = Snapshot {
            name: name.to_string(),
            timestamp: Utc::now(),
            data: prepare(value, projection),
            metadata: SnapshotMetadata {
                version: SNAPSHOT_FORMAT_VERSION.to_string(),
                properties: projection.properties.clone(),
                exclude: projection.exclude.clone(),
            },
        };
        self.write(&snapshot).await?;
        Ok(snapshot)
    }

    /// Fail if `path` holds a readable snapshot stored under another name.
    async fn check_slot(&self, name: &str, path: &Path) -> Result<()> {
        let Ok(text) = tokio::fs::read_to_string(path).await else {
            return Ok(());
        };
        match serde_json::from_str::<Snapshot>(&text) {
            Ok(stored) => ensure_owner(name, path, &stored.name),
            Err(_) => Ok(()),
        }
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let path = self.path_for(&snapshot.name);

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CheckError::snapshot(
                &snapshot.name,
                format!("failed to create {}", self.dir.display()),
                e,
            )
        })?;

        let mut text = serde_json::to_string_pretty(snapshot)?;
        text.push('\n');

        tokio::fs::write(&path, text).await.map_err(|e| {
            CheckError::snapshot(
                &snapshot.name,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;

        debug!(snapshot = %snapshot.name, path = %path.display(), "Wrote snapshot");
        Ok(())
    }

    /// Compare `actual` against snapshot `name`.
    ///
    /// With `update` off the store is never written. With `update` on, a
    /// missing or different snapshot is (re)written and reported as a match.
    pub async fn compare(
        &self,
        name: &str,
        actual: &Value,
        projection: &SnapshotProjection,
        update: bool,
    ) -> Result<SnapshotComparison> {
        let prepared = prepare(actual, projection);

        let Some(existing) = self.load(name).await? else {
            if update {
                self.save(name, actual, projection).await?;
                info!(snapshot = %name, "Created snapshot");
                return Ok(SnapshotComparison {
                    outcome: ComparisonOutcome::Created,
                    diff: None,
                    existing: None,
                });
            }
            return Ok(SnapshotComparison {
                outcome: ComparisonOutcome::Missing,
                diff: Some(format!(
                    "Snapshot '{name}' does not exist; run with --update-snapshots to create it"
                )),
                existing: None,
            });
        };

        if deep_equal(&existing.data, &prepared) {
            return Ok(SnapshotComparison {
                outcome: ComparisonOutcome::Matched,
                diff: None,
                existing: Some(existing),
            });
        }

        if update {
            self.save(name, actual, projection).await?;
            info!(snapshot = %name, "Updated snapshot");
            return Ok(SnapshotComparison {
                outcome: ComparisonOutcome::Updated,
                diff: None,
                existing: Some(existing),
            });
        }

        let lines = diff(&existing.data, &prepared);
        Ok(SnapshotComparison {
            outcome: ComparisonOutcome::Mismatched,
            diff: Some(format!("Snapshot '{name}' does not match:\n{}", lines.join("\n"))),
            existing: Some(existing),
        })
    }

    /// Names of all stored snapshots, sorted. A missing directory is empty.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CheckError::snapshot(
                    "*",
                    format!("failed to list {}", self.dir.display()),
                    e,
                ));
            }
        };

        let mut names = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| {
                CheckError::snapshot("*", format!("failed to list {}", self.dir.display()), e)
            })?;
            let Some(entry) = entry else { break };

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = file_name.strip_suffix(SNAPSHOT_EXTENSION) else {
                continue;
            };

            match tokio::fs::read_to_string(entry.path()).await {
                Ok(text) => match serde_json::from_str::<Snapshot>(&text) {
                    Ok(snapshot) => names.push(snapshot.name),
                    Err(e) => {
                        warn!(file = %file_name, error = %e, "Skipping unreadable snapshot");
                        names.push(stem.to_string());
                    }
                },
                Err(e) => warn!(file = %file_name, error = %e, "Skipping unreadable snapshot"),
            }
        }

        names.sort();
        Ok(names)
    }

    /// Delete snapshot `name`. Returns whether a file was removed.
    ///
    /// A file that holds a different snapshot under the same sanitized name
    /// is left alone and reported as an error.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name);
        self.check_slot(name, &path).await?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(snapshot = %name, path = %path.display(), "Removed snapshot");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CheckError::snapshot(
                name,
                format!("failed to remove {}", path.display()),
                e,
            )),
        }
    }
}

/// Different names can sanitize to the same file; the stored name decides
/// who owns it.
fn ensure_owner(name: &str, path: &Path, stored: &str) -> Result<()> {
    if stored == name {
        return Ok(());
    }
    Err(CheckError::Snapshot {
        name: name.to_string(),
        message: format!(
            "{} already holds snapshot '{stored}'; choose a snapshot name that differs after sanitizing",
            path.display()
        ),
        source: None,
    })
}

/// Replace characters outside `[A-Za-z0-9._-]` with `_`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Project then normalize: the form that is stored and compared.
#[must_use]
pub fn prepare(value: &Value, projection: &SnapshotProjection) -> Value {
    normalize(&project(value, projection))
}

/// Recursively sort object keys. Arrays keep their order.
#[must_use]
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), normalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => other.clone(),
    }
}

/// Apply the allow-list (if any), then delete the excluded paths.
///
/// Allow-listed paths that do not exist are omitted. Kept sub-trees are
/// rebuilt with the container kinds of `value`; an array on the way is
/// padded with `null` up to the kept index.
#[must_use]
pub fn project(value: &Value, projection: &SnapshotProjection) -> Value {
    if projection.is_identity() {
        return value.clone();
    }

    let mut projected = if projection.properties.is_empty() {
        value.clone()
    } else {
        let mut kept = Value::Object(Map::new());
        for property in &projection.properties {
            path::copy_path(value, &mut kept, &path::parse_path(property));
        }
        kept
    };

    for excluded in &projection.exclude {
        path::remove(&mut projected, &path::parse_path(excluded));
    }
    projected
}

/// Structural equality. Numbers compare by value; arrays and objects are
/// never equal to each other.
#[must_use]
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(i), Some(j)) => i == j,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => a == b,
    }
}

/// `-`/`+` lines for every differing leaf path between `expected` and `actual`.
#[must_use]
pub fn diff(expected: &Value, actual: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    let mut trail = Vec::new();
    diff_into(Some(expected), Some(actual), &mut trail, &mut lines);
    lines
}

fn diff_into(
    expected: Option<&Value>,
    actual: Option<&Value>,
    trail: &mut Vec<Segment>,
    lines: &mut Vec<String>,
) {
    match (expected, actual) {
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                trail.push(Segment::Key(key.clone()));
                diff_into(a.get(key.as_str()), b.get(key.as_str()), trail, lines);
                trail.pop();
            }
        }
        (Some(Value::Array(a)), Some(Value::Array(b))) => {
            for index in 0..a.len().max(b.len()) {
                trail.push(Segment::Index(index));
                diff_into(a.get(index), b.get(index), trail, lines);
                trail.pop();
            }
        }
        (Some(a), Some(b)) if deep_equal(a, b) => {}
        _ => {
            let location = if trail.is_empty() {
                "(root)".to_string()
            } else {
                path::format_path(trail)
            };
            if let Some(a) = expected {
                lines.push(format!("- {location}: {a}"));
            }
            if let Some(b) = actual {
                lines.push(format!("+ {location}: {b}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn projection(properties: &[&str], exclude: &[&str]) -> SnapshotProjection {
        SnapshotProjection {
            properties: properties.iter().map(ToString::to_string).collect(),
            exclude: exclude.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_normalize_is_key_order_independent() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"y":2,"x":[{"q":1,"p":2}]}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"x":[{"p":2,"q":1}],"y":2},"a":1}"#).unwrap();
        assert_eq!(normalize(&a), normalize(&b));
        assert!(deep_equal(&normalize(&a), &normalize(&b)));
        assert_eq!(
            serde_json::to_string(&normalize(&a)).unwrap(),
            serde_json::to_string(&normalize(&b)).unwrap()
        );
    }

    #[test]
    fn test_projection_composes_properties_then_exclude() {
        let value = json!({ "x": { "y": { "z": 1, "w": 2 }, "v": 3 }, "other": true });
        let projected = project(&value, &projection(&["x.y"], &["x.y.z"]));
        assert_eq!(projected, json!({ "x": { "y": { "w": 2 } } }));
    }

    #[test]
    fn test_projection_omits_absent_paths() {
        let value = json!({ "a": 1 });
        assert_eq!(project(&value, &projection(&["a", "missing.b"], &[])), json!({ "a": 1 }));
    }

    #[test]
    fn test_projection_through_arrays() {
        let value = json!({ "content": [{ "text": "a", "type": "text" }, { "text": "b" }] });
        let projected = project(&value, &projection(&["content[1].text"], &[]));
        assert_eq!(projected, json!({ "content": [null, { "text": "b" }] }));

        let excluded = project(&value, &projection(&[], &["content[0]"]));
        assert_eq!(excluded, json!({ "content": [{ "text": "b" }] }));
    }

    #[test]
    fn test_projection_keeps_numeric_keyed_objects() {
        let value = json!({ "scores": { "2": "b", "x": 1 }, "ids": { "4000000000": true } });
        let projected = project(&value, &projection(&["scores[2]", "ids[4000000000]"], &[]));
        assert_eq!(projected, json!({ "scores": { "2": "b" }, "ids": { "4000000000": true } }));
    }

    #[test]
    fn test_deep_equal_distinguishes_arrays_and_objects() {
        assert!(!deep_equal(&json!([1, 2]), &json!({ "0": 1, "1": 2 })));
        assert!(!deep_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(deep_equal(&json!(1), &json!(1.0)));
        assert!(!deep_equal(&json!({ "a": 1 }), &json!({ "a": 1, "b": null })));
    }

    #[test]
    fn test_diff_lines() {
        let lines = diff(&json!({ "a": 1, "gone": true }), &json!({ "a": 2, "new": [1] }));
        assert_eq!(
            lines,
            vec!["- a: 1", "+ a: 2", "- gone: true", "+ new: [1]"]
        );
    }

    #[test]
    fn test_diff_type_mismatch_yields_both_lines() {
        let lines = diff(&json!({ "a": [1] }), &json!({ "a": { "0": 1 } }));
        assert_eq!(lines, vec!["- a: [1]", "+ a: {\"0\":1}"]);
        assert_eq!(diff(&json!(1), &json!("1")), vec!["- (root): 1", "+ (root): \"1\""]);
    }

    #[test]
    fn test_diff_array_positions() {
        let lines = diff(&json!({ "items": [1, 2] }), &json!({ "items": [1, 3, 4] }));
        assert_eq!(lines, vec!["- items[1]: 2", "+ items[1]: 3", "+ items[2]: 4"]);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("tool-add"), "tool-add");
        assert_eq!(sanitize_name("resource-file:///logs/a.txt"), "resource-file____logs_a.txt");
        assert_eq!(sanitize_name(""), "_");
    }
}

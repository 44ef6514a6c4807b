//! The expectation evaluator.
//!
//! Expressions are tiny, side-effect-free judgments over an invocation
//! result. The grammar is tried in this order:
//!
//! 1. `exists`: the value is not `null`
//! 2. `a && b && ...`: every conjunct must hold
//! 3. `path OP literal` with `OP` one of `===`, `!==`, `==`, `!=`, `>=`,
//!    `<=`, `>`, `<`
//! 4. `path`: the resolved value is truthy
//!
//! Paths are resolved with [`mcpcheck_core::path::resolve`], which also
//! provides the `length`/`count` pseudo-properties used by expressions such
//! as `content.length > 0`. A path that cannot be traversed is undefined: it
//! is falsy and fails every comparison except `!=`/`!==`.
//!
//! # Example
//!
//! ```rust
//! use mcpcheck_runner::evaluator::evaluate_expression;
//! use serde_json::json;
//!
//! let result = json!({ "content": [{ "type": "text", "text": "8" }] });
//! assert!(evaluate_expression(&result, "content[0].text === '8'"));
//! assert!(evaluate_expression(&result, "content.length == 1 && content[0].type"));
//! assert!(!evaluate_expression(&result, "content[0].text === '9'"));
//! ```

use mcpcheck_core::declaration::Expectation;
use mcpcheck_core::path;
use serde_json::Value;
use std::fmt;

/// Judge `value` against an expectation.
///
/// Predicates receive the raw value and their answer is used as is.
#[must_use]
pub fn evaluate(value: &Value, expectation: &Expectation) -> bool {
    match expectation {
        Expectation::Expression(expression) => evaluate_expression(value, expression),
        Expectation::Predicate(predicate) => predicate(value),
    }
}

/// Parse and evaluate an expression string.
#[must_use]
pub fn evaluate_expression(value: &Value, expression: &str) -> bool {
    Expression::parse(expression).evaluate(value)
}

/// Comparison operators, longest spelling first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
    /// `==`
    LooseEq,
    /// `!=`
    LooseNe,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `<`
    Lt,
}

impl Operator {
    const ALL: [Self; 8] = [
        Self::StrictEq,
        Self::StrictNe,
        Self::LooseEq,
        Self::LooseNe,
        Self::Ge,
        Self::Le,
        Self::Gt,
        Self::Lt,
    ];

    /// The operator's source spelling.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
            Self::LooseEq => "==",
            Self::LooseNe => "!=",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }

    fn apply(self, lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
        match self {
            Self::StrictEq => strict_equal(lhs, rhs),
            Self::StrictNe => !strict_equal(lhs, rhs),
            Self::LooseEq => loose_equal(lhs, rhs),
            Self::LooseNe => !loose_equal(lhs, rhs),
            Self::Ge => numeric(lhs, rhs, |a, b| a >= b),
            Self::Le => numeric(lhs, rhs, |a, b| a <= b),
            Self::Gt => numeric(lhs, rhs, |a, b| a > b),
            Self::Lt => numeric(lhs, rhs, |a, b| a < b),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One conjunct of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `exists`
    Exists,
    /// A bare path checked for truthiness.
    Truthy(String),
    /// `path OP literal`; a `None` literal is `undefined`.
    Compare {
        /// Path on the left-hand side.
        path: String,
        /// The comparison.
        op: Operator,
        /// Parsed right-hand side.
        literal: Option<Value>,
    },
}

impl Condition {
    fn parse(source: &str) -> Self {
        let source = source.trim();
        if source == "exists" {
            return Self::Exists;
        }
        match find_operator(source) {
            Some((index, op)) => Self::Compare {
                path: source[..index].trim().to_string(),
                op,
                literal: parse_literal(source[index + op.symbol().len()..].trim()),
            },
            None => Self::Truthy(source.to_string()),
        }
    }

    fn evaluate(&self, value: &Value) -> bool {
        match self {
            Self::Exists => !value.is_null(),
            Self::Truthy(path) => truthy(path::resolve(value, path).as_ref()),
            Self::Compare { path, op, literal } => {
                op.apply(path::resolve(value, path).as_ref(), literal.as_ref())
            }
        }
    }
}

/// A parsed expression: all conditions must hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    conditions: Vec<Condition>,
}

impl Expression {
    /// Parse an expression. Parsing never fails; unknown syntax degrades to
    /// a path lookup.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        let conditions = if source == "exists" {
            vec![Condition::Exists]
        } else if source.contains("&&") {
            source.split("&&").map(Condition::parse).collect()
        } else {
            vec![Condition::parse(source)]
        };
        Self { conditions }
    }

    /// The parsed conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Evaluate against a value.
    #[must_use]
    pub fn evaluate(&self, value: &Value) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.evaluate(value))
    }
}

/// Leftmost operator occurrence; longest spelling wins at a position.
fn find_operator(source: &str) -> Option<(usize, Operator)> {
    source.char_indices().find_map(|(index, _)| {
        let rest = &source[index..];
        Operator::ALL
            .iter()
            .find(|op| rest.starts_with(op.symbol()))
            .map(|op| (index, *op))
    })
}

/// Parse a literal: number, boolean, `null`, quoted string, bare string.
///
/// `undefined` parses to `None`.
fn parse_literal(source: &str) -> Option<Value> {
    if looks_numeric(source) {
        if let Ok(int) = source.parse::<i64>() {
            return Some(Value::from(int));
        }
        if let Some(number) = source
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            return Some(Value::Number(number));
        }
    }
    match source {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        "undefined" => return None,
        _ => {}
    }
    if let Some(inner) = unquote(source) {
        return Some(Value::String(inner.to_string()));
    }
    Some(Value::String(source.to_string()))
}

fn looks_numeric(source: &str) -> bool {
    source
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
}

fn unquote(source: &str) -> Option<&str> {
    ['\'', '"', '`'].iter().find_map(|quote| {
        source
            .strip_prefix(*quote)
            .and_then(|rest| rest.strip_suffix(*quote))
    })
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

fn numeric(lhs: Option<&Value>, rhs: Option<&Value>, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (lhs.and_then(Value::as_f64), rhs.and_then(Value::as_f64)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// `===`: same type and same value. Containers never compare equal to a literal.
fn strict_equal(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    match (lhs, rhs) {
        (None, None) => true,
        (Some(Value::Null), Some(Value::Null)) => true,
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a == b,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(Value::String(a)), Some(Value::String(b))) => a == b,
        _ => false,
    }
}

/// `==`: `null` equals undefined, numbers and strings coerce, booleans count as 0/1.
fn loose_equal(lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    let nullish = |v: Option<&Value>| matches!(v, None | Some(Value::Null));
    if nullish(lhs) || nullish(rhs) {
        return nullish(lhs) && nullish(rhs);
    }
    match (lhs, rhs) {
        (Some(Value::Bool(b)), other) | (other, Some(Value::Bool(b))) => {
            let as_number = Value::from(u8::from(*b));
            match other {
                Some(Value::Bool(_)) => strict_equal(lhs, rhs),
                _ => loose_equal(Some(&as_number), other),
            }
        }
        (Some(Value::Number(n)), Some(Value::String(s)))
        | (Some(Value::String(s)), Some(Value::Number(n))) => {
            string_to_number(s).is_some_and(|parsed| n.as_f64() == Some(parsed))
        }
        _ => strict_equal(lhs, rhs),
    }
}

fn string_to_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|f| !f.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn text_result(text: &str) -> Value {
        json!({ "content": [{ "type": "text", "text": text }] })
    }

    #[test]
    fn test_strict_string_equality() {
        assert!(evaluate_expression(&text_result("8"), "content[0].text === '8'"));
        assert!(!evaluate_expression(&text_result("9"), "content[0].text === '8'"));
        assert!(!evaluate_expression(&text_result("8"), "content[0].text === 8"));
    }

    #[test]
    fn test_loose_equality_coerces() {
        assert!(evaluate_expression(&text_result("8"), "content[0].text == 8"));
        assert!(evaluate_expression(&json!({ "flag": true }), "flag == 1"));
        assert!(evaluate_expression(&json!({ "a": null }), "a == undefined"));
        assert!(evaluate_expression(&json!({}), "missing == null"));
        assert!(!evaluate_expression(&json!({}), "missing === null"));
    }

    #[test]
    fn test_inequality_operators() {
        assert!(evaluate_expression(&json!({ "a": 1 }), "a !== '1'"));
        assert!(!evaluate_expression(&json!({ "a": 1 }), "a != '1'"));
        assert!(evaluate_expression(&json!({}), "missing != 3"));
    }

    #[test]
    fn test_numeric_comparisons_require_numbers() {
        let value = json!({ "n": 5, "s": "5" });
        assert!(evaluate_expression(&value, "n > 4"));
        assert!(evaluate_expression(&value, "n >= 5"));
        assert!(evaluate_expression(&value, "n <= 5.0"));
        assert!(!evaluate_expression(&value, "n < 5"));
        assert!(!evaluate_expression(&value, "s > 4"));
        assert!(!evaluate_expression(&value, "missing > -1"));
    }

    #[test]
    fn test_exists() {
        assert!(evaluate_expression(&json!({}), "exists"));
        assert!(evaluate_expression(&json!(0), "exists"));
        assert!(!evaluate_expression(&Value::Null, "exists"));
    }

    #[test]
    fn test_conjunction_requires_all() {
        let value = json!({ "content": [{ "text": "ok" }], "isError": false });
        assert!(evaluate_expression(&value, "content.length > 0 && content[0].text === 'ok'"));
        assert!(!evaluate_expression(&value, "content.length > 0 && isError"));
    }

    #[test]
    fn test_length_and_count() {
        let value = json!({ "items": [1, 2, 3], "count": 2 });
        assert!(evaluate_expression(&value, "items.length === 3"));
        assert!(evaluate_expression(&value, "items.count > 2"));
        assert!(evaluate_expression(&value, "count == 2"));
        assert!(!evaluate_expression(&json!({ "meta": { "x": 1 } }), "meta.count === 1"));
    }

    #[test]
    fn test_truthiness() {
        let value = json!({ "empty": "", "zero": 0, "list": [], "text": "x" });
        assert!(!evaluate_expression(&value, "empty"));
        assert!(!evaluate_expression(&value, "zero"));
        assert!(evaluate_expression(&value, "list"));
        assert!(evaluate_expression(&value, "text"));
        assert!(!evaluate_expression(&value, "a.b.c"));
    }

    #[test]
    fn test_leftmost_operator_wins() {
        assert_eq!(
            Expression::parse("text === 'a<b'").conditions(),
            &[Condition::Compare {
                path: "text".into(),
                op: Operator::StrictEq,
                literal: Some(json!("a<b")),
            }]
        );
        assert!(evaluate_expression(&json!({ "text": "a<b" }), "text === 'a<b'"));
    }

    #[test]
    fn test_literal_parsing_order() {
        assert_eq!(parse_literal("42"), Some(json!(42)));
        assert_eq!(parse_literal("-1.5"), Some(json!(-1.5)));
        assert_eq!(parse_literal("true"), Some(json!(true)));
        assert_eq!(parse_literal("null"), Some(Value::Null));
        assert_eq!(parse_literal("\"quoted\""), Some(json!("quoted")));
        assert_eq!(parse_literal("bare"), Some(json!("bare")));
        assert_eq!(parse_literal("undefined"), None);
    }

    #[test]
    fn test_predicate_receives_raw_value() {
        let expectation = Expectation::predicate(|v| v["b"] == 2 && v["a"] == 1);
        assert!(evaluate(&json!({ "b": 2, "a": 1 }), &expectation));
        assert!(!evaluate(&json!({ "b": 3 }), &expectation));
    }
}

//! Render-time value coercions.
//!
//! Template values are `serde_json::Value` so assigned data, artifact JSON
//! and the expression evaluator all share one representation. The coercion
//! rules follow loose scripting semantics: `""`, `"0"`, `0` and empty
//! arrays are falsy, numeric-looking strings compare numerically.

use serde_json::Value;
use std::cmp::Ordering;

/// Loose truthiness.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text a value prints as. Composite values print as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        composite => serde_json::to_string(composite).unwrap_or_default(),
    }
}

/// Numeric view of a value, when it has one.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => Some(0.0),
        _ => None,
    }
}

pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => as_number(value).map(|f| f as i64),
    }
}

/// Build a number value, collapsing to an integer when exact.
pub fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Loose ordering: numeric when both sides have a numeric view, string
/// ordering otherwise.
pub fn compare(lhs: &Value, rhs: &Value) -> Ordering {
    if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    stringify(lhs).cmp(&stringify(rhs))
}

/// Loose equality, consistent with [`compare`].
pub fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    compare(lhs, rhs) == Ordering::Equal
}

/// Strict equality: same type and same value.
pub fn strict_eq(lhs: &Value, rhs: &Value) -> bool {
    lhs == rhs
}

/// Element count: array length, object size, string character count.
pub fn count(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        Value::Null => 0,
        _ => 1,
    }
}

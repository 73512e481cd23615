//! Template values are `serde_json::Value`s; helpers for the
//! conversions the engine needs.

use std::fmt::Display;

pub use serde_json::{Value, Map};

/// A render context: string keys to values. The key `"."` holds the
/// current item in iterations and the bound value in `with` blocks.
pub type Context = Map<String, Value>;

/// The key under which the current item is stored.
pub const DOT: &str = ".";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Sequence,
    Mapping,
}

impl ValueKind {
    pub fn of(value: &Value) -> ValueKind {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Sequence,
            Value::Object(_) => ValueKind::Mapping,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Sequence => "sequence",
            ValueKind::Mapping => "mapping",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `false`, `""`, zero, empty sequences and mappings and null are
/// false, everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) =>
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(u) = n.as_u64() {
                u != 0
            } else {
                n.as_f64().map(|f| f != 0.0).unwrap_or(false)
            },
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}

/// The string written to the output for a value. Null becomes the
/// empty string, sequences and mappings are written as JSON.
pub fn to_output_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Strip one pair of surrounding double quotes, if present.
pub fn unquote(token: &str) -> &str {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        &token[1..token.len() - 1]
    } else {
        token
    }
}

/// Interpret a token that is neither a path nor a variable: quoted
/// strings, booleans, null, numbers; any other word stands for
/// itself as a string.
pub fn literal_value(token: &str) -> Value {
    if token.starts_with('"') {
        return Value::String(unquote(token).to_string())
    }
    match token {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" | "nil" => Value::Null,
        _ =>
            if let Ok(i) = token.parse::<i64>() {
                Value::from(i)
            } else if let Some(n) = token.parse::<f64>().ok()
                .filter(|f| f.is_finite())
                .and_then(serde_json::Number::from_f64)
            {
                Value::Number(n)
            } else {
                Value::String(token.to_string())
            }
    }
}

/// Integer view of a value, accepting numeric strings too.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None
    }
}

/// Descend into `value` following `keys`: mapping keys, or
/// non-negative indices for sequences.
pub fn descend<'v, S: AsRef<str>>(value: &'v Value, keys: &[S]) -> Option<&'v Value> {
    let mut current = value;
    for key in keys {
        let key = key.as_ref();
        current = match current {
            Value::Object(m) => m.get(key)?,
            Value::Array(a) => a.get(key.parse::<usize>().ok()?)?,
            _ => return None
        };
    }
    Some(current)
}

/// A new context holding the entries of `global`, overridden by
/// those of `local`.
pub fn layered(global: &Context, local: Context) -> Context {
    if global.is_empty() {
        return local
    }
    let mut ctx = global.clone();
    ctx.extend(local);
    ctx
}

/// The context used when a value is handed to a sub-render: mappings
/// are used as they are, anything else is bound to `"."`.
pub fn context_from_value(value: Value) -> Context {
    match value {
        Value::Object(m) => m,
        other => {
            let mut ctx = Context::new();
            ctx.insert(DOT.into(), other);
            ctx
        }
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    #[test]
    fn t_is_truthy() {
        for v in [json!(null), json!(false), json!(""), json!(0), json!(0.0),
                  json!([]), json!({})] {
            assert!(!is_truthy(&v), "{v:?}");
        }
        for v in [json!(true), json!("0"), json!(-1), json!(0.5), json!([0]),
                  json!({"a": null})] {
            assert!(is_truthy(&v), "{v:?}");
        }
    }

    #[test]
    fn t_literal_value() {
        assert_eq!(literal_value("\"a b\""), json!("a b"));
        assert_eq!(literal_value("42"), json!(42));
        assert_eq!(literal_value("-1.5"), json!(-1.5));
        assert_eq!(literal_value("true"), json!(true));
        assert_eq!(literal_value("nil"), json!(null));
        assert_eq!(literal_value("word"), json!("word"));
        assert_eq!(literal_value("inf"), json!("inf"));
    }

    #[test]
    fn t_descend() {
        let v = json!({"a": {"b": [10, {"c": "x"}]}});
        assert_eq!(descend(&v, &["a", "b", "1", "c"]), Some(&json!("x")));
        assert_eq!(descend(&v, &["a", "b", "0"]), Some(&json!(10)));
        assert_eq!(descend(&v, &["a", "b", "2"]), None);
        assert_eq!(descend(&v, &["a", "b", "x"]), None);
        assert_eq!(descend(&v, &["a", "b", "0", "z"]), None);
        assert_eq!(descend::<&str>(&v, &[]), Some(&v));
    }

    #[test]
    fn t_to_output_string() {
        assert_eq!(to_output_string(&json!(null)), "");
        assert_eq!(to_output_string(&json!("s")), "s");
        assert_eq!(to_output_string(&json!(3)), "3");
        assert_eq!(to_output_string(&json!([1, "a"])), "[1,\"a\"]");
    }
}

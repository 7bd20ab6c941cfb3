//! The attribute value type shared by principals, resources, variables and
//! CEL contexts.
//!
//! Source systems carry untyped attribute maps; spec.md §9 calls for a
//! tagged sum here instead so access errors (missing key, wrong shape) are
//! explicit rather than silently absent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A JSON-shaped value: `null | bool | number | string | list | map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Field access on a `Map`, `None` for anything else (including a
    /// missing key) — callers that need fail-closed semantics on a missing
    /// path should treat `None` as an evaluation error.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Num(n.as_f64().unwrap_or(0.0)),
            JsonValue::String(s) => Value::Str(s),
            JsonValue::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
            JsonValue::Object(o) => {
                Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for JsonValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(b),
            Value::Num(n) => serde_json::Number::from_f64(n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Str(s) => JsonValue::String(s),
            Value::List(l) => JsonValue::Array(l.into_iter().map(JsonValue::from).collect()),
            Value::Map(m) => {
                JsonValue::Object(m.into_iter().map(|(k, v)| (k, JsonValue::from(v))).collect())
            }
        }
    }
}

pub type AttributeMap = BTreeMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_json() {
        let original = serde_json::json!({
            "a": 1,
            "b": "text",
            "c": [true, false, null],
            "d": {"nested": 1.5}
        });
        let v: Value = original.clone().into();
        let back: JsonValue = v.into();
        assert_eq!(original, back);
    }

    #[test]
    fn map_get_missing_is_none() {
        let v = Value::Map(BTreeMap::new());
        assert!(v.get("missing").is_none());
        assert!(Value::Null.get("anything").is_none());
    }
}

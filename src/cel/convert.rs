//! Value conversion between this crate's [`Value`] sum type and
//! `cel_interpreter`'s own value representation.

use std::collections::HashMap;
use std::sync::Arc;

use cel_interpreter::objects::{Key, Map};
use cel_interpreter::objects::Value as CelValue;
use serde_json::Value as JsonValue;

use crate::value::Value;

/// Convert `serde_json::Value` to `cel_interpreter::Value`.
pub fn json_to_cel(value: &JsonValue) -> CelValue {
    match value {
        JsonValue::Null => CelValue::Null,
        JsonValue::Bool(b) => CelValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                CelValue::UInt(u)
            } else if let Some(f) = n.as_f64() {
                CelValue::Float(f)
            } else {
                CelValue::Null
            }
        }
        JsonValue::String(s) => CelValue::String(s.clone().into()),
        JsonValue::Array(arr) => {
            let cel_vec: Vec<CelValue> = arr.iter().map(json_to_cel).collect();
            CelValue::List(cel_vec.into())
        }
        JsonValue::Object(obj) => {
            let mut map_data: HashMap<Key, CelValue> = HashMap::new();
            for (k, v) in obj.iter() {
                map_data.insert(Key::from(k.clone()), json_to_cel(v));
            }
            CelValue::Map(Map { map: Arc::new(map_data) })
        }
    }
}

/// Convert `cel_interpreter::Value` back to `serde_json::Value`. CEL bytes,
/// durations and timestamps have no direct JSON shape in this grammar
/// subset, so they fall back to a debug string rather than pulling in a
/// bytes-encoding dependency this crate has no other use for.
pub fn cel_to_json(value: &CelValue) -> JsonValue {
    match value {
        CelValue::Null => JsonValue::Null,
        CelValue::Bool(b) => JsonValue::Bool(*b),
        CelValue::Int(i) => JsonValue::Number((*i).into()),
        CelValue::UInt(u) => JsonValue::Number((*u).into()),
        CelValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        CelValue::String(s) => JsonValue::String(s.to_string()),
        CelValue::Bytes(b) => JsonValue::String(hex_encode(b)),
        CelValue::List(list) => JsonValue::Array(list.iter().map(cel_to_json).collect()),
        CelValue::Map(map) => {
            let mut json_obj = serde_json::Map::new();
            for (k, v) in map.map.as_ref().iter() {
                let key_str = match k {
                    Key::String(s) => s.to_string(),
                    Key::Int(i) => i.to_string(),
                    Key::Uint(u) => u.to_string(),
                    Key::Bool(b) => b.to_string(),
                };
                json_obj.insert(key_str, cel_to_json(v));
            }
            JsonValue::Object(json_obj)
        }
        CelValue::Duration(_) | CelValue::Timestamp(_) | CelValue::Function(_, _) => {
            JsonValue::String(format!("{:?}", value))
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Convert this crate's [`Value`] to `cel_interpreter::Value` via the
/// existing JSON bridge.
pub fn value_to_cel(value: &Value) -> CelValue {
    json_to_cel(&JsonValue::from(value.clone()))
}

/// Convert a `cel_interpreter::Value` back to this crate's [`Value`].
pub fn cel_to_value(value: &CelValue) -> Value {
    Value::from(cel_to_json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_to_cel_bool() {
        let cel = json_to_cel(&json!(true));
        assert!(matches!(cel, CelValue::Bool(true)));
    }

    #[test]
    fn json_to_cel_int() {
        let cel = json_to_cel(&json!(42));
        assert!(matches!(cel, CelValue::Int(42)));
    }

    #[test]
    fn json_to_cel_string() {
        let cel = json_to_cel(&json!("hello"));
        match cel {
            CelValue::String(s) => assert_eq!(s.as_ref(), "hello"),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn json_to_cel_array() {
        let cel = json_to_cel(&json!([1, 2, 3]));
        match cel {
            CelValue::List(list) => assert_eq!(list.len(), 3),
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn json_to_cel_object() {
        let cel = json_to_cel(&json!({"key": "value"}));
        match cel {
            CelValue::Map(map) => assert_eq!(map.map.len(), 1),
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn round_trips_through_value() {
        let v = Value::Str("hi".to_string());
        let cel = value_to_cel(&v);
        let back = cel_to_value(&cel);
        assert_eq!(back, v);
    }
}

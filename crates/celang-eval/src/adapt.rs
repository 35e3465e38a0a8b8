//! Host and JSON value adaptation.
//!
//! JSON follows the `google.protobuf.Value` mapping: numbers become
//! doubles, objects become `map<string, dyn>`, arrays become `list<dyn>`.
//! Maps adapted from JSON remember their origin so `has()` treats a null
//! value as absent (defined-and-not-null semantics).

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::EvalError;
use crate::stdlib::format_duration;
use crate::value::{MapKey, MapValue, Value};

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v.into())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<chrono::Duration> for Value {
    fn from(v: chrono::Duration) -> Self {
        Value::Duration(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// Adapt a JSON document into a CEL value.
pub fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            // JSON numbers are doubles in the CEL data model.
            Value::Double(n.as_f64().unwrap_or(f64::NAN))
        }
        serde_json::Value::String(s) => Value::String(s.into()),
        serde_json::Value::Array(items) => {
            Value::list(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(fields) => {
            let mut map = MapValue::new();
            map.from_json = true;
            for (key, value) in fields {
                map.insert(MapKey::String(key.into()), from_json(value));
            }
            Value::map(map)
        }
    }
}

/// Render a CEL value as JSON. Unknowns and non-finite doubles have no
/// JSON form and report an invalid-argument error.
pub fn to_json(value: &Value) -> Result<serde_json::Value, EvalError> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(v) => serde_json::Value::Number((*v).into()),
        Value::Uint(v) => serde_json::Value::Number((*v).into()),
        Value::Double(v) => serde_json::Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                EvalError::invalid_argument("non-finite double has no JSON representation")
            })?,
        Value::String(s) => serde_json::Value::String(s.to_string()),
        Value::Bytes(b) => serde_json::Value::Array(
            b.iter().map(|byte| serde_json::Value::Number((*byte).into())).collect(),
        ),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items.iter() {
                out.push(to_json(item)?);
            }
            serde_json::Value::Array(out)
        }
        Value::Map(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, entry) in map.entries() {
                let key = match key {
                    MapKey::String(s) => s.to_string(),
                    MapKey::Bool(b) => b.to_string(),
                    MapKey::Int(v) => v.to_string(),
                    MapKey::Uint(v) => v.to_string(),
                };
                out.insert(key, to_json(entry)?);
            }
            serde_json::Value::Object(out)
        }
        Value::Timestamp(ts) => {
            serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        Value::Duration(d) => serde_json::Value::String(format_duration(*d)),
        Value::Message(m) => {
            let mut out = serde_json::Map::new();
            for (name, field) in m.set_fields() {
                out.insert(name.to_owned(), to_json(field)?);
            }
            serde_json::Value::Object(out)
        }
        Value::Type(t) => serde_json::Value::String(t.to_string()),
        Value::Optional(o) => match o.as_ref() {
            Some(v) => to_json(v)?,
            None => serde_json::Value::Null,
        },
        Value::Unknown(_) => {
            return Err(EvalError::invalid_argument(
                "unknown value has no JSON representation",
            ));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn host_conversions() {
        assert_eq!(Value::from(1i64), Value::Int(1));
        assert_eq!(Value::from(1u64), Value::Uint(1));
        assert_eq!(Value::from("s"), Value::string("s"));
        assert_eq!(
            Value::from(vec![1i64, 2]),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn json_numbers_become_doubles() {
        let v = from_json(json!({"a": 1, "b": [true, null, "x"]}));
        let Value::Map(map) = &v else { panic!("expected map") };
        assert_eq!(
            map.get(&MapKey::String("a".into())),
            Some(&Value::Double(1.0))
        );
        let Some(Value::List(items)) = map.get(&MapKey::String("b".into())) else {
            panic!("expected list");
        };
        assert_eq!(items[0], Value::Bool(true));
        assert_eq!(items[1], Value::Null);
        assert_eq!(items[2], Value::string("x"));
    }

    #[test]
    fn json_round_trip() {
        let v = from_json(json!({"x": [1.5, false], "y": "z"}));
        let back = to_json(&v).unwrap();
        assert_eq!(back, json!({"x": [1.5, false], "y": "z"}));
    }

    #[test]
    fn to_json_renders_time_types() {
        let ts = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            to_json(&Value::Timestamp(ts)).unwrap(),
            json!("2024-06-01T12:00:00Z")
        );
        assert_eq!(
            to_json(&Value::Duration(chrono::Duration::seconds(90))).unwrap(),
            json!("90s")
        );
    }

    #[test]
    fn non_finite_double_has_no_json() {
        assert!(to_json(&Value::Double(f64::INFINITY)).is_err());
        assert!(to_json(&Value::unknown("x")).is_err());
    }
}

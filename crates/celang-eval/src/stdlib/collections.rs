//! Aggregate helpers: `size`, membership, indexing, `dyn`.

use crate::error::EvalError;
use crate::registry::{strict, FunctionRegistry, RegistryError};
use crate::value::{Kind, MapKey, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    use Kind::{Bytes, Int, List, Map, String};

    let sizes: [(&str, bool, Kind); 8] = [
        ("size_string", false, String),
        ("size_bytes", false, Bytes),
        ("size_list", false, List),
        ("size_map", false, Map),
        ("string_size", true, String),
        ("bytes_size", true, Bytes),
        ("list_size", true, List),
        ("map_size", true, Map),
    ];
    for (id, member, kind) in sizes {
        registry.register("size", strict(id, member, vec![Some(kind)], |args| size(&args[0])))?;
    }

    registry.register(
        "@in",
        strict("in_list", false, vec![None, Some(List)], |args| {
            match &args[1] {
                Value::List(items) => {
                    Ok(Value::Bool(items.iter().any(|item| item.equals(&args[0]))))
                }
                _ => Err(EvalError::invalid_argument("expected list")),
            }
        }),
    )?;
    registry.register(
        "@in",
        strict("in_map", false, vec![None, Some(Map)], |args| {
            match &args[1] {
                Value::Map(map) => match MapKey::from_value(args[0].clone()) {
                    Ok(key) => Ok(Value::Bool(map.contains_key(&key))),
                    Err(_) => Ok(Value::Bool(false)),
                },
                _ => Err(EvalError::invalid_argument("expected map")),
            }
        }),
    )?;

    registry.register(
        "_[_]",
        strict("index_list", false, vec![Some(List), Some(Int)], |args| {
            match (&args[0], &args[1]) {
                (Value::List(items), Value::Int(index)) => {
                    usize::try_from(*index)
                        .ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                        .ok_or_else(|| {
                            EvalError::invalid_argument(format!(
                                "index out of range: {index} (size {})",
                                items.len()
                            ))
                        })
                }
                _ => Err(EvalError::invalid_argument("expected list[int]")),
            }
        }),
    )?;
    registry.register(
        "_[_]",
        strict("index_map", false, vec![Some(Map), None], |args| {
            match &args[0] {
                Value::Map(map) => {
                    let key = MapKey::from_value(args[1].clone())?;
                    map.get(&key)
                        .cloned()
                        .ok_or_else(|| EvalError::NoSuchKey(key.to_string()))
                }
                _ => Err(EvalError::invalid_argument("expected map[key]")),
            }
        }),
    )?;

    // Optional-safe indexing: misses yield `optional.none()`.
    registry.register(
        "_[?_]",
        strict(
            "optional_index_list",
            false,
            vec![Some(List), Some(Int)],
            |args| match (&args[0], &args[1]) {
                (Value::List(items), Value::Int(index)) => Ok(usize::try_from(*index)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .map_or_else(Value::optional_none, Value::optional_of)),
                _ => Err(EvalError::invalid_argument("expected list[?int]")),
            },
        ),
    )?;
    registry.register(
        "_[?_]",
        strict(
            "optional_index_map",
            false,
            vec![Some(Map), None],
            |args| match &args[0] {
                Value::Map(map) => {
                    let key = MapKey::from_value(args[1].clone())?;
                    Ok(match map.get(&key) {
                        Some(value) => Value::optional_of(value.clone()),
                        None => Value::optional_none(),
                    })
                }
                _ => Err(EvalError::invalid_argument("expected map[?key]")),
            },
        ),
    )?;

    registry.register(
        "dyn",
        strict("to_dyn", false, vec![None], |args| Ok(args[0].clone())),
    )?;

    Ok(())
}

fn size(value: &Value) -> Result<Value, EvalError> {
    let len = match value {
        // String size counts code points, not bytes.
        Value::String(s) => s.chars().count(),
        Value::Bytes(b) => b.len(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => {
            return Err(EvalError::no_matching_overload(
                "size",
                &[other.kind().name()],
            ));
        }
    };
    Ok(Value::Int(len as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Binding;

    fn call(id: &str, args: &[Value]) -> Result<Value, EvalError> {
        let mut registry = FunctionRegistry::new();
        register(&mut registry).unwrap();
        match &registry.by_id(id).expect(id).binding {
            Binding::Strict(f) => f(args),
            Binding::Lazy(_) => panic!("collections are strict"),
        }
    }

    #[test]
    fn size_counts_code_points() {
        assert_eq!(call("size_string", &[Value::string("héllo")]), Ok(Value::Int(5)));
        assert_eq!(call("size_bytes", &[Value::bytes(b"ab")]), Ok(Value::Int(2)));
        assert_eq!(
            call("size_list", &[Value::list(vec![Value::Null])]),
            Ok(Value::Int(1))
        );
    }

    #[test]
    fn list_membership_uses_cel_equality() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            call("in_list", &[Value::Uint(2), list.clone()]),
            Ok(Value::Bool(true))
        );
        assert_eq!(call("in_list", &[Value::Int(9), list]), Ok(Value::Bool(false)));
    }

    #[test]
    fn list_index_bounds() {
        let list = Value::list(vec![Value::Int(10), Value::Int(20)]);
        assert_eq!(call("index_list", &[list.clone(), Value::Int(1)]), Ok(Value::Int(20)));
        assert!(call("index_list", &[list.clone(), Value::Int(2)]).is_err());
        assert!(call("index_list", &[list, Value::Int(-1)]).is_err());
    }

    #[test]
    fn optional_list_index_yields_optional() {
        let list = Value::list(vec![Value::Int(10), Value::Int(20)]);
        assert_eq!(
            call("optional_index_list", &[list.clone(), Value::Int(1)]),
            Ok(Value::optional_of(Value::Int(20)))
        );
        assert_eq!(
            call("optional_index_list", &[list.clone(), Value::Int(5)]),
            Ok(Value::optional_none())
        );
        assert_eq!(
            call("optional_index_list", &[list, Value::Int(-1)]),
            Ok(Value::optional_none())
        );
    }

    #[test]
    fn optional_map_index_yields_optional() {
        let mut map = crate::value::MapValue::new();
        map.insert(MapKey::String("a".into()), Value::Int(1));
        let map = Value::map(map);
        assert_eq!(
            call("optional_index_map", &[map.clone(), Value::string("a")]),
            Ok(Value::optional_of(Value::Int(1)))
        );
        assert_eq!(
            call("optional_index_map", &[map, Value::string("b")]),
            Ok(Value::optional_none())
        );
    }

    #[test]
    fn map_index_missing_key() {
        let mut map = crate::value::MapValue::new();
        map.insert(MapKey::String("a".into()), Value::Int(1));
        let map = Value::map(map);
        assert_eq!(
            call("index_map", &[map.clone(), Value::string("a")]),
            Ok(Value::Int(1))
        );
        assert_eq!(
            call("index_map", &[map, Value::string("b")]),
            Err(EvalError::NoSuchKey("\"b\"".into()))
        );
    }
}

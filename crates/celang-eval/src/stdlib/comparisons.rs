//! Equality and ordering relations.

use std::cmp::Ordering;

use crate::registry::{strict, FunctionRegistry, RegistryError};
use crate::value::{Kind, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    registry.register(
        "_==_",
        strict("equals", false, vec![None, None], |args| {
            Ok(Value::Bool(args[0].equals(&args[1])))
        }),
    )?;
    registry.register(
        "_!=_",
        strict("not_equals", false, vec![None, None], |args| {
            Ok(Value::Bool(!args[0].equals(&args[1])))
        }),
    )?;

    let homogeneous: [(&str, Kind); 8] = [
        ("int64", Kind::Int),
        ("uint64", Kind::Uint),
        ("double", Kind::Double),
        ("string", Kind::String),
        ("bytes", Kind::Bytes),
        ("bool", Kind::Bool),
        ("timestamp", Kind::Timestamp),
        ("duration", Kind::Duration),
    ];
    let heterogeneous: [(&str, Kind, Kind); 6] = [
        ("int64_uint64", Kind::Int, Kind::Uint),
        ("int64_double", Kind::Int, Kind::Double),
        ("uint64_int64", Kind::Uint, Kind::Int),
        ("uint64_double", Kind::Uint, Kind::Double),
        ("double_int64", Kind::Double, Kind::Int),
        ("double_uint64", Kind::Double, Kind::Uint),
    ];

    for (op, prefix, accept) in RELATIONS {
        for (suffix, kind) in homogeneous {
            registry.register(
                op,
                relation(&format!("{prefix}_{suffix}"), kind, kind, accept),
            )?;
        }
        for (suffix, lhs, rhs) in heterogeneous {
            registry.register(
                op,
                relation(&format!("{prefix}_{suffix}"), lhs, rhs, accept),
            )?;
        }
    }

    // Cross-numeric equality, reachable through the heterogeneous
    // comparison declarations.
    for (suffix, lhs, rhs) in heterogeneous {
        registry.register(
            "_==_",
            strict(
                &format!("equals_{suffix}"),
                false,
                vec![Some(lhs), Some(rhs)],
                |args| Ok(Value::Bool(args[0].equals(&args[1]))),
            ),
        )?;
        registry.register(
            "_!=_",
            strict(
                &format!("not_equals_{suffix}"),
                false,
                vec![Some(lhs), Some(rhs)],
                |args| Ok(Value::Bool(!args[0].equals(&args[1]))),
            ),
        )?;
    }
    Ok(())
}

type Accept = fn(Ordering) -> bool;

const RELATIONS: [(&str, &str, Accept); 4] = [
    ("_<_", "less", |o| o == Ordering::Less),
    ("_<=_", "less_equals", |o| o != Ordering::Greater),
    ("_>_", "greater", |o| o == Ordering::Greater),
    ("_>=_", "greater_equals", |o| o != Ordering::Less),
];

fn relation(
    id: &str,
    lhs: Kind,
    rhs: Kind,
    accept: Accept,
) -> crate::registry::RuntimeOverload {
    strict(id, false, vec![Some(lhs), Some(rhs)], move |args| {
        // A NaN operand compares as neither; every relation is false.
        let holds = args[0].compare(&args[1]).is_some_and(accept);
        Ok(Value::Bool(holds))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Binding;

    fn call(registry: &FunctionRegistry, id: &str, args: &[Value]) -> Value {
        let overload = registry.by_id(id).expect(id);
        match &overload.binding {
            Binding::Strict(f) => f(args).unwrap(),
            Binding::Lazy(_) => panic!("relation should be strict"),
        }
    }

    #[test]
    fn orderings() {
        let mut registry = FunctionRegistry::new();
        register(&mut registry).unwrap();

        assert_eq!(
            call(&registry, "less_int64", &[Value::Int(1), Value::Int(2)]),
            Value::Bool(true)
        );
        assert_eq!(
            call(
                &registry,
                "greater_equals_string",
                &[Value::string("b"), Value::string("a")]
            ),
            Value::Bool(true)
        );
        assert_eq!(
            call(
                &registry,
                "less_equals_uint64",
                &[Value::Uint(2), Value::Uint(2)]
            ),
            Value::Bool(true)
        );
    }

    #[test]
    fn nan_relations_are_false() {
        let mut registry = FunctionRegistry::new();
        register(&mut registry).unwrap();
        let nan = Value::Double(f64::NAN);
        for id in ["less_double", "less_equals_double", "greater_double"] {
            assert_eq!(
                call(&registry, id, &[nan.clone(), Value::Double(1.0)]),
                Value::Bool(false)
            );
        }
    }

    #[test]
    fn cross_numeric_relations() {
        let mut registry = FunctionRegistry::new();
        register(&mut registry).unwrap();
        assert_eq!(
            call(
                &registry,
                "less_int64_uint64",
                &[Value::Int(-1), Value::Uint(0)]
            ),
            Value::Bool(true)
        );
        assert_eq!(
            call(
                &registry,
                "greater_double_int64",
                &[Value::Double(1.5), Value::Int(1)]
            ),
            Value::Bool(true)
        );
    }

    #[test]
    fn equality_spans_numerics() {
        let mut registry = FunctionRegistry::new();
        register(&mut registry).unwrap();
        assert_eq!(
            call(&registry, "equals", &[Value::Int(1), Value::Double(1.0)]),
            Value::Bool(true)
        );
        assert_eq!(
            call(
                &registry,
                "not_equals",
                &[Value::string("a"), Value::Int(1)]
            ),
            Value::Bool(true)
        );
    }
}

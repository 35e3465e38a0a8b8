//! The `optional.*` library.

use crate::error::EvalError;
use crate::registry::{lazy, strict, FunctionRegistry, RegistryError};
use crate::value::{Kind, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    registry.register(
        "optional.of",
        strict("optional_of", false, vec![None], |args| {
            Ok(Value::optional_of(args[0].clone()))
        }),
    )?;
    registry.register(
        "optional.ofNonZeroValue",
        strict("optional_of_non_zero_value", false, vec![None], |args| {
            if args[0].is_zero_value() {
                Ok(Value::optional_none())
            } else {
                Ok(Value::optional_of(args[0].clone()))
            }
        }),
    )?;
    registry.register(
        "optional.none",
        strict("optional_none", false, vec![], |_| Ok(Value::optional_none())),
    )?;
    registry.register(
        "orValue",
        strict(
            "optional_or_value",
            true,
            vec![Some(Kind::Optional), None],
            |args| match &args[0] {
                Value::Optional(o) => Ok(match o.as_ref() {
                    Some(v) => v.clone(),
                    None => args[1].clone(),
                }),
                _ => Err(EvalError::invalid_argument("expected optional")),
            },
        ),
    )?;
    // `a.or(b)` keeps `b` unevaluated unless `a` is empty.
    registry.register(
        "or",
        lazy("optional_or_optional", true, 2, |args| {
            match args.eval(0)? {
                Value::Optional(o) if o.is_some() => Ok(Value::Optional(o)),
                Value::Optional(_) => match args.eval(1)? {
                    v @ Value::Optional(_) => Ok(v),
                    other => Err(EvalError::no_matching_overload(
                        "or",
                        &[other.kind().name()],
                    )),
                },
                other => Err(EvalError::no_matching_overload(
                    "or",
                    &[other.kind().name()],
                )),
            }
        }),
    )?;
    registry.register(
        "hasValue",
        strict(
            "optional_has_value",
            true,
            vec![Some(Kind::Optional)],
            |args| match &args[0] {
                Value::Optional(o) => Ok(Value::Bool(o.is_some())),
                _ => Err(EvalError::invalid_argument("expected optional")),
            },
        ),
    )?;
    registry.register(
        "value",
        strict(
            "optional_value",
            true,
            vec![Some(Kind::Optional)],
            |args| match &args[0] {
                Value::Optional(o) => match o.as_ref() {
                    Some(v) => Ok(v.clone()),
                    None => Err(EvalError::invalid_argument(
                        "optional.none() dereference",
                    )),
                },
                _ => Err(EvalError::invalid_argument("expected optional")),
            },
        ),
    )?;
    Ok(())
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
            Binding::Lazy(_) => panic!("use the interpreter for lazy overloads"),
        }
    }

    #[test]
    fn of_and_value() {
        let opt = call("optional_of", &[Value::Int(3)]).unwrap();
        assert_eq!(call("optional_has_value", &[opt.clone()]), Ok(Value::Bool(true)));
        assert_eq!(call("optional_value", &[opt]), Ok(Value::Int(3)));
    }

    #[test]
    fn none_dereference_errors() {
        let none = call("optional_none", &[]).unwrap();
        assert_eq!(call("optional_has_value", &[none.clone()]), Ok(Value::Bool(false)));
        assert!(call("optional_value", &[none]).is_err());
    }

    #[test]
    fn of_non_zero_value() {
        assert_eq!(
            call("optional_of_non_zero_value", &[Value::Int(0)]),
            Ok(Value::optional_none())
        );
        assert_eq!(
            call("optional_of_non_zero_value", &[Value::string("x")]),
            Ok(Value::optional_of(Value::string("x")))
        );
    }

    #[test]
    fn or_value_picks_fallback_when_empty() {
        assert_eq!(
            call(
                "optional_or_value",
                &[Value::optional_of(Value::Int(1)), Value::Int(9)]
            ),
            Ok(Value::Int(1))
        );
        assert_eq!(
            call("optional_or_value", &[Value::optional_none(), Value::Int(9)]),
            Ok(Value::Int(9))
        );
    }
}

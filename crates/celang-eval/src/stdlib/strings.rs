//! String predicates.

use crate::error::EvalError;
use crate::registry::{strict, FunctionRegistry, RegistryError};
use crate::value::{Kind, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    registry.register(
        "contains",
        string_predicate("contains_string", |s, sub| s.contains(sub)),
    )?;
    registry.register(
        "startsWith",
        string_predicate("starts_with_string", |s, prefix| s.starts_with(prefix)),
    )?;
    registry.register(
        "endsWith",
        string_predicate("ends_with_string", |s, suffix| s.ends_with(suffix)),
    )?;
    registry.register("matches", matches_overload("matches", false))?;
    registry.register("matches", matches_overload("matches_string", true))?;
    Ok(())
}

fn string_predicate(
    id: &str,
    predicate: fn(&str, &str) -> bool,
) -> crate::registry::RuntimeOverload {
    strict(
        id,
        true,
        vec![Some(Kind::String), Some(Kind::String)],
        move |args| match (&args[0], &args[1]) {
            (Value::String(s), Value::String(arg)) => Ok(Value::Bool(predicate(s, arg))),
            _ => Err(EvalError::invalid_argument("expected strings")),
        },
    )
}

/// `matches` searches for the pattern anywhere in the string (RE2-style
/// partial match). The pattern compiles per evaluation; a malformed
/// pattern is an invalid-argument error.
fn matches_overload(id: &str, member: bool) -> crate::registry::RuntimeOverload {
    strict(
        id,
        member,
        vec![Some(Kind::String), Some(Kind::String)],
        |args| match (&args[0], &args[1]) {
            (Value::String(s), Value::String(pattern)) => {
                let re = regex::Regex::new(pattern).map_err(|e| {
                    EvalError::invalid_argument(format!("invalid regex: {e}"))
                })?;
                Ok(Value::Bool(re.is_match(s)))
            }
            _ => Err(EvalError::invalid_argument("expected strings")),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Binding;

    fn call(id: &str, s: &str, arg: &str) -> Result<Value, EvalError> {
        let mut registry = FunctionRegistry::new();
        register(&mut registry).unwrap();
        match &registry.by_id(id).expect(id).binding {
            Binding::Strict(f) => f(&[Value::string(s), Value::string(arg)]),
            Binding::Lazy(_) => panic!("string functions are strict"),
        }
    }

    #[test]
    fn predicates() {
        assert_eq!(call("contains_string", "hello", "ell"), Ok(Value::Bool(true)));
        assert_eq!(
            call("starts_with_string", "/groups/admin", "/groups/"),
            Ok(Value::Bool(true))
        );
        assert_eq!(call("ends_with_string", "a.txt", ".txt"), Ok(Value::Bool(true)));
        assert_eq!(call("ends_with_string", "a.txt", ".rs"), Ok(Value::Bool(false)));
    }

    #[test]
    fn matches_is_a_search() {
        assert_eq!(call("matches_string", "xx123yy", r"\d+"), Ok(Value::Bool(true)));
        assert_eq!(call("matches_string", "abc", r"^b"), Ok(Value::Bool(false)));
    }

    #[test]
    fn bad_pattern_is_invalid_argument() {
        assert!(matches!(
            call("matches_string", "x", "("),
            Err(EvalError::InvalidArgument(_))
        ));
    }
}

//! Arithmetic with 64-bit overflow trapping.
//!
//! Integer `+ - * / %` trap on wrap; `/ 0` and `% 0` are distinct errors;
//! doubles follow IEEE-754. Timestamp and duration arithmetic checks the
//! representable range.

use crate::error::EvalError;
use crate::registry::{strict, FunctionRegistry, RegistryError};
use crate::stdlib::datetime::{check_timestamp_range, checked_duration_add};
use crate::value::{Kind, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    use Kind::{Double, Duration, Int, Timestamp, Uint};

    registry.register(
        "_+_",
        strict("add_int64", false, vec![Some(Int), Some(Int)], |args| {
            let (a, b) = int_pair(args);
            a.checked_add(b).map(Value::Int).ok_or(EvalError::Overflow)
        }),
    )?;
    registry.register(
        "_+_",
        strict("add_uint64", false, vec![Some(Uint), Some(Uint)], |args| {
            let (a, b) = uint_pair(args);
            a.checked_add(b).map(Value::Uint).ok_or(EvalError::Overflow)
        }),
    )?;
    registry.register(
        "_+_",
        strict("add_double", false, vec![Some(Double), Some(Double)], |args| {
            let (a, b) = double_pair(args);
            Ok(Value::Double(a + b))
        }),
    )?;
    for overload in concat_overloads(None) {
        registry.register("_+_", overload)?;
    }
    registry.register(
        "_+_",
        strict(
            "add_timestamp_duration",
            false,
            vec![Some(Timestamp), Some(Duration)],
            |args| timestamp_plus_duration(&args[0], &args[1]),
        ),
    )?;
    registry.register(
        "_+_",
        strict(
            "add_duration_timestamp",
            false,
            vec![Some(Duration), Some(Timestamp)],
            |args| timestamp_plus_duration(&args[1], &args[0]),
        ),
    )?;
    registry.register(
        "_+_",
        strict(
            "add_duration_duration",
            false,
            vec![Some(Duration), Some(Duration)],
            |args| match (&args[0], &args[1]) {
                (Value::Duration(a), Value::Duration(b)) => {
                    checked_duration_add(*a, *b).map(Value::Duration)
                }
                _ => Err(EvalError::invalid_argument("expected durations")),
            },
        ),
    )?;

    registry.register(
        "_-_",
        strict("subtract_int64", false, vec![Some(Int), Some(Int)], |args| {
            let (a, b) = int_pair(args);
            a.checked_sub(b).map(Value::Int).ok_or(EvalError::Overflow)
        }),
    )?;
    registry.register(
        "_-_",
        strict("subtract_uint64", false, vec![Some(Uint), Some(Uint)], |args| {
            let (a, b) = uint_pair(args);
            a.checked_sub(b).map(Value::Uint).ok_or(EvalError::Overflow)
        }),
    )?;
    registry.register(
        "_-_",
        strict(
            "subtract_double",
            false,
            vec![Some(Double), Some(Double)],
            |args| {
                let (a, b) = double_pair(args);
                Ok(Value::Double(a - b))
            },
        ),
    )?;
    registry.register(
        "_-_",
        strict(
            "subtract_timestamp_timestamp",
            false,
            vec![Some(Timestamp), Some(Timestamp)],
            |args| match (&args[0], &args[1]) {
                (Value::Timestamp(a), Value::Timestamp(b)) => Ok(Value::Duration(*a - *b)),
                _ => Err(EvalError::invalid_argument("expected timestamps")),
            },
        ),
    )?;
    registry.register(
        "_-_",
        strict(
            "subtract_timestamp_duration",
            false,
            vec![Some(Timestamp), Some(Duration)],
            |args| match (&args[0], &args[1]) {
                (Value::Timestamp(ts), Value::Duration(d)) => {
                    let shifted = ts
                        .checked_sub_signed(*d)
                        .ok_or(EvalError::Overflow)?;
                    check_timestamp_range(shifted)?;
                    Ok(Value::Timestamp(shifted))
                }
                _ => Err(EvalError::invalid_argument("expected timestamp - duration")),
            },
        ),
    )?;
    registry.register(
        "_-_",
        strict(
            "subtract_duration_duration",
            false,
            vec![Some(Duration), Some(Duration)],
            |args| match (&args[0], &args[1]) {
                (Value::Duration(a), Value::Duration(b)) => a
                    .checked_sub(b)
                    .map(Value::Duration)
                    .ok_or(EvalError::Overflow),
                _ => Err(EvalError::invalid_argument("expected durations")),
            },
        ),
    )?;

    registry.register(
        "_*_",
        strict("multiply_int64", false, vec![Some(Int), Some(Int)], |args| {
            let (a, b) = int_pair(args);
            a.checked_mul(b).map(Value::Int).ok_or(EvalError::Overflow)
        }),
    )?;
    registry.register(
        "_*_",
        strict("multiply_uint64", false, vec![Some(Uint), Some(Uint)], |args| {
            let (a, b) = uint_pair(args);
            a.checked_mul(b).map(Value::Uint).ok_or(EvalError::Overflow)
        }),
    )?;
    registry.register(
        "_*_",
        strict(
            "multiply_double",
            false,
            vec![Some(Double), Some(Double)],
            |args| {
                let (a, b) = double_pair(args);
                Ok(Value::Double(a * b))
            },
        ),
    )?;

    registry.register(
        "_/_",
        strict("divide_int64", false, vec![Some(Int), Some(Int)], |args| {
            let (a, b) = int_pair(args);
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            a.checked_div(b).map(Value::Int).ok_or(EvalError::Overflow)
        }),
    )?;
    registry.register(
        "_/_",
        strict("divide_uint64", false, vec![Some(Uint), Some(Uint)], |args| {
            let (a, b) = uint_pair(args);
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Uint(a / b))
        }),
    )?;
    registry.register(
        "_/_",
        strict(
            "divide_double",
            false,
            vec![Some(Double), Some(Double)],
            |args| {
                let (a, b) = double_pair(args);
                Ok(Value::Double(a / b))
            },
        ),
    )?;

    registry.register(
        "_%_",
        strict("modulo_int64", false, vec![Some(Int), Some(Int)], |args| {
            let (a, b) = int_pair(args);
            if b == 0 {
                return Err(EvalError::ModulusByZero);
            }
            a.checked_rem(b).map(Value::Int).ok_or(EvalError::Overflow)
        }),
    )?;
    registry.register(
        "_%_",
        strict("modulo_uint64", false, vec![Some(Uint), Some(Uint)], |args| {
            let (a, b) = uint_pair(args);
            if b == 0 {
                return Err(EvalError::ModulusByZero);
            }
            Ok(Value::Uint(a % b))
        }),
    )?;

    registry.register(
        "-_",
        strict("negate_int64", false, vec![Some(Int)], |args| match args[0] {
            Value::Int(v) => v.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
            _ => Err(EvalError::invalid_argument("expected int")),
        }),
    )?;
    registry.register(
        "-_",
        strict("negate_double", false, vec![Some(Double)], |args| {
            match args[0] {
                Value::Double(v) => Ok(Value::Double(-v)),
                _ => Err(EvalError::invalid_argument("expected double")),
            }
        }),
    )?;

    Ok(())
}

/// The concatenation overloads (`string + string`, `bytes + bytes`,
/// `list + list`), optionally capped at a maximum result size.
pub(crate) fn concat_overloads(limit: Option<usize>) -> Vec<crate::registry::RuntimeOverload> {
    use crate::value::Kind::{Bytes, List, String};

    let check = move |len: usize| -> Result<(), EvalError> {
        match limit {
            Some(max) if len > max => Err(EvalError::invalid_argument(format!(
                "concatenation result size {len} exceeds limit {max}"
            ))),
            _ => Ok(()),
        }
    };

    vec![
        strict(
            "add_string",
            false,
            vec![Some(String), Some(String)],
            move |args| match (&args[0], &args[1]) {
                (Value::String(a), Value::String(b)) => {
                    check(a.len() + b.len())?;
                    let mut out = std::string::String::with_capacity(a.len() + b.len());
                    out.push_str(a);
                    out.push_str(b);
                    Ok(Value::string(out))
                }
                _ => Err(EvalError::invalid_argument("add_string expects strings")),
            },
        ),
        strict(
            "add_bytes",
            false,
            vec![Some(Bytes), Some(Bytes)],
            move |args| match (&args[0], &args[1]) {
                (Value::Bytes(a), Value::Bytes(b)) => {
                    check(a.len() + b.len())?;
                    let mut out = Vec::with_capacity(a.len() + b.len());
                    out.extend_from_slice(a);
                    out.extend_from_slice(b);
                    Ok(Value::bytes(out))
                }
                _ => Err(EvalError::invalid_argument("add_bytes expects bytes")),
            },
        ),
        strict(
            "add_list",
            false,
            vec![Some(List), Some(List)],
            move |args| match (&args[0], &args[1]) {
                (Value::List(a), Value::List(b)) => {
                    check(a.len() + b.len())?;
                    let mut out = Vec::with_capacity(a.len() + b.len());
                    out.extend(a.iter().cloned());
                    out.extend(b.iter().cloned());
                    Ok(Value::list(out))
                }
                _ => Err(EvalError::invalid_argument("add_list expects lists")),
            },
        ),
    ]
}

fn timestamp_plus_duration(ts: &Value, d: &Value) -> Result<Value, EvalError> {
    match (ts, d) {
        (Value::Timestamp(ts), Value::Duration(d)) => {
            let shifted = ts.checked_add_signed(*d).ok_or(EvalError::Overflow)?;
            check_timestamp_range(shifted)?;
            Ok(Value::Timestamp(shifted))
        }
        _ => Err(EvalError::invalid_argument("expected timestamp + duration")),
    }
}

fn int_pair(args: &[Value]) -> (i64, i64) {
    match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => (*a, *b),
        _ => (0, 0),
    }
}

fn uint_pair(args: &[Value]) -> (u64, u64) {
    match (&args[0], &args[1]) {
        (Value::Uint(a), Value::Uint(b)) => (*a, *b),
        _ => (0, 0),
    }
}

fn double_pair(args: &[Value]) -> (f64, f64) {
    match (&args[0], &args[1]) {
        (Value::Double(a), Value::Double(b)) => (*a, *b),
        _ => (0.0, 0.0),
    }
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
            Binding::Lazy(_) => panic!("arithmetic is strict"),
        }
    }

    #[test]
    fn int_addition_traps_overflow() {
        assert_eq!(
            call("add_int64", &[Value::Int(i64::MAX), Value::Int(1)]),
            Err(EvalError::Overflow)
        );
        assert_eq!(
            call("subtract_int64", &[Value::Int(i64::MIN), Value::Int(1)]),
            Err(EvalError::Overflow)
        );
        assert_eq!(
            call("add_int64", &[Value::Int(2), Value::Int(3)]),
            Ok(Value::Int(5))
        );
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(
            call("divide_int64", &[Value::Int(1), Value::Int(0)]),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            call("modulo_int64", &[Value::Int(1), Value::Int(0)]),
            Err(EvalError::ModulusByZero)
        );
        assert_eq!(
            call("divide_int64", &[Value::Int(i64::MIN), Value::Int(-1)]),
            Err(EvalError::Overflow)
        );
    }

    #[test]
    fn uint_arithmetic() {
        assert_eq!(
            call("subtract_uint64", &[Value::Uint(1), Value::Uint(2)]),
            Err(EvalError::Overflow)
        );
        assert_eq!(
            call("multiply_uint64", &[Value::Uint(6), Value::Uint(7)]),
            Ok(Value::Uint(42))
        );
    }

    #[test]
    fn double_follows_ieee754() {
        assert_eq!(
            call("divide_double", &[Value::Double(1.0), Value::Double(0.0)]),
            Ok(Value::Double(f64::INFINITY))
        );
    }

    #[test]
    fn string_and_list_concatenation() {
        assert_eq!(
            call("add_string", &[Value::string("ab"), Value::string("cd")]),
            Ok(Value::string("abcd"))
        );
        assert_eq!(
            call(
                "add_list",
                &[
                    Value::list(vec![Value::Int(1)]),
                    Value::list(vec![Value::Int(2)])
                ]
            ),
            Ok(Value::list(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn negation() {
        assert_eq!(call("negate_int64", &[Value::Int(5)]), Ok(Value::Int(-5)));
        assert_eq!(
            call("negate_int64", &[Value::Int(i64::MIN)]),
            Err(EvalError::Overflow)
        );
    }
}

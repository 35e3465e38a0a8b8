//! Logical operators with commutative error and unknown absorption.
//!
//! `&&` and `||` evaluate both operands when one side is an error or
//! unknown; the error is absorbed only when the other side short-circuits
//! the result. An unknown paired with a non-absorbed error combines into
//! one unknown set that also carries the error, keeping both kinds
//! visible to the host.

use std::sync::Arc;

use crate::error::EvalError;
use crate::registry::{lazy, strict, FunctionRegistry, LazyArgs, RegistryError};
use crate::value::{merge_unknowns, Kind, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    registry.register(
        "_&&_",
        lazy("logical_and", false, 2, |args| combine(args, false)),
    )?;
    registry.register(
        "_||_",
        lazy("logical_or", false, 2, |args| combine(args, true)),
    )?;
    registry.register(
        "!_",
        strict("logical_not", false, vec![Some(Kind::Bool)], |args| {
            match &args[0] {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(EvalError::no_matching_overload(
                    "!_",
                    &[other.kind().name()],
                )),
            }
        }),
    )?;
    registry.register("_?_:_", lazy("conditional", false, 3, conditional))?;
    registry.register(
        "@not_strictly_false",
        lazy("not_strictly_false", false, 1, not_strictly_false),
    )?;
    Ok(())
}

/// Shared truth table of `&&` and `||`. `absorbing` is the boolean that
/// short-circuits the operator: `false` for `&&`, `true` for `||`.
fn combine(args: &mut dyn LazyArgs, absorbing: bool) -> Result<Value, EvalError> {
    let lhs = args.eval(0);
    if let Ok(Value::Bool(b)) = &lhs
        && *b == absorbing
    {
        return Ok(Value::Bool(absorbing));
    }
    let rhs = args.eval(1);
    if let Ok(Value::Bool(b)) = &rhs
        && *b == absorbing
    {
        return Ok(Value::Bool(absorbing));
    }

    // Neither side short-circuits; the non-absorbing boolean yields
    // whatever the other side produced.
    let operator = if absorbing { "_||_" } else { "_&&_" };
    match (lhs, rhs) {
        (Ok(Value::Bool(_)), other) => propagate(other),
        (other, Ok(Value::Bool(_))) => propagate(other),
        (Ok(Value::Unknown(a)), Ok(Value::Unknown(b))) => {
            Ok(merge_unknowns(&Value::Unknown(a), &Value::Unknown(b)))
        }
        // An unknown paired with an error yields the combined set: the
        // unknowns may yet be resolved by the host, the error records what
        // already failed.
        (Ok(Value::Unknown(u)), Err(e)) | (Err(e), Ok(Value::Unknown(u))) => {
            Ok(Value::Unknown(Arc::new(u.with_error(e))))
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
        (Ok(Value::Unknown(u)), Ok(other)) | (Ok(other), Ok(Value::Unknown(u))) => {
            let error = EvalError::no_matching_overload(operator, &[other.kind().name()]);
            Ok(Value::Unknown(Arc::new(u.with_error(error))))
        }
        (Ok(a), Ok(b)) => Err(EvalError::no_matching_overload(
            operator,
            &[a.kind().name(), b.kind().name()],
        )),
    }
}

fn propagate(side: Result<Value, EvalError>) -> Result<Value, EvalError> {
    match side {
        Ok(Value::Bool(b)) => Ok(Value::Bool(b)),
        Ok(u @ Value::Unknown(_)) => Ok(u),
        Ok(other) => Err(EvalError::no_matching_overload(
            "logical operator",
            &[other.kind().name()],
        )),
        Err(e) => Err(e),
    }
}

/// `cond ? a : b`: strict in the condition, lazy in the branches.
fn conditional(args: &mut dyn LazyArgs) -> Result<Value, EvalError> {
    match args.eval(0)? {
        Value::Bool(true) => args.eval(1),
        Value::Bool(false) => args.eval(2),
        u @ Value::Unknown(_) => Ok(u),
        other => Err(EvalError::no_matching_overload(
            "_?_:_",
            &[other.kind().name()],
        )),
    }
}

/// Comprehension loop-condition helper: false only for a strict `false`.
/// Errors and unknowns keep the loop running so the step operator can
/// absorb or accumulate them.
fn not_strictly_false(args: &mut dyn LazyArgs) -> Result<Value, EvalError> {
    match args.eval(0) {
        Ok(Value::Bool(false)) => Ok(Value::Bool(false)),
        _ => Ok(Value::Bool(true)),
    }
}

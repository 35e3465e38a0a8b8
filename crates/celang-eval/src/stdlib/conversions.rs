//! Type conversion functions.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::EvalError;
use crate::registry::{strict, FunctionRegistry, RegistryError};
use crate::stdlib::datetime::{check_timestamp_range, format_duration, parse_duration};
use crate::value::{Kind, Value};

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    use Kind::{Bool, Bytes, Double, Duration, Int, String, Timestamp, Uint};

    // int()
    registry.register("int", identity("int64_to_int64", Int))?;
    registry.register(
        "int",
        strict("uint64_to_int64", false, vec![Some(Uint)], |args| {
            match args[0] {
                Value::Uint(v) => i64::try_from(v)
                    .map(Value::Int)
                    .map_err(|_| EvalError::Overflow),
                _ => Err(EvalError::invalid_argument("expected uint")),
            }
        }),
    )?;
    registry.register(
        "int",
        strict("double_to_int64", false, vec![Some(Double)], |args| {
            match args[0] {
                Value::Double(v) => double_to_int(v),
                _ => Err(EvalError::invalid_argument("expected double")),
            }
        }),
    )?;
    registry.register(
        "int",
        strict("string_to_int64", false, vec![Some(String)], |args| {
            match &args[0] {
                Value::String(s) => s
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| EvalError::invalid_argument(format!("invalid int '{s}'"))),
                _ => Err(EvalError::invalid_argument("expected string")),
            }
        }),
    )?;
    registry.register(
        "int",
        strict("timestamp_to_int64", false, vec![Some(Timestamp)], |args| {
            match &args[0] {
                Value::Timestamp(ts) => Ok(Value::Int(ts.timestamp())),
                _ => Err(EvalError::invalid_argument("expected timestamp")),
            }
        }),
    )?;
    registry.register(
        "int",
        strict("duration_to_int64", false, vec![Some(Duration)], |args| {
            match &args[0] {
                Value::Duration(d) => Ok(Value::Int(d.num_seconds())),
                _ => Err(EvalError::invalid_argument("expected duration")),
            }
        }),
    )?;

    // uint()
    registry.register("uint", identity("uint64_to_uint64", Uint))?;
    registry.register(
        "uint",
        strict("int64_to_uint64", false, vec![Some(Int)], |args| {
            match args[0] {
                Value::Int(v) => u64::try_from(v)
                    .map(Value::Uint)
                    .map_err(|_| EvalError::Overflow),
                _ => Err(EvalError::invalid_argument("expected int")),
            }
        }),
    )?;
    registry.register(
        "uint",
        strict("double_to_uint64", false, vec![Some(Double)], |args| {
            match args[0] {
                Value::Double(v) => double_to_uint(v),
                _ => Err(EvalError::invalid_argument("expected double")),
            }
        }),
    )?;
    registry.register(
        "uint",
        strict("string_to_uint64", false, vec![Some(String)], |args| {
            match &args[0] {
                Value::String(s) => s
                    .parse::<u64>()
                    .map(Value::Uint)
                    .map_err(|_| EvalError::invalid_argument(format!("invalid uint '{s}'"))),
                _ => Err(EvalError::invalid_argument("expected string")),
            }
        }),
    )?;

    // double()
    registry.register("double", identity("double_to_double", Double))?;
    registry.register(
        "double",
        strict("int64_to_double", false, vec![Some(Int)], |args| {
            match args[0] {
                Value::Int(v) => Ok(Value::Double(v as f64)),
                _ => Err(EvalError::invalid_argument("expected int")),
            }
        }),
    )?;
    registry.register(
        "double",
        strict("uint64_to_double", false, vec![Some(Uint)], |args| {
            match args[0] {
                Value::Uint(v) => Ok(Value::Double(v as f64)),
                _ => Err(EvalError::invalid_argument("expected uint")),
            }
        }),
    )?;
    registry.register(
        "double",
        strict("string_to_double", false, vec![Some(String)], |args| {
            match &args[0] {
                Value::String(s) => s
                    .parse::<f64>()
                    .map(Value::Double)
                    .map_err(|_| EvalError::invalid_argument(format!("invalid double '{s}'"))),
                _ => Err(EvalError::invalid_argument("expected string")),
            }
        }),
    )?;

    // string()
    registry.register("string", identity("string_to_string", String))?;
    registry.register(
        "string",
        strict("int64_to_string", false, vec![Some(Int)], |args| {
            Ok(Value::string(render(&args[0])))
        }),
    )?;
    registry.register(
        "string",
        strict("uint64_to_string", false, vec![Some(Uint)], |args| {
            Ok(Value::string(render(&args[0])))
        }),
    )?;
    registry.register(
        "string",
        strict("double_to_string", false, vec![Some(Double)], |args| {
            Ok(Value::string(render(&args[0])))
        }),
    )?;
    registry.register(
        "string",
        strict("bool_to_string", false, vec![Some(Bool)], |args| {
            Ok(Value::string(render(&args[0])))
        }),
    )?;
    registry.register(
        "string",
        strict("bytes_to_string", false, vec![Some(Bytes)], |args| {
            match &args[0] {
                Value::Bytes(b) => std::str::from_utf8(b)
                    .map(Value::string)
                    .map_err(|_| EvalError::invalid_argument("bytes are not valid UTF-8")),
                _ => Err(EvalError::invalid_argument("expected bytes")),
            }
        }),
    )?;
    registry.register(
        "string",
        strict("timestamp_to_string", false, vec![Some(Timestamp)], |args| {
            match &args[0] {
                Value::Timestamp(ts) => Ok(Value::string(
                    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                )),
                _ => Err(EvalError::invalid_argument("expected timestamp")),
            }
        }),
    )?;
    registry.register(
        "string",
        strict("duration_to_string", false, vec![Some(Duration)], |args| {
            match &args[0] {
                Value::Duration(d) => Ok(Value::string(format_duration(*d))),
                _ => Err(EvalError::invalid_argument("expected duration")),
            }
        }),
    )?;

    // bytes()
    registry.register("bytes", identity("bytes_to_bytes", Bytes))?;
    registry.register(
        "bytes",
        strict("string_to_bytes", false, vec![Some(String)], |args| {
            match &args[0] {
                Value::String(s) => Ok(Value::bytes(s.as_bytes())),
                _ => Err(EvalError::invalid_argument("expected string")),
            }
        }),
    )?;

    // bool()
    registry.register("bool", identity("bool_to_bool", Bool))?;
    registry.register(
        "bool",
        strict("string_to_bool", false, vec![Some(String)], |args| {
            match &args[0] {
                Value::String(s) => match s.as_ref() {
                    "1" | "t" | "true" | "TRUE" | "True" => Ok(Value::Bool(true)),
                    "0" | "f" | "false" | "FALSE" | "False" => Ok(Value::Bool(false)),
                    other => Err(EvalError::invalid_argument(format!(
                        "invalid bool '{other}'"
                    ))),
                },
                _ => Err(EvalError::invalid_argument("expected string")),
            }
        }),
    )?;

    // timestamp()
    registry.register("timestamp", identity("timestamp_to_timestamp", Timestamp))?;
    registry.register(
        "timestamp",
        strict("string_to_timestamp", false, vec![Some(String)], |args| {
            match &args[0] {
                Value::String(s) => {
                    let parsed = DateTime::parse_from_rfc3339(s).map_err(|e| {
                        EvalError::invalid_argument(format!("invalid timestamp '{s}': {e}"))
                    })?;
                    let ts = parsed.with_timezone(&Utc);
                    check_timestamp_range(ts)?;
                    Ok(Value::Timestamp(ts))
                }
                _ => Err(EvalError::invalid_argument("expected string")),
            }
        }),
    )?;
    registry.register(
        "timestamp",
        strict("int64_to_timestamp", false, vec![Some(Int)], |args| {
            match args[0] {
                Value::Int(seconds) => {
                    let ts = DateTime::from_timestamp(seconds, 0).ok_or(EvalError::Overflow)?;
                    check_timestamp_range(ts)?;
                    Ok(Value::Timestamp(ts))
                }
                _ => Err(EvalError::invalid_argument("expected int")),
            }
        }),
    )?;

    // duration()
    registry.register("duration", identity("duration_to_duration", Duration))?;
    registry.register(
        "duration",
        strict("string_to_duration", false, vec![Some(String)], |args| {
            match &args[0] {
                Value::String(s) => parse_duration(s).map(Value::Duration),
                _ => Err(EvalError::invalid_argument("expected string")),
            }
        }),
    )?;

    // type()
    registry.register(
        "type",
        strict("type", false, vec![None], |args| {
            Ok(Value::Type(args[0].type_of()))
        }),
    )?;

    Ok(())
}

fn identity(id: &str, kind: Kind) -> crate::registry::RuntimeOverload {
    strict(id, false, vec![Some(kind)], |args| Ok(args[0].clone()))
}

/// Conversion-to-string rendering; unlike `Display`, strings and numbers
/// render bare (no quotes, no `u` suffix).
fn render(value: &Value) -> std::string::String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Uint(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn double_to_int(v: f64) -> Result<Value, EvalError> {
    let truncated = v.trunc();
    if truncated.is_nan() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 + 1.0 {
        return Err(EvalError::Overflow);
    }
    Ok(Value::Int(truncated as i64))
}

fn double_to_uint(v: f64) -> Result<Value, EvalError> {
    let truncated = v.trunc();
    if truncated.is_nan() || truncated < 0.0 || truncated >= u64::MAX as f64 + 1.0 {
        return Err(EvalError::Overflow);
    }
    Ok(Value::Uint(truncated as u64))
}

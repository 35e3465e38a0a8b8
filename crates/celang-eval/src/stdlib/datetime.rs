//! Timestamp and duration accessors, plus shared time helpers.
//!
//! Accessors accept an optional time-zone argument: an IANA zone name
//! (`America/New_York`) or a fixed offset (`+02:00`). Conventions follow
//! cel-spec: `getMonth`, `getDayOfYear`, `getDayOfMonth` and
//! `getDayOfWeek` are 0-based (Sunday = 0), `getDate` is 1-based.

use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};

use crate::error::EvalError;
use crate::registry::{strict, FunctionRegistry, RegistryError, RuntimeOverload};
use crate::value::{Kind, Value};

/// CEL timestamp range: 0001-01-01T00:00:00Z through
/// 9999-12-31T23:59:59.999999999Z, as epoch second bounds.
pub const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;
pub const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;

pub fn check_timestamp_range(ts: DateTime<Utc>) -> Result<(), EvalError> {
    let seconds = ts.timestamp();
    if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&seconds) {
        return Err(EvalError::Overflow);
    }
    Ok(())
}

pub fn checked_duration_add(
    a: chrono::Duration,
    b: chrono::Duration,
) -> Result<chrono::Duration, EvalError> {
    a.checked_add(&b).ok_or(EvalError::Overflow)
}

/// Parse a CEL duration string: decimal numbers with unit suffixes
/// `h`, `m`, `s`, `ms`, `us`, `ns`, e.g. `"1h30m"`, `"-2.5s"`.
pub fn parse_duration(text: &str) -> Result<chrono::Duration, EvalError> {
    let bad = || EvalError::invalid_argument(format!("invalid duration '{text}'"));

    let (negative, mut rest) = match text.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if rest.is_empty() {
        return Err(bad());
    }

    let mut total_nanos: i128 = 0;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(bad)?;
        if digits_end == 0 {
            return Err(bad());
        }
        let number: f64 = rest[..digits_end].parse().map_err(|_| bad())?;
        rest = &rest[digits_end..];

        let (unit_nanos, unit_len) = if rest.starts_with("ms") {
            (1_000_000f64, 2)
        } else if rest.starts_with("us") {
            (1_000f64, 2)
        } else if rest.starts_with("ns") {
            (1f64, 2)
        } else if rest.starts_with('h') {
            (3_600_000_000_000f64, 1)
        } else if rest.starts_with('m') {
            (60_000_000_000f64, 1)
        } else if rest.starts_with('s') {
            (1_000_000_000f64, 1)
        } else {
            return Err(bad());
        };
        rest = &rest[unit_len..];
        total_nanos += (number * unit_nanos) as i128;
    }

    if negative {
        total_nanos = -total_nanos;
    }
    let nanos = i64::try_from(total_nanos).map_err(|_| EvalError::Overflow)?;
    Ok(chrono::Duration::nanoseconds(nanos))
}

/// Render a duration the way CEL prints it: seconds with an optional
/// fractional part, e.g. `"3600s"`, `"1.5s"`.
pub fn format_duration(d: chrono::Duration) -> String {
    let nanos = d.num_nanoseconds().unwrap_or(0);
    if nanos % 1_000_000_000 == 0 {
        format!("{}s", nanos / 1_000_000_000)
    } else {
        let mut out = format!("{:.9}", nanos as f64 / 1e9);
        while out.ends_with('0') {
            out.pop();
        }
        out.push('s');
        out
    }
}

/// Resolve a zone argument into a fixed-offset view of the timestamp.
fn in_zone(ts: DateTime<Utc>, zone: &str) -> Result<DateTime<FixedOffset>, EvalError> {
    if zone.starts_with('+') || zone.starts_with('-') {
        let offset = parse_fixed_offset(zone)
            .ok_or_else(|| EvalError::invalid_argument(format!("invalid time zone '{zone}'")))?;
        return Ok(ts.with_timezone(&offset));
    }
    let tz = chrono_tz::Tz::from_str(zone)
        .map_err(|_| EvalError::invalid_argument(format!("invalid time zone '{zone}'")))?;
    Ok(ts.with_timezone(&tz).fixed_offset())
}

fn parse_fixed_offset(zone: &str) -> Option<FixedOffset> {
    let (sign, rest) = match zone.split_at_checked(1)? {
        ("+", rest) => (1, rest),
        ("-", rest) => (-1, rest),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 18 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

type TsAccessor = fn(&DateTime<FixedOffset>) -> i64;

fn ts_overload(id: &str, with_tz: bool, accessor: TsAccessor) -> RuntimeOverload {
    let kinds = if with_tz {
        vec![Some(Kind::Timestamp), Some(Kind::String)]
    } else {
        vec![Some(Kind::Timestamp)]
    };
    strict(id, true, kinds, move |args| {
        let Value::Timestamp(ts) = &args[0] else {
            return Err(EvalError::invalid_argument("expected timestamp"));
        };
        let zoned = match args.get(1) {
            Some(Value::String(zone)) => in_zone(*ts, zone)?,
            Some(_) => return Err(EvalError::invalid_argument("expected time zone string")),
            None => ts.fixed_offset(),
        };
        Ok(Value::Int(accessor(&zoned)))
    })
}

type DurationAccessor = fn(&chrono::Duration) -> i64;

fn duration_overload(id: &str, accessor: DurationAccessor) -> RuntimeOverload {
    strict(id, true, vec![Some(Kind::Duration)], move |args| {
        let Value::Duration(d) = &args[0] else {
            return Err(EvalError::invalid_argument("expected duration"));
        };
        Ok(Value::Int(accessor(d)))
    })
}

pub fn register(registry: &mut FunctionRegistry) -> Result<(), RegistryError> {
    let date_accessors: [(&str, &str, TsAccessor); 6] = [
        ("getFullYear", "timestamp_to_year", |t| t.year() as i64),
        ("getMonth", "timestamp_to_month", |t| t.month0() as i64),
        ("getDayOfYear", "timestamp_to_day_of_year", |t| {
            t.ordinal0() as i64
        }),
        ("getDayOfMonth", "timestamp_to_day_of_month", |t| {
            t.day0() as i64
        }),
        ("getDate", "timestamp_to_day_of_month_1_based", |t| {
            t.day() as i64
        }),
        ("getDayOfWeek", "timestamp_to_day_of_week", |t| {
            t.weekday().num_days_from_sunday() as i64
        }),
    ];
    for (function, id, accessor) in date_accessors {
        registry.register(function, ts_overload(id, false, accessor))?;
        registry.register(function, ts_overload(&format!("{id}_with_tz"), true, accessor))?;
    }

    let time_accessors: [(&str, &str, TsAccessor, &str, DurationAccessor); 4] = [
        (
            "getHours",
            "timestamp_to_hours",
            |t| t.hour() as i64,
            "duration_to_hours",
            chrono::Duration::num_hours,
        ),
        (
            "getMinutes",
            "timestamp_to_minutes",
            |t| t.minute() as i64,
            "duration_to_minutes",
            chrono::Duration::num_minutes,
        ),
        (
            "getSeconds",
            "timestamp_to_seconds",
            |t| t.second() as i64,
            "duration_to_seconds",
            chrono::Duration::num_seconds,
        ),
        (
            "getMilliseconds",
            "timestamp_to_milliseconds",
            |t| (t.nanosecond() / 1_000_000) as i64,
            "duration_to_milliseconds",
            chrono::Duration::num_milliseconds,
        ),
    ];
    for (function, ts_id, ts_accessor, dur_id, dur_accessor) in time_accessors {
        registry.register(function, ts_overload(ts_id, false, ts_accessor))?;
        registry.register(
            function,
            ts_overload(&format!("{ts_id}_with_tz"), true, ts_accessor),
        )?;
        registry.register(function, duration_overload(dur_id, dur_accessor))?;
    }

    Ok(())
}

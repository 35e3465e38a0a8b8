//! The runtime value model.
//!
//! Aggregates are `Arc`-shared so cloning a value is cheap and a compiled
//! program plus its constant values can be evaluated from many threads.
//! [`Value::equals`] implements CEL equality (deep for aggregates, total
//! across numeric kinds); the derived `PartialEq` is structural and exists
//! for tests and map bookkeeping.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

use celang_core::types::CelType;

use crate::error::EvalError;
use crate::msg::MessageValue;

/// Runtime kind of a value, used for overload dispatch signatures.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    List,
    Map,
    Timestamp,
    Duration,
    Message,
    Type,
    Optional,
    Unknown,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::List => "list",
            Kind::Map => "map",
            Kind::Timestamp => "timestamp",
            Kind::Duration => "duration",
            Kind::Message => "message",
            Kind::Type => "type",
            Kind::Optional => "optional",
            Kind::Unknown => "unknown",
        }
    }
}

/// A CEL runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    List(Arc<Vec<Value>>),
    Map(Arc<MapValue>),
    Timestamp(DateTime<Utc>),
    Duration(chrono::Duration),
    Message(Arc<MessageValue>),
    Type(CelType),
    /// `optional.of(v)` / `optional.none()`.
    Optional(Arc<Option<Value>>),
    /// Partial-state sentinel: inputs that were not supplied.
    Unknown(Arc<UnknownSet>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn bytes(b: impl AsRef<[u8]>) -> Self {
        Value::Bytes(Arc::from(b.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn map(map: MapValue) -> Self {
        Value::Map(Arc::new(map))
    }

    pub fn optional_of(value: Value) -> Self {
        Value::Optional(Arc::new(Some(value)))
    }

    pub fn optional_none() -> Self {
        Value::Optional(Arc::new(None))
    }

    pub fn unknown(attribute: impl Into<String>) -> Self {
        Value::Unknown(Arc::new(UnknownSet::single(attribute)))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Uint(_) => Kind::Uint,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::Bytes(_) => Kind::Bytes,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Timestamp(_) => Kind::Timestamp,
            Value::Duration(_) => Kind::Duration,
            Value::Message(_) => Kind::Message,
            Value::Type(_) => Kind::Type,
            Value::Optional(_) => Kind::Optional,
            Value::Unknown(_) => Kind::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown(_))
    }

    /// The CEL type of this value, as reported by `type()`.
    pub fn type_of(&self) -> CelType {
        match self {
            Value::Null => CelType::Null,
            Value::Bool(_) => CelType::Bool,
            Value::Int(_) => CelType::Int,
            Value::Uint(_) => CelType::Uint,
            Value::Double(_) => CelType::Double,
            Value::String(_) => CelType::String,
            Value::Bytes(_) => CelType::Bytes,
            Value::List(_) => CelType::list(CelType::Dyn),
            Value::Map(_) => CelType::map(CelType::Dyn, CelType::Dyn),
            Value::Timestamp(_) => CelType::Timestamp,
            Value::Duration(_) => CelType::Duration,
            Value::Message(m) => CelType::Message(m.descriptor().full_name.clone()),
            Value::Type(t) => CelType::type_of(t.clone()),
            Value::Optional(_) => CelType::optional(CelType::Dyn),
            Value::Unknown(_) => CelType::Dyn,
        }
    }

    /// The zero of each kind, used by `optional.ofNonZeroValue`.
    pub fn is_zero_value(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(v) => *v == 0,
            Value::Uint(v) => *v == 0,
            Value::Double(v) => *v == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            Value::Optional(o) => o.is_none(),
            _ => false,
        }
    }

    /// CEL equality. Numeric kinds compare across int/uint/double;
    /// unrelated kinds are unequal; `NaN` is unequal to itself.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.entries()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.equals(w)))
            }
            (Value::Message(a), Value::Message(b)) => a.equals(b),
            (Value::Optional(a), Value::Optional(b)) => match (a.as_ref(), b.as_ref()) {
                (Some(x), Some(y)) => x.equals(y),
                (None, None) => true,
                _ => false,
            },
            _ => numeric_compare(self, other) == Some(Ordering::Equal),
        }
    }

    /// Ordering for relation operators; `None` when the kinds are not
    /// comparable (or a NaN is involved).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
            _ => numeric_compare(self, other),
        }
    }
}

/// Total ordering across int/uint/double, `None` on NaN or non-numerics.
fn numeric_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Uint(x), Value::Uint(y)) => Some(x.cmp(y)),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::Uint(y)) => Some(compare_int_uint(*x, *y)),
        (Value::Uint(x), Value::Int(y)) => Some(compare_int_uint(*y, *x).reverse()),
        (Value::Int(x), Value::Double(y)) => (*x as f64).partial_cmp(y),
        (Value::Double(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Uint(x), Value::Double(y)) => (*x as f64).partial_cmp(y),
        (Value::Double(x), Value::Uint(y)) => x.partial_cmp(&(*y as f64)),
        _ => None,
    }
}

fn compare_int_uint(i: i64, u: u64) -> Ordering {
    if i < 0 {
        Ordering::Less
    } else {
        (i as u64).cmp(&u)
    }
}

/// Valid CEL map key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(Arc<str>),
}

impl MapKey {
    pub fn from_value(value: Value) -> Result<MapKey, EvalError> {
        match value {
            Value::Bool(b) => Ok(MapKey::Bool(b)),
            Value::Int(v) => Ok(MapKey::Int(v)),
            Value::Uint(v) => Ok(MapKey::Uint(v)),
            Value::String(s) => Ok(MapKey::String(s)),
            other => Err(EvalError::UnsupportedKeyType(
                other.kind().name().to_owned(),
            )),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(v) => Value::Int(*v),
            MapKey::Uint(v) => Value::Uint(*v),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{b}"),
            MapKey::Int(v) => write!(f, "{v}"),
            MapKey::Uint(v) => write!(f, "{v}u"),
            MapKey::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// An ordered map value. Entry order follows construction order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapValue {
    entries: IndexMap<MapKey, Value>,
    /// Set for maps adapted from JSON objects; `has()` on those treats a
    /// null value as absent.
    pub(crate) from_json: bool,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: MapKey, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: &MapKey) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&MapKey, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.keys()
    }
}

impl FromIterator<(MapKey, Value)> for MapValue {
    fn from_iter<T: IntoIterator<Item = (MapKey, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            from_json: false,
        }
    }
}

/// The set of unknown attributes encountered during partial evaluation.
///
/// When a logical operator combines an unknown with a terminal error and
/// neither side short-circuits, the error is carried here alongside the
/// attributes: the combined set preserves both kinds, so the host can
/// distinguish "supply the missing inputs" from "part of the expression
/// already failed".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnknownSet {
    attributes: Vec<String>,
    errors: Vec<EvalError>,
}

impl UnknownSet {
    pub fn single(attribute: impl Into<String>) -> Self {
        Self {
            attributes: vec![attribute.into()],
            errors: Vec::new(),
        }
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Errors absorbed into this set while combining with unknowns.
    pub fn errors(&self) -> &[EvalError] {
        &self.errors
    }

    /// This set plus one absorbed error, deduplicated.
    pub fn with_error(&self, error: EvalError) -> UnknownSet {
        let mut combined = self.clone();
        if !combined.errors.contains(&error) {
            combined.errors.push(error);
        }
        combined
    }

    /// Union of two unknown sets (attributes and absorbed errors),
    /// order-preserving and deduplicated.
    pub fn merge(&self, other: &UnknownSet) -> UnknownSet {
        let mut attributes = self.attributes.clone();
        for attr in &other.attributes {
            if !attributes.contains(attr) {
                attributes.push(attr.clone());
            }
        }
        let mut errors = self.errors.clone();
        for error in &other.errors {
            if !errors.contains(error) {
                errors.push(error.clone());
            }
        }
        UnknownSet { attributes, errors }
    }
}

/// Merge two unknown values into one combined set.
pub fn merge_unknowns(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Unknown(x), Value::Unknown(y)) => Value::Unknown(Arc::new(x.merge(y))),
        (Value::Unknown(_), _) => a.clone(),
        (_, Value::Unknown(_)) => b.clone(),
        _ => a.clone(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}u"),
            Value::Double(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => {
                write!(f, "b\"")?;
                for byte in b.iter() {
                    if byte.is_ascii_graphic() || *byte == b' ' {
                        write!(f, "{}", *byte as char)?;
                    } else {
                        write!(f, "\\x{byte:02x}")?;
                    }
                }
                write!(f, "\"")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.entries().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Timestamp(ts) => {
                write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Duration(d) => {
                let nanos = d.num_nanoseconds().unwrap_or(0);
                if nanos % 1_000_000_000 == 0 {
                    write!(f, "{}s", nanos / 1_000_000_000)
                } else {
                    write!(f, "{}s", nanos as f64 / 1e9)
                }
            }
            Value::Message(m) => write!(f, "{}{{...}}", m.descriptor().full_name),
            Value::Type(t) => write!(f, "{t}"),
            Value::Optional(o) => match o.as_ref() {
                Some(v) => write!(f, "optional.of({v})"),
                None => write!(f, "optional.none()"),
            },
            Value::Unknown(u) => {
                write!(f, "unknown({}", u.attributes().join(", "))?;
                for error in u.errors() {
                    write!(f, "; {error}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_equality_spans_kinds() {
        assert!(Value::Int(1).equals(&Value::Uint(1)));
        assert!(Value::Int(1).equals(&Value::Double(1.0)));
        assert!(!Value::Int(1).equals(&Value::Uint(2)));
        assert!(!Value::Int(-1).equals(&Value::Uint(u64::MAX)));
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        let nan = Value::Double(f64::NAN);
        assert!(!nan.equals(&nan));
    }

    #[test]
    fn deep_equality_for_aggregates() {
        let a = Value::list(vec![Value::Int(1), Value::string("x")]);
        let b = Value::list(vec![Value::Int(1), Value::string("x")]);
        assert!(a.equals(&b));

        let mut m1 = MapValue::new();
        m1.insert(MapKey::String(Arc::from("k")), Value::Int(1));
        let mut m2 = MapValue::new();
        m2.insert(MapKey::String(Arc::from("k")), Value::Int(1));
        assert!(Value::map(m1).equals(&Value::map(m2)));
    }

    #[test]
    fn mismatched_kinds_are_unequal() {
        assert!(!Value::string("1").equals(&Value::Int(1)));
        assert!(!Value::Null.equals(&Value::Int(0)));
        assert!(!Value::Bool(false).equals(&Value::Int(0)));
    }

    #[test]
    fn cross_numeric_ordering_is_total() {
        use std::cmp::Ordering::*;
        assert_eq!(Value::Int(-1).compare(&Value::Uint(0)), Some(Less));
        assert_eq!(Value::Uint(2).compare(&Value::Int(1)), Some(Greater));
        assert_eq!(Value::Int(1).compare(&Value::Double(1.5)), Some(Less));
        assert_eq!(Value::Double(2.5).compare(&Value::Uint(2)), Some(Greater));
        assert_eq!(Value::Int(1).compare(&Value::string("a")), None);
    }

    #[test]
    fn unknown_sets_merge_deduplicated() {
        let a = UnknownSet::single("x");
        let b = UnknownSet::single("y").merge(&UnknownSet::single("x"));
        let merged = a.merge(&b);
        assert_eq!(merged.attributes(), ["x", "y"]);
        assert!(merged.errors().is_empty());
    }

    #[test]
    fn unknown_sets_carry_absorbed_errors() {
        let set = UnknownSet::single("x")
            .with_error(EvalError::DivisionByZero)
            .with_error(EvalError::DivisionByZero);
        assert_eq!(set.errors(), [EvalError::DivisionByZero]);

        let merged = set.merge(&UnknownSet::single("y").with_error(EvalError::Overflow));
        assert_eq!(merged.attributes(), ["x", "y"]);
        assert_eq!(
            merged.errors(),
            [EvalError::DivisionByZero, EvalError::Overflow]
        );
    }

    #[test]
    fn zero_values() {
        assert!(Value::Int(0).is_zero_value());
        assert!(Value::string("").is_zero_value());
        assert!(Value::list(vec![]).is_zero_value());
        assert!(!Value::Int(1).is_zero_value());
        assert!(!Value::Timestamp(Utc::now()).is_zero_value());
    }
}

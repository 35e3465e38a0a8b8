//! Dynamic message values over the descriptor pool.
//!
//! A message value stores only explicitly set fields; reading an unset
//! field yields the zero value of its type, with wrapper fields (and
//! message-typed fields) reading as null. Construction validates each
//! assignment against the field's declared type.

use std::sync::Arc;

use indexmap::IndexMap;

use celang_core::descriptors::MessageDescriptor;
use celang_core::types::CelType;

use crate::error::EvalError;
use crate::value::Value;

/// Fully qualified name of the well-known `Any` wrapper.
pub const ANY_MESSAGE: &str = "google.protobuf.Any";

/// An immutable dynamic message.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageValue {
    descriptor: Arc<MessageDescriptor>,
    fields: IndexMap<String, Value>,
}

impl MessageValue {
    pub fn builder(descriptor: Arc<MessageDescriptor>) -> MessageBuilder {
        MessageBuilder {
            descriptor,
            fields: IndexMap::new(),
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// Whether the field was explicitly set. Zero-valued assignments count
    /// as set; this backs `has()` semantics on messages.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Read a field. Unset declared fields read as their zero value; unset
    /// wrapper and message fields read as null. Undeclared fields are an
    /// error.
    pub fn field(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.fields.get(name) {
            return Ok(value.clone());
        }
        match self.descriptor.field_by_name(name) {
            Some(field) => Ok(zero_value(&field.ty)),
            None => Err(EvalError::NoSuchField(name.to_owned())),
        }
    }

    pub fn set_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn equals(&self, other: &MessageValue) -> bool {
        self.descriptor.full_name == other.descriptor.full_name
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(name, value)| other.fields.get(name).is_some_and(|w| value.equals(w)))
    }
}

/// The payload of a packed `google.protobuf.Any`, when `m` is one.
pub fn unpack_any(m: &MessageValue) -> Option<Value> {
    if m.descriptor.full_name != ANY_MESSAGE {
        return None;
    }
    m.fields.get("value").cloned()
}

/// Validating builder for [`MessageValue`].
pub struct MessageBuilder {
    descriptor: Arc<MessageDescriptor>,
    fields: IndexMap<String, Value>,
}

impl MessageBuilder {
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        let Some(field) = self.descriptor.field_by_name(name) else {
            return Err(EvalError::NoSuchField(name.to_owned()));
        };
        if !value_fits(&field.ty, &value) {
            return Err(EvalError::InvalidField {
                field: name.to_owned(),
                reason: format!(
                    "value of kind '{}' does not fit field type '{}'",
                    value.kind().name(),
                    field.ty
                ),
            });
        }
        self.fields.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn build(self) -> MessageValue {
        MessageValue {
            descriptor: self.descriptor,
            fields: self.fields,
        }
    }
}

/// The zero value a field of `ty` reads as when unset.
fn zero_value(ty: &CelType) -> Value {
    match ty {
        CelType::Bool => Value::Bool(false),
        CelType::Int | CelType::Enum(_) => Value::Int(0),
        CelType::Uint => Value::Uint(0),
        CelType::Double => Value::Double(0.0),
        CelType::String => Value::string(""),
        CelType::Bytes => Value::bytes([]),
        CelType::List(_) => Value::list(Vec::new()),
        CelType::Map(_, _) => Value::map(crate::value::MapValue::new()),
        CelType::Optional(_) => Value::optional_none(),
        _ => Value::Null,
    }
}

/// Shallow-plus-elements kind check of a value against a declared type.
fn value_fits(ty: &CelType, value: &Value) -> bool {
    match ty {
        CelType::Dyn | CelType::Any | CelType::TypeParam(_) | CelType::Error => true,
        CelType::Wrapper(p) => matches!(value, Value::Null) || value_fits(p, value),
        CelType::Null => matches!(value, Value::Null),
        CelType::Bool => matches!(value, Value::Bool(_)),
        CelType::Int | CelType::Enum(_) => matches!(value, Value::Int(_)),
        CelType::Uint => matches!(value, Value::Uint(_)),
        CelType::Double => matches!(value, Value::Double(_)),
        CelType::String => matches!(value, Value::String(_)),
        CelType::Bytes => matches!(value, Value::Bytes(_)),
        CelType::Timestamp => matches!(value, Value::Timestamp(_)),
        CelType::Duration => matches!(value, Value::Duration(_)),
        CelType::List(elem) => match value {
            Value::List(items) => items.iter().all(|v| value_fits(elem, v)),
            _ => false,
        },
        CelType::Map(_, value_ty) => match value {
            Value::Map(map) => map.entries().all(|(_, v)| value_fits(value_ty, v)),
            _ => false,
        },
        CelType::Optional(inner) => match value {
            Value::Optional(o) => o.as_ref().as_ref().is_none_or(|v| value_fits(inner, v)),
            _ => false,
        },
        CelType::Message(name) => match value {
            Value::Message(m) => &m.descriptor().full_name == name,
            Value::Null => true,
            _ => false,
        },
        CelType::Type(_) => matches!(value, Value::Type(_)),
        CelType::Opaque { .. } | CelType::Function { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> Arc<MessageDescriptor> {
        Arc::new(
            MessageDescriptor::new("test.Msg")
                .field("name", CelType::String)
                .field("count", CelType::Int)
                .field("flag", CelType::wrapper(CelType::Bool))
                .field("nested", CelType::Message("test.Msg".into())),
        )
    }

    #[test]
    fn set_and_read_fields() {
        let mut builder = MessageValue::builder(descriptor());
        builder.set_field("name", Value::string("x")).unwrap();
        builder.set_field("count", Value::Int(0)).unwrap();
        let msg = builder.build();

        assert_eq!(msg.field("name").unwrap(), Value::string("x"));
        assert!(msg.has_field("count"));
        // Zero-valued but set still counts as present.
        assert!(msg.has_field("count"));
        assert!(!msg.has_field("flag"));
    }

    #[test]
    fn unset_fields_read_zero_or_null() {
        let msg = MessageValue::builder(descriptor()).build();
        assert_eq!(msg.field("name").unwrap(), Value::string(""));
        assert_eq!(msg.field("count").unwrap(), Value::Int(0));
        assert_eq!(msg.field("flag").unwrap(), Value::Null);
        assert_eq!(msg.field("nested").unwrap(), Value::Null);
        assert_eq!(
            msg.field("bogus").unwrap_err(),
            EvalError::NoSuchField("bogus".into())
        );
    }

    #[test]
    fn wrapper_fields_accept_value_and_null() {
        let mut builder = MessageValue::builder(descriptor());
        builder.set_field("flag", Value::Bool(true)).unwrap();
        builder.set_field("flag", Value::Null).unwrap();
        let err = builder.set_field("flag", Value::Int(3)).unwrap_err();
        assert!(matches!(err, EvalError::InvalidField { .. }));
    }

    #[test]
    fn type_mismatch_is_invalid_field() {
        let mut builder = MessageValue::builder(descriptor());
        let err = builder.set_field("count", Value::string("no")).unwrap_err();
        assert!(matches!(err, EvalError::InvalidField { .. }));
    }

    #[test]
    fn message_equality_by_set_fields() {
        let mut a = MessageValue::builder(descriptor());
        a.set_field("count", Value::Int(1)).unwrap();
        let mut b = MessageValue::builder(descriptor());
        b.set_field("count", Value::Int(1)).unwrap();
        assert!(a.build().equals(&b.build()));
    }
}

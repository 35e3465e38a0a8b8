//! Abstract descriptor pool.
//!
//! Stands in for protobuf reflection: message and enum types are described
//! by name with CEL-typed fields, registered once at environment build time
//! and read-only afterwards. The well-known `google.protobuf` types are
//! recognised by name and map directly to CEL types (wrappers become
//! nullable primitives).

use std::sync::Arc;

use indexmap::IndexMap;

use crate::types::CelType;

/// A single field of a message type.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: CelType,
}

/// A declared message type.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MessageDescriptor {
    pub full_name: String,
    fields: IndexMap<String, FieldDescriptor>,
}

impl MessageDescriptor {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: CelType) -> Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            FieldDescriptor {
                name,
                ty,
            },
        );
        self
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// A declared enumeration.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct EnumDescriptor {
    pub full_name: String,
    values: IndexMap<String, i64>,
}

impl EnumDescriptor {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            values: IndexMap::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, number: i64) -> Self {
        self.values.insert(name.into(), number);
        self
    }

    pub fn value_by_name(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

/// Registry of message and enum descriptors, read-only after build.
#[derive(Clone, Debug, Default)]
pub struct DescriptorPool {
    messages: IndexMap<String, Arc<MessageDescriptor>>,
    enums: IndexMap<String, Arc<EnumDescriptor>>,
}

impl DescriptorPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_message(&mut self, descriptor: MessageDescriptor) {
        self.messages
            .insert(descriptor.full_name.clone(), Arc::new(descriptor));
    }

    pub fn register_enum(&mut self, descriptor: EnumDescriptor) {
        self.enums
            .insert(descriptor.full_name.clone(), Arc::new(descriptor));
    }

    pub fn message(&self, full_name: &str) -> Option<&Arc<MessageDescriptor>> {
        self.messages.get(full_name)
    }

    pub fn enum_by_name(&self, full_name: &str) -> Option<&Arc<EnumDescriptor>> {
        self.enums.get(full_name)
    }

    /// Resolve a qualified type name to its CEL type: well-known names
    /// first, then registered messages and enums.
    pub fn resolve_type(&self, full_name: &str) -> Option<CelType> {
        if let Some(ty) = well_known_type(full_name) {
            return Some(ty);
        }
        if self.messages.contains_key(full_name) {
            return Some(CelType::Message(full_name.to_owned()));
        }
        if self.enums.contains_key(full_name) {
            return Some(CelType::Enum(full_name.to_owned()));
        }
        None
    }

    /// Interpret a qualified name as `<enum>.<VALUE>` and look it up.
    pub fn find_enum_value(&self, qualified: &str) -> Option<(&Arc<EnumDescriptor>, i64)> {
        let (enum_name, value_name) = qualified.rsplit_once('.')?;
        let descriptor = self.enums.get(enum_name)?;
        let number = descriptor.value_by_name(value_name)?;
        Some((descriptor, number))
    }

    /// Field type on a registered message, with wrapper fields surfacing as
    /// their nullable CEL types.
    pub fn field_type(&self, message: &str, field: &str) -> Option<&CelType> {
        self.messages
            .get(message)
            .and_then(|m| m.field_by_name(field))
            .map(|f| &f.ty)
    }
}

/// CEL type of a well-known `google.protobuf` name, if it is one.
pub fn well_known_type(full_name: &str) -> Option<CelType> {
    let short = full_name.strip_prefix("google.protobuf.")?;
    Some(match short {
        "BoolValue" => CelType::wrapper(CelType::Bool),
        "BytesValue" => CelType::wrapper(CelType::Bytes),
        "DoubleValue" | "FloatValue" => CelType::wrapper(CelType::Double),
        "Int32Value" | "Int64Value" => CelType::wrapper(CelType::Int),
        "UInt32Value" | "UInt64Value" => CelType::wrapper(CelType::Uint),
        "StringValue" => CelType::wrapper(CelType::String),
        "Timestamp" => CelType::Timestamp,
        "Duration" => CelType::Duration,
        "Any" => CelType::Any,
        "Struct" => CelType::map(CelType::String, CelType::Dyn),
        "ListValue" => CelType::list(CelType::Dyn),
        "Value" => CelType::Dyn,
        "NullValue" => CelType::Null,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pool() -> DescriptorPool {
        let mut pool = DescriptorPool::new();
        pool.register_message(
            MessageDescriptor::new("test.Msg")
                .field("name", CelType::String)
                .field("count", CelType::Int)
                .field("opt_flag", CelType::wrapper(CelType::Bool)),
        );
        pool.register_enum(
            EnumDescriptor::new("test.Color")
                .value("RED", 0)
                .value("GREEN", 1),
        );
        pool
    }

    #[test]
    fn message_field_lookup() {
        let pool = sample_pool();
        assert_eq!(pool.field_type("test.Msg", "count"), Some(&CelType::Int));
        assert_eq!(
            pool.field_type("test.Msg", "opt_flag"),
            Some(&CelType::wrapper(CelType::Bool))
        );
        assert_eq!(pool.field_type("test.Msg", "missing"), None);
    }

    #[test]
    fn enum_value_lookup() {
        let pool = sample_pool();
        let (descriptor, number) = pool.find_enum_value("test.Color.GREEN").unwrap();
        assert_eq!(descriptor.full_name, "test.Color");
        assert_eq!(number, 1);
        assert!(pool.find_enum_value("test.Color.BLUE").is_none());
        assert!(pool.find_enum_value("unqualified").is_none());
    }

    #[test]
    fn resolve_type_prefers_well_known() {
        let pool = sample_pool();
        assert_eq!(
            pool.resolve_type("google.protobuf.Int64Value"),
            Some(CelType::wrapper(CelType::Int))
        );
        assert_eq!(
            pool.resolve_type("test.Msg"),
            Some(CelType::Message("test.Msg".into()))
        );
        assert_eq!(
            pool.resolve_type("test.Color"),
            Some(CelType::Enum("test.Color".into()))
        );
        assert_eq!(pool.resolve_type("test.Unknown"), None);
    }

    #[test]
    fn well_known_structural_types() {
        assert_eq!(
            well_known_type("google.protobuf.Struct"),
            Some(CelType::map(CelType::String, CelType::Dyn))
        );
        assert_eq!(
            well_known_type("google.protobuf.ListValue"),
            Some(CelType::list(CelType::Dyn))
        );
        assert_eq!(well_known_type("google.protobuf.Value"), Some(CelType::Dyn));
        assert_eq!(well_known_type("not.a.wkt"), None);
    }
}

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures for celang.
//!
//! This crate holds everything the compiler and the runtime share:
//! - `source` - immutable source text with line/column mapping
//! - `ast` - the typed expression tree and its parsed/checked containers
//! - `navigator` - read-only traversals with computed structural metrics
//! - `types` - the closed CEL type kind set, assignability, unification
//! - `container` - namespace resolution of unqualified identifiers
//! - `descriptors` - the abstract descriptor pool for message/enum types
//! - `wire` - JSON and binary interchange encodings for ASTs

pub mod ast;
pub mod container;
pub mod descriptors;
pub mod navigator;
pub mod source;
pub mod types;
pub mod wire;

pub use ast::{
    CallExpr, CheckedAst, ComprehensionExpr, Constant, Expr, ExprId, ExprKind, ListExpr, MapEntry,
    MapExpr, ParsedAst, Reference, SelectExpr, StructEntry, StructExpr,
};
pub use container::{Container, ContainerBuilder, ContainerError};
pub use descriptors::{DescriptorPool, EnumDescriptor, FieldDescriptor, MessageDescriptor};
pub use navigator::{NavNode, Navigator, NavigatorError, TraversalOrder};
pub use source::{Source, SourceInfo, Span};
pub use types::{CelType, Substitution};

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! celang: a Common Expression Language (CEL) compiler and runtime.
//!
//! # Example
//!
//! ```
//! use celang_lib::{CelType, Compiler, MapActivation, Runtime, Value};
//!
//! let compiler = Compiler::builder()
//!     .add_var("name", CelType::String)
//!     .build()
//!     .expect("valid environment");
//!
//! let result = compiler.compile("name.startsWith('ada') && size(name) < 10");
//! if result.has_error() {
//!     eprintln!("{}", result.error_string());
//! }
//! let checked = result.into_checked_ast().expect("valid expression");
//!
//! let program = Runtime::standard().program(checked);
//! let activation = MapActivation::new().bind("name", "ada lovelace");
//! assert_eq!(program.eval(&activation).unwrap(), Value::Bool(false));
//! ```

#[cfg(test)]
mod e2e_tests;

pub use celang_core::ast::{CheckedAst, Constant, Expr, ExprId, ExprKind, ParsedAst, Reference};
pub use celang_core::container::{Container, ContainerBuilder, ContainerError};
pub use celang_core::descriptors::{
    DescriptorPool, EnumDescriptor, FieldDescriptor, MessageDescriptor,
};
pub use celang_core::navigator::{NavNode, Navigator, NavigatorError, TraversalOrder};
pub use celang_core::source::{Source, SourceInfo, Span};
pub use celang_core::types::CelType;
pub use celang_core::wire;

pub use celang_compiler::{
    Compiler, CompilerBuilder, Diagnostics, DiagnosticsPrinter, Error as CompileError,
    FunctionDecl, OverloadDecl, Severity, StandardMacro, ValidationResult, VariableDecl,
};

pub use celang_eval::{
    adapt, Activation, EmptyActivation, EvalError, FnActivation, HierarchicalActivation,
    MapActivation, MapKey, MapValue, PartialActivation, Program, Runtime, RuntimeBuilder,
    UnknownSet, Value,
};

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! celang compiler: parser, macro expander, and type checker.
//!
//! The compilation pipeline for CEL expressions:
//! - `lexer` - logos-derived token stream
//! - `parser` - recursive descent producing the core AST
//! - `macros` - parse-time expansion of the standard macros
//! - `checker` - type annotation and overload resolution
//! - `diagnostics` - error collection and rendering
//! - `compiler` - the `Compiler` facade and `ValidationResult`

pub mod checker;
pub mod compiler;
pub mod decls;
pub mod diagnostics;
pub mod escape;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod standard;

pub use compiler::{Compiler, CompilerBuilder, ValidationResult};
pub use decls::{FunctionDecl, OverloadDecl, VariableDecl};
pub use diagnostics::{Diagnostic, Diagnostics, DiagnosticsPrinter, Severity};
pub use macros::StandardMacro;

/// Errors that end a compiler operation outright (everything recoverable is
/// reported through [`Diagnostics`] instead).
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Input nested deeper than the configured parse recursion limit.
    #[error("recursion limit exceeded")]
    RecursionLimitExceeded,

    #[error("validation failed with {} error(s)", .0.error_count())]
    ValidationError(Diagnostics),

    #[error(transparent)]
    Container(#[from] celang_core::container::ContainerError),
}

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, Error>;

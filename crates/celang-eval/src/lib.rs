#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! celang runtime: values, function dispatch, and the interpreter.
//!
//! - `value` - the runtime value model with cheap `Arc` sharing
//! - `error` - evaluation error kinds
//! - `activation` - variable resolvers consulted during evaluation
//! - `registry` - the function overload registry (strict and lazy calls)
//! - `stdlib` - the standard function bindings
//! - `interp` - the tree-walk interpreter
//! - `adapt` - host and JSON value adaptation
//! - `msg` - dynamic message values over the descriptor pool
//! - `runtime` - the `Runtime`/`Program` facade

pub mod activation;
pub mod adapt;
pub mod error;
pub mod interp;
pub mod msg;
pub mod registry;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use activation::{
    Activation, EmptyActivation, FnActivation, HierarchicalActivation, MapActivation,
    PartialActivation,
};
pub use error::EvalError;
pub use runtime::{Program, Runtime, RuntimeBuilder};
pub use value::{MapKey, MapValue, UnknownSet, Value};

/// Result type for evaluation.
pub type Result<T> = std::result::Result<T, EvalError>;

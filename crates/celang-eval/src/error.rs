//! Errors produced during evaluation.
//!
//! These are values, not control flow: the interpreter propagates them up
//! through strict positions, and the commutative logical operators absorb
//! them when the other operand short-circuits the result.

/// An evaluation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("no such key: '{0}'")]
    NoSuchKey(String),

    #[error("no such field: '{0}'")]
    NoSuchField(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulus by zero")]
    ModulusByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("cannot set field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("comprehension iteration budget exceeded")]
    IterationLimitExceeded,

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("undeclared variable: '{0}'")]
    UnboundVariable(String),

    #[error("no matching overload for '{function}' applied to ({signature})")]
    NoMatchingOverload { function: String, signature: String },

    #[error("duplicate map key: {0}")]
    DuplicateMapKey(String),

    #[error("unsupported map key type: {0}")]
    UnsupportedKeyType(String),

    #[error("{0}")]
    Custom(String),
}

impl EvalError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        EvalError::InvalidArgument(message.into())
    }

    pub fn no_matching_overload(function: &str, kinds: &[&str]) -> Self {
        EvalError::NoMatchingOverload {
            function: function.to_owned(),
            signature: kinds.join(", "),
        }
    }
}

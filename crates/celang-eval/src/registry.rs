//! The runtime function registry.
//!
//! Overloads are registered by globally unique id under a function name.
//! Two call disciplines exist: **strict** bindings receive fully evaluated
//! argument values (never errors or unknowns; the interpreter handles
//! those before dispatch), and **lazy** bindings receive their arguments
//! as thunks and decide what to force (`&&`, `||`, `?:`,
//! `@not_strictly_false`, `optional.or`).
//!
//! The registry is mutable only while a runtime is being built; programs
//! share it read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EvalError;
use crate::value::{Kind, Value};

pub type StrictFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;
pub type LazyFn = Arc<dyn Fn(&mut dyn LazyArgs) -> Result<Value, EvalError> + Send + Sync>;

/// Deferred arguments handed to a lazy binding.
pub trait LazyArgs {
    fn len(&self) -> usize;
    /// Evaluate argument `index`. May be called zero or more times.
    fn eval(&mut self, index: usize) -> Result<Value, EvalError>;
}

/// How a binding is invoked.
#[derive(Clone)]
pub enum Binding {
    Strict(StrictFn),
    Lazy(LazyFn),
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binding::Strict(_) => f.write_str("Strict(..)"),
            Binding::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// One runtime overload: id, shape, and binding.
#[derive(Clone, Debug)]
pub struct RuntimeOverload {
    pub id: String,
    pub member: bool,
    /// Expected argument kinds (receiver first for members); `None` is a
    /// wildcard.
    pub arg_kinds: Vec<Option<Kind>>,
    pub binding: Binding,
}

impl RuntimeOverload {
    pub fn arity(&self) -> usize {
        self.arg_kinds.len()
    }

    /// Whether evaluated arguments match this overload's kind signature.
    pub fn matches_kinds(&self, member: bool, kinds: &[Kind]) -> bool {
        self.member == member
            && self.arg_kinds.len() == kinds.len()
            && self
                .arg_kinds
                .iter()
                .zip(kinds)
                .all(|(expected, actual)| expected.is_none() || *expected == Some(*actual))
    }
}

/// Construct a strict overload.
pub fn strict(
    id: &str,
    member: bool,
    arg_kinds: Vec<Option<Kind>>,
    f: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
) -> RuntimeOverload {
    RuntimeOverload {
        id: id.to_owned(),
        member,
        arg_kinds,
        binding: Binding::Strict(Arc::new(f)),
    }
}

/// Construct a lazy overload of fixed arity.
pub fn lazy(
    id: &str,
    member: bool,
    arity: usize,
    f: impl Fn(&mut dyn LazyArgs) -> Result<Value, EvalError> + Send + Sync + 'static,
) -> RuntimeOverload {
    RuntimeOverload {
        id: id.to_owned(),
        member,
        arg_kinds: vec![None; arity],
        binding: Binding::Lazy(Arc::new(f)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate overload id '{0}'")]
    DuplicateOverload(String),
}

/// Registry of function overloads keyed by name and by overload id.
#[derive(Clone, Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Vec<RuntimeOverload>>,
    by_id: HashMap<String, (String, usize)>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the standard library.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        crate::stdlib::register_all(&mut registry)
            .expect("standard library registration is collision-free");
        registry
    }

    pub fn register(
        &mut self,
        function: &str,
        overload: RuntimeOverload,
    ) -> Result<(), RegistryError> {
        if self.by_id.contains_key(&overload.id) {
            return Err(RegistryError::DuplicateOverload(overload.id));
        }
        let entry = self.functions.entry(function.to_owned()).or_default();
        self.by_id
            .insert(overload.id.clone(), (function.to_owned(), entry.len()));
        entry.push(overload);
        Ok(())
    }

    /// Swap the binding of an already registered overload id. Used by the
    /// runtime builder to apply resource limits to standard bindings.
    pub fn replace(&mut self, overload: RuntimeOverload) -> bool {
        let Some((function, index)) = self.by_id.get(&overload.id).cloned() else {
            return false;
        };
        if let Some(overloads) = self.functions.get_mut(&function)
            && let Some(slot) = overloads.get_mut(index)
        {
            *slot = overload;
            return true;
        }
        false
    }

    pub fn overloads(&self, function: &str) -> Option<&[RuntimeOverload]> {
        self.functions.get(function).map(Vec::as_slice)
    }

    pub fn by_id(&self, overload_id: &str) -> Option<&RuntimeOverload> {
        let (function, index) = self.by_id.get(overload_id)?;
        self.functions.get(function)?.get(*index)
    }

    pub fn contains_function(&self, function: &str) -> bool {
        self.functions.contains_key(function)
    }

    /// Whether the function dispatches lazily (all-or-nothing per name).
    pub fn is_lazy(&self, function: &str) -> bool {
        self.functions
            .get(function)
            .is_some_and(|o| o.iter().any(|ov| matches!(ov.binding, Binding::Lazy(_))))
    }

    /// First overload of `function` matching the evaluated argument kinds.
    pub fn find_by_kinds(
        &self,
        function: &str,
        member: bool,
        kinds: &[Kind],
    ) -> Option<&RuntimeOverload> {
        self.functions
            .get(function)?
            .iter()
            .find(|o| o.matches_kinds(member, kinds))
    }

    /// Lazy overload of `function` with the given arity.
    pub fn find_lazy(&self, function: &str, member: bool, arity: usize) -> Option<&RuntimeOverload> {
        self.functions.get(function)?.iter().find(|o| {
            o.member == member
                && o.arity() == arity
                && matches!(o.binding, Binding::Lazy(_))
        })
    }
}

//! The `Runtime`/`Program` facade.
//!
//! A runtime bundles the function registry, descriptor pool, container,
//! and evaluation options; all of it is immutable once built. Programs
//! hold an `Arc` of that state plus their AST and are safe to evaluate
//! concurrently with distinct activations.

#[cfg(test)]
mod runtime_tests;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use celang_core::ast::{CheckedAst, ParsedAst};
use celang_core::container::Container;
use celang_core::descriptors::{DescriptorPool, EnumDescriptor, MessageDescriptor};
use celang_core::types::CelType;

use crate::activation::Activation;
use crate::error::EvalError;
use crate::interp::{EvalContext, Interpreter, Scope};
use crate::registry::{FunctionRegistry, RegistryError, RuntimeOverload};
use crate::value::Value;

/// Default aggregate comprehension iteration budget per evaluation.
pub const DEFAULT_ITERATION_BUDGET: i64 = 1000;

/// Evaluation policy knobs, fixed at runtime build time.
#[derive(Clone, Debug)]
pub struct RuntimeOptions {
    /// Missing variables are unbound errors instead of unknowns.
    pub(crate) strict_variables: bool,
    /// Duplicate map keys overwrite instead of erroring.
    pub(crate) last_wins_map_keys: bool,
    /// Aggregate comprehension budget; `-1` disables.
    pub(crate) comprehension_max_iterations: i64,
    /// Legacy mode: uint constants fold into the signed domain.
    pub(crate) fold_uint_to_int: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            strict_variables: false,
            last_wins_map_keys: false,
            comprehension_max_iterations: DEFAULT_ITERATION_BUDGET,
            fold_uint_to_int: false,
        }
    }
}

struct RuntimeInner {
    registry: FunctionRegistry,
    pool: DescriptorPool,
    container: Container,
    options: RuntimeOptions,
    cancel: Option<Arc<AtomicBool>>,
}

/// Immutable evaluation environment.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// A runtime over the standard library with default options.
    pub fn standard() -> Self {
        RuntimeBuilder::new().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Plan a checked AST for evaluation.
    pub fn program(&self, ast: CheckedAst) -> Program {
        Program {
            inner: self.inner.clone(),
            ast: ProgramAst::Checked(Arc::new(ast)),
        }
    }

    /// Plan a parse-only AST; dispatch falls back to runtime kinds.
    pub fn program_from_parsed(&self, ast: ParsedAst) -> Program {
        Program {
            inner: self.inner.clone(),
            ast: ProgramAst::Parsed(Arc::new(ast)),
        }
    }
}

/// Builder for [`Runtime`].
pub struct RuntimeBuilder {
    registry: FunctionRegistry,
    pool: DescriptorPool,
    container: Container,
    options: RuntimeOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            registry: FunctionRegistry::standard(),
            pool: DescriptorPool::new(),
            container: Container::root(),
            options: RuntimeOptions::default(),
            cancel: None,
        }
    }

    /// Register an extra function binding by overload id.
    pub fn add_function_binding(
        mut self,
        function: &str,
        overload: RuntimeOverload,
    ) -> Result<Self, RegistryError> {
        self.registry.register(function, overload)?;
        Ok(self)
    }

    pub fn add_message_type(mut self, descriptor: MessageDescriptor) -> Self {
        self.pool.register_message(descriptor);
        self
    }

    pub fn add_enum_type(mut self, descriptor: EnumDescriptor) -> Self {
        self.pool.register_enum(descriptor);
        self
    }

    pub fn container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    /// Missing variables become unbound errors instead of unknowns.
    pub fn strict_variables(mut self, value: bool) -> Self {
        self.options.strict_variables = value;
        self
    }

    /// Duplicate map keys take last-write-wins instead of erroring.
    pub fn last_wins_map_keys(mut self, value: bool) -> Self {
        self.options.last_wins_map_keys = value;
        self
    }

    /// Aggregate comprehension iteration budget; `-1` disables.
    pub fn comprehension_max_iterations(mut self, limit: i64) -> Self {
        self.options.comprehension_max_iterations = limit;
        self
    }

    /// Legacy uint handling: fold uint constants to int at runtime.
    pub fn enable_unsigned_longs(mut self, value: bool) -> Self {
        self.options.fold_uint_to_int = !value;
        self
    }

    /// Cooperative cancellation flag, checked per comprehension iteration.
    pub fn cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Cap the size of strings, bytes, and lists created by concatenation.
    pub fn max_concat_size(mut self, limit: usize) -> Self {
        for overload in crate::stdlib::concat_overloads(Some(limit)) {
            self.registry.replace(overload);
        }
        self
    }

    pub fn build(self) -> Runtime {
        Runtime {
            inner: Arc::new(RuntimeInner {
                registry: self.registry,
                pool: self.pool,
                container: self.container,
                options: self.options,
                cancel: self.cancel,
            }),
        }
    }
}

#[derive(Clone)]
enum ProgramAst {
    Checked(Arc<CheckedAst>),
    Parsed(Arc<ParsedAst>),
}

/// A planned expression, immutable and shareable across threads.
#[derive(Clone)]
pub struct Program {
    inner: Arc<RuntimeInner>,
    ast: ProgramAst,
}

impl Program {
    /// Evaluate against an activation.
    pub fn eval(&self, activation: &dyn Activation) -> Result<Value, EvalError> {
        let (root, references) = match &self.ast {
            ProgramAst::Checked(ast) => (&ast.root, Some(&ast.references)),
            ProgramAst::Parsed(ast) => (&ast.root, None),
        };
        let interp = Interpreter {
            registry: &self.inner.registry,
            pool: &self.inner.pool,
            container: &self.inner.container,
            options: &self.inner.options,
            references,
        };
        let ctx = EvalContext::new(
            self.inner.options.comprehension_max_iterations,
            self.inner.cancel.clone(),
        );
        let scope = Scope::Root(activation);
        interp.eval(&ctx, &scope, root)
    }

    /// The declared result type, for checked programs.
    pub fn result_type(&self) -> Option<&CelType> {
        match &self.ast {
            ProgramAst::Checked(ast) => Some(ast.result_type()),
            ProgramAst::Parsed(_) => None,
        }
    }
}

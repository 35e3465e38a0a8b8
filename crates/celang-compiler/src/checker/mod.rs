//! Type checker: bottom-up annotation and overload resolution.
//!
//! The checker walks a parsed AST, assigns every node a resolved type,
//! resolves identifiers through the container, resolves call overloads by
//! unifying declared parameter types with inferred argument types, and
//! records references (qualified names, enum constants, overload ids) in
//! the reference map of the resulting [`CheckedAst`].

mod check;


use indexmap::IndexMap;

use celang_core::container::Container;
use celang_core::descriptors::DescriptorPool;
use celang_core::types::CelType;

use crate::decls::{FunctionDecl, VariableDecl};
use crate::standard;

pub use check::check;

/// The compile-time environment the checker resolves against.
#[derive(Clone, Debug)]
pub struct CheckerEnv {
    container: Container,
    pool: DescriptorPool,
    variables: IndexMap<String, CelType>,
    functions: IndexMap<String, FunctionDecl>,
    /// When false, uint literals fold to int (legacy behaviour).
    pub unsigned_longs: bool,
}

impl CheckerEnv {
    /// An environment holding only the standard declarations.
    pub fn standard() -> Self {
        let mut env = Self {
            container: Container::root(),
            pool: DescriptorPool::new(),
            variables: IndexMap::new(),
            functions: IndexMap::new(),
            unsigned_longs: true,
        };
        for var in standard::type_variables() {
            env.add_variable(var.clone());
        }
        for decl in standard::declarations() {
            env.add_function(decl.clone());
        }
        env.add_function(standard::timestamp_epoch_decl());
        env
    }

    pub fn add_variable(&mut self, decl: VariableDecl) {
        self.variables.insert(decl.name, decl.ty);
    }

    pub fn add_function(&mut self, decl: FunctionDecl) {
        match self.functions.get_mut(&decl.name) {
            Some(existing) => existing.merge(decl),
            None => {
                self.functions.insert(decl.name.clone(), decl);
            }
        }
    }

    /// Remove one overload; used to retract `timestamp(int)` when the
    /// legacy string-only behaviour is selected.
    pub fn remove_overload(&mut self, function: &str, overload_id: &str) {
        if let Some(decl) = self.functions.get_mut(function) {
            decl.overloads.retain(|o| o.id != overload_id);
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn set_container(&mut self, container: Container) {
        self.container = container;
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut DescriptorPool {
        &mut self.pool
    }

    pub fn variable(&self, qualified_name: &str) -> Option<&CelType> {
        self.variables.get(qualified_name)
    }

    pub fn function(&self, qualified_name: &str) -> Option<&FunctionDecl> {
        self.functions.get(qualified_name)
    }
}

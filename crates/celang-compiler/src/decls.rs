//! Variable and function declarations for the checker environment.

use celang_core::types::CelType;

/// A declared variable: a name the checker resolves idents against.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub ty: CelType,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, ty: CelType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// One typed signature of a function, with its globally unique overload id.
///
/// For member overloads the receiver type is `params[0]`.
#[derive(Clone, Debug, PartialEq)]
pub struct OverloadDecl {
    pub id: String,
    pub member: bool,
    pub params: Vec<CelType>,
    pub result: CelType,
}

impl OverloadDecl {
    /// Free-function overload.
    pub fn global(id: impl Into<String>, params: Vec<CelType>, result: CelType) -> Self {
        Self {
            id: id.into(),
            member: false,
            params,
            result,
        }
    }

    /// Receiver-style overload; the receiver is the first parameter.
    pub fn member(id: impl Into<String>, params: Vec<CelType>, result: CelType) -> Self {
        Self {
            id: id.into(),
            member: true,
            params,
            result,
        }
    }

    /// Number of call arguments (excluding the receiver for members).
    pub fn arg_count(&self) -> usize {
        if self.member {
            self.params.len() - 1
        } else {
            self.params.len()
        }
    }
}

/// A function name with its overload set.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub overloads: Vec<OverloadDecl>,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    pub fn overload(mut self, overload: OverloadDecl) -> Self {
        self.overloads.push(overload);
        self
    }

    /// Merge another declaration for the same name, skipping duplicate ids.
    pub fn merge(&mut self, other: FunctionDecl) {
        for overload in other.overloads {
            if self.overloads.iter().all(|o| o.id != overload.id) {
                self.overloads.push(overload);
            }
        }
    }
}

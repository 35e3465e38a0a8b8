//! The closed CEL type kind set, assignability, and parameter substitution.
//!
//! Overload resolution unifies declared parameter types (which may contain
//! type parameters) with inferred argument types by threading a
//! [`Substitution`]; unification fails when two bindings for the same
//! parameter disagree.

use std::collections::HashMap;
use std::fmt;

/// Semantic type of a CEL expression or declaration.
///
/// This is the canonical closed enumeration of kinds. `Dyn` is the top of
/// the assignment lattice; `Error` exists for checker-internal propagation
/// and never annotates a well-typed AST.
#[derive(Clone, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CelType {
    Dyn,
    Error,
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    Timestamp,
    Duration,
    /// `google.protobuf.Any`: a dynamically typed payload unpacked on demand.
    Any,
    List(Box<CelType>),
    Map(Box<CelType>, Box<CelType>),
    /// `optional_type(T)`: a distinct opaque parameterised type threaded by
    /// the `optional.*` library rather than control flow.
    Optional(Box<CelType>),
    /// First-class type value; `Type(None)` is the type of `type` itself.
    Type(Option<Box<CelType>>),
    /// Extension point for host-defined abstract types.
    Opaque { name: String, params: Vec<CelType> },
    /// Placeholder bound during overload unification (`A`, `B`, `@T0`...).
    TypeParam(String),
    /// Reference to a declared message type.
    Message(String),
    /// Reference to a declared enumeration.
    Enum(String),
    /// Nullable wrapper (`google.protobuf.*Value`) around a primitive.
    Wrapper(Box<CelType>),
    Function {
        result: Box<CelType>,
        args: Vec<CelType>,
    },
}

impl CelType {
    pub fn list(elem: CelType) -> Self {
        CelType::List(Box::new(elem))
    }

    pub fn map(key: CelType, value: CelType) -> Self {
        CelType::Map(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: CelType) -> Self {
        CelType::Optional(Box::new(inner))
    }

    pub fn wrapper(primitive: CelType) -> Self {
        CelType::Wrapper(Box::new(primitive))
    }

    pub fn type_of(inner: CelType) -> Self {
        CelType::Type(Some(Box::new(inner)))
    }

    pub fn param(name: impl Into<String>) -> Self {
        CelType::TypeParam(name.into())
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, CelType::Dyn)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CelType::Error)
    }

    pub fn is_dyn_or_error(&self) -> bool {
        matches!(self, CelType::Dyn | CelType::Error)
    }

    /// `dyn` or `any`: types whose members are only known at runtime.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, CelType::Dyn | CelType::Any)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CelType::Int | CelType::Uint | CelType::Double)
    }

    /// Primitives that have a `google.protobuf.*Value` wrapper.
    pub fn has_wrapper(&self) -> bool {
        matches!(
            self,
            CelType::Bool
                | CelType::Int
                | CelType::Uint
                | CelType::Double
                | CelType::String
                | CelType::Bytes
        )
    }

    /// Whether any type parameter occurs in this type.
    pub fn has_params(&self) -> bool {
        match self {
            CelType::TypeParam(_) => true,
            CelType::List(e) | CelType::Optional(e) | CelType::Wrapper(e) => e.has_params(),
            CelType::Map(k, v) => k.has_params() || v.has_params(),
            CelType::Type(Some(t)) => t.has_params(),
            CelType::Opaque { params, .. } => params.iter().any(CelType::has_params),
            CelType::Function { result, args } => {
                result.has_params() || args.iter().any(CelType::has_params)
            }
            _ => false,
        }
    }
}

impl fmt::Display for CelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CelType::Dyn => write!(f, "dyn"),
            CelType::Error => write!(f, "error"),
            CelType::Null => write!(f, "null_type"),
            CelType::Bool => write!(f, "bool"),
            CelType::Int => write!(f, "int"),
            CelType::Uint => write!(f, "uint"),
            CelType::Double => write!(f, "double"),
            CelType::String => write!(f, "string"),
            CelType::Bytes => write!(f, "bytes"),
            CelType::Timestamp => write!(f, "timestamp"),
            CelType::Duration => write!(f, "duration"),
            CelType::Any => write!(f, "any"),
            CelType::List(e) => write!(f, "list({e})"),
            CelType::Map(k, v) => write!(f, "map({k}, {v})"),
            CelType::Optional(t) => write!(f, "optional_type({t})"),
            CelType::Type(None) => write!(f, "type"),
            CelType::Type(Some(t)) => write!(f, "type({t})"),
            CelType::Opaque { name, params } => {
                write!(f, "{name}")?;
                if !params.is_empty() {
                    write!(f, "(")?;
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{p}")?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            CelType::TypeParam(name) => write!(f, "{name}"),
            CelType::Message(name) => write!(f, "{name}"),
            CelType::Enum(name) => write!(f, "{name}"),
            CelType::Wrapper(t) => write!(f, "wrapper({t})"),
            CelType::Function { result, args } => {
                write!(f, "(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ") -> {result}")
            }
        }
    }
}

/// Type-parameter bindings accumulated during overload resolution.
#[derive(Clone, Debug, Default)]
pub struct Substitution {
    bindings: HashMap<String, CelType>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CelType> {
        self.bindings.get(name)
    }

    pub fn bind(&mut self, name: &str, ty: CelType) {
        self.bindings.insert(name.to_owned(), ty);
    }

    /// Deep-replace bound parameters; unbound parameters are left intact.
    pub fn apply(&self, ty: &CelType) -> CelType {
        match ty {
            CelType::TypeParam(name) => match self.bindings.get(name) {
                // A binding may itself mention parameters bound later.
                Some(bound) if bound != ty => self.apply(bound),
                _ => ty.clone(),
            },
            CelType::List(e) => CelType::list(self.apply(e)),
            CelType::Map(k, v) => CelType::map(self.apply(k), self.apply(v)),
            CelType::Optional(t) => CelType::optional(self.apply(t)),
            CelType::Wrapper(t) => CelType::wrapper(self.apply(t)),
            CelType::Type(Some(t)) => CelType::type_of(self.apply(t)),
            CelType::Opaque { name, params } => CelType::Opaque {
                name: name.clone(),
                params: params.iter().map(|p| self.apply(p)).collect(),
            },
            CelType::Function { result, args } => CelType::Function {
                result: Box::new(self.apply(result)),
                args: args.iter().map(|a| self.apply(a)).collect(),
            },
            _ => ty.clone(),
        }
    }

    /// Like [`Substitution::apply`], but unresolved parameters collapse to
    /// `dyn`. Used to finalize recorded node types after checking.
    pub fn apply_default_dyn(&self, ty: &CelType) -> CelType {
        let applied = self.apply(ty);
        erase_params(&applied)
    }
}

fn erase_params(ty: &CelType) -> CelType {
    match ty {
        CelType::TypeParam(_) => CelType::Dyn,
        CelType::List(e) => CelType::list(erase_params(e)),
        CelType::Map(k, v) => CelType::map(erase_params(k), erase_params(v)),
        CelType::Optional(t) => CelType::optional(erase_params(t)),
        CelType::Wrapper(t) => CelType::wrapper(erase_params(t)),
        CelType::Type(Some(t)) => CelType::type_of(erase_params(t)),
        CelType::Opaque { name, params } => CelType::Opaque {
            name: name.clone(),
            params: params.iter().map(erase_params).collect(),
        },
        CelType::Function { result, args } => CelType::Function {
            result: Box::new(erase_params(result)),
            args: args.iter().map(erase_params).collect(),
        },
        _ => ty.clone(),
    }
}

/// Whether `source` is assignable to `target` under `sub`.
///
/// On success `sub` may gain parameter bindings; on failure it is left in a
/// partially extended state, so callers that probe multiple overloads must
/// clone before each attempt.
pub fn is_assignable(sub: &mut Substitution, target: &CelType, source: &CelType) -> bool {
    let target = sub.apply(target);
    let source = sub.apply(source);

    if target == source {
        return true;
    }
    if target.is_dyn_or_error() || source.is_dyn_or_error() {
        return true;
    }

    if let CelType::TypeParam(name) = &target {
        sub.bind(name, source);
        return true;
    }
    if let CelType::TypeParam(name) = &source {
        sub.bind(name, target);
        return true;
    }

    match (&target, &source) {
        (CelType::Wrapper(_), CelType::Null) => true,
        (CelType::Wrapper(p), CelType::Wrapper(q)) => is_assignable(sub, p, q),
        (CelType::Wrapper(p), _) => is_assignable(sub, p, &source),
        // `any` is dynamically typed in both directions, like `dyn`.
        (CelType::Any, _) | (_, CelType::Any) => true,
        (CelType::Message(_) | CelType::Optional(_), CelType::Null) => true,
        (CelType::List(a), CelType::List(b)) => is_assignable(sub, a, b),
        (CelType::Map(ka, va), CelType::Map(kb, vb)) => {
            is_assignable(sub, ka, kb) && is_assignable(sub, va, vb)
        }
        (CelType::Optional(a), CelType::Optional(b)) => is_assignable(sub, a, b),
        (CelType::Type(None), CelType::Type(_)) => true,
        (CelType::Type(Some(a)), CelType::Type(Some(b))) => is_assignable(sub, a, b),
        (
            CelType::Opaque { name: na, params: pa },
            CelType::Opaque { name: nb, params: pb },
        ) => {
            na == nb
                && pa.len() == pb.len()
                && pa.iter().zip(pb).all(|(a, b)| is_assignable(sub, a, b))
        }
        (
            CelType::Function {
                result: ra,
                args: aa,
            },
            CelType::Function {
                result: rb,
                args: ab,
            },
        ) => {
            aa.len() == ab.len()
                && is_assignable(sub, ra, rb)
                && aa.iter().zip(ab).all(|(a, b)| is_assignable(sub, a, b))
        }
        // Enum values flow freely to and from int.
        (CelType::Int, CelType::Enum(_)) | (CelType::Enum(_), CelType::Int) => true,
        _ => false,
    }
}

/// Least upper bound of two types, used to type heterogeneous literals.
///
/// Joining `null` with a wrappable primitive yields the nullable wrapper;
/// unrelated kinds collapse to `dyn`.
pub fn least_upper_bound(a: &CelType, b: &CelType) -> CelType {
    if a == b {
        return a.clone();
    }
    match (a, b) {
        (CelType::Dyn, _) | (_, CelType::Dyn) => CelType::Dyn,
        (CelType::Error, other) | (other, CelType::Error) => other.clone(),
        (CelType::Null, other) | (other, CelType::Null) => {
            if other.has_wrapper() {
                CelType::wrapper(other.clone())
            } else if matches!(
                other,
                CelType::Wrapper(_) | CelType::Message(_) | CelType::Optional(_)
            ) {
                other.clone()
            } else {
                CelType::Dyn
            }
        }
        (CelType::Wrapper(p), other) | (other, CelType::Wrapper(p)) if p.as_ref() == other => {
            CelType::wrapper(other.clone())
        }
        (CelType::List(x), CelType::List(y)) => CelType::list(least_upper_bound(x, y)),
        (CelType::Map(kx, vx), CelType::Map(ky, vy)) => {
            CelType::map(least_upper_bound(kx, ky), least_upper_bound(vx, vy))
        }
        (CelType::Optional(x), CelType::Optional(y)) => {
            CelType::optional(least_upper_bound(x, y))
        }
        _ => CelType::Dyn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dyn_is_top() {
        let mut sub = Substitution::new();
        assert!(is_assignable(&mut sub, &CelType::Dyn, &CelType::Int));
        assert!(is_assignable(&mut sub, &CelType::String, &CelType::Dyn));
    }

    #[test]
    fn numerics_are_distinct() {
        let mut sub = Substitution::new();
        assert!(!is_assignable(&mut sub, &CelType::Int, &CelType::Uint));
        assert!(!is_assignable(&mut sub, &CelType::Int, &CelType::Double));
        assert!(!is_assignable(&mut sub, &CelType::Double, &CelType::Int));
    }

    #[test]
    fn wrapper_accepts_value_and_null() {
        let wrapped = CelType::wrapper(CelType::Int);
        let mut sub = Substitution::new();
        assert!(is_assignable(&mut sub, &wrapped, &CelType::Int));
        assert!(is_assignable(&mut sub, &wrapped, &CelType::Null));
        assert!(!is_assignable(&mut sub, &wrapped, &CelType::String));
    }

    #[test]
    fn params_unify_consistently() {
        // (A, A) against (int, int) binds A once.
        let a = CelType::param("A");
        let mut sub = Substitution::new();
        assert!(is_assignable(&mut sub, &a, &CelType::Int));
        assert!(is_assignable(&mut sub, &a, &CelType::Int));
        assert_eq!(sub.apply(&a), CelType::Int);
    }

    #[test]
    fn params_reject_disagreement() {
        let a = CelType::param("A");
        let mut sub = Substitution::new();
        assert!(is_assignable(&mut sub, &a, &CelType::Int));
        // A is already int; string no longer unifies.
        assert!(!is_assignable(&mut sub, &a, &CelType::String));
    }

    #[test]
    fn list_params_flow_through() {
        let decl = CelType::list(CelType::param("A"));
        let arg = CelType::list(CelType::String);
        let mut sub = Substitution::new();
        assert!(is_assignable(&mut sub, &decl, &arg));
        assert_eq!(sub.apply(&CelType::param("A")), CelType::String);
    }

    #[test]
    fn lub_null_primitive_is_wrapper() {
        assert_eq!(
            least_upper_bound(&CelType::Null, &CelType::Int),
            CelType::wrapper(CelType::Int)
        );
        assert_eq!(
            least_upper_bound(&CelType::Int, &CelType::String),
            CelType::Dyn
        );
        assert_eq!(
            least_upper_bound(&CelType::list(CelType::Int), &CelType::list(CelType::Int)),
            CelType::list(CelType::Int)
        );
    }

    #[test]
    fn display_names() {
        assert_eq!(CelType::list(CelType::Int).to_string(), "list(int)");
        assert_eq!(
            CelType::map(CelType::String, CelType::Dyn).to_string(),
            "map(string, dyn)"
        );
        assert_eq!(
            CelType::optional(CelType::Bool).to_string(),
            "optional_type(bool)"
        );
        assert_eq!(CelType::type_of(CelType::Int).to_string(), "type(int)");
    }
}

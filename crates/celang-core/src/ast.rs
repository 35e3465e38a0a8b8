//! The celang expression tree.
//!
//! Every node carries a 64-bit id unique within one AST, assigned
//! monotonically by the parser, plus exactly one variant payload. Ids index
//! the side-maps of a [`CheckedAst`] (per-node types and resolved
//! references) and the position table in
//! [`SourceInfo`](crate::source::SourceInfo).
//!
//! The tree is a plain owned value: rewrite passes take `&mut Expr`, the
//! checker and the interpreter only ever see `&Expr`.

use indexmap::IndexMap;

use crate::source::SourceInfo;
use crate::types::CelType;

/// Identifier of an expression node, unique within one AST.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ExprId(u64);

impl ExprId {
    #[inline]
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ExprId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Tagged literal constant.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Constant {
    /// The intrinsic CEL type of this constant.
    pub fn cel_type(&self) -> CelType {
        match self {
            Constant::Null => CelType::Null,
            Constant::Bool(_) => CelType::Bool,
            Constant::Int(_) => CelType::Int,
            Constant::Uint(_) => CelType::Uint,
            Constant::Double(_) => CelType::Double,
            Constant::String(_) => CelType::String,
            Constant::Bytes(_) => CelType::Bytes,
        }
    }
}

/// Field access, `operand.field`. With `test_only` set this is the expansion
/// of `has(operand.field)` and evaluates to a presence boolean.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectExpr {
    pub operand: Expr,
    pub field: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub test_only: bool,
}

/// Function or method invocation. Operators parse to calls on their
/// canonical names (`_&&_`, `_+_`, `_[_]`, ...).
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallExpr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Expr>,
    pub function: String,
    pub args: Vec<Expr>,
}

/// List construction literal.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExpr {
    pub elements: Vec<Expr>,
    /// Indices of elements written `?e`; such an element must evaluate to an
    /// optional and is skipped when the optional is empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_indices: Vec<u32>,
}

/// One field of a message construction literal.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructEntry {
    pub id: ExprId,
    pub field: String,
    pub value: Expr,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

/// Message construction, `pkg.Message{field: value}`.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructExpr {
    pub message_name: String,
    pub entries: Vec<StructEntry>,
}

/// One entry of a map construction literal.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    pub id: ExprId,
    pub key: Expr,
    pub value: Expr,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

/// Map construction literal.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapExpr {
    pub entries: Vec<MapEntry>,
}

/// The sole looping construct: a bounded fold over a list or map.
///
/// `iter_var` and `accu_var` are lexically scoped to the loop condition,
/// loop step, and result; shadowing outer bindings is permitted.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensionExpr {
    pub iter_var: String,
    pub iter_range: Expr,
    pub accu_var: String,
    pub accu_init: Expr,
    pub loop_condition: Expr,
    pub loop_step: Expr,
    pub result: Expr,
}

/// Expression variant payload.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExprKind {
    /// Placeholder for an absent expression (parse error recovery).
    NotSet,
    Const(Constant),
    Ident(String),
    Select(Box<SelectExpr>),
    Call(Box<CallExpr>),
    List(ListExpr),
    Struct(StructExpr),
    Map(MapExpr),
    Comprehension(Box<ComprehensionExpr>),
}

/// An expression node: id plus variant.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind) -> Self {
        Self { id, kind }
    }

    pub fn not_set(id: ExprId) -> Self {
        Self::new(id, ExprKind::NotSet)
    }

    pub fn constant(id: ExprId, value: Constant) -> Self {
        Self::new(id, ExprKind::Const(value))
    }

    pub fn ident(id: ExprId, name: impl Into<String>) -> Self {
        Self::new(id, ExprKind::Ident(name.into()))
    }

    pub fn select(id: ExprId, operand: Expr, field: impl Into<String>, test_only: bool) -> Self {
        Self::new(
            id,
            ExprKind::Select(Box::new(SelectExpr {
                operand,
                field: field.into(),
                test_only,
            })),
        )
    }

    /// Global (free-function) call.
    pub fn call(id: ExprId, function: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(
            id,
            ExprKind::Call(Box::new(CallExpr {
                target: None,
                function: function.into(),
                args,
            })),
        )
    }

    /// Receiver-style call.
    pub fn member_call(
        id: ExprId,
        target: Expr,
        function: impl Into<String>,
        args: Vec<Expr>,
    ) -> Self {
        Self::new(
            id,
            ExprKind::Call(Box::new(CallExpr {
                target: Some(target),
                function: function.into(),
                args,
            })),
        )
    }

    pub fn list(id: ExprId, elements: Vec<Expr>) -> Self {
        Self::new(
            id,
            ExprKind::List(ListExpr {
                elements,
                optional_indices: Vec::new(),
            }),
        )
    }

    /// Children in normative visitation order.
    ///
    /// Call: target (if present) then args; Select: operand; List: elements;
    /// Struct/Map: entries in order, map key before value; Comprehension:
    /// iter range, accu init, loop condition, loop step, result.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::NotSet | ExprKind::Const(_) | ExprKind::Ident(_) => Vec::new(),
            ExprKind::Select(s) => vec![&s.operand],
            ExprKind::Call(c) => {
                let mut out = Vec::with_capacity(c.args.len() + 1);
                if let Some(target) = &c.target {
                    out.push(target);
                }
                out.extend(c.args.iter());
                out
            }
            ExprKind::List(l) => l.elements.iter().collect(),
            ExprKind::Struct(s) => s.entries.iter().map(|e| &e.value).collect(),
            ExprKind::Map(m) => {
                let mut out = Vec::with_capacity(m.entries.len() * 2);
                for entry in &m.entries {
                    out.push(&entry.key);
                    out.push(&entry.value);
                }
                out
            }
            ExprKind::Comprehension(c) => vec![
                &c.iter_range,
                &c.accu_init,
                &c.loop_condition,
                &c.loop_step,
                &c.result,
            ],
        }
    }

    /// Largest id in this subtree (including self).
    pub fn max_id(&self) -> ExprId {
        let mut max = self.id;
        let mut stack = self.children();
        while let Some(node) = stack.pop() {
            if node.id > max {
                max = node.id;
            }
            stack.extend(node.children());
        }
        max
    }
}

/// A resolved reference recorded by the checker.
///
/// For identifiers this is the fully qualified name the container resolved
/// to (plus the constant value for enum literals); for calls it is the list
/// of matching overload ids.
#[derive(Clone, PartialEq, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overload_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Constant>,
}

impl Reference {
    pub fn to_ident(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overload_ids: Vec::new(),
            value: None,
        }
    }

    pub fn to_constant(name: impl Into<String>, value: Constant) -> Self {
        Self {
            name: name.into(),
            overload_ids: Vec::new(),
            value: Some(value),
        }
    }

    pub fn to_overloads(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: String::new(),
            overload_ids: ids.into_iter().map(Into::into).collect(),
            value: None,
        }
    }
}

/// Output of a successful parse: the tree plus its positional side-table.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedAst {
    pub root: Expr,
    pub source_info: SourceInfo,
}

/// Output of a successful check: a parsed AST annotated with per-node
/// resolved types and references.
#[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedAst {
    pub root: Expr,
    pub source_info: SourceInfo,
    pub types: IndexMap<ExprId, CelType>,
    pub references: IndexMap<ExprId, Reference>,
}

impl CheckedAst {
    /// The resolved type of the root expression.
    pub fn result_type(&self) -> &CelType {
        self.types.get(&self.root.id).unwrap_or(&CelType::Dyn)
    }

    pub fn type_of(&self, id: ExprId) -> Option<&CelType> {
        self.types.get(&id)
    }

    pub fn reference_of(&self, id: ExprId) -> Option<&Reference> {
        self.references.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ExprId {
        ExprId::from_raw(n)
    }

    #[test]
    fn children_order_for_calls() {
        let call = Expr::member_call(
            id(4),
            Expr::ident(id(1), "target"),
            "f",
            vec![Expr::ident(id(2), "a"), Expr::ident(id(3), "b")],
        );
        let names: Vec<_> = call
            .children()
            .iter()
            .map(|e| match &e.kind {
                ExprKind::Ident(n) => n.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, ["target", "a", "b"]);
    }

    #[test]
    fn children_order_for_maps_key_before_value() {
        let map = Expr::new(
            id(5),
            ExprKind::Map(MapExpr {
                entries: vec![MapEntry {
                    id: id(4),
                    key: Expr::ident(id(1), "k"),
                    value: Expr::ident(id(2), "v"),
                    optional: false,
                }],
            }),
        );
        let kinds: Vec<_> = map.children().iter().map(|e| e.id).collect();
        assert_eq!(kinds, [id(1), id(2)]);
    }

    #[test]
    fn max_id_covers_subtree() {
        let e = Expr::call(
            id(1),
            "_+_",
            vec![
                Expr::constant(id(7), Constant::Int(1)),
                Expr::constant(id(3), Constant::Int(2)),
            ],
        );
        assert_eq!(e.max_id(), id(7));
    }

    #[test]
    fn constant_types() {
        assert_eq!(Constant::Int(1).cel_type(), CelType::Int);
        assert_eq!(Constant::Uint(1).cel_type(), CelType::Uint);
        assert_eq!(Constant::Double(1.0).cel_type(), CelType::Double);
        assert_eq!(Constant::Null.cel_type(), CelType::Null);
    }
}

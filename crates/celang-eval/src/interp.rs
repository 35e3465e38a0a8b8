//! The tree-walk interpreter.
//!
//! Evaluation is deterministic and left-to-right. Strict calls force their
//! arguments and never hand errors or unknowns to a binding; lazy calls
//! (the logical operators) receive thunks and implement the commutative
//! absorption rules themselves. Comprehensions are bounded folds drawing
//! on a shared iteration budget with a cooperative cancellation check per
//! iteration.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use celang_core::ast::{
    CallExpr, ComprehensionExpr, Constant, Expr, ExprId, ExprKind, ListExpr, MapExpr, Reference,
    SelectExpr, StructExpr,
};
use celang_core::container::Container;
use celang_core::descriptors::DescriptorPool;
use celang_core::types::CelType;

use crate::activation::Activation;
use crate::error::EvalError;
use crate::msg::{unpack_any, MessageValue, ANY_MESSAGE};
use crate::registry::{Binding, FunctionRegistry, LazyArgs, RuntimeOverload};
use crate::runtime::RuntimeOptions;
use crate::value::{merge_unknowns, Kind, MapKey, MapValue, Value};

/// Per-evaluation bookkeeping: the aggregate comprehension budget and the
/// cooperative cancellation flag.
pub(crate) struct EvalContext {
    iter_budget: Cell<i64>,
    cancel: Option<Arc<AtomicBool>>,
}

impl EvalContext {
    pub(crate) fn new(budget: i64, cancel: Option<Arc<AtomicBool>>) -> Self {
        Self {
            iter_budget: Cell::new(if budget < 0 { i64::MAX } else { budget }),
            cancel,
        }
    }

    fn tick(&self) -> Result<(), EvalError> {
        if let Some(flag) = &self.cancel
            && flag.load(Ordering::Relaxed)
        {
            return Err(EvalError::Cancelled);
        }
        let remaining = self.iter_budget.get();
        if remaining == 0 {
            return Err(EvalError::IterationLimitExceeded);
        }
        self.iter_budget.set(remaining - 1);
        Ok(())
    }
}

/// Lexical scope chain: comprehension variables over the root activation.
pub(crate) enum Scope<'a> {
    Root(&'a dyn Activation),
    Child {
        parent: &'a Scope<'a>,
        name: &'a str,
        value: Value,
    },
}

impl<'a> Scope<'a> {
    fn child(parent: &'a Scope<'a>, name: &'a str, value: Value) -> Scope<'a> {
        Scope::Child {
            parent,
            name,
            value,
        }
    }

    fn lookup(&self, wanted: &str) -> Option<Value> {
        match self {
            Scope::Root(_) => None,
            Scope::Child {
                parent,
                name,
                value,
            } => {
                if *name == wanted {
                    Some(value.clone())
                } else {
                    parent.lookup(wanted)
                }
            }
        }
    }

    fn activation(&self) -> &dyn Activation {
        match self {
            Scope::Root(activation) => *activation,
            Scope::Child { parent, .. } => parent.activation(),
        }
    }
}

/// Immutable evaluation machinery shared by one program.
pub(crate) struct Interpreter<'p> {
    pub(crate) registry: &'p FunctionRegistry,
    pub(crate) pool: &'p DescriptorPool,
    pub(crate) container: &'p Container,
    pub(crate) options: &'p RuntimeOptions,
    /// Present for checked programs; parse-only programs dispatch purely
    /// by runtime kinds.
    pub(crate) references: Option<&'p IndexMap<ExprId, Reference>>,
}

impl<'p> Interpreter<'p> {
    pub(crate) fn eval(
        &self,
        ctx: &EvalContext,
        scope: &Scope<'_>,
        e: &Expr,
    ) -> Result<Value, EvalError> {
        match &e.kind {
            ExprKind::NotSet => Err(EvalError::invalid_argument("unspecified expression")),
            ExprKind::Const(c) => Ok(self.constant_value(c)),
            ExprKind::Ident(name) => self.eval_ident(scope, e.id, name),
            ExprKind::Select(select) => self.eval_select(ctx, scope, e.id, select),
            ExprKind::Call(call) => self.eval_call(ctx, scope, e.id, call),
            ExprKind::List(list) => self.eval_list(ctx, scope, list),
            ExprKind::Map(map) => self.eval_map(ctx, scope, map),
            ExprKind::Struct(strct) => self.eval_struct(ctx, scope, e.id, strct),
            ExprKind::Comprehension(comp) => self.eval_comprehension(ctx, scope, comp),
        }
    }

    fn reference_of(&self, id: ExprId) -> Option<&'p Reference> {
        self.references.and_then(|refs| refs.get(&id))
    }

    fn constant_value(&self, c: &Constant) -> Value {
        match c {
            Constant::Null => Value::Null,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(v) => Value::Int(*v),
            Constant::Uint(v) => {
                if self.options.fold_uint_to_int {
                    Value::Int(*v as i64)
                } else {
                    Value::Uint(*v)
                }
            }
            Constant::Double(v) => Value::Double(*v),
            Constant::String(s) => Value::string(s),
            Constant::Bytes(b) => Value::bytes(b),
        }
    }

    fn eval_ident(&self, scope: &Scope<'_>, id: ExprId, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = scope.lookup(name) {
            return Ok(value);
        }
        if let Some(reference) = self.reference_of(id) {
            if let Some(constant) = &reference.value {
                return Ok(self.constant_value(constant));
            }
            if !reference.name.is_empty() {
                return self.resolve_variable(scope, &reference.name);
            }
        }
        for candidate in self.container.resolve_candidate_names(name) {
            if let Some(value) = self.lookup_name(scope, &candidate) {
                return Ok(value);
            }
        }
        self.missing(name)
    }

    /// Activation lookup plus the ambient names every evaluation knows:
    /// type identifiers and enum constants.
    fn lookup_name(&self, scope: &Scope<'_>, qualified: &str) -> Option<Value> {
        if let Some(value) = scope.activation().resolve(qualified) {
            return Some(value);
        }
        if let Some(ty) = type_ident(qualified) {
            return Some(Value::Type(ty));
        }
        if let Some((_, number)) = self.pool.find_enum_value(qualified) {
            return Some(Value::Int(number));
        }
        self.pool.resolve_type(qualified).map(Value::Type)
    }

    fn resolve_variable(&self, scope: &Scope<'_>, name: &str) -> Result<Value, EvalError> {
        match self.lookup_name(scope, name) {
            Some(value) => Ok(value),
            None => self.missing(name),
        }
    }

    fn missing(&self, name: &str) -> Result<Value, EvalError> {
        if self.options.strict_variables {
            Err(EvalError::UnboundVariable(name.to_owned()))
        } else {
            Ok(Value::unknown(name))
        }
    }

    fn eval_select(
        &self,
        ctx: &EvalContext,
        scope: &Scope<'_>,
        id: ExprId,
        select: &SelectExpr,
    ) -> Result<Value, EvalError> {
        // The checker may have resolved this select chain as a qualified
        // variable or enum constant.
        if let Some(reference) = self.reference_of(id) {
            if let Some(constant) = &reference.value {
                return Ok(self.constant_value(constant));
            }
            if !reference.name.is_empty() {
                return self.resolve_variable(scope, &reference.name);
            }
        }
        // Parse-only programs attempt the same qualified interpretation
        // against the activation before field-walking.
        if self.references.is_none()
            && !select.test_only
            && let Some(qualified) = flatten_expr_name_select(select)
        {
            for candidate in self.container.resolve_candidate_names(&qualified) {
                if let Some(value) = self.lookup_name(scope, &candidate) {
                    return Ok(value);
                }
            }
        }

        let operand = self.eval(ctx, scope, &select.operand)?;
        self.select_field(operand, &select.field, select.test_only)
    }

    fn select_field(
        &self,
        operand: Value,
        field: &str,
        test_only: bool,
    ) -> Result<Value, EvalError> {
        match operand {
            Value::Unknown(_) => Ok(operand),
            Value::Message(m) => {
                // A packed Any unpacks into its payload before access.
                if m.descriptor().full_name == ANY_MESSAGE
                    && let Some(payload) = unpack_any(&m)
                {
                    return self.select_field(payload, field, test_only);
                }
                if test_only {
                    if m.descriptor().field_by_name(field).is_none() {
                        return Err(EvalError::NoSuchField(field.to_owned()));
                    }
                    Ok(Value::Bool(m.has_field(field)))
                } else {
                    m.field(field)
                }
            }
            Value::Map(map) => {
                let key = MapKey::String(field.into());
                if test_only {
                    let present = match map.get(&key) {
                        // JSON-origin maps: defined-and-not-null.
                        Some(Value::Null) if map.from_json => false,
                        Some(_) => true,
                        None => false,
                    };
                    Ok(Value::Bool(present))
                } else {
                    map.get(&key)
                        .cloned()
                        .ok_or_else(|| EvalError::NoSuchKey(field.to_owned()))
                }
            }
            Value::Optional(o) => match o.as_ref() {
                Some(inner) => {
                    let through = self.select_field(inner.clone(), field, test_only)?;
                    if test_only {
                        Ok(through)
                    } else {
                        Ok(Value::optional_of(through))
                    }
                }
                None => Ok(if test_only {
                    Value::Bool(false)
                } else {
                    Value::optional_none()
                }),
            },
            Value::Null => Err(EvalError::invalid_argument(format!(
                "cannot select field '{field}' on null"
            ))),
            other => Err(EvalError::invalid_argument(format!(
                "type '{}' does not support field selection",
                other.kind().name()
            ))),
        }
    }

    fn eval_call(
        &self,
        ctx: &EvalContext,
        scope: &Scope<'_>,
        id: ExprId,
        call: &CallExpr,
    ) -> Result<Value, EvalError> {
        let reference = self.reference_of(id);

        // Receiver syntax can spell a namespaced global (`optional.of(x)`).
        // Checked programs carry the resolved name; parse-only programs
        // probe the registry through the container.
        let mut function: &str = &call.function;
        let mut target: Option<&Expr> = call.target.as_ref();
        let mut ns_resolved: Option<String> = None;
        if let Some(r) = reference
            && !r.name.is_empty()
            && r.name != call.function
        {
            function = &r.name;
            target = None;
        } else if self.references.is_none()
            && let Some(t) = &call.target
            && let Some(qualified) = flatten_expr_name(t)
        {
            let full = format!("{qualified}.{}", call.function);
            for candidate in self.container.resolve_candidate_names(&full) {
                if self.registry.contains_function(&candidate) {
                    ns_resolved = Some(candidate);
                    break;
                }
            }
            if let Some(name) = &ns_resolved {
                function = name;
                target = None;
            }
        }
        let member = target.is_some();

        if self.registry.is_lazy(function) {
            let exprs: Vec<&Expr> = target.into_iter().chain(call.args.iter()).collect();
            let Some(overload) = self.registry.find_lazy(function, member, exprs.len()) else {
                return Err(EvalError::no_matching_overload(function, &[]));
            };
            let Binding::Lazy(f) = &overload.binding else {
                return Err(EvalError::no_matching_overload(function, &[]));
            };
            let mut thunks = ThunkArgs {
                interp: self,
                ctx,
                scope,
                exprs,
            };
            return f(&mut thunks);
        }

        // Strict: force the receiver and arguments left-to-right.
        let mut values = Vec::with_capacity(call.args.len() + 1);
        if let Some(t) = target {
            values.push(self.eval(ctx, scope, t)?);
        }
        for arg in &call.args {
            values.push(self.eval(ctx, scope, arg)?);
        }

        // Strict bindings never see unknowns; the merged set propagates.
        if values.iter().any(Value::is_unknown) {
            let mut merged: Option<Value> = None;
            for value in values.iter().filter(|v| v.is_unknown()) {
                merge_into(&mut merged, value);
            }
            if let Some(merged) = merged {
                return Ok(merged);
            }
        }

        let kinds: Vec<Kind> = values.iter().map(Value::kind).collect();

        if let Some(r) = reference {
            if r.overload_ids.len() == 1 {
                if let Some(overload) = self.registry.by_id(&r.overload_ids[0]) {
                    return self.invoke(overload, &values);
                }
            } else if r.overload_ids.len() > 1 {
                // Dyn-driven dispatch among the checker's candidates.
                if let Some(overload) = r
                    .overload_ids
                    .iter()
                    .filter_map(|oid| self.registry.by_id(oid))
                    .find(|o| o.matches_kinds(member, &kinds))
                {
                    return self.invoke(overload, &values);
                }
                return Err(self.signature_miss(function, &kinds));
            }
        }

        match self.registry.find_by_kinds(function, member, &kinds) {
            Some(overload) => self.invoke(overload, &values),
            None => Err(self.signature_miss(function, &kinds)),
        }
    }

    fn signature_miss(&self, function: &str, kinds: &[Kind]) -> EvalError {
        let names: Vec<&str> = kinds.iter().map(|k| k.name()).collect();
        EvalError::no_matching_overload(function, &names)
    }

    fn invoke(&self, overload: &RuntimeOverload, args: &[Value]) -> Result<Value, EvalError> {
        match &overload.binding {
            Binding::Strict(f) => f(args),
            Binding::Lazy(f) => {
                let mut ready = ReadyArgs(args.to_vec());
                f(&mut ready)
            }
        }
    }

    fn eval_list(
        &self,
        ctx: &EvalContext,
        scope: &Scope<'_>,
        list: &ListExpr,
    ) -> Result<Value, EvalError> {
        let mut items = Vec::with_capacity(list.elements.len());
        let mut unknown: Option<Value> = None;
        for (index, element) in list.elements.iter().enumerate() {
            let value = self.eval(ctx, scope, element)?;
            if value.is_unknown() {
                merge_into(&mut unknown, &value);
                continue;
            }
            if list.optional_indices.contains(&(index as u32)) {
                match value {
                    Value::Optional(o) => {
                        if let Some(inner) = o.as_ref() {
                            items.push(inner.clone());
                        }
                    }
                    other => {
                        return Err(EvalError::invalid_argument(format!(
                            "optional list element must be optional, found '{}'",
                            other.kind().name()
                        )));
                    }
                }
            } else {
                items.push(value);
            }
        }
        Ok(unknown.unwrap_or_else(|| Value::list(items)))
    }

    fn eval_map(
        &self,
        ctx: &EvalContext,
        scope: &Scope<'_>,
        map: &MapExpr,
    ) -> Result<Value, EvalError> {
        let mut out = MapValue::new();
        let mut unknown: Option<Value> = None;
        for entry in &map.entries {
            let key = self.eval(ctx, scope, &entry.key)?;
            let value = self.eval(ctx, scope, &entry.value)?;
            if key.is_unknown() {
                merge_into(&mut unknown, &key);
                continue;
            }
            if value.is_unknown() {
                merge_into(&mut unknown, &value);
                continue;
            }
            let value = if entry.optional {
                match value {
                    Value::Optional(o) => match o.as_ref() {
                        Some(inner) => inner.clone(),
                        None => continue,
                    },
                    other => {
                        return Err(EvalError::invalid_argument(format!(
                            "optional map entry must be optional, found '{}'",
                            other.kind().name()
                        )));
                    }
                }
            } else {
                value
            };
            let key = MapKey::from_value(key)?;
            if out.contains_key(&key) && !self.options.last_wins_map_keys {
                return Err(EvalError::DuplicateMapKey(key.to_string()));
            }
            out.insert(key, value);
        }
        Ok(unknown.unwrap_or_else(|| Value::map(out)))
    }

    fn eval_struct(
        &self,
        ctx: &EvalContext,
        scope: &Scope<'_>,
        id: ExprId,
        strct: &StructExpr,
    ) -> Result<Value, EvalError> {
        let resolved = match self.reference_of(id) {
            Some(r) if !r.name.is_empty() => Some(r.name.clone()),
            _ => self
                .container
                .resolve_candidate_names(&strct.message_name)
                .into_iter()
                .find(|candidate| self.pool.message(candidate).is_some()),
        };
        let descriptor = resolved
            .as_deref()
            .and_then(|name| self.pool.message(name))
            .ok_or_else(|| {
                EvalError::invalid_argument(format!(
                    "unknown message type '{}'",
                    strct.message_name
                ))
            })?;

        let mut builder = MessageValue::builder(descriptor.clone());
        let mut unknown: Option<Value> = None;
        for entry in &strct.entries {
            let value = self.eval(ctx, scope, &entry.value)?;
            if value.is_unknown() {
                merge_into(&mut unknown, &value);
                continue;
            }
            let value = if entry.optional {
                match value {
                    Value::Optional(o) => match o.as_ref() {
                        Some(inner) => inner.clone(),
                        None => continue,
                    },
                    other => {
                        return Err(EvalError::invalid_argument(format!(
                            "optional field must be optional, found '{}'",
                            other.kind().name()
                        )));
                    }
                }
            } else {
                value
            };
            builder.set_field(&entry.field, value)?;
        }
        Ok(unknown.unwrap_or_else(|| Value::Message(Arc::new(builder.build()))))
    }

    fn eval_comprehension(
        &self,
        ctx: &EvalContext,
        scope: &Scope<'_>,
        comp: &ComprehensionExpr,
    ) -> Result<Value, EvalError> {
        let range = self.eval(ctx, scope, &comp.iter_range)?;
        let items: Vec<Value> = match &range {
            Value::Unknown(_) => return Ok(range),
            Value::List(items) => items.iter().cloned().collect(),
            Value::Map(map) => map.keys().map(MapKey::to_value).collect(),
            other => {
                return Err(EvalError::invalid_argument(format!(
                    "cannot iterate over '{}'",
                    other.kind().name()
                )));
            }
        };

        let mut accu = self.eval(ctx, scope, &comp.accu_init)?;
        for item in items {
            ctx.tick()?;
            let accu_scope = Scope::child(scope, &comp.accu_var, accu.clone());
            let iter_scope = Scope::child(&accu_scope, &comp.iter_var, item);
            match self.eval(ctx, &iter_scope, &comp.loop_condition)? {
                Value::Bool(true) => {}
                Value::Bool(false) => break,
                unknown @ Value::Unknown(_) => return Ok(unknown),
                other => {
                    return Err(EvalError::invalid_argument(format!(
                        "comprehension loop condition must be bool, found '{}'",
                        other.kind().name()
                    )));
                }
            }
            accu = self.eval(ctx, &iter_scope, &comp.loop_step)?;
        }

        let result_scope = Scope::child(scope, &comp.accu_var, accu);
        self.eval(ctx, &result_scope, &comp.result)
    }
}

fn merge_into(slot: &mut Option<Value>, unknown: &Value) {
    *slot = Some(match slot.take() {
        Some(existing) => merge_unknowns(&existing, unknown),
        None => unknown.clone(),
    });
}

/// Thunked arguments backed by unevaluated subexpressions.
struct ThunkArgs<'x, 'p> {
    interp: &'x Interpreter<'p>,
    ctx: &'x EvalContext,
    scope: &'x Scope<'x>,
    exprs: Vec<&'x Expr>,
}

impl LazyArgs for ThunkArgs<'_, '_> {
    fn len(&self) -> usize {
        self.exprs.len()
    }

    fn eval(&mut self, index: usize) -> Result<Value, EvalError> {
        self.interp.eval(self.ctx, self.scope, self.exprs[index])
    }
}

/// Pre-evaluated arguments presented through the lazy interface, for the
/// rare case of a lazy binding reached through strict dispatch.
struct ReadyArgs(Vec<Value>);

impl LazyArgs for ReadyArgs {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn eval(&mut self, index: usize) -> Result<Value, EvalError> {
        Ok(self.0[index].clone())
    }
}

/// Standard type identifiers every evaluation resolves.
fn type_ident(name: &str) -> Option<CelType> {
    Some(match name {
        "bool" => CelType::Bool,
        "int" => CelType::Int,
        "uint" => CelType::Uint,
        "double" => CelType::Double,
        "string" => CelType::String,
        "bytes" => CelType::Bytes,
        "list" => CelType::list(CelType::Dyn),
        "map" => CelType::map(CelType::Dyn, CelType::Dyn),
        "null_type" => CelType::Null,
        "dyn" => CelType::Dyn,
        "type" => CelType::Type(None),
        _ => return None,
    })
}

fn flatten_expr_name(e: &Expr) -> Option<String> {
    match &e.kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::Select(s) => flatten_expr_name_select(s),
        _ => None,
    }
}

fn flatten_expr_name_select(select: &SelectExpr) -> Option<String> {
    if select.test_only {
        return None;
    }
    let base = flatten_expr_name(&select.operand)?;
    Some(format!("{base}.{}", select.field))
}

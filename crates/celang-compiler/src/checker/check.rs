//! The checking walk.

use indexmap::IndexMap;

use celang_core::ast::{
    CallExpr, CheckedAst, ComprehensionExpr, Constant, Expr, ExprId, ExprKind, ListExpr, MapExpr,
    ParsedAst, Reference, SelectExpr, StructExpr,
};
use celang_core::source::Span;
use celang_core::types::{self, CelType, Substitution};

use super::CheckerEnv;
use crate::decls::{FunctionDecl, OverloadDecl};
use crate::diagnostics::Diagnostics;

/// Check a parsed AST against an environment. Returns the checked AST only
/// when no error was diagnosed.
pub fn check(parsed: &ParsedAst, env: &CheckerEnv) -> (Option<CheckedAst>, Diagnostics) {
    let mut checker = Checker {
        env,
        positions: &parsed.source_info.positions,
        types: IndexMap::new(),
        references: IndexMap::new(),
        diagnostics: Diagnostics::new(),
        scopes: Vec::new(),
        sub: Substitution::new(),
        next_param: 0,
    };

    checker.check_expr(&parsed.root);

    let Checker {
        mut types,
        references,
        diagnostics,
        sub,
        ..
    } = checker;

    if diagnostics.has_errors() {
        return (None, diagnostics);
    }

    // Finalize: resolve bound type parameters, collapse the rest to dyn.
    for ty in types.values_mut() {
        *ty = sub.apply_default_dyn(ty);
    }

    let checked = CheckedAst {
        root: parsed.root.clone(),
        source_info: parsed.source_info.clone(),
        types,
        references,
    };
    (Some(checked), diagnostics)
}

struct Checker<'a> {
    env: &'a CheckerEnv,
    positions: &'a IndexMap<ExprId, u32>,
    types: IndexMap<ExprId, CelType>,
    references: IndexMap<ExprId, Reference>,
    diagnostics: Diagnostics,
    /// Comprehension-scoped variables, innermost last.
    scopes: Vec<(String, CelType)>,
    sub: Substitution,
    next_param: u32,
}

impl Checker<'_> {
    fn span_of(&self, id: ExprId) -> Span {
        Span::at(self.positions.get(&id).copied().unwrap_or(0))
    }

    fn error(&mut self, id: ExprId, message: impl Into<String>) {
        let span = self.span_of(id);
        self.diagnostics.error(span, message);
    }

    fn fresh_param(&mut self) -> CelType {
        let name = format!("@T{}", self.next_param);
        self.next_param += 1;
        CelType::param(name)
    }

    fn record(&mut self, id: ExprId, ty: CelType) -> CelType {
        self.types.insert(id, ty.clone());
        ty
    }

    fn check_expr(&mut self, e: &Expr) -> CelType {
        let ty = match &e.kind {
            ExprKind::NotSet => {
                self.error(e.id, "unspecified expression");
                CelType::Error
            }
            ExprKind::Const(c) => self.constant_type(c),
            ExprKind::Ident(name) => self.check_ident(e.id, name),
            ExprKind::Select(select) => self.check_select(e.id, select),
            ExprKind::Call(call) => self.check_call(e.id, call),
            ExprKind::List(list) => self.check_list(list),
            ExprKind::Map(map) => self.check_map(map),
            ExprKind::Struct(strct) => self.check_struct(e.id, strct),
            ExprKind::Comprehension(comp) => self.check_comprehension(comp),
        };
        self.record(e.id, ty)
    }

    fn constant_type(&self, c: &Constant) -> CelType {
        match c {
            // Legacy mode folds uint literals into the signed domain.
            Constant::Uint(_) if !self.env.unsigned_longs => CelType::Int,
            _ => c.cel_type(),
        }
    }

    fn lookup_scope(&self, name: &str) -> Option<&CelType> {
        self.scopes
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| ty)
    }

    fn check_ident(&mut self, id: ExprId, name: &str) -> CelType {
        if let Some(ty) = self.lookup_scope(name) {
            return ty.clone();
        }
        if let Some(ty) = self.resolve_qualified(id, name) {
            return ty;
        }
        self.error(
            id,
            format!(
                "undeclared reference to '{name}' (in container '{}')",
                self.env.container().name()
            ),
        );
        CelType::Error
    }

    /// Resolve a (possibly dotted) name through the container against
    /// declared variables and enum constants.
    fn resolve_qualified(&mut self, id: ExprId, name: &str) -> Option<CelType> {
        for candidate in self.env.container().resolve_candidate_names(name) {
            if let Some(ty) = self.env.variable(&candidate) {
                let ty = ty.clone();
                self.references
                    .insert(id, Reference::to_ident(candidate));
                return Some(ty);
            }
            if let Some((_, number)) = self.env.pool().find_enum_value(&candidate) {
                self.references
                    .insert(id, Reference::to_constant(candidate, Constant::Int(number)));
                return Some(CelType::Int);
            }
            if let Some(ty) = self.env.pool().resolve_type(&candidate) {
                self.references
                    .insert(id, Reference::to_ident(candidate));
                return Some(CelType::type_of(ty));
            }
        }
        None
    }

    fn check_select(&mut self, id: ExprId, select: &SelectExpr) -> CelType {
        // A select chain may spell a declared qualified name
        // (`resource.name`) or an enum constant (`pkg.Color.RED`); those
        // interpretations win over field selection.
        if !select.test_only
            && let Some(qualified) = flatten_qualified(select)
            && let Some(ty) = self.resolve_qualified(id, &qualified)
        {
            return ty;
        }

        let operand_type = self.check_expr(&select.operand);
        let result = self.select_field_type(id, &operand_type, &select.field);
        if select.test_only {
            if result.is_error() {
                CelType::Error
            } else {
                CelType::Bool
            }
        } else {
            result
        }
    }

    fn select_field_type(&mut self, id: ExprId, operand: &CelType, field: &str) -> CelType {
        match self.sub.apply(operand) {
            CelType::Dyn | CelType::Any | CelType::TypeParam(_) => CelType::Dyn,
            CelType::Error => CelType::Error,
            CelType::Message(name) => match self.env.pool().field_type(&name, field) {
                Some(ty) => ty.clone(),
                None => {
                    self.error(id, format!("undefined field '{field}' on '{name}'"));
                    CelType::Error
                }
            },
            CelType::Map(key, value) => {
                let mut trial = self.sub.clone();
                if types::is_assignable(&mut trial, &key, &CelType::String) {
                    self.sub = trial;
                    *value
                } else {
                    self.error(
                        id,
                        format!("map with key type '{key}' does not support field selection"),
                    );
                    CelType::Error
                }
            }
            CelType::Optional(inner) => {
                let through = self.select_field_type(id, &inner, field);
                if through.is_error() {
                    CelType::Error
                } else {
                    CelType::optional(through)
                }
            }
            other => {
                self.error(
                    id,
                    format!("type '{other}' does not support field selection"),
                );
                CelType::Error
            }
        }
    }

    fn check_call(&mut self, id: ExprId, call: &CallExpr) -> CelType {
        // Receiver syntax may spell a namespaced global function
        // (`optional.of(x)`, `math.greatest(...)`).
        if let Some(target) = &call.target
            && let Some(qualified) = flatten_expr_name(target)
        {
            let full = format!("{qualified}.{}", call.function);
            for candidate in self.env.container().resolve_candidate_names(&full) {
                if let Some(decl) = self.env.function(&candidate) {
                    let decl = decl.clone();
                    let arg_types: Vec<CelType> =
                        call.args.iter().map(|a| self.check_expr(a)).collect();
                    return self.resolve_overload(id, &candidate, &decl, None, &arg_types);
                }
            }
        }

        match &call.target {
            Some(target) => {
                let target_type = self.check_expr(target);
                let arg_types: Vec<CelType> =
                    call.args.iter().map(|a| self.check_expr(a)).collect();
                match self.env.function(&call.function) {
                    Some(decl) => {
                        let decl = decl.clone();
                        self.resolve_overload(
                            id,
                            &call.function,
                            &decl,
                            Some(target_type),
                            &arg_types,
                        )
                    }
                    None => {
                        self.undeclared_function(id, &call.function);
                        CelType::Error
                    }
                }
            }
            None => {
                let arg_types: Vec<CelType> =
                    call.args.iter().map(|a| self.check_expr(a)).collect();
                let resolved = self
                    .lookup_function(&call.function)
                    .map(|(name, decl)| (name.clone(), decl.clone()));
                match resolved {
                    Some((name, decl)) => {
                        self.resolve_overload(id, &name, &decl, None, &arg_types)
                    }
                    None => {
                        self.undeclared_function(id, &call.function);
                        CelType::Error
                    }
                }
            }
        }
    }

    fn lookup_function(&self, name: &str) -> Option<(&String, &FunctionDecl)> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self.env.functions.get_key_value(absolute);
        }
        for candidate in self.env.container().resolve_candidate_names(name) {
            if let Some(pair) = self.env.functions.get_key_value(&candidate) {
                return Some(pair);
            }
        }
        None
    }

    fn undeclared_function(&mut self, id: ExprId, name: &str) {
        self.error(
            id,
            format!(
                "undeclared reference to '{name}' (in container '{}')",
                self.env.container().name()
            ),
        );
    }

    /// Overload resolution: unify each candidate against the argument
    /// types, prefer non-dyn matches, merge dyn-driven matches.
    fn resolve_overload(
        &mut self,
        id: ExprId,
        function: &str,
        decl: &FunctionDecl,
        target_type: Option<CelType>,
        arg_types: &[CelType],
    ) -> CelType {
        let mut call_args: Vec<CelType> = Vec::with_capacity(arg_types.len() + 1);
        let is_member = target_type.is_some();
        if let Some(t) = target_type {
            call_args.push(t);
        }
        call_args.extend(arg_types.iter().cloned());

        if call_args.iter().any(CelType::is_error) {
            return CelType::Error;
        }

        let mut matches: Vec<(&OverloadDecl, Vec<CelType>, CelType, Substitution)> = Vec::new();
        for overload in &decl.overloads {
            if overload.member != is_member || overload.params.len() != call_args.len() {
                continue;
            }
            // Declared type parameters are scoped to the overload; each call
            // site gets a fresh instantiation.
            let (params, result) = self.instantiate(overload);
            let mut trial = self.sub.clone();
            let unified = params
                .iter()
                .zip(&call_args)
                .all(|(param, arg)| types::is_assignable(&mut trial, param, arg));
            if unified {
                matches.push((overload, params, result, trial));
            }
        }

        if matches.is_empty() {
            let rendered: Vec<String> = call_args
                .iter()
                .map(|t| self.sub.apply_default_dyn(t).to_string())
                .collect();
            self.error(
                id,
                format!(
                    "found no matching overload for '{function}' applied to ({})",
                    rendered.join(", ")
                ),
            );
            return CelType::Error;
        }

        let any_arg_dynamic = call_args
            .iter()
            .any(|t| self.sub.apply(t).is_dynamic());

        if !any_arg_dynamic {
            if matches.len() > 1 {
                self.error(id, format!("ambiguous overload for '{function}'"));
                return CelType::Error;
            }
            let (overload, _, result, trial) = matches.remove(0);
            self.sub = trial;
            self.references.insert(
                id,
                Reference {
                    name: function.to_owned(),
                    overload_ids: vec![overload.id.clone()],
                    value: None,
                },
            );
            return result;
        }

        // Dyn-driven dispatch: record every candidate and join the results;
        // the runtime picks by the actual argument kinds.
        let mut ids = Vec::with_capacity(matches.len());
        let mut joined: Option<CelType> = None;
        for (overload, _, result, trial) in &matches {
            ids.push(overload.id.clone());
            let applied = trial.apply_default_dyn(result);
            joined = Some(match joined {
                None => applied,
                Some(prev) => types::least_upper_bound(&prev, &applied),
            });
        }
        if matches.len() == 1 {
            let (_, _, _, trial) = matches.remove(0);
            self.sub = trial;
        }
        self.references.insert(
            id,
            Reference {
                name: function.to_owned(),
                overload_ids: ids,
                value: None,
            },
        );
        joined.unwrap_or(CelType::Dyn)
    }

    /// Rename an overload's declared type parameters to fresh checker
    /// parameters.
    fn instantiate(&mut self, overload: &OverloadDecl) -> (Vec<CelType>, CelType) {
        let mut names: Vec<String> = Vec::new();
        for ty in overload.params.iter().chain(std::iter::once(&overload.result)) {
            collect_params(ty, &mut names);
        }
        if names.is_empty() {
            return (overload.params.clone(), overload.result.clone());
        }
        let mut renaming = Substitution::new();
        for name in names {
            let fresh = self.fresh_param();
            renaming.bind(&name, fresh);
        }
        (
            overload.params.iter().map(|p| renaming.apply(p)).collect(),
            renaming.apply(&overload.result),
        )
    }

    fn check_list(&mut self, list: &ListExpr) -> CelType {
        if list.elements.is_empty() {
            return CelType::list(self.fresh_param());
        }
        let mut element: Option<CelType> = None;
        for (index, e) in list.elements.iter().enumerate() {
            let mut ty = self.check_expr(e);
            ty = self.sub.apply(&ty);
            if list.optional_indices.contains(&(index as u32)) {
                ty = self.unwrap_optional(e.id, ty);
            }
            element = Some(match element {
                None => ty,
                Some(prev) => types::least_upper_bound(&prev, &ty),
            });
        }
        CelType::list(element.unwrap_or(CelType::Dyn))
    }

    fn check_map(&mut self, map: &MapExpr) -> CelType {
        if map.entries.is_empty() {
            let key = self.fresh_param();
            let value = self.fresh_param();
            return CelType::map(key, value);
        }
        let mut key_type: Option<CelType> = None;
        let mut value_type: Option<CelType> = None;
        for entry in &map.entries {
            let k = self.check_expr(&entry.key);
            let k = self.sub.apply(&k);
            let mut v = self.check_expr(&entry.value);
            v = self.sub.apply(&v);
            if entry.optional {
                v = self.unwrap_optional(entry.value.id, v);
            }
            key_type = Some(match key_type {
                None => k,
                Some(prev) => types::least_upper_bound(&prev, &k),
            });
            value_type = Some(match value_type {
                None => v,
                Some(prev) => types::least_upper_bound(&prev, &v),
            });
        }
        CelType::map(
            key_type.unwrap_or(CelType::Dyn),
            value_type.unwrap_or(CelType::Dyn),
        )
    }

    /// An optional entry must carry an `optional_type`; yields the wrapped
    /// type for literal element typing.
    fn unwrap_optional(&mut self, id: ExprId, ty: CelType) -> CelType {
        match ty {
            CelType::Optional(inner) => *inner,
            CelType::Dyn | CelType::Error => ty,
            other => {
                self.error(
                    id,
                    format!("optional entry must be of optional type, found '{other}'"),
                );
                CelType::Error
            }
        }
    }

    fn check_struct(&mut self, id: ExprId, strct: &StructExpr) -> CelType {
        let mut resolved: Option<String> = None;
        for candidate in self
            .env
            .container()
            .resolve_candidate_names(&strct.message_name)
        {
            if self.env.pool().message(&candidate).is_some() {
                resolved = Some(candidate);
                break;
            }
        }
        let Some(message_name) = resolved else {
            self.error(
                id,
                format!("undeclared message type '{}'", strct.message_name),
            );
            // Entry values still get checked for secondary diagnostics.
            for entry in &strct.entries {
                self.check_expr(&entry.value);
            }
            return CelType::Error;
        };

        self.references
            .insert(id, Reference::to_ident(message_name.clone()));

        for entry in &strct.entries {
            let value_type = self.check_expr(&entry.value);
            let value_type = if entry.optional {
                self.unwrap_optional(entry.value.id, self.sub.apply(&value_type))
            } else {
                value_type
            };
            let Some(field_type) = self.env.pool().field_type(&message_name, &entry.field) else {
                self.error(
                    entry.value.id,
                    format!("undefined field '{}' on '{message_name}'", entry.field),
                );
                continue;
            };
            let mut trial = self.sub.clone();
            if types::is_assignable(&mut trial, field_type, &value_type) {
                self.sub = trial;
            } else {
                self.error(
                    entry.value.id,
                    format!(
                        "expected type of field '{}' is '{field_type}' but provided type is '{}'",
                        entry.field,
                        self.sub.apply_default_dyn(&value_type)
                    ),
                );
            }
        }

        CelType::Message(message_name)
    }

    fn check_comprehension(&mut self, comp: &ComprehensionExpr) -> CelType {
        let range_type = self.check_expr(&comp.iter_range);
        let iter_type = match self.sub.apply(&range_type) {
            CelType::List(elem) => *elem,
            CelType::Map(key, _) => *key,
            CelType::Dyn | CelType::Any | CelType::TypeParam(_) => CelType::Dyn,
            CelType::Error => CelType::Error,
            other => {
                self.error(
                    comp.iter_range.id,
                    format!("expression of type '{other}' cannot be the range of a comprehension"),
                );
                CelType::Error
            }
        };

        let accu_type = self.check_expr(&comp.accu_init);

        let scope_base = self.scopes.len();
        self.scopes.push((comp.accu_var.clone(), accu_type.clone()));
        self.scopes.push((comp.iter_var.clone(), iter_type));

        let condition_type = self.check_expr(&comp.loop_condition);
        {
            let mut trial = self.sub.clone();
            if !types::is_assignable(&mut trial, &CelType::Bool, &condition_type) {
                self.error(
                    comp.loop_condition.id,
                    format!("comprehension loop condition must be bool, found '{condition_type}'"),
                );
            } else {
                self.sub = trial;
            }
        }

        let step_type = self.check_expr(&comp.loop_step);
        {
            let mut trial = self.sub.clone();
            if !types::is_assignable(&mut trial, &accu_type, &step_type) {
                self.error(
                    comp.loop_step.id,
                    format!(
                        "loop step type '{}' is not assignable to accumulator type '{}'",
                        self.sub.apply_default_dyn(&step_type),
                        self.sub.apply_default_dyn(&accu_type)
                    ),
                );
            } else {
                self.sub = trial;
            }
        }

        let result_type = self.check_expr(&comp.result);
        self.scopes.truncate(scope_base);
        result_type
    }
}

fn collect_params(ty: &CelType, out: &mut Vec<String>) {
    match ty {
        CelType::TypeParam(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        CelType::List(e) | CelType::Optional(e) | CelType::Wrapper(e) => collect_params(e, out),
        CelType::Map(k, v) => {
            collect_params(k, out);
            collect_params(v, out);
        }
        CelType::Type(Some(t)) => collect_params(t, out),
        CelType::Opaque { params, .. } => {
            for p in params {
                collect_params(p, out);
            }
        }
        CelType::Function { result, args } => {
            collect_params(result, out);
            for a in args {
                collect_params(a, out);
            }
        }
        _ => {}
    }
}

/// Dotted spelling of a select chain over identifiers, if it is one.
fn flatten_qualified(select: &SelectExpr) -> Option<String> {
    let base = flatten_expr_name(&select.operand)?;
    Some(format!("{base}.{}", select.field))
}

fn flatten_expr_name(e: &Expr) -> Option<String> {
    match &e.kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::Select(s) if !s.test_only => flatten_qualified(s),
        _ => None,
    }
}

//! Parse-time macro expansion.
//!
//! Macros rewrite syntactic forms into core AST shapes before checking:
//! `has` becomes a presence-test select, the comprehension macros (`all`,
//! `exists`, `exists_one`, `filter`, `map`) become bounded folds, and
//! `cel.bind` becomes a single-iteration comprehension. Expansion preserves
//! span information; with `populate_macro_calls` the pre-expansion call is
//! recorded keyed by the expanded node id.

use celang_core::ast::{ComprehensionExpr, Constant, Expr, ExprKind};

use crate::parser::Parser;

/// Name of the hidden accumulator variable used by macro expansions. The
/// leading `@` keeps it out of reach of user programs.
pub const ACCUMULATOR_VAR: &str = "@result";

/// Internal condition helper: true unless its argument is strictly `false`.
pub const NOT_STRICTLY_FALSE: &str = "@not_strictly_false";

/// The standard macros recognised at parse time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StandardMacro {
    Has,
    All,
    Exists,
    ExistsOne,
    Filter,
    Map,
    CelBind,
}

impl StandardMacro {
    pub const ALL: [StandardMacro; 7] = [
        StandardMacro::Has,
        StandardMacro::All,
        StandardMacro::Exists,
        StandardMacro::ExistsOne,
        StandardMacro::Filter,
        StandardMacro::Map,
        StandardMacro::CelBind,
    ];

    fn bit(self) -> u8 {
        match self {
            StandardMacro::Has => 1 << 0,
            StandardMacro::All => 1 << 1,
            StandardMacro::Exists => 1 << 2,
            StandardMacro::ExistsOne => 1 << 3,
            StandardMacro::Filter => 1 << 4,
            StandardMacro::Map => 1 << 5,
            StandardMacro::CelBind => 1 << 6,
        }
    }
}

/// The subset of standard macros enabled for a parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroSet(u8);

impl MacroSet {
    pub fn none() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        let mut set = Self::none();
        for m in StandardMacro::ALL {
            set = set.with(m);
        }
        set
    }

    pub fn with(mut self, m: StandardMacro) -> Self {
        self.0 |= m.bit();
        self
    }

    pub fn contains(&self, m: StandardMacro) -> bool {
        self.0 & m.bit() != 0
    }

    /// Match a call shape against the enabled macros.
    pub fn recognizes(
        &self,
        target: Option<&Expr>,
        function: &str,
        arg_count: usize,
    ) -> Option<StandardMacro> {
        let m = match (target, function, arg_count) {
            (None, "has", 1) => StandardMacro::Has,
            (Some(_), "all", 2) => StandardMacro::All,
            (Some(_), "exists", 2) => StandardMacro::Exists,
            (Some(_), "exists_one", 2) => StandardMacro::ExistsOne,
            (Some(_), "filter", 2) => StandardMacro::Filter,
            (Some(_), "map", 2 | 3) => StandardMacro::Map,
            (Some(t), "bind", 3) if matches!(&t.kind, ExprKind::Ident(n) if n == "cel") => {
                StandardMacro::CelBind
            }
            _ => return None,
        };
        self.contains(m).then_some(m)
    }
}

impl FromIterator<StandardMacro> for MacroSet {
    fn from_iter<T: IntoIterator<Item = StandardMacro>>(iter: T) -> Self {
        iter.into_iter().fold(Self::none(), MacroSet::with)
    }
}

impl Parser<'_> {
    /// Expand a recognised macro call. `offset` is the call position; all
    /// synthesized nodes are recorded there.
    pub(crate) fn expand_macro(
        &mut self,
        m: StandardMacro,
        offset: u32,
        target: Option<Expr>,
        function: &str,
        args: Vec<Expr>,
    ) -> Expr {
        let original = self.populate_macro_calls.then(|| {
            let id = self.new_id(offset);
            match target.clone() {
                Some(t) => Expr::member_call(id, t, function, args.clone()),
                None => Expr::call(id, function, args.clone()),
            }
        });

        let expanded = match (m, target) {
            (StandardMacro::Has, _) => self.expand_has(offset, args),
            (StandardMacro::All, Some(t)) => {
                self.expand_quantifier(offset, t, args, Quantifier::All)
            }
            (StandardMacro::Exists, Some(t)) => {
                self.expand_quantifier(offset, t, args, Quantifier::Exists)
            }
            (StandardMacro::ExistsOne, Some(t)) => self.expand_exists_one(offset, t, args),
            (StandardMacro::Filter, Some(t)) => self.expand_filter(offset, t, args),
            (StandardMacro::Map, Some(t)) => self.expand_map(offset, t, args),
            (StandardMacro::CelBind, _) => self.expand_bind(offset, args),
            _ => Expr::not_set(self.new_id(offset)),
        };

        if let Some(call) = original
            && !matches!(expanded.kind, ExprKind::NotSet)
        {
            self.macro_calls.insert(expanded.id, call);
        }
        expanded
    }

    fn expand_has(&mut self, offset: u32, mut args: Vec<Expr>) -> Expr {
        let arg = args.remove(0);
        match arg.kind {
            ExprKind::Select(select) if !select.test_only => {
                let id = self.new_id(offset);
                Expr::select(id, select.operand, select.field, true)
            }
            _ => {
                self.error_at_offset(offset, "invalid argument to has() macro: field selection required");
                Expr::not_set(self.new_id(offset))
            }
        }
    }

    /// `e.all(x, p)` / `e.exists(x, p)`: fold over a boolean accumulator
    /// with a short-circuiting loop condition.
    fn expand_quantifier(
        &mut self,
        offset: u32,
        target: Expr,
        mut args: Vec<Expr>,
        quantifier: Quantifier,
    ) -> Expr {
        let Some(iter_var) = self.macro_iter_var(offset, &args[0]) else {
            return Expr::not_set(self.new_id(offset));
        };
        let predicate = args.remove(1);

        let (init, combine) = match quantifier {
            Quantifier::All => (true, "_&&_"),
            Quantifier::Exists => (false, "_||_"),
        };

        let accu_init = self.mk_const(offset, Constant::Bool(init));
        let condition = {
            let accu = self.mk_accu(offset);
            let probe = match quantifier {
                Quantifier::All => accu,
                // exists stops once the accumulator turned true.
                Quantifier::Exists => {
                    let id = self.new_id(offset);
                    Expr::call(id, "!_", vec![accu])
                }
            };
            let id = self.new_id(offset);
            Expr::call(id, NOT_STRICTLY_FALSE, vec![probe])
        };
        let step = {
            let accu = self.mk_accu(offset);
            let id = self.new_id(offset);
            Expr::call(id, combine, vec![accu, predicate])
        };
        let result = self.mk_accu(offset);

        self.mk_comprehension(offset, iter_var, target, accu_init, condition, step, result)
    }

    /// `e.exists_one(x, p)`: count matches, compare with one.
    fn expand_exists_one(&mut self, offset: u32, target: Expr, mut args: Vec<Expr>) -> Expr {
        let Some(iter_var) = self.macro_iter_var(offset, &args[0]) else {
            return Expr::not_set(self.new_id(offset));
        };
        let predicate = args.remove(1);

        let accu_init = self.mk_const(offset, Constant::Int(0));
        let condition = self.mk_const(offset, Constant::Bool(true));
        let step = {
            let accu = self.mk_accu(offset);
            let one = self.mk_const(offset, Constant::Int(1));
            let add_id = self.new_id(offset);
            let incremented = Expr::call(add_id, "_+_", vec![accu, one]);
            let unchanged = self.mk_accu(offset);
            let id = self.new_id(offset);
            Expr::call(id, "_?_:_", vec![predicate, incremented, unchanged])
        };
        let result = {
            let accu = self.mk_accu(offset);
            let one = self.mk_const(offset, Constant::Int(1));
            let id = self.new_id(offset);
            Expr::call(id, "_==_", vec![accu, one])
        };

        self.mk_comprehension(offset, iter_var, target, accu_init, condition, step, result)
    }

    /// `e.filter(x, p)`: keep elements satisfying the predicate.
    fn expand_filter(&mut self, offset: u32, target: Expr, mut args: Vec<Expr>) -> Expr {
        let Some(iter_var) = self.macro_iter_var(offset, &args[0]) else {
            return Expr::not_set(self.new_id(offset));
        };
        let predicate = args.remove(1);

        let element = {
            let id = self.new_id(offset);
            Expr::ident(id, iter_var.clone())
        };
        self.expand_collect(offset, target, iter_var, Some(predicate), element)
    }

    /// `e.map(x, t)` / `e.map(x, f, t)`: transform (and optionally filter).
    fn expand_map(&mut self, offset: u32, target: Expr, mut args: Vec<Expr>) -> Expr {
        let Some(iter_var) = self.macro_iter_var(offset, &args[0]) else {
            return Expr::not_set(self.new_id(offset));
        };
        let (filter, transform) = if args.len() == 3 {
            let transform = args.remove(2);
            (Some(args.remove(1)), transform)
        } else {
            (None, args.remove(1))
        };
        self.expand_collect(offset, target, iter_var, filter, transform)
    }

    /// Shared tail of `filter`/`map`: append `element` (conditionally) to a
    /// list accumulator.
    fn expand_collect(
        &mut self,
        offset: u32,
        target: Expr,
        iter_var: String,
        filter: Option<Expr>,
        element: Expr,
    ) -> Expr {
        let accu_init = {
            let id = self.new_id(offset);
            Expr::list(id, Vec::new())
        };
        let condition = self.mk_const(offset, Constant::Bool(true));
        let step = {
            let accu = self.mk_accu(offset);
            let single_id = self.new_id(offset);
            let single = Expr::list(single_id, vec![element]);
            let append_id = self.new_id(offset);
            let appended = Expr::call(append_id, "_+_", vec![accu, single]);
            match filter {
                Some(predicate) => {
                    let unchanged = self.mk_accu(offset);
                    let id = self.new_id(offset);
                    Expr::call(id, "_?_:_", vec![predicate, appended, unchanged])
                }
                None => appended,
            }
        };
        let result = self.mk_accu(offset);

        self.mk_comprehension(offset, iter_var, target, accu_init, condition, step, result)
    }

    /// `cel.bind(v, e1, e2)`: local binding via a zero-iteration fold.
    fn expand_bind(&mut self, offset: u32, mut args: Vec<Expr>) -> Expr {
        let Some(var) = self.macro_iter_var(offset, &args[0]) else {
            return Expr::not_set(self.new_id(offset));
        };
        let body = args.remove(2);
        let init = args.remove(1);

        let iter_range = {
            let id = self.new_id(offset);
            Expr::list(id, Vec::new())
        };
        let condition = self.mk_const(offset, Constant::Bool(false));
        let step = {
            let id = self.new_id(offset);
            Expr::ident(id, var.clone())
        };

        let id = self.new_id(offset);
        Expr::new(
            id,
            ExprKind::Comprehension(Box::new(ComprehensionExpr {
                iter_var: "#unused".into(),
                iter_range,
                accu_var: var,
                accu_init: init,
                loop_condition: condition,
                loop_step: step,
                result: body,
            })),
        )
    }

    /// Validate and extract the iteration variable of a macro call.
    fn macro_iter_var(&mut self, offset: u32, arg: &Expr) -> Option<String> {
        match &arg.kind {
            ExprKind::Ident(name) if !name.starts_with('@') && !name.contains('.') => {
                Some(name.clone())
            }
            _ => {
                self.error_at_offset(offset, "macro iteration variable must be a simple identifier");
                None
            }
        }
    }

    fn mk_const(&mut self, offset: u32, value: Constant) -> Expr {
        let id = self.new_id(offset);
        Expr::constant(id, value)
    }

    fn mk_accu(&mut self, offset: u32) -> Expr {
        let id = self.new_id(offset);
        Expr::ident(id, ACCUMULATOR_VAR)
    }

    fn mk_comprehension(
        &mut self,
        offset: u32,
        iter_var: String,
        iter_range: Expr,
        accu_init: Expr,
        loop_condition: Expr,
        loop_step: Expr,
        result: Expr,
    ) -> Expr {
        let id = self.new_id(offset);
        Expr::new(
            id,
            ExprKind::Comprehension(Box::new(ComprehensionExpr {
                iter_var,
                iter_range,
                accu_var: ACCUMULATOR_VAR.into(),
                accu_init,
                loop_condition,
                loop_step,
                result,
            })),
        )
    }
}

#[derive(Clone, Copy)]
enum Quantifier {
    All,
    Exists,
}

//! Grammar productions, precedence climbing from ternary down to primary.
//!
//! Operators parse to calls on their canonical names (`_&&_`, `_+_`,
//! `_[_]`, `@in`, ...). Message construction `pkg.Msg{...}` is recognised
//! by tracking whether the member chain so far spells a qualified name.

use celang_core::ast::{
    Constant, Expr, ExprKind, ListExpr, MapEntry, MapExpr, StructEntry, StructExpr,
};

use crate::escape;
use crate::lexer::Token;
use crate::parser::Parser;

/// Identifiers reserved by the language; `in` is an operator token already.
const RESERVED: &[&str] = &[
    "as", "break", "const", "continue", "else", "for", "function", "if", "import", "let", "loop",
    "package", "namespace", "return", "var", "void", "while",
];

impl<'s> Parser<'s> {
    pub(crate) fn parse_root(&mut self) -> Expr {
        let root = self.parse_expr();
        if self.current().is_some() {
            let span = self.current_span();
            self.diagnostics.error(span, "unexpected token after expression");
        }
        root
    }

    /// `expr := or ['?' or ':' expr]` (right-associative ternary).
    pub(crate) fn parse_expr(&mut self) -> Expr {
        if !self.enter_recursion() {
            return Expr::not_set(self.new_id(self.offset()));
        }

        let condition = self.parse_or();
        let expr = if self.at(&Token::Question) {
            let offset = self.offset();
            self.bump();
            let then_branch = self.parse_or();
            self.expect(&Token::Colon, "':' in conditional expression");
            let else_branch = self.parse_expr();
            let id = self.new_id(offset);
            Expr::call(id, "_?_:_", vec![condition, then_branch, else_branch])
        } else {
            condition
        };

        self.exit_recursion();
        expr
    }

    fn parse_or(&mut self) -> Expr {
        let mut left = self.parse_and();
        while self.at(&Token::OrOr) {
            let offset = self.offset();
            self.bump();
            let right = self.parse_and();
            let id = self.new_id(offset);
            left = Expr::call(id, "_||_", vec![left, right]);
        }
        left
    }

    fn parse_and(&mut self) -> Expr {
        let mut left = self.parse_relation();
        while self.at(&Token::AndAnd) {
            let offset = self.offset();
            self.bump();
            let right = self.parse_relation();
            let id = self.new_id(offset);
            left = Expr::call(id, "_&&_", vec![left, right]);
        }
        left
    }

    fn parse_relation(&mut self) -> Expr {
        let mut left = self.parse_additive();
        loop {
            let function = match self.current() {
                Some(Token::Less) => "_<_",
                Some(Token::LessEq) => "_<=_",
                Some(Token::Greater) => "_>_",
                Some(Token::GreaterEq) => "_>=_",
                Some(Token::EqEq) => "_==_",
                Some(Token::NotEq) => "_!=_",
                Some(Token::In) => "@in",
                _ => return left,
            };
            let offset = self.offset();
            self.bump();
            let right = self.parse_additive();
            let id = self.new_id(offset);
            left = Expr::call(id, function, vec![left, right]);
        }
    }

    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let function = match self.current() {
                Some(Token::Plus) => "_+_",
                Some(Token::Minus) => "_-_",
                _ => return left,
            };
            let offset = self.offset();
            self.bump();
            let right = self.parse_multiplicative();
            let id = self.new_id(offset);
            left = Expr::call(id, function, vec![left, right]);
        }
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_unary();
        loop {
            let function = match self.current() {
                Some(Token::Star) => "_*_",
                Some(Token::Slash) => "_/_",
                Some(Token::Percent) => "_%_",
                _ => return left,
            };
            let offset = self.offset();
            self.bump();
            let right = self.parse_unary();
            let id = self.new_id(offset);
            left = Expr::call(id, function, vec![left, right]);
        }
    }

    fn parse_unary(&mut self) -> Expr {
        if !self.enter_recursion() {
            return Expr::not_set(self.new_id(self.offset()));
        }

        let expr = if self.at(&Token::Bang) {
            let offset = self.offset();
            self.bump();
            let operand = self.parse_unary();
            let id = self.new_id(offset);
            Expr::call(id, "!_", vec![operand])
        } else if self.at(&Token::Minus) {
            let offset = self.offset();
            self.bump();
            // A minus directly on a numeric literal is part of the
            // literal, so i64::MIN is representable.
            match self.current().cloned() {
                Some(Token::IntLit(text)) => {
                    let value = self.parse_int(offset, &format!("-{text}"), 10);
                    self.bump();
                    let id = self.new_id(offset);
                    Expr::constant(id, Constant::Int(value))
                }
                Some(Token::HexIntLit(text)) => {
                    let value = self.parse_int(offset, &format!("-{}", &text[2..]), 16);
                    self.bump();
                    let id = self.new_id(offset);
                    Expr::constant(id, Constant::Int(value))
                }
                Some(Token::FloatLit(text)) => {
                    let value = self.parse_double(offset, &format!("-{text}"));
                    self.bump();
                    let id = self.new_id(offset);
                    Expr::constant(id, Constant::Double(value))
                }
                _ => {
                    let operand = self.parse_unary();
                    let id = self.new_id(offset);
                    Expr::call(id, "-_", vec![operand])
                }
            }
        } else {
            self.parse_member()
        };

        self.exit_recursion();
        expr
    }

    /// Postfix chains: field selects, method calls, indexing, and message
    /// construction on a qualified-name prefix.
    fn parse_member(&mut self) -> Expr {
        let (mut expr, mut qualified) = self.parse_primary();

        loop {
            if self.eat(&Token::Dot) {
                let offset = self.offset();
                let Some(Token::Ident(name)) = self.current().cloned() else {
                    let span = self.current_span();
                    self.diagnostics
                        .error(span, "expected field or method name after '.'");
                    return expr;
                };
                let name = name.to_owned();
                self.bump();

                if self.eat(&Token::LParen) {
                    let args = self.parse_expr_list(&Token::RParen);
                    self.expect(&Token::RParen, "')' closing argument list");
                    expr = self.finish_call(offset, Some(expr), name, args);
                    qualified = None;
                } else {
                    let id = self.new_id(offset);
                    expr = Expr::select(id, expr, &name, false);
                    qualified = qualified.map(|q| format!("{q}.{name}"));
                }
            } else if self.at(&Token::LBracket) {
                let offset = self.offset();
                self.bump();
                // `e[?i]` is the optional-safe index: absent entries yield
                // `optional.none()` instead of an error.
                let function = if self.eat(&Token::Question) {
                    "_[?_]"
                } else {
                    "_[_]"
                };
                let index = self.parse_expr();
                self.expect(&Token::RBracket, "']' closing index expression");
                let id = self.new_id(offset);
                expr = Expr::call(id, function, vec![expr, index]);
                qualified = None;
            } else if qualified.is_some() && self.at(&Token::LBrace) {
                let offset = self.offset();
                self.bump();
                let message_name = qualified.take().unwrap_or_default();
                let entries = self.parse_struct_entries();
                self.expect(&Token::RBrace, "'}' closing message construction");
                let id = self.new_id(offset);
                expr = Expr::new(
                    id,
                    ExprKind::Struct(StructExpr {
                        message_name,
                        entries,
                    }),
                );
            } else {
                return expr;
            }
        }
    }

    /// Primary expressions. The second element of the return is the dotted
    /// name spelled so far, when this primary can begin a qualified name.
    fn parse_primary(&mut self) -> (Expr, Option<String>) {
        let offset = self.offset();
        match self.current().cloned() {
            Some(Token::LParen) => {
                self.bump();
                let expr = self.parse_expr();
                self.expect(&Token::RParen, "')'");
                (expr, None)
            }
            Some(Token::LBracket) => {
                self.bump();
                let expr = self.parse_list_literal(offset);
                (expr, None)
            }
            Some(Token::LBrace) => {
                self.bump();
                let expr = self.parse_map_literal(offset);
                (expr, None)
            }
            Some(Token::Dot) => {
                self.bump();
                let Some(Token::Ident(name)) = self.current().cloned() else {
                    let span = self.current_span();
                    self.diagnostics.error(span, "expected identifier after '.'");
                    return (Expr::not_set(self.new_id(offset)), None);
                };
                let absolute = format!(".{name}");
                self.bump();
                if self.at(&Token::LParen) {
                    self.bump();
                    let args = self.parse_expr_list(&Token::RParen);
                    self.expect(&Token::RParen, "')' closing argument list");
                    (self.finish_call(offset, None, absolute, args), None)
                } else {
                    let id = self.new_id(offset);
                    (Expr::ident(id, &absolute), Some(absolute))
                }
            }
            Some(Token::Ident(name)) => {
                let name = name.to_owned();
                if RESERVED.contains(&name.as_str()) {
                    let span = self.current_span();
                    self.diagnostics
                        .error(span, format!("reserved identifier '{name}'"));
                    self.bump();
                    return (Expr::not_set(self.new_id(offset)), None);
                }
                self.bump();
                if self.at(&Token::LParen) {
                    self.bump();
                    let args = self.parse_expr_list(&Token::RParen);
                    self.expect(&Token::RParen, "')' closing argument list");
                    (self.finish_call(offset, None, name, args), None)
                } else {
                    let id = self.new_id(offset);
                    (Expr::ident(id, &name), Some(name))
                }
            }
            Some(Token::True) => {
                self.bump();
                (self.mk_constant(offset, Constant::Bool(true)), None)
            }
            Some(Token::False) => {
                self.bump();
                (self.mk_constant(offset, Constant::Bool(false)), None)
            }
            Some(Token::Null) => {
                self.bump();
                (self.mk_constant(offset, Constant::Null), None)
            }
            Some(Token::IntLit(text)) => {
                let value = self.parse_int(offset, text, 10);
                self.bump();
                (self.mk_constant(offset, Constant::Int(value)), None)
            }
            Some(Token::HexIntLit(text)) => {
                let value = self.parse_int(offset, &text[2..], 16);
                self.bump();
                (self.mk_constant(offset, Constant::Int(value)), None)
            }
            Some(Token::UintLit(text)) => {
                let digits = &text[..text.len() - 1];
                let value = self.parse_uint(offset, digits, 10);
                self.bump();
                (self.mk_constant(offset, Constant::Uint(value)), None)
            }
            Some(Token::HexUintLit(text)) => {
                let digits = &text[2..text.len() - 1];
                let value = self.parse_uint(offset, digits, 16);
                self.bump();
                (self.mk_constant(offset, Constant::Uint(value)), None)
            }
            Some(Token::FloatLit(text)) => {
                let value = self.parse_double(offset, text);
                self.bump();
                (self.mk_constant(offset, Constant::Double(value)), None)
            }
            Some(Token::StringLit(raw)) => {
                let constant = match escape::parse_string_literal(raw) {
                    Ok(constant) => constant,
                    Err(e) => {
                        self.error_at_offset(offset, e.message);
                        Constant::String(String::new())
                    }
                };
                self.bump();
                (self.mk_constant(offset, constant), None)
            }
            Some(_) => {
                let span = self.current_span();
                self.diagnostics.error(span, "unexpected token");
                self.bump();
                (Expr::not_set(self.new_id(offset)), None)
            }
            None => {
                let span = self.current_span();
                self.diagnostics.error(span, "unexpected end of expression");
                (Expr::not_set(self.new_id(offset)), None)
            }
        }
    }

    /// Comma-separated expressions up to (not consuming) `terminator`.
    fn parse_expr_list(&mut self, terminator: &Token<'_>) -> Vec<Expr> {
        let mut out = Vec::new();
        while self.current().is_some() && !self.at(terminator) {
            out.push(self.parse_expr());
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        out
    }

    /// `'[' ['?']expr {',' ['?']expr} [','] ']'` — the bracket is consumed.
    fn parse_list_literal(&mut self, offset: u32) -> Expr {
        let mut elements = Vec::new();
        let mut optional_indices = Vec::new();
        while self.current().is_some() && !self.at(&Token::RBracket) {
            if self.eat(&Token::Question) {
                optional_indices.push(elements.len() as u32);
            }
            elements.push(self.parse_expr());
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBracket, "']' closing list literal");
        let id = self.new_id(offset);
        Expr::new(
            id,
            ExprKind::List(ListExpr {
                elements,
                optional_indices,
            }),
        )
    }

    fn parse_map_literal(&mut self, offset: u32) -> Expr {
        let mut entries = Vec::new();
        while self.current().is_some() && !self.at(&Token::RBrace) {
            let entry_offset = self.offset();
            let optional = self.eat(&Token::Question);
            let key = self.parse_expr();
            self.expect(&Token::Colon, "':' separating map key and value");
            let value = self.parse_expr();
            entries.push(MapEntry {
                id: self.new_id(entry_offset),
                key,
                value,
                optional,
            });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace, "'}' closing map literal");
        let id = self.new_id(offset);
        Expr::new(id, ExprKind::Map(MapExpr { entries }))
    }

    /// Entries of a message construction; the opening brace is consumed.
    fn parse_struct_entries(&mut self) -> Vec<StructEntry> {
        let mut entries = Vec::new();
        while self.current().is_some() && !self.at(&Token::RBrace) {
            let entry_offset = self.offset();
            let optional = self.eat(&Token::Question);
            let Some(Token::Ident(field)) = self.current().cloned() else {
                let span = self.current_span();
                self.diagnostics.error(span, "expected field name");
                break;
            };
            let field = field.to_owned();
            self.bump();
            self.expect(&Token::Colon, "':' separating field name and value");
            let value = self.parse_expr();
            entries.push(StructEntry {
                id: self.new_id(entry_offset),
                field,
                value,
                optional,
            });
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        entries
    }

    fn finish_call(
        &mut self,
        offset: u32,
        target: Option<Expr>,
        function: String,
        args: Vec<Expr>,
    ) -> Expr {
        if let Some(m) = self.macros.recognizes(target.as_ref(), &function, args.len()) {
            return self.expand_macro(m, offset, target, &function, args);
        }
        let id = self.new_id(offset);
        match target {
            Some(t) => Expr::member_call(id, t, function, args),
            None => Expr::call(id, function, args),
        }
    }

    fn mk_constant(&mut self, offset: u32, value: Constant) -> Expr {
        let id = self.new_id(offset);
        Expr::constant(id, value)
    }

    fn parse_int(&mut self, offset: u32, text: &str, radix: u32) -> i64 {
        match i64::from_str_radix(text, radix) {
            Ok(v) => v,
            Err(_) => {
                self.error_at_offset(offset, format!("invalid int literal '{text}'"));
                0
            }
        }
    }

    fn parse_uint(&mut self, offset: u32, text: &str, radix: u32) -> u64 {
        match u64::from_str_radix(text, radix) {
            Ok(v) => v,
            Err(_) => {
                self.error_at_offset(offset, format!("invalid uint literal '{text}'"));
                0
            }
        }
    }

    fn parse_double(&mut self, offset: u32, text: &str) -> f64 {
        match text.parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                self.error_at_offset(offset, format!("invalid double literal '{text}'"));
                0.0
            }
        }
    }
}

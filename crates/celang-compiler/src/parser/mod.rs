//! Recursive-descent parser producing the core AST.
//!
//! The parser owns id assignment (monotonic from 1), the per-id position
//! table, and parse-time macro expansion. Nesting depth is bounded by a
//! configurable recursion cap; exceeding it is reported as a diagnostic,
//! not a panic.

mod grammar;


use indexmap::IndexMap;

use celang_core::ast::{Expr, ExprId, ParsedAst};
use celang_core::source::{Source, SourceInfo, Span};

use crate::diagnostics::Diagnostics;
use crate::lexer::{self, Lexed, Token};
use crate::macros::MacroSet;

/// Default nesting cap for the parser.
pub const DEFAULT_RECURSION_DEPTH: u32 = 500;

/// Knobs honored by [`parse`].
#[derive(Clone, Debug)]
pub struct ParserOptions {
    pub max_recursion_depth: u32,
    pub macros: MacroSet,
    /// Record pre-expansion macro calls into the source info.
    pub populate_macro_calls: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_RECURSION_DEPTH,
            macros: MacroSet::all(),
            populate_macro_calls: false,
        }
    }
}

/// Parse one expression. Returns the AST only when no error was diagnosed.
pub fn parse(source: &Source, options: &ParserOptions) -> (Option<ParsedAst>, Diagnostics) {
    let (tokens, lex_errors) = lexer::tokenize(source.content());

    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        next_id: 1,
        positions: IndexMap::new(),
        macro_calls: IndexMap::new(),
        diagnostics: Diagnostics::new(),
        depth: 0,
        max_depth: options.max_recursion_depth,
        macros: options.macros.clone(),
        populate_macro_calls: options.populate_macro_calls,
    };

    for lex_error in lex_errors {
        let span = parser.span_of_bytes(&lex_error.span);
        parser.diagnostics.error(span, lex_error.message);
    }

    let root = parser.parse_root();

    let mut source_info = SourceInfo::new(source);
    source_info.positions = parser.positions;
    source_info.macro_calls = parser.macro_calls;

    let diagnostics = parser.diagnostics;
    if diagnostics.has_errors() {
        (None, diagnostics)
    } else {
        (Some(ParsedAst { root, source_info }), diagnostics)
    }
}

pub(crate) struct Parser<'s> {
    source: &'s Source,
    tokens: Vec<Lexed<'s>>,
    pos: usize,
    next_id: u64,
    positions: IndexMap<ExprId, u32>,
    pub(crate) macro_calls: IndexMap<ExprId, Expr>,
    pub(crate) diagnostics: Diagnostics,
    depth: u32,
    max_depth: u32,
    pub(crate) macros: MacroSet,
    pub(crate) populate_macro_calls: bool,
}

impl<'s> Parser<'s> {
    /// Allocate a fresh expression id positioned at `offset`.
    pub(crate) fn new_id(&mut self, offset: u32) -> ExprId {
        let id = ExprId::from_raw(self.next_id);
        self.next_id += 1;
        self.positions.insert(id, offset);
        id
    }

    pub(crate) fn current(&self) -> Option<&Token<'s>> {
        self.tokens.get(self.pos).map(|l| &l.token)
    }

    pub(crate) fn peek(&self, ahead: usize) -> Option<&Token<'s>> {
        self.tokens.get(self.pos + ahead).map(|l| &l.token)
    }

    pub(crate) fn at(&self, token: &Token<'_>) -> bool {
        self.current() == Some(token)
    }

    pub(crate) fn bump(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Consume the current token if it matches.
    pub(crate) fn eat(&mut self, token: &Token<'_>) -> bool {
        if self.at(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Consume a required token or diagnose its absence.
    pub(crate) fn expect(&mut self, token: &Token<'_>, description: &str) -> bool {
        if self.eat(token) {
            return true;
        }
        let span = self.current_span();
        self.diagnostics
            .error(span, format!("expected {description}"));
        false
    }

    /// Code-point offset of the current token (end of input at EOF).
    pub(crate) fn offset(&self) -> u32 {
        match self.tokens.get(self.pos) {
            Some(lexed) => self.source.offset_of_byte(lexed.span.start),
            None => self.source.len(),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some(lexed) => self.span_of_bytes(&lexed.span),
            None => Span::at(self.source.len()),
        }
    }

    fn span_of_bytes(&self, bytes: &std::ops::Range<usize>) -> Span {
        Span::new(
            self.source.offset_of_byte(bytes.start),
            self.source.offset_of_byte(bytes.end),
        )
    }

    pub(crate) fn error_at_offset(&mut self, offset: u32, message: impl Into<String>) {
        self.diagnostics.error(Span::at(offset), message);
    }

    /// Guard for nested productions. On overflow reports once and returns
    /// false; the caller produces a `NotSet` placeholder.
    pub(crate) fn enter_recursion(&mut self) -> bool {
        if self.depth >= self.max_depth {
            let span = self.current_span();
            self.diagnostics
                .error(span, "expression recursion limit exceeded");
            return false;
        }
        self.depth += 1;
        true
    }

    pub(crate) fn exit_recursion(&mut self) {
        self.depth -= 1;
    }
}

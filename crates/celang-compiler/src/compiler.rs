//! The `Compiler` facade: parse, check, compile.

#[cfg(test)]
mod compiler_tests;

use celang_core::ast::{CheckedAst, ParsedAst};
use celang_core::container::Container;
use celang_core::descriptors::{DescriptorPool, EnumDescriptor, MessageDescriptor};
use celang_core::source::Source;
use celang_core::types::CelType;

use crate::checker::{self, CheckerEnv};
use crate::decls::{FunctionDecl, VariableDecl};
use crate::diagnostics::{Diagnostics, DiagnosticsPrinter};
use crate::macros::{MacroSet, StandardMacro};
use crate::parser::{self, ParserOptions};
use crate::standard;
use crate::{Error, Result};

/// Outcome of a parse/check/compile run: diagnostics plus the AST when no
/// error was diagnosed.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    source: Source,
    diagnostics: Diagnostics,
    parsed: Option<ParsedAst>,
    checked: Option<CheckedAst>,
}

impl ValidationResult {
    pub fn has_error(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Error diagnostics in the caret format.
    pub fn error_string(&self) -> String {
        self.diagnostics.error_string(&self.source)
    }

    /// All diagnostics (errors and warnings) in the caret format.
    pub fn issue_string(&self) -> String {
        self.diagnostics.issue_string(&self.source)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn printer(&self) -> DiagnosticsPrinter<'_, '_> {
        self.diagnostics.printer(&self.source)
    }

    /// The parsed AST; fails when any error diagnostic is present.
    pub fn parsed_ast(&self) -> Result<&ParsedAst> {
        match &self.parsed {
            Some(ast) if !self.has_error() => Ok(ast),
            _ => Err(Error::ValidationError(self.diagnostics.clone())),
        }
    }

    /// The checked AST; fails when any error diagnostic is present or the
    /// result came from a parse-only run.
    pub fn checked_ast(&self) -> Result<&CheckedAst> {
        match &self.checked {
            Some(ast) if !self.has_error() => Ok(ast),
            _ => Err(Error::ValidationError(self.diagnostics.clone())),
        }
    }

    pub fn into_checked_ast(self) -> Result<CheckedAst> {
        match self.checked {
            Some(ast) if !self.diagnostics.has_errors() => Ok(ast),
            _ => Err(Error::ValidationError(self.diagnostics)),
        }
    }
}

/// Immutable compilation environment. Safe to share across threads; one
/// compiler can compile any number of expressions concurrently.
#[derive(Clone, Debug)]
pub struct Compiler {
    env: CheckerEnv,
    parser_options: ParserOptions,
    comprehension_max_iterations: i64,
    heterogeneous_numeric_comparisons: bool,
}

impl Compiler {
    /// A compiler over the standard environment with default options.
    pub fn standard() -> Self {
        Self {
            env: CheckerEnv::standard(),
            parser_options: ParserOptions::default(),
            comprehension_max_iterations: 1000,
            heterogeneous_numeric_comparisons: false,
        }
    }

    pub fn builder() -> CompilerBuilder {
        CompilerBuilder::default()
    }

    pub fn container(&self) -> &Container {
        self.env.container()
    }

    pub fn pool(&self) -> &DescriptorPool {
        self.env.pool()
    }

    /// Iteration budget to seed runtimes with (`-1` disables).
    pub fn comprehension_max_iterations(&self) -> i64 {
        self.comprehension_max_iterations
    }

    pub fn heterogeneous_numeric_comparisons(&self) -> bool {
        self.heterogeneous_numeric_comparisons
    }

    /// Parse only.
    pub fn parse(&self, text: &str) -> ValidationResult {
        let source = Source::new(text);
        self.parse_source(source)
    }

    pub fn parse_source(&self, source: Source) -> ValidationResult {
        let (parsed, diagnostics) = parser::parse(&source, &self.parser_options);
        ValidationResult {
            source,
            diagnostics,
            parsed,
            checked: None,
        }
    }

    /// Type-check a previously parsed AST.
    pub fn check(&self, parsed: &ParsedAst, source: &Source) -> ValidationResult {
        let (checked, diagnostics) = checker::check(parsed, &self.env);
        ValidationResult {
            source: source.clone(),
            diagnostics,
            parsed: Some(parsed.clone()),
            checked,
        }
    }

    /// Parse and check.
    pub fn compile(&self, text: &str) -> ValidationResult {
        let mut result = self.parse(text);
        let Some(parsed) = result.parsed.take() else {
            return result;
        };
        let (checked, check_diagnostics) = checker::check(&parsed, &self.env);
        result.diagnostics.extend(check_diagnostics);
        result.parsed = Some(parsed);
        result.checked = checked;
        result
    }
}

/// Builder collecting environment and option state for a [`Compiler`].
#[derive(Debug)]
pub struct CompilerBuilder {
    macros: MacroSet,
    container_name: String,
    aliases: Vec<(String, String)>,
    abbreviations: Vec<String>,
    variables: Vec<VariableDecl>,
    functions: Vec<FunctionDecl>,
    messages: Vec<MessageDescriptor>,
    enums: Vec<EnumDescriptor>,
    populate_macro_calls: bool,
    heterogeneous_numeric_comparisons: bool,
    unsigned_longs: bool,
    timestamp_epoch: bool,
    comprehension_max_iterations: i64,
    max_parse_recursion_depth: u32,
}

impl Default for CompilerBuilder {
    fn default() -> Self {
        Self {
            macros: MacroSet::all(),
            container_name: String::new(),
            aliases: Vec::new(),
            abbreviations: Vec::new(),
            variables: Vec::new(),
            functions: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            populate_macro_calls: false,
            heterogeneous_numeric_comparisons: false,
            unsigned_longs: true,
            timestamp_epoch: true,
            comprehension_max_iterations: 1000,
            max_parse_recursion_depth: parser::DEFAULT_RECURSION_DEPTH,
        }
    }
}

impl CompilerBuilder {
    /// Replace the enabled macro set.
    pub fn standard_macros(mut self, macros: impl IntoIterator<Item = StandardMacro>) -> Self {
        self.macros = macros.into_iter().collect();
        self
    }

    pub fn container(mut self, name: impl Into<String>) -> Self {
        self.container_name = name.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), target.into()));
        self
    }

    pub fn abbreviation(mut self, qualified: impl Into<String>) -> Self {
        self.abbreviations.push(qualified.into());
        self
    }

    pub fn add_var(mut self, name: impl Into<String>, ty: CelType) -> Self {
        self.variables.push(VariableDecl::new(name, ty));
        self
    }

    pub fn add_function(mut self, decl: FunctionDecl) -> Self {
        self.functions.push(decl);
        self
    }

    pub fn add_message_type(mut self, descriptor: MessageDescriptor) -> Self {
        self.messages.push(descriptor);
        self
    }

    pub fn add_enum_type(mut self, descriptor: EnumDescriptor) -> Self {
        self.enums.push(descriptor);
        self
    }

    pub fn populate_macro_calls(mut self, value: bool) -> Self {
        self.populate_macro_calls = value;
        self
    }

    pub fn enable_heterogeneous_numeric_comparisons(mut self, value: bool) -> Self {
        self.heterogeneous_numeric_comparisons = value;
        self
    }

    pub fn enable_unsigned_longs(mut self, value: bool) -> Self {
        self.unsigned_longs = value;
        self
    }

    pub fn enable_timestamp_epoch(mut self, value: bool) -> Self {
        self.timestamp_epoch = value;
        self
    }

    /// Aggregate comprehension iteration budget; `-1` disables the limit.
    pub fn comprehension_max_iterations(mut self, limit: i64) -> Self {
        self.comprehension_max_iterations = limit;
        self
    }

    pub fn max_parse_recursion_depth(mut self, depth: u32) -> Self {
        self.max_parse_recursion_depth = depth;
        self
    }

    pub fn build(self) -> Result<Compiler> {
        let mut container_builder = Container::builder(self.container_name);
        for (alias, target) in self.aliases {
            container_builder = container_builder.alias(alias, target);
        }
        for abbreviation in self.abbreviations {
            container_builder = container_builder.abbreviation(abbreviation);
        }
        let container = container_builder.build()?;

        let mut env = CheckerEnv::standard();
        env.set_container(container);
        env.unsigned_longs = self.unsigned_longs;

        for message in self.messages {
            env.pool_mut().register_message(message);
        }
        for descriptor in self.enums {
            env.pool_mut().register_enum(descriptor);
        }
        for variable in self.variables {
            env.add_variable(variable);
        }
        for function in self.functions {
            env.add_function(function);
        }
        if self.heterogeneous_numeric_comparisons {
            for decl in standard::heterogeneous_comparison_decls() {
                env.add_function(decl);
            }
        }
        if !self.timestamp_epoch {
            env.remove_overload("timestamp", "int64_to_timestamp");
        }

        Ok(Compiler {
            env,
            parser_options: ParserOptions {
                max_recursion_depth: self.max_parse_recursion_depth,
                macros: self.macros,
                populate_macro_calls: self.populate_macro_calls,
            },
            comprehension_max_iterations: self.comprehension_max_iterations,
            heterogeneous_numeric_comparisons: self.heterogeneous_numeric_comparisons,
        })
    }
}

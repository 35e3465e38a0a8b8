//! Compiler diagnostics: collection and rendering.
//!
//! Two renderers over the same collection: the fixed caret format used by
//! `ValidationResult` (`ERROR: <src>:<line>:<col>: <msg>` with a source line
//! and caret), and a rich [`DiagnosticsPrinter`] built on annotate-snippets
//! for terminal output.

use std::fmt::Write as _;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};

use celang_core::source::{Source, Span};

/// Severity of a diagnostic. Errors make a validation result error-bearing;
/// warnings do not.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message with its source span.
#[derive(Clone, PartialEq, Debug)]
pub struct Diagnostic {
    pub span: Span,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// Collection of diagnostics from parsing and checking.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.0.push(Diagnostic {
            span,
            severity: Severity::Error,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.0.push(Diagnostic {
            span,
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.0.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.0.iter().filter(|d| d.is_warning()).count()
    }

    /// Render error diagnostics in the fixed caret format.
    pub fn error_string(&self, source: &Source) -> String {
        self.render_caret(source, true)
    }

    /// Render all diagnostics (errors and warnings) in the caret format.
    pub fn issue_string(&self, source: &Source) -> String {
        self.render_caret(source, false)
    }

    fn render_caret(&self, source: &Source, errors_only: bool) -> String {
        let mut out = String::new();
        for diag in &self.0 {
            if errors_only && !diag.is_error() {
                continue;
            }
            let label = match diag.severity {
                Severity::Error => "ERROR",
                Severity::Warning => "WARNING",
            };
            let (line, col) = source.location(diag.span.start).unwrap_or((1, 0));
            let _ = writeln!(
                out,
                "{label}: {}:{line}:{col}: {}",
                source.description(),
                diag.message
            );
            if let Some(text) = source.snippet(line) {
                let _ = writeln!(out, " | {text}");
                let mut caret = String::from(" | ");
                caret.extend(std::iter::repeat_n(' ', col as usize));
                caret.push('^');
                let _ = writeln!(out, "{caret}");
            }
        }
        out
    }

    pub fn printer<'d, 's>(&'d self, source: &'s Source) -> DiagnosticsPrinter<'d, 's> {
        DiagnosticsPrinter::new(self, source)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Builder-pattern printer for rendering diagnostics with annotate-snippets.
pub struct DiagnosticsPrinter<'d, 's> {
    diagnostics: &'d Diagnostics,
    source: &'s Source,
    colored: bool,
}

impl<'d, 's> DiagnosticsPrinter<'d, 's> {
    pub fn new(diagnostics: &'d Diagnostics, source: &'s Source) -> Self {
        Self {
            diagnostics,
            source,
            colored: false,
        }
    }

    pub fn colored(mut self, value: bool) -> Self {
        self.colored = value;
        self
    }

    pub fn render(&self) -> String {
        if self.diagnostics.is_empty() {
            return String::new();
        }

        let renderer = if self.colored {
            Renderer::styled()
        } else {
            Renderer::plain()
        };

        let text = self.source.content();
        let mut out = String::new();
        for (i, diag) in self.diagnostics.iter().enumerate() {
            let range = self.byte_range(diag.span, text.len());
            let snippet = Snippet::source(text)
                .path(self.source.description())
                .line_start(1)
                .annotation(AnnotationKind::Primary.span(range).label(&diag.message));

            let level = match diag.severity {
                Severity::Error => Level::ERROR,
                Severity::Warning => Level::WARNING,
            };
            let report: Vec<Group> = vec![level.primary_title(&diag.message).element(snippet)];

            if i > 0 {
                out.push('\n');
            }
            out.push_str(&renderer.render(&report).to_string());
        }
        out
    }

    fn byte_range(&self, span: Span, limit: usize) -> std::ops::Range<usize> {
        let start = self.source.byte_offset(span.start);
        let end = self.source.byte_offset(span.end);
        if start == end {
            return start..(start + 1).min(limit);
        }
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_string_format() {
        let source = Source::with_description("a ++ b", "expr.cel");
        let mut diags = Diagnostics::new();
        diags.error(Span::new(3, 4), "unexpected token '+'");

        let rendered = diags.error_string(&source);
        assert_eq!(
            rendered,
            "ERROR: expr.cel:1:3: unexpected token '+'\n | a ++ b\n |    ^\n"
        );
    }

    #[test]
    fn issue_string_includes_warnings() {
        let source = Source::new("x");
        let mut diags = Diagnostics::new();
        diags.warning(Span::at(0), "deprecated identifier");

        assert_eq!(diags.error_string(&source), "");
        let issues = diags.issue_string(&source);
        assert!(issues.starts_with("WARNING: <input>:1:0: deprecated identifier"));
    }

    #[test]
    fn counts_by_severity() {
        let mut diags = Diagnostics::new();
        diags.error(Span::at(0), "boom");
        diags.warning(Span::at(1), "meh");
        diags.error(Span::at(2), "boom again");

        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 2);
        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.len(), 3);
    }

    #[test]
    fn printer_renders_span() {
        let source = Source::new("1 + true");
        let mut diags = Diagnostics::new();
        diags.error(Span::new(4, 8), "no matching overload");

        let rendered = diags.printer(&source).render();
        assert!(rendered.contains("no matching overload"));
        assert!(rendered.contains("1 + true"));
    }
}

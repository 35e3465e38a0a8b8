//! Immutable source text with code-point indexed position mapping.
//!
//! Offsets everywhere in this crate count Unicode code points, not bytes.
//! `Source` keeps a byte-offset side table so renderers that need byte
//! ranges (e.g. snippet printers) can convert without rescanning.

use indexmap::IndexMap;

use crate::ast::{Expr, ExprId};

/// Half-open span of code-point offsets into a [`Source`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Zero-width span at a single offset.
    pub fn at(offset: u32) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }
}

/// Immutable expression source text.
///
/// Stores the original text plus two indexes computed once at construction:
/// the code-point offset of every line start, and the byte offset of every
/// code point. Line numbers are 1-based, columns 0-based.
#[derive(Clone, Debug)]
pub struct Source {
    description: String,
    text: String,
    /// Code-point offset where each line starts; `line_offsets[0] == 0`.
    line_offsets: Vec<u32>,
    /// Byte offset of each code point, plus a trailing `text.len()` sentinel.
    byte_offsets: Vec<u32>,
}

impl Source {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_description(text, "<input>")
    }

    pub fn with_description(text: impl Into<String>, description: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_offsets = vec![0u32];
        let mut byte_offsets = Vec::with_capacity(text.len());
        for (cp, (byte, ch)) in text.char_indices().enumerate() {
            byte_offsets.push(byte as u32);
            if ch == '\n' {
                line_offsets.push(cp as u32 + 1);
            }
        }
        byte_offsets.push(text.len() as u32);
        Self {
            description: description.into(),
            text,
            line_offsets,
            byte_offsets,
        }
    }

    /// Name of the source shown in diagnostics (file name or `<input>`).
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn content(&self) -> &str {
        &self.text
    }

    /// Total length in code points.
    pub fn len(&self) -> u32 {
        self.byte_offsets.len() as u32 - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn line_offsets(&self) -> &[u32] {
        &self.line_offsets
    }

    /// Map a code-point offset to `(line, column)`, 1-based line, 0-based column.
    pub fn location(&self, offset: u32) -> Option<(u32, u32)> {
        if offset > self.len() {
            return None;
        }
        let line = match self.line_offsets.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Some((line as u32 + 1, offset - self.line_offsets[line]))
    }

    /// Inverse of [`Source::location`].
    pub fn offset(&self, line: u32, column: u32) -> Option<u32> {
        if line == 0 {
            return None;
        }
        let start = *self.line_offsets.get(line as usize - 1)?;
        let offset = start + column;
        (offset <= self.len()).then_some(offset)
    }

    /// Text of one line (1-based), without the trailing newline.
    pub fn snippet(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        let start_cp = *self.line_offsets.get(line as usize - 1)?;
        let end_cp = self
            .line_offsets
            .get(line as usize)
            .map(|&next| next - 1)
            .unwrap_or(self.len());
        let start = self.byte_offsets[start_cp as usize] as usize;
        let end = self.byte_offsets[end_cp as usize] as usize;
        Some(&self.text[start..end])
    }

    /// Byte offset of a code-point offset, for byte-ranged renderers.
    pub fn byte_offset(&self, offset: u32) -> usize {
        let idx = (offset as usize).min(self.byte_offsets.len() - 1);
        self.byte_offsets[idx] as usize
    }

    /// Code-point offset of a byte offset produced by a byte-based scanner.
    pub fn offset_of_byte(&self, byte: usize) -> u32 {
        match self.byte_offsets.binary_search(&(byte as u32)) {
            Ok(i) => i as u32,
            Err(i) => i.saturating_sub(1) as u32,
        }
    }
}

/// Positional side-table carried with every AST.
///
/// Serializes alongside the expression tree so a deserialized AST can still
/// report line/column positions and recover pre-expansion macro calls.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub description: String,
    pub line_offsets: Vec<u32>,
    /// Code-point start offset of each expression node.
    pub positions: IndexMap<ExprId, u32>,
    /// Pre-expansion macro calls keyed by the expanded node id.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub macro_calls: IndexMap<ExprId, Expr>,
}

impl SourceInfo {
    pub fn new(source: &Source) -> Self {
        Self {
            description: source.description().to_owned(),
            line_offsets: source.line_offsets().to_vec(),
            positions: IndexMap::new(),
            macro_calls: IndexMap::new(),
        }
    }

    /// `(line, column)` of an expression id, if recorded.
    pub fn location_of(&self, id: ExprId) -> Option<(u32, u32)> {
        let offset = *self.positions.get(&id)?;
        let line = match self.line_offsets.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Some((line as u32 + 1, offset - self.line_offsets[line]))
    }
}

//! Interchange encodings for parsed and checked ASTs.
//!
//! Two encodings over the same serde model: canonical JSON mirroring the
//! `ParsedExpr`/`CheckedExpr` layout (camelCase fields, id-keyed side maps)
//! and a compact postcard binary. Both round-trip structurally equal,
//! including the type and reference maps of a checked AST.

use crate::ast::{CheckedAst, ParsedAst};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encoding failed: {0}")]
    Binary(#[from] postcard::Error),
}

pub fn parsed_to_json(ast: &ParsedAst) -> Result<String, WireError> {
    Ok(serde_json::to_string(ast)?)
}

pub fn parsed_from_json(json: &str) -> Result<ParsedAst, WireError> {
    Ok(serde_json::from_str(json)?)
}

pub fn checked_to_json(ast: &CheckedAst) -> Result<String, WireError> {
    Ok(serde_json::to_string(ast)?)
}

pub fn checked_from_json(json: &str) -> Result<CheckedAst, WireError> {
    Ok(serde_json::from_str(json)?)
}

pub fn parsed_to_bytes(ast: &ParsedAst) -> Result<Vec<u8>, WireError> {
    Ok(postcard::to_allocvec(ast)?)
}

pub fn parsed_from_bytes(bytes: &[u8]) -> Result<ParsedAst, WireError> {
    Ok(postcard::from_bytes(bytes)?)
}

pub fn checked_to_bytes(ast: &CheckedAst) -> Result<Vec<u8>, WireError> {
    Ok(postcard::to_allocvec(ast)?)
}

pub fn checked_from_bytes(bytes: &[u8]) -> Result<CheckedAst, WireError> {
    Ok(postcard::from_bytes(bytes)?)
}

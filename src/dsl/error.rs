// src/dsl/error.rs

use thiserror::Error;

use super::token::Token;

/// First error found while parsing a pipeline.
///
/// Displayed as `Line(<line>): <message>`. Both `line` and `column` are
/// 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Line({line}): {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    /// Error positioned at `token` within `input`.
    pub fn at(input: &str, token: &Token, message: impl Into<String>) -> Self {
        let (line, column) = line_and_column(input, token.start);
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Line and column of a byte offset.
///
/// Offsets past the end (the EOF token) are reported on the last character
/// of the input, so a missing brace at the end of a file points at the
/// last line that has content.
pub fn line_and_column(input: &str, offset: usize) -> (usize, usize) {
    let end = offset.min(input.len().saturating_sub(1));
    let before = &input.as_bytes()[..end];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |idx| idx + 1);
    (line, end - line_start + 1)
}

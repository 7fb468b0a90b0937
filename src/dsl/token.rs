// src/dsl/token.rs

use std::fmt;

/// Kinds of tokens produced by the pipeline lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    String,
    Number,
    Identifier,

    Plus,
    Star,
    Divide,
    Minus,
    Dot,
    Comma,
    Colon,
    /// `;` or a literal newline.
    Semicolon,
    Pipe,

    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,

    RightArrow,

    Unknown,
    Eof,
}

/// A single lexeme.
///
/// `start` is the byte offset of the token text in the source; for quoted
/// strings this is the offset right after the opening quote. Two tokens are
/// equal when kind, text and offset all match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, start: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
        }
    }

    pub fn eof(start: usize) -> Self {
        Self::new(TokenKind::Eof, "", start)
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Statement separators: `;`, newline or end of input.
    pub fn ends_statement(&self) -> bool {
        matches!(self.kind, TokenKind::Semicolon | TokenKind::Eof)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})@{}", self.kind, self.text, self.start)
    }
}

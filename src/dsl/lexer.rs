// src/dsl/lexer.rs

//! Hand-written lexer for the pipeline language.
//!
//! The lexer is lazy and restartable: it only keeps a byte cursor and a line
//! counter, so the parser can take a [`Checkpoint`] and rewind to it later.
//! Once the input is exhausted it keeps returning [`TokenKind::Eof`].
//!
//! - Spaces, tabs and `\r` are skipped.
//! - A literal newline becomes a [`TokenKind::Semicolon`] token whose text is
//!   the two characters `\n`, so line breaks terminate statements.
//! - `// ...` comments run to the end of the line, `/* ... */` comments to the
//!   closing `*/` (or to the end of input when unterminated).
//! - Characters that start no token become single-character
//!   [`TokenKind::Unknown`] tokens; the lexer itself never fails.

use super::token::{Token, TokenKind};

/// Saved lexer position, see [`Lexer::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pos: usize,
    line: usize,
}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    /// Tokenize the whole input, excluding the trailing EOF token.
    pub fn tokenize(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            if token.is(TokenKind::Eof) {
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Current 1-based line, counting the newlines consumed so far.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            line: self.line,
        }
    }

    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.line = checkpoint.line;
    }

    /// Return the next token without consuming it.
    pub fn peek_token(&mut self) -> Token {
        let saved = self.checkpoint();
        let token = self.next_token();
        self.rewind(saved);
        token
    }

    pub fn next_token(&mut self) -> Token {
        if let Some(separator) = self.skip_trivia() {
            return separator;
        }

        let start = self.pos;
        let Some(c) = self.current() else {
            return Token::eof(self.input.len());
        };

        let kind = match c {
            b'"' => return self.string(),
            b'-' => {
                if self.byte_at(1) == Some(b'>') {
                    self.pos += 2;
                    return Token::new(TokenKind::RightArrow, "->", start);
                }
                TokenKind::Minus
            }
            b'+' => TokenKind::Plus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Divide,
            b'.' => TokenKind::Dot,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            b'|' => TokenKind::Pipe,
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b'[' => TokenKind::LeftBracket,
            b']' => TokenKind::RightBracket,
            c if c.is_ascii_digit() => return self.number(start),
            c if is_alpha(c) => return self.identifier(start),
            _ => {
                let ch = self.input[start..].chars().next().unwrap_or('\u{FFFD}');
                self.pos += ch.len_utf8().max(1);
                return Token::new(TokenKind::Unknown, ch.to_string(), start);
            }
        };

        self.pos += 1;
        Token::new(kind, &self.input[start..self.pos], start)
    }

    /// Skip whitespace and comments. A newline is returned as a separator.
    fn skip_trivia(&mut self) -> Option<Token> {
        while let Some(c) = self.current() {
            match c {
                b'\n' => {
                    let start = self.pos;
                    self.pos += 1;
                    self.line += 1;
                    return Some(Token::new(TokenKind::Semicolon, "\\n", start));
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'/' if self.byte_at(1) == Some(b'/') => {
                    // the newline stays in the input so it still ends the statement
                    while let Some(c) = self.current() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                b'/' if self.byte_at(1) == Some(b'*') => {
                    self.pos += 2;
                    loop {
                        match self.current() {
                            None => break,
                            Some(b'*') if self.byte_at(1) == Some(b'/') => {
                                self.pos += 2;
                                break;
                            }
                            Some(c) => {
                                if c == b'\n' {
                                    self.line += 1;
                                }
                                self.pos += 1;
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        None
    }

    fn string(&mut self) -> Token {
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.current() {
            match c {
                b'"' => break,
                b'\\' => self.pos = (self.pos + 2).min(self.input.len()),
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        let text = &self.input[start..self.pos];
        if self.current() == Some(b'"') {
            self.pos += 1;
        }
        Token::new(TokenKind::String, text, start)
    }

    fn number(&mut self, start: usize) -> Token {
        let mut seen_dot = false;
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == b'.' && !seen_dot {
                seen_dot = true;
                self.pos += 1;
            } else if c == b'-' && self.byte_at(1) == Some(b'>') {
                break;
            } else if is_alpha(c) {
                // `2myNode` is an identifier, rescan it as one
                self.pos = start;
                return self.identifier(start);
            } else {
                break;
            }
        }
        Token::new(TokenKind::Number, &self.input[start..self.pos], start)
    }

    fn identifier(&mut self, start: usize) -> Token {
        while let Some(c) = self.current() {
            if !(is_alpha(c) || c.is_ascii_digit()) {
                break;
            }
            if c == b'-' && self.byte_at(1) == Some(b'>') && self.pos > start {
                break;
            }
            self.pos += 1;
        }
        Token::new(TokenKind::Identifier, &self.input[start..self.pos], start)
    }

    fn current(&self) -> Option<u8> {
        self.byte_at(0)
    }

    fn byte_at(&self, ahead: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + ahead).copied()
    }
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn tok(kind: TokenKind, text: &str, start: usize) -> Token {
        Token::new(kind, text, start)
    }

    #[test]
    fn simple_edge_statement() {
        assert_eq!(
            Lexer::tokenize("A -> C;"),
            vec![
                tok(Identifier, "A", 0),
                tok(RightArrow, "->", 2),
                tok(Identifier, "C", 5),
                tok(Semicolon, ";", 6),
            ]
        );
    }

    #[test]
    fn quoted_string_excludes_quotes() {
        assert_eq!(
            Lexer::tokenize("\"A-X\"->C"),
            vec![
                tok(String, "A-X", 1),
                tok(RightArrow, "->", 5),
                tok(Identifier, "C", 7),
            ]
        );
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let tokens = Lexer::tokenize(r#""a\"b" c"#);
        assert_eq!(tokens[0], tok(String, r#"a\"b"#, 1));
        assert_eq!(tokens[1], tok(Identifier, "c", 7));
    }

    #[test]
    fn unterminated_string_runs_to_end() {
        assert_eq!(Lexer::tokenize("\"abc"), vec![tok(String, "abc", 1)]);
    }

    #[test]
    fn identifier_stops_before_arrow() {
        assert_eq!(
            Lexer::tokenize("node-1->x"),
            vec![
                tok(Identifier, "node-1", 0),
                tok(RightArrow, "->", 6),
                tok(Identifier, "x", 8),
            ]
        );
    }

    #[test]
    fn lone_minus_is_an_operator() {
        assert_eq!(
            Lexer::tokenize("- a"),
            vec![tok(Minus, "-", 0), tok(Identifier, "a", 2)]
        );
    }

    #[test]
    fn unknown_characters_are_single_tokens() {
        assert_eq!(
            Lexer::tokenize("#!A"),
            vec![tok(Unknown, "#", 0), tok(Unknown, "!", 1), tok(Identifier, "A", 2)]
        );
        assert_eq!(Lexer::tokenize("é"), vec![tok(Unknown, "é", 0)]);
    }

    #[test]
    fn numbers_allow_a_single_dot() {
        assert_eq!(
            Lexer::tokenize("AB: 123.45678901"),
            vec![
                tok(Identifier, "AB", 0),
                tok(Colon, ":", 2),
                tok(Number, "123.45678901", 4),
            ]
        );
        assert_eq!(
            Lexer::tokenize("1.2.3"),
            vec![tok(Number, "1.2", 0), tok(Dot, ".", 3), tok(Number, "3", 4)]
        );
    }

    #[test]
    fn letter_inside_number_makes_an_identifier() {
        assert_eq!(Lexer::tokenize("2myNode"), vec![tok(Identifier, "2myNode", 0)]);
    }

    #[test]
    fn number_followed_by_arrow() {
        assert_eq!(
            Lexer::tokenize("12->b"),
            vec![tok(Number, "12", 0), tok(RightArrow, "->", 2), tok(Identifier, "b", 4)]
        );
    }

    #[test]
    fn newline_is_a_separator_and_counts_lines() {
        let mut lexer = Lexer::new("a\nb");
        assert_eq!(lexer.next_token(), tok(Identifier, "a", 0));
        assert_eq!(lexer.line(), 1);
        assert_eq!(lexer.next_token(), tok(Semicolon, "\\n", 1));
        assert_eq!(lexer.line(), 2);
        assert_eq!(lexer.next_token(), tok(Identifier, "b", 2));
    }

    #[test]
    fn comments_are_stripped() {
        assert_eq!(
            Lexer::tokenize("a // b -> c\nd"),
            vec![
                tok(Identifier, "a", 0),
                tok(Semicolon, "\\n", 11),
                tok(Identifier, "d", 12),
            ]
        );
        assert_eq!(
            Lexer::tokenize("/**A -> B**/ C"),
            vec![tok(Identifier, "C", 13)]
        );
    }

    #[test]
    fn block_comment_newlines_advance_line_counter() {
        let mut lexer = Lexer::new("/* a\nb\n*/ c");
        let token = lexer.next_token();
        assert_eq!(token.text, "c");
        assert_eq!(lexer.line(), 3);
    }

    #[test]
    fn string_newlines_advance_line_counter() {
        let mut lexer = Lexer::new("\"a\nb\" c");
        assert_eq!(lexer.next_token().text, "a\nb");
        assert_eq!(lexer.line(), 2);
        assert_eq!(lexer.next_token().text, "c");
    }

    #[test]
    fn unterminated_block_comment_consumes_input() {
        assert!(Lexer::tokenize("a /* b -> c").len() == 1);
    }

    #[test]
    fn eof_repeats_forever() {
        let mut lexer = Lexer::new("x");
        lexer.next_token();
        assert!(lexer.next_token().is(Eof));
        assert!(lexer.next_token().is(Eof));
        assert_eq!(lexer.next_token().start, 1);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new("a\nb");
        lexer.next_token();
        let peeked = lexer.peek_token();
        assert_eq!(lexer.line(), 1);
        assert_eq!(lexer.next_token(), peeked);
        assert_eq!(lexer.line(), 2);
    }

    #[test]
    fn rewind_restores_position_and_line() {
        let mut lexer = Lexer::new("a\nb\nc");
        lexer.next_token();
        let checkpoint = lexer.checkpoint();
        lexer.next_token();
        lexer.next_token();
        lexer.rewind(checkpoint);
        assert_eq!(lexer.line(), 1);
        assert_eq!(lexer.next_token().text, "\\n");
    }
}

// src/dsl/mod.rs

//! The pipeline language: lexer, parser and name verification.

pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod verifier;

pub use error::ParseError;
pub use lexer::Lexer;
pub use parser::{ParsedBuild, ParsedBuildJob, Parser, parse_build, parse_build_no_verify};
pub use token::{Token, TokenKind};
pub use verifier::{SettingsVerifier, Verifier};

// src/tokens/token.rs
use crate::location::source_span::SourceSpan;
use crate::tokens::token_kind::TokenKind;
use std::fmt;

/// A lexed token together with the source range it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: SourceSpan,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.span)
    }
}

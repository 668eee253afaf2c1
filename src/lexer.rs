// src/lexer.rs
//! Lexical analysis. A thin wrapper over the logos-generated scanner that
//! attaches spans via [`LineTracker`], accumulates invalid-token errors
//! instead of stopping, and emits a final [`TokenKind::Eof`] token so the
//! parser never runs off the end of the stream.
use crate::{
    error::compile_error::CompileError,
    location::line_tracker::LineTracker,
    tokens::{token::Token, token_kind::TokenKind},
};
use logos::Logos;

pub struct Lexer<'a> {
    inner: logos::Lexer<'a, TokenKind>,
    line_tracker: LineTracker,
    source_len: usize,
    eof_emitted: bool,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(file_path: &str, source: &'a str) -> Self {
        Lexer {
            inner: TokenKind::lexer(source),
            line_tracker: LineTracker::new(file_path, source),
            source_len: source.len(),
            eof_emitted: false,
        }
    }

    #[must_use]
    pub fn line_tracker(&self) -> &LineTracker {
        &self.line_tracker
    }

    pub fn next_token(&mut self) -> Option<Result<Token, CompileError>> {
        if self.eof_emitted {
            return None;
        }

        let (kind_result, range) = match self.inner.next() {
            Some(kind_result) => (kind_result, self.inner.span()),
            None => {
                self.eof_emitted = true;
                (Ok(TokenKind::Eof), self.source_len..self.source_len)
            }
        };

        let span = self.line_tracker.span_for(range);
        Some(match kind_result {
            Ok(kind) => Ok(Token { kind, span }),
            Err(()) => Err(CompileError::Lexer {
                message: format!("invalid token {:?}", self.inner.slice()),
                span,
            }),
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

/// Drains the lexer, splitting valid tokens from errors. The token vector
/// always ends with an `Eof` token.
pub fn tokenize_with_errors(lexer: &mut Lexer) -> (Vec<Token>, Vec<CompileError>) {
    let mut tokens = Vec::with_capacity(lexer.source_len / 4);
    let mut errors = Vec::new();

    while let Some(result) = lexer.next_token() {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }
    (tokens, errors)
}

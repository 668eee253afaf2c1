// src/parser/precedence.rs
use crate::parser::ast::BinaryOp;
use crate::tokens::token_kind::TokenKind;

/// Binding power of an infix operator token; 0 for anything that is not an
/// infix operator. Multiplicative binds tighter than additive.
#[must_use]
pub fn binary_precedence(kind: &TokenKind) -> u8 {
    match kind {
        TokenKind::Star | TokenKind::Slash => 20,
        TokenKind::Plus | TokenKind::Minus => 10,
        _ => 0,
    }
}

#[must_use]
pub fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Subtract),
        TokenKind::Star => Some(BinaryOp::Multiply),
        TokenKind::Slash => Some(BinaryOp::Divide),
        _ => None,
    }
}

// src/tokens/token_kind.rs
use logos::Logos;
use std::fmt;

fn parse_integer(lex: &mut logos::Lexer<TokenKind>) -> Option<u64> {
    lex.slice().parse().ok()
}

/// Token kinds of the source language. The logos derive doubles as the
/// lexer definition: whitespace and `//` line comments are skipped, and an
/// unparseable integer (overflow) lexes as an error token.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
pub enum TokenKind {
    #[token("int")]
    KeywordInt,
    #[token("if")]
    KeywordIf,
    #[token("else")]
    KeywordElse,
    #[token("while")]
    KeywordWhile,
    #[token("return")]
    KeywordReturn,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Identifier(String),
    #[regex(r"[0-9]+", parse_integer)]
    Integer(u64),

    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Equal,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,

    /// Emitted once by the lexer after the source is exhausted.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::KeywordInt => f.write_str("'int'"),
            TokenKind::KeywordIf => f.write_str("'if'"),
            TokenKind::KeywordElse => f.write_str("'else'"),
            TokenKind::KeywordWhile => f.write_str("'while'"),
            TokenKind::KeywordReturn => f.write_str("'return'"),
            TokenKind::Identifier(name) => write!(f, "identifier '{name}'"),
            TokenKind::Integer(value) => write!(f, "integer '{value}'"),
            TokenKind::OpenParen => f.write_str("'('"),
            TokenKind::CloseParen => f.write_str("')'"),
            TokenKind::OpenBrace => f.write_str("'{'"),
            TokenKind::CloseBrace => f.write_str("'}'"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::Equal => f.write_str("'='"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

// src/tokens/mod.rs
//! Lexical tokens of the source language: the kind enumeration (which also
//! carries the logos lexing rules) and the token/span pairing the parser
//! consumes.
pub mod token;
pub mod token_kind;

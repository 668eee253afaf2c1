// src/parser/mod.rs
//! Syntax analysis: the abstract syntax tree and the recursive-descent
//! parser (expressions use precedence climbing) that builds it from the
//! token stream.
pub mod ast;
pub mod brine_parser;
pub mod precedence;

// src/lib.rs
//! # brine
//!
//! An ahead-of-time optimizing compiler back end for a tiny C-like
//! language, built around a sea-of-nodes intermediate representation: one
//! graph per function in which data and control flow mix, rewritten to a
//! fixed point by worklist peepholes and dead-store elimination, lowered
//! by a declarative tree-pattern instruction selector, scheduled into
//! basic blocks by global code motion, and emitted as virtual-register
//! x86-32 assembly with liveness information.
//!
//! Pipeline: source text to tokens (`lexer`), AST (`parser`), semantic
//! unit (`semantic`), graph (`ir`), optimized graph (`opt`), target graph
//! (`isel`), block schedule (`schedule`), machine code (`emit`).
pub mod cli;
pub mod emit;
pub mod error;
pub mod ir;
pub mod isel;
pub mod lexer;
pub mod location;
pub mod opt;
pub mod parser;
pub mod schedule;
pub mod semantic;
pub mod tokens;

// src/error/mod.rs
//! User-facing error handling. Lexical, syntax and semantic diagnostics are
//! accumulated as [`compile_error::CompileError`] values carrying source
//! spans and rendered with source context by
//! [`error_reporter::ErrorReporter`].
//!
//! Programmer errors inside the back end (violated graph invariants,
//! unknown node kinds, malformed internal tables) are not represented here:
//! they abort the process via assertions.
pub mod compile_error;
pub mod error_reporter;

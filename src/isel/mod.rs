// src/isel/mod.rs
//! Instruction selection: a bottom-up tree-pattern matcher over the
//! optimized graph, driven by the declarative rule table in `x64.pats`.
//! The graph is partitioned into selection roots; each root's subtree is
//! walked post-order and rewritten into target nodes in a fresh function,
//! with cross-root edges patched in a second pass.
pub mod rules;
pub mod selector;

pub use rules::{Rule, RuleTable, x64_rules};
pub use selector::select_x64;

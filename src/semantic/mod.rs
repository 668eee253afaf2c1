// src/semantic/mod.rs
//! Semantic analysis. Lowers the AST into a [`unit::SemUnit`]: per function
//! a flat control-flow graph of blocks holding three-address instructions
//! over dense temporaries, with every variable resolved to a numbered stack
//! slot and accessed through explicit load/store instructions. The IR
//! generator consumes this form directly; the optimizer later recovers SSA
//! values from the memory traffic.
pub mod lowering;
pub mod unit;

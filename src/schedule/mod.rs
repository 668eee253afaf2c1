// src/schedule/mod.rs
//! The scheduler: extracts a basic-block CFG from the selected graph,
//! computes its dominator tree, and assigns every node to a block: pinned
//! nodes to the block of their control input, everything else as late as
//! dominance allows (global code motion).
pub mod cfg;
pub mod dominance;
pub mod gcm;

pub use cfg::{Block, BlockId, Cfg};
pub use dominance::DominatorTree;
pub use gcm::{run_global_code_motion, Schedule};

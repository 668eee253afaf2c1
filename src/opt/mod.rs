// src/opt/mod.rs
//! The worklist-driven rewrite engine: peepholes run to a fixed point,
//! dead-store elimination runs to completion, and the pair loops until
//! neither has anything left to do. All side tables live in the reusable
//! [`Optimizer`] context so repeated runs over many functions do not
//! reallocate.
pub mod dse;
pub mod peephole;
pub mod worklist;

use crate::ir::function::Function;
use crate::ir::node::NodeId;
use crate::opt::worklist::Worklist;

/// Reusable optimization context: the peephole worklist plus a scratch
/// stack for the local recursive traversals (load-forwarding, collection).
#[derive(Debug, Default)]
pub struct Optimizer {
    worklist: Worklist,
    stack: Vec<(bool, NodeId)>,
}

impl Optimizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.worklist.clear();
        self.stack.clear();
    }

    /// Rewrites `func` to a fixed point: drain the peephole worklist, run
    /// dead-store elimination (which re-enqueues the neighbors of anything
    /// it removes), and repeat until both are quiet.
    pub fn optimize(&mut self, func: &mut Function) {
        self.reset();

        for id in func.reachable() {
            self.worklist.add(id);
        }

        loop {
            self.peepholes(func);
            dse::dead_store_elim(self, func);
            if self.worklist.is_empty() {
                break;
            }
        }
    }

    fn peepholes(&mut self, func: &mut Function) {
        while let Some(node) = self.worklist.pop() {
            let ideal = peephole::idealize(self, func, node);
            if ideal != node {
                self.replace(func, node, ideal);
            }
        }
    }

    /// Rewires every use of `target` to `source`, enqueues the affected
    /// users, then collects `target` (and, transitively, anything its
    /// removal leaves dead).
    pub(crate) fn replace(&mut self, func: &mut Function, target: NodeId, source: NodeId) {
        for user in func.rewire_uses(target, source) {
            self.worklist.add(user);
        }
        self.remove(func, target);
    }

    /// Collects a use-less node: detaches its inputs (cascading into inputs
    /// that become dead) and tombstones it. The unique END survives even
    /// with no uses; dead nodes never stay on the worklist.
    pub(crate) fn remove(&mut self, func: &mut Function, first: NodeId) {
        let end = func.end_node();
        let mut stack = vec![first];

        while let Some(node) = stack.pop() {
            assert!(func.uses(node).is_empty(), "collecting {node} while it still has uses");

            self.worklist.remove(node);
            for input in func.detach_inputs(node) {
                if input != end {
                    stack.push(input);
                }
            }
            func.tombstone(node);
        }
    }

    pub(crate) fn enqueue(&mut self, node: NodeId) {
        self.worklist.add(node);
    }

    pub(crate) fn take_stack(&mut self) -> Vec<(bool, NodeId)> {
        std::mem::take(&mut self.stack)
    }

    pub(crate) fn put_stack(&mut self, mut stack: Vec<(bool, NodeId)>) {
        stack.clear();
        self.stack = stack;
    }
}

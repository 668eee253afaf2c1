// src/schedule/dominance.rs
use crate::schedule::cfg::{BlockId, Cfg};
use petgraph::algo::dominators;
use petgraph::graph::{DiGraph, NodeIndex};

/// Dominator information over the block CFG: immediate dominators,
/// dominator-tree children and depths, with the queries the scheduler and
/// emitter need (dominance tests, tree LCA, pre-order).
#[derive(Debug, Clone)]
pub struct DominatorTree {
    idom: Vec<Option<BlockId>>,
    pub children: Vec<Vec<BlockId>>,
    depth: Vec<u32>,
    entry: BlockId,
}

impl DominatorTree {
    /// Computes dominators with the simple-fast algorithm over a petgraph
    /// mirror of the CFG.
    ///
    /// # Panics
    /// Panics if some block is unreachable from the entry; the extractor
    /// only produces reachable blocks, so that is a programmer error.
    #[must_use]
    pub fn compute(cfg: &Cfg) -> DominatorTree {
        let mut graph: DiGraph<BlockId, ()> = DiGraph::new();

        // Block ids are dense, so graph indices align with them.
        let indices: Vec<NodeIndex> =
            (0..cfg.blocks.len()).map(|i| graph.add_node(BlockId(i as u32))).collect();
        for (i, block) in cfg.blocks.iter().enumerate() {
            for succ in &block.succs {
                graph.add_edge(indices[i], indices[succ.index()], ());
            }
        }

        let doms = dominators::simple_fast(&graph, indices[cfg.entry.index()]);

        let mut idom = vec![None; cfg.blocks.len()];
        let mut children = vec![Vec::new(); cfg.blocks.len()];
        for (i, &index) in indices.iter().enumerate() {
            let block = BlockId(i as u32);
            if block == cfg.entry {
                continue;
            }
            let dominator = doms
                .immediate_dominator(index)
                .unwrap_or_else(|| panic!("{block} is unreachable from the entry block"));
            let dominator = BlockId(dominator.index() as u32);
            idom[i] = Some(dominator);
            children[dominator.index()].push(block);
        }

        // Depths via a walk down the tree.
        let mut depth = vec![0u32; cfg.blocks.len()];
        let mut stack = vec![cfg.entry];
        while let Some(block) = stack.pop() {
            for &child in &children[block.index()] {
                depth[child.index()] = depth[block.index()] + 1;
                stack.push(child);
            }
        }

        DominatorTree { idom, children, depth, entry: cfg.entry }
    }

    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    #[must_use]
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.idom[block.index()]
    }

    #[must_use]
    pub fn depth(&self, block: BlockId) -> u32 {
        self.depth[block.index()]
    }

    /// Whether `a` dominates `b` (reflexively).
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom[current.index()] {
                Some(up) => current = up,
                None => return false,
            }
        }
    }

    /// Lowest common ancestor in the dominator tree: the deepest block
    /// dominating both arguments.
    #[must_use]
    pub fn lca(&self, a: BlockId, b: BlockId) -> BlockId {
        let (mut a, mut b) = (a, b);
        while self.depth(a) > self.depth(b) {
            a = self.idom[a.index()].expect("a deeper block has a dominator");
        }
        while self.depth(b) > self.depth(a) {
            b = self.idom[b.index()].expect("a deeper block has a dominator");
        }
        while a != b {
            a = self.idom[a.index()].expect("blocks at equal depth share an ancestor");
            b = self.idom[b.index()].expect("blocks at equal depth share an ancestor");
        }
        a
    }

    /// Dominator-tree pre-order starting at the entry. Generating code in
    /// this order guarantees a definition's block is emitted before any
    /// dominated use.
    #[must_use]
    pub fn preorder(&self) -> Vec<BlockId> {
        let mut order = Vec::with_capacity(self.children.len());
        let mut stack = vec![self.entry];
        while let Some(block) = stack.pop() {
            order.push(block);
            for &child in self.children[block.index()].iter().rev() {
                stack.push(child);
            }
        }
        order
    }
}

// src/schedule/cfg.rs
use crate::ir::function::Function;
use crate::ir::node::{NodeId, NodeKind};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb_{}", self.0)
    }
}

/// One basic block of the extracted CFG. `nodes` is filled by the
/// scheduler with the block's final def-before-use order.
#[derive(Debug, Clone)]
pub struct Block {
    /// The control node this block starts at: a start-control projection,
    /// region, or branch projection.
    pub head: NodeId,
    /// Scheduled nodes in emission order (set by global code motion).
    pub nodes: Vec<NodeId>,
    pub succs: Vec<BlockId>,
    /// For region-headed blocks the order matches the region's input
    /// order, so phi input `i` flows in from `preds[i - 1]`.
    pub preds: Vec<BlockId>,
    /// The branch or end node closing this block, if any; fallthrough
    /// blocks have none and get their jump from the emitter.
    pub terminator: Option<NodeId>,
}

/// The basic-block graph extracted from a scheduled function.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub blocks: Vec<Block>,
    pub entry: BlockId,
    head_to_block: HashMap<NodeId, BlockId>,
}

impl Cfg {
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// The block headed by a given control node.
    ///
    /// # Panics
    /// Panics if the node is not a block head.
    #[must_use]
    pub fn block_of_head(&self, head: NodeId) -> BlockId {
        *self
            .head_to_block
            .get(&head)
            .unwrap_or_else(|| panic!("{head} does not head a basic block"))
    }
}

/// Extracts the block structure of a graph. Block heads are start-control
/// projections, regions and branch projections; branches and ends belong
/// to the block of their control input and terminate it.
#[must_use]
pub fn build_cfg(func: &Function) -> Cfg {
    let mut reachable = func.reachable();
    reachable.sort_unstable();

    let mut blocks = Vec::new();
    let mut head_to_block = HashMap::new();
    for &node in &reachable {
        if is_block_head(func.kind(node)) {
            let id = BlockId(u32::try_from(blocks.len()).expect("block count fits in u32"));
            head_to_block.insert(node, id);
            blocks.push(Block {
                head: node,
                nodes: Vec::new(),
                succs: Vec::new(),
                preds: Vec::new(),
                terminator: None,
            });
        }
    }

    let mut cfg = Cfg {
        entry: *head_to_block
            .get(&func.start_nodes().ctrl)
            .expect("the start-control projection heads the entry block"),
        blocks,
        head_to_block,
    };

    // Edges. Regions pull in one predecessor per input (in input order);
    // branches push their projection blocks as successors.
    for &node in &reachable {
        match func.kind(node) {
            NodeKind::Region => {
                let region_block = cfg.block_of_head(node);
                for input in func.node(node).ins.iter().flatten() {
                    let pred = cfg.block_of_head(*input);
                    cfg.blocks[region_block.index()].preds.push(pred);
                    cfg.blocks[pred.index()].succs.push(region_block);
                }
            }
            NodeKind::Branch | NodeKind::X64Branch32 => {
                let block = cfg.block_of_head(func.input_node(node, 0));
                assert!(
                    cfg.blocks[block.index()].terminator.is_none(),
                    "block {block} has two terminators"
                );
                cfg.blocks[block.index()].terminator = Some(node);

                let on_true = branch_projection(func, node, NodeKind::BranchTrue);
                let on_false = branch_projection(func, node, NodeKind::BranchFalse);
                let (tb, fb) = (cfg.block_of_head(on_true), cfg.block_of_head(on_false));
                cfg.blocks[block.index()].succs.push(tb);
                cfg.blocks[block.index()].succs.push(fb);
                cfg.blocks[tb.index()].preds.push(block);
                cfg.blocks[fb.index()].preds.push(block);
            }
            NodeKind::End | NodeKind::X64End32 => {
                let block = cfg.block_of_head(func.input_node(node, 0));
                assert!(
                    cfg.blocks[block.index()].terminator.is_none(),
                    "block {block} has two terminators"
                );
                cfg.blocks[block.index()].terminator = Some(node);
            }
            _ => {}
        }
    }

    cfg
}

fn is_block_head(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::StartCtrl | NodeKind::Region | NodeKind::BranchTrue | NodeKind::BranchFalse
    )
}

/// Finds the given projection of a branch by scanning its use list.
pub(crate) fn branch_projection(func: &Function, branch: NodeId, kind: NodeKind) -> NodeId {
    func.uses(branch)
        .iter()
        .map(|u| u.node)
        .find(|&user| func.kind(user) == kind)
        .unwrap_or_else(|| panic!("branch {branch} has no {} projection", kind.label()))
}

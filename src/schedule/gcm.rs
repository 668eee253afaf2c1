// src/schedule/gcm.rs
use crate::ir::function::Function;
use crate::ir::node::{NodeFlags, NodeId, NodeKind};
use crate::schedule::cfg::{build_cfg, BlockId, Cfg};
use crate::schedule::dominance::DominatorTree;
use std::collections::{BTreeSet, HashMap};

/// The scheduler's result: the block CFG, its dominator tree, and a
/// complete node-to-block assignment with per-block emission order.
#[derive(Debug)]
pub struct Schedule {
    pub cfg: Cfg,
    pub dom: DominatorTree,
    block_of: Vec<Option<BlockId>>,
}

impl Schedule {
    #[must_use]
    pub fn block_of(&self, node: NodeId) -> BlockId {
        self.block_of[node.index()]
            .unwrap_or_else(|| panic!("{node} was never assigned to a block"))
    }
}

/// Global code motion. Pinned nodes (control, projections, phis, the
/// start/end family) sit in the block their control input determines;
/// every other node lands in the latest block that is still dominated by
/// its inputs and dominates all of its uses: the dominator-tree LCA of
/// the use blocks.
#[must_use]
pub fn run_global_code_motion(func: &Function) -> Schedule {
    let mut cfg = build_cfg(func);
    let dom = DominatorTree::compute(&cfg);
    let reachable = func.reachable();

    let mut block_of: Vec<Option<BlockId>> = vec![None; func.node_count()];

    for &node in &reachable {
        block_of[node.index()] = pinned_block(func, &cfg, node);
    }

    let early = compute_early(func, &cfg, &dom, &reachable, &block_of);
    place_late(func, &cfg, &dom, &reachable, &early, &mut block_of);
    order_blocks(func, &mut cfg, &reachable, &block_of);

    Schedule { cfg, dom, block_of }
}

/// The fixed block of a pinned node, or `None` for nodes global code
/// motion is free to move.
fn pinned_block(func: &Function, cfg: &Cfg, node: NodeId) -> Option<BlockId> {
    match func.kind(node) {
        NodeKind::StartCtrl | NodeKind::Region | NodeKind::BranchTrue | NodeKind::BranchFalse => {
            Some(cfg.block_of_head(node))
        }
        NodeKind::Start | NodeKind::StartMem => Some(cfg.entry),
        NodeKind::Phi => Some(cfg.block_of_head(func.input_node(node, 0))),
        NodeKind::Branch | NodeKind::X64Branch32 | NodeKind::End | NodeKind::X64End32 => {
            Some(cfg.block_of_head(func.input_node(node, 0)))
        }
        _ if func
            .flags(node)
            .intersects(NodeFlags::PINNED | NodeFlags::CFG | NodeFlags::PROJ) =>
        {
            Some(cfg.block_of_head(func.input_node(node, 0)))
        }
        _ => None,
    }
}

/// Early placement: the deepest block among a node's inputs (the earliest
/// block in which all of its operands are available). Only used to check
/// the late placement's validity.
fn compute_early(
    func: &Function,
    cfg: &Cfg,
    dom: &DominatorTree,
    reachable: &[NodeId],
    pinned: &[Option<BlockId>],
) -> Vec<Option<BlockId>> {
    let mut early: Vec<Option<BlockId>> = pinned.to_vec();
    let mut stack: Vec<(bool, NodeId)> = Vec::new();

    for &node in reachable {
        if early[node.index()].is_some() {
            continue;
        }
        stack.push((false, node));

        while let Some((ins_processed, n)) = stack.pop() {
            if early[n.index()].is_some() {
                continue;
            }
            if !ins_processed {
                stack.push((true, n));
                for input in func.node(n).ins.iter().flatten() {
                    if early[input.index()].is_none() {
                        stack.push((false, *input));
                    }
                }
            } else {
                let mut best = cfg.entry;
                for input in func.node(n).ins.iter().flatten() {
                    let b = early[input.index()].expect("inputs are placed post-order");
                    if dom.depth(b) > dom.depth(best) {
                        best = b;
                    }
                }
                early[n.index()] = Some(best);
            }
        }
    }

    early
}

/// Late placement: walks uses first, then puts each unpinned node at the
/// dominator-tree LCA of its use blocks. A phi use counts as the
/// predecessor block its input position flows in from, not the phi's own
/// block.
fn place_late(
    func: &Function,
    cfg: &Cfg,
    dom: &DominatorTree,
    reachable: &[NodeId],
    early: &[Option<BlockId>],
    block_of: &mut Vec<Option<BlockId>>,
) {
    let mut stack: Vec<(bool, NodeId)> = Vec::new();

    for &node in reachable {
        if block_of[node.index()].is_some() {
            continue;
        }
        stack.push((false, node));

        while let Some((uses_processed, n)) = stack.pop() {
            if block_of[n.index()].is_some() {
                continue;
            }
            if !uses_processed {
                stack.push((true, n));
                for u in func.uses(n) {
                    if block_of[u.node.index()].is_none() {
                        stack.push((false, u.node));
                    }
                }
            } else {
                let mut late: Option<BlockId> = None;
                for u in func.uses(n) {
                    let use_block = if func.kind(u.node) == NodeKind::Phi && u.index >= 1 {
                        let phi_block = block_of[u.node.index()].expect("phis are pinned");
                        cfg.block(phi_block).preds[(u.index - 1) as usize]
                    } else {
                        block_of[u.node.index()].expect("uses are placed before their defs")
                    };
                    late = Some(match late {
                        None => use_block,
                        Some(seen) => dom.lca(seen, use_block),
                    });
                }

                let late = late.unwrap_or_else(|| {
                    panic!("unpinned {n} has no uses but is reachable from END")
                });
                let early = early[n.index()].expect("every reachable node has an early block");
                assert!(
                    dom.dominates(early, late),
                    "{n} scheduled at {late}, outside its legal range from {early}"
                );
                block_of[n.index()] = Some(late);
            }
        }
    }
}

/// Fixes each block's internal order: a topological sort over the
/// block-local def-use edges (phi value inputs exempt, which is what
/// breaks the loop-carried cycles), ties broken by node id, with the
/// block's terminator forced last.
fn order_blocks(func: &Function, cfg: &mut Cfg, reachable: &[NodeId], block_of: &[Option<BlockId>]) {
    let mut members: Vec<Vec<NodeId>> = vec![Vec::new(); cfg.blocks.len()];
    let mut sorted = reachable.to_vec();
    sorted.sort_unstable();
    for &node in &sorted {
        let block = block_of[node.index()].expect("every reachable node is scheduled");
        members[block.index()].push(node);
    }

    for (index, mut nodes) in members.into_iter().enumerate() {
        let terminator = cfg.blocks[index].terminator;
        nodes.retain(|&n| Some(n) != terminator);

        let in_block: HashMap<NodeId, usize> =
            nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        let mut in_degree = vec![0usize; nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

        for (i, &n) in nodes.iter().enumerate() {
            let is_phi = func.kind(n) == NodeKind::Phi;
            for (slot, input) in func.node(n).ins.iter().enumerate() {
                let Some(input) = *input else { continue };
                if is_phi && slot >= 1 {
                    continue;
                }
                if let Some(&j) = in_block.get(&input) {
                    in_degree[i] += 1;
                    dependents[j].push(i);
                }
            }
        }

        let mut ready: BTreeSet<NodeId> = nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] == 0)
            .map(|(_, &n)| n)
            .collect();
        let mut order = Vec::with_capacity(nodes.len() + 1);

        while let Some(&next) = ready.iter().next() {
            ready.remove(&next);
            order.push(next);
            let i = in_block[&next];
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(nodes[dependent]);
                }
            }
        }

        assert_eq!(
            order.len(),
            nodes.len(),
            "cycle through non-phi nodes inside {}",
            BlockId(index as u32)
        );
        if let Some(terminator) = terminator {
            order.push(terminator);
        }
        cfg.blocks[index].nodes = order;
    }
}

// src/ir/validator.rs
use crate::ir::function::Function;
use crate::ir::node::{NodeFlags, NodeId, NodeKind};

/// Checks the structural invariants of a finished graph. All violations are
/// programmer errors and abort the process.
///
/// Checked for every node reachable from END by inputs:
/// - no reachable node is an `UNINITIALIZED` tombstone;
/// - use-list duality: `n.ins[i] == m` iff `m.uses` holds exactly one
///   `(n, i)` record;
/// - a phi's first input is a region and it has exactly one more input than
///   that region;
/// - the unique START is reachable from END.
pub fn finalize(func: &Function) {
    let reachable = func.reachable();

    let mut start_seen = false;
    let start = func.start_nodes().start;

    for &id in &reachable {
        let node = func.node(id);
        assert!(
            node.kind != NodeKind::Uninitialized,
            "removed node {id} is still reachable from END"
        );
        start_seen |= id == start;

        for (i, input) in node.ins.iter().enumerate() {
            let Some(input) = *input else { continue };
            let records = func
                .uses(input)
                .iter()
                .filter(|u| u.node == id && u.index as usize == i)
                .count();
            assert_eq!(
                records, 1,
                "{} {id} input {i} -> {input}: expected exactly one use record, found {records}",
                node.kind.label()
            );
        }

        for u in &node.uses {
            assert_eq!(
                func.input(u.node, u.index as usize),
                Some(id),
                "use record ({}, {}) of {id} does not point back at it",
                u.node,
                u.index
            );
        }

        if node.kind == NodeKind::Phi {
            let region = node.input(0).expect("a wired phi has its region input");
            assert_eq!(
                func.kind(region),
                NodeKind::Region,
                "phi {id}'s first input must be a REGION"
            );
            assert_eq!(
                node.ins.len(),
                func.node(region).ins.len() + 1,
                "phi {id} must have one more input than its region"
            );
            assert!(
                node.flags.contains(NodeFlags::PINNED),
                "phi {id} lost its pinned flag"
            );
        }
    }

    assert!(start_seen, "START is not reachable from END");
    let _: NodeId = func.end_node();
}

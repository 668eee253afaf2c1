// src/opt/dse.rs
use crate::ir::function::Function;
use crate::ir::node::{NodeFlags, NodeId, NodeKind, END_MEM, LOAD_MEM, STORE_MEM};
use crate::opt::Optimizer;

/// Dead-store elimination.
///
/// Every node that reads memory is a sink. Memory dependency chains are
/// walked backwards from all sinks, coloring the memory nodes they can
/// observe; a store left uncolored has no observable effect and is replaced
/// by its own memory input. Replacements feed the peephole worklist, so the
/// outer optimize loop reruns both passes until nothing changes.
pub(crate) fn dead_store_elim(opt: &mut Optimizer, func: &mut Function) {
    let reachable = func.reachable();
    let mut observed = vec![false; func.node_count()];

    let mut stack: Vec<NodeId> = Vec::new();
    let mut stores: Vec<NodeId> = Vec::new();

    for &node in &reachable {
        if func.flags(node).contains(NodeFlags::READS_MEMORY) {
            stack.push(node);
        }
        if func.kind(node) == NodeKind::Store {
            stores.push(node);
        }
    }

    while let Some(node) = stack.pop() {
        if std::mem::replace(&mut observed[node.index()], true) {
            continue;
        }
        push_mem_deps(func, node, &mut stack);
    }

    for store in stores {
        // A store can be collected by an earlier replacement in this loop.
        if func.kind(store) != NodeKind::Store || observed[store.index()] {
            continue;
        }
        let mem = func.input_node(store, STORE_MEM);
        opt.replace(func, store, mem);
    }
}

/// The memory dependencies of a node, per kind: a phi depends on all of its
/// value inputs, loads/stores/end on their memory input. Everything else
/// has none.
fn push_mem_deps(func: &Function, node: NodeId, stack: &mut Vec<NodeId>) {
    match func.kind(node) {
        NodeKind::Phi => {
            for input in &func.node(node).ins[1..] {
                stack.push(input.expect("wired phi"));
            }
        }
        NodeKind::Load => stack.push(func.input_node(node, LOAD_MEM)),
        NodeKind::Store => stack.push(func.input_node(node, STORE_MEM)),
        NodeKind::End => stack.push(func.input_node(node, END_MEM)),
        _ => {}
    }
}

// src/opt/peephole.rs
use crate::ir::function::Function;
use crate::ir::node::{NodeId, NodeKind, LOAD_ADDR, LOAD_MEM, STORE_ADDR, STORE_VALUE};
use crate::opt::Optimizer;
use std::collections::HashMap;

/// Looks up and runs the idealizer for `node`'s kind. Returns the node
/// itself when there is nothing to improve, or the replacement node.
pub(crate) fn idealize(opt: &mut Optimizer, func: &mut Function, node: NodeId) -> NodeId {
    match func.kind(node) {
        NodeKind::Phi => idealize_phi(opt, func, node),
        NodeKind::Region => idealize_region(func, node),
        NodeKind::Load => idealize_load(opt, func, node),
        NodeKind::Add | NodeKind::Sub | NodeKind::Mul | NodeKind::Sdiv => {
            idealize_arith(func, node)
        }
        _ => node,
    }
}

/// A phi whose value inputs (ignoring itself, so loop-closed phis can
/// collapse) all name the same node is that node.
fn idealize_phi(opt: &mut Optimizer, func: &Function, phi: NodeId) -> NodeId {
    let ins = &func.node(phi).ins;
    let mut unique: Option<NodeId> = None;

    for input in &ins[1..] {
        let input = input.expect("a wired phi has no empty value slots");
        if input == phi {
            continue;
        }
        match unique {
            None => unique = Some(input),
            Some(seen) if seen == input => {}
            Some(_) => return phi,
        }
    }

    let Some(unique) = unique else {
        debug_assert!(false, "phi {phi} has only itself as input");
        return phi;
    };

    // The region may now be phi-free and collapsible itself.
    opt.enqueue(func.input_node(phi, 0));
    unique
}

/// A region with a single predecessor and no phi users is just its
/// predecessor.
fn idealize_region(func: &Function, region: NodeId) -> NodeId {
    if func.node(region).ins.len() != 1 {
        return region;
    }
    if func.uses(region).iter().any(|u| func.kind(u.node) == NodeKind::Phi) {
        return region;
    }
    func.input_node(region, 0)
}

/// Constant folding and identities over the source arithmetic kinds. All
/// arithmetic is 32-bit and wrapping; division only folds for a non-zero
/// constant divisor.
fn idealize_arith(func: &mut Function, node: NodeId) -> NodeId {
    let kind = func.kind(node);
    let lhs = func.input_node(node, 0);
    let rhs = func.input_node(node, 1);
    let lv = const_value(func, lhs);
    let rv = const_value(func, rhs);

    if let (Some(a), Some(b)) = (lv, rv) {
        let folded = match kind {
            NodeKind::Add => Some(a.wrapping_add(b)),
            NodeKind::Sub => Some(a.wrapping_sub(b)),
            NodeKind::Mul => Some(a.wrapping_mul(b)),
            NodeKind::Sdiv => (b != 0).then(|| a.wrapping_div(b)),
            _ => unreachable!("idealize_arith is only dispatched for arithmetic kinds"),
        };
        if let Some(value) = folded {
            return func.constant(value as i64 as u64);
        }
    }

    match (kind, lv, rv) {
        (NodeKind::Add, _, Some(0)) | (NodeKind::Sub, _, Some(0)) => lhs,
        (NodeKind::Add, Some(0), _) => rhs,
        (NodeKind::Mul, _, Some(1)) | (NodeKind::Sdiv, _, Some(1)) => lhs,
        (NodeKind::Mul, Some(1), _) => rhs,
        (NodeKind::Mul, Some(0), _) => lhs,
        (NodeKind::Mul, _, Some(0)) => rhs,
        _ => node,
    }
}

fn const_value(func: &Function, id: NodeId) -> Option<i32> {
    if func.kind(id) != NodeKind::Constant {
        return None;
    }
    match func.data(id) {
        crate::ir::node::NodeData::Constant(raw) => Some(raw as u32 as i32),
        other => panic!("CONSTANT {id} carries unexpected payload {other:?}"),
    }
}

/// Load forwarding through the memory dependency web.
///
/// Walks backwards from the load's memory input. Stores to the load's
/// address record their stored value; memory phis get a fresh value phi
/// over the recorded values of their inputs, synthesized post-order.
/// Anything else in the web makes the memory state unknowable and aborts
/// the rewrite. On success the load becomes the value recorded at its
/// original memory input.
fn idealize_load(opt: &mut Optimizer, func: &mut Function, load: NodeId) -> NodeId {
    let address = func.input_node(load, LOAD_ADDR);
    let first = func.input_node(load, LOAD_MEM);

    // memory node -> the value memory holds at that point
    let mut map: HashMap<NodeId, NodeId> = HashMap::new();
    let mut created: Vec<NodeId> = Vec::new();
    let mut aborted = false;

    let mut stack = opt.take_stack();
    stack.push((false, first));

    while let Some((ins_processed, node)) = stack.pop() {
        match func.kind(node) {
            NodeKind::Phi => {
                if ins_processed {
                    let region = func.input_node(node, 0);
                    let values: Vec<NodeId> = func.node(node).ins[1..]
                        .iter()
                        .map(|input| {
                            let input = input.expect("wired phi");
                            *map.get(&input).expect("post-order visits inputs first")
                        })
                        .collect();
                    let phi = map[&node];
                    func.set_phi_inputs(phi, region, &values);
                } else {
                    if map.contains_key(&node) {
                        continue;
                    }
                    let placeholder = func.phi();
                    map.insert(node, placeholder);
                    created.push(placeholder);

                    stack.push((true, node));
                    for input in &func.node(node).ins[1..] {
                        stack.push((false, input.expect("wired phi")));
                    }
                }
            }

            NodeKind::Store => {
                if func.input_node(node, STORE_ADDR) != address {
                    aborted = true;
                    break;
                }
                map.insert(node, func.input_node(node, STORE_VALUE));
            }

            // Hit a memory effect we cannot see through.
            _ => {
                aborted = true;
                break;
            }
        }
    }

    opt.put_stack(stack);

    if aborted {
        // Discard the half-built phi web. The placeholders only ever use
        // graph nodes that have other uses, so nothing real dies here.
        for &phi in &created {
            let _ = func.detach_inputs(phi);
        }
        for &phi in &created {
            func.tombstone(phi);
        }
        return load;
    }

    for &phi in &created {
        opt.enqueue(phi);
    }
    *map.get(&first).expect("a completed walk recorded the entry memory state")
}

// src/ir/generator.rs
use crate::ir::function::Function;
use crate::ir::node::{NodeFlags, NodeId};
use crate::ir::validator::finalize;
use crate::parser::ast::BinaryOp;
use crate::semantic::unit::{SemBlockId, SemFunc, SemInst, SemTerminator, SemUnit};

/// Builds one sea-of-nodes graph per semantic function.
#[must_use]
pub fn generate_unit(unit: &SemUnit) -> Vec<Function> {
    unit.funcs.iter().map(generate).collect()
}

/// Translates one semantic function into the graph form.
///
/// Every block's control is a single head node: the start-control
/// projection for the entry, a branch projection for single-predecessor
/// blocks entered through a branch edge, the predecessor's own head for
/// goto edges, or a region for join blocks. Memory is threaded the same
/// way, with a memory phi placed at every join; all variable traffic goes
/// through `ALLOCA`/`LOAD`/`STORE`, so no value phis are needed here;
/// the optimizer recovers them by load-forwarding.
#[must_use]
pub fn generate(sem: &SemFunc) -> Function {
    let mut func = Function::new(&sem.name);
    let start = func.start();

    let reachable = reachable_blocks(sem);
    let preds = predecessors(sem, &reachable);
    let order = reverse_post_order(sem, &reachable);

    let allocas: Vec<NodeId> = (0..sem.num_slots).map(|_| func.alloca()).collect();

    let block_count = sem.blocks.len();
    let mut ctrl_of: Vec<Option<NodeId>> = vec![None; block_count];
    let mut region_of: Vec<Option<NodeId>> = vec![None; block_count];
    let mut mem_phi_of: Vec<Option<NodeId>> = vec![None; block_count];
    let mut out_mem: Vec<Option<NodeId>> = vec![None; block_count];
    let mut projs: Vec<Option<crate::ir::function::BranchNodes>> = vec![None; block_count];
    let mut values: Vec<Option<NodeId>> = vec![None; sem.num_values as usize];
    let mut returns: Vec<(NodeId, NodeId, NodeId)> = Vec::new();

    // Join blocks get their region and memory phi up front; their inputs
    // are only known once every predecessor has been generated.
    for &b in &order {
        if preds[b.index()].len() >= 2 {
            let region = func.region();
            let phi = func.phi();
            func.add_flags(phi, NodeFlags::PRODUCES_MEMORY);
            region_of[b.index()] = Some(region);
            mem_phi_of[b.index()] = Some(phi);
        }
    }

    for &b in &order {
        let block_preds = &preds[b.index()];

        let (in_ctrl, in_mem) = if b == sem.entry() {
            assert!(block_preds.is_empty(), "the entry block cannot be a jump target");
            (start.ctrl, start.mem)
        } else if block_preds.len() >= 2 {
            (region_of[b.index()].expect("join region"), mem_phi_of[b.index()].expect("join phi"))
        } else {
            let p = block_preds[0];
            let ctrl = edge_ctrl(sem, p, b, &ctrl_of, &projs);
            let mem = out_mem[p.index()]
                .expect("reverse post-order visits a forward predecessor first");
            (ctrl, mem)
        };

        ctrl_of[b.index()] = Some(in_ctrl);
        let mut mem = in_mem;

        for inst in &sem.block(b).insts {
            match inst {
                SemInst::ConstInt { dst, value } => {
                    values[dst.0 as usize] = Some(func.constant(*value));
                }
                SemInst::LoadSlot { dst, slot } => {
                    let load = func.load(in_ctrl, mem, allocas[slot.0 as usize]);
                    values[dst.0 as usize] = Some(load);
                }
                SemInst::StoreSlot { slot, src } => {
                    let value = values[src.0 as usize].expect("temporary defined before use");
                    mem = func.store(in_ctrl, mem, allocas[slot.0 as usize], value);
                }
                SemInst::Binary { op, dst, lhs, rhs } => {
                    let lhs = values[lhs.0 as usize].expect("temporary defined before use");
                    let rhs = values[rhs.0 as usize].expect("temporary defined before use");
                    let node = match op {
                        BinaryOp::Add => func.add(lhs, rhs),
                        BinaryOp::Subtract => func.sub(lhs, rhs),
                        BinaryOp::Multiply => func.mul(lhs, rhs),
                        BinaryOp::Divide => func.sdiv(lhs, rhs),
                    };
                    values[dst.0 as usize] = Some(node);
                }
            }
        }

        out_mem[b.index()] = Some(mem);

        match &sem.block(b).terminator {
            SemTerminator::Goto(_) => {}
            SemTerminator::Branch { cond, .. } => {
                let predicate = values[cond.0 as usize].expect("condition defined in its block");
                projs[b.index()] = Some(func.branch(in_ctrl, predicate));
            }
            SemTerminator::Return(value) => {
                let value = match value {
                    Some(v) => values[v.0 as usize].expect("return value defined in its block"),
                    None => func.constant(0),
                };
                returns.push((in_ctrl, mem, value));
            }
            SemTerminator::None => panic!("reachable block b{} is unterminated", b.0),
        }
    }

    // Wire the join blocks now that every predecessor edge exists.
    for &b in &order {
        let block_preds = &preds[b.index()];
        if block_preds.len() < 2 {
            continue;
        }

        let ctrls: Vec<NodeId> =
            block_preds.iter().map(|&p| edge_ctrl(sem, p, b, &ctrl_of, &projs)).collect();
        let mems: Vec<NodeId> = block_preds
            .iter()
            .map(|&p| out_mem[p.index()].expect("predecessor generated"))
            .collect();

        let region = region_of[b.index()].expect("join region");
        func.set_region_inputs(region, &ctrls);
        func.set_phi_inputs(mem_phi_of[b.index()].expect("join phi"), region, &mems);
    }

    build_end(&mut func, &returns);
    finalize(&func);
    func
}

/// The control node a `pred -> succ` edge enters through.
fn edge_ctrl(
    sem: &SemFunc,
    pred: SemBlockId,
    succ: SemBlockId,
    ctrl_of: &[Option<NodeId>],
    projs: &[Option<crate::ir::function::BranchNodes>],
) -> NodeId {
    match &sem.block(pred).terminator {
        SemTerminator::Goto(_) => ctrl_of[pred.index()].expect("predecessor generated"),
        SemTerminator::Branch { then_block, else_block, .. } => {
            let projs = projs[pred.index()].expect("branch projections generated");
            if *then_block == succ {
                projs.on_true
            } else {
                assert_eq!(*else_block, succ, "edge does not match its branch");
                projs.on_false
            }
        }
        SemTerminator::Return(_) | SemTerminator::None => {
            panic!("block b{} has no outgoing edges", pred.0)
        }
    }
}

/// Builds the unique END. Multiple `return` sites merge through a region
/// with a memory phi and a value phi.
fn build_end(func: &mut Function, returns: &[(NodeId, NodeId, NodeId)]) {
    assert!(!returns.is_empty(), "lowering guarantees at least one return site");

    if let [(ctrl, mem, value)] = returns {
        func.end(*ctrl, *mem, *value);
        return;
    }

    let ctrls: Vec<NodeId> = returns.iter().map(|r| r.0).collect();
    let mems: Vec<NodeId> = returns.iter().map(|r| r.1).collect();
    let vals: Vec<NodeId> = returns.iter().map(|r| r.2).collect();

    let region = func.region();
    func.set_region_inputs(region, &ctrls);

    let mem_phi = func.phi();
    func.add_flags(mem_phi, NodeFlags::PRODUCES_MEMORY);
    func.set_phi_inputs(mem_phi, region, &mems);

    let value_phi = func.phi();
    func.set_phi_inputs(value_phi, region, &vals);

    func.end(region, mem_phi, value_phi);
}

fn reachable_blocks(sem: &SemFunc) -> Vec<bool> {
    let mut reachable = vec![false; sem.blocks.len()];
    let mut stack = vec![sem.entry()];
    while let Some(b) = stack.pop() {
        if std::mem::replace(&mut reachable[b.index()], true) {
            continue;
        }
        for succ in sem.block(b).terminator.successors() {
            stack.push(succ);
        }
    }
    reachable
}

/// Predecessor lists in a fixed order (block id, then branch then/else
/// order); this order determines region input order and thereby phi input
/// order.
fn predecessors(sem: &SemFunc, reachable: &[bool]) -> Vec<Vec<SemBlockId>> {
    let mut preds = vec![Vec::new(); sem.blocks.len()];
    for (i, block) in sem.blocks.iter().enumerate() {
        if !reachable[i] {
            continue;
        }
        let id = SemBlockId(u32::try_from(i).expect("block count fits in u32"));
        for succ in block.terminator.successors() {
            preds[succ.index()].push(id);
        }
    }
    preds
}

fn reverse_post_order(sem: &SemFunc, reachable: &[bool]) -> Vec<SemBlockId> {
    let mut seen = vec![false; sem.blocks.len()];
    let mut post = Vec::new();
    // (children_visited, block) pairs; explicit stack instead of recursion.
    let mut stack = vec![(false, sem.entry())];

    while let Some((children_visited, b)) = stack.pop() {
        if children_visited {
            post.push(b);
            continue;
        }
        if std::mem::replace(&mut seen[b.index()], true) {
            continue;
        }
        stack.push((true, b));
        for succ in sem.block(b).terminator.successors().into_iter().rev() {
            if !seen[succ.index()] && reachable[succ.index()] {
                stack.push((false, succ));
            }
        }
    }

    post.reverse();
    post
}

// tests/schedule_tests.rs
use brine::ir::generator::generate_unit;
use brine::ir::{Function, NodeFlags, NodeKind};
use brine::isel::select_x64;
use brine::lexer::{tokenize_with_errors, Lexer};
use brine::opt::Optimizer;
use brine::parser::brine_parser::BrineParser;
use brine::schedule::{run_global_code_motion, Schedule};
use brine::semantic::lowering::lower_unit;

fn target_for(source: &str) -> Function {
    let mut lexer = Lexer::new("test.c", source);
    let (tokens, lex_errors) = tokenize_with_errors(&mut lexer);
    assert!(lex_errors.is_empty());
    let (functions, parse_errors) = BrineParser::new(tokens).parse();
    assert!(parse_errors.is_empty());
    let (unit, sem_errors) = lower_unit(&functions);
    assert!(sem_errors.is_empty());

    let mut funcs = generate_unit(&unit);
    let mut optimizer = Optimizer::new();
    optimizer.optimize(&mut funcs[0]);
    select_x64(&funcs[0])
}

/// The scheduler's contract: pinned nodes sit in the block of their
/// control input; every other node's block dominates every use (with phi
/// uses counted in the predecessor block they flow in from); and blocks
/// order defs before uses, phis and block heads excepted.
fn assert_schedule_invariants(func: &Function, schedule: &Schedule) {
    let cfg = &schedule.cfg;
    let dom = &schedule.dom;

    for node in func.reachable() {
        let block = schedule.block_of(node);

        match func.kind(node) {
            NodeKind::Phi => {
                let region = func.input_node(node, 0);
                assert_eq!(block, schedule.block_of(region), "a phi lives with its region");
            }
            NodeKind::X64Branch32 | NodeKind::X64End32 => {
                let ctrl = func.input_node(node, 0);
                assert_eq!(block, cfg.block_of_head(ctrl), "{node} must stay at its control");
            }
            NodeKind::StartCtrl | NodeKind::Region | NodeKind::BranchTrue
            | NodeKind::BranchFalse => {
                assert_eq!(block, cfg.block_of_head(node));
            }
            _ => {}
        }

        for u in func.uses(node) {
            let use_block = if func.kind(u.node) == NodeKind::Phi && u.index >= 1 {
                let phi_block = schedule.block_of(u.node);
                cfg.block(phi_block).preds[(u.index - 1) as usize]
            } else {
                schedule.block_of(u.node)
            };
            assert!(
                dom.dominates(block, use_block),
                "{node} in {block} does not dominate its use in {use_block}"
            );
        }
    }

    // Per-block order: defs precede uses, except phi value inputs.
    for block in &cfg.blocks {
        let position: std::collections::HashMap<_, _> =
            block.nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        for (i, &n) in block.nodes.iter().enumerate() {
            if func.kind(n) == NodeKind::Phi {
                continue;
            }
            for input in func.node(n).ins.iter().flatten() {
                if let Some(&j) = position.get(input) {
                    assert!(j < i, "{input} is used at position {i} before its definition at {j}");
                }
            }
        }
    }
}

#[test]
fn straight_line_schedules_into_one_block() {
    let target = target_for("int main() { return 3; }");
    let schedule = run_global_code_motion(&target);

    assert_eq!(schedule.cfg.blocks.len(), 1);
    assert_schedule_invariants(&target, &schedule);
}

#[test]
fn if_else_schedules_into_a_diamond() {
    let target = target_for(
        "int main() {
            int c = 1;
            int x = 0;
            if (c) { x = 1; } else { x = 2; }
            return x;
        }",
    );
    let schedule = run_global_code_motion(&target);
    assert_schedule_invariants(&target, &schedule);

    // entry, two arms, join.
    assert_eq!(schedule.cfg.blocks.len(), 4);
    let join = schedule
        .cfg
        .blocks
        .iter()
        .position(|b| b.preds.len() == 2)
        .expect("the join block has two predecessors");
    assert!(schedule.cfg.blocks[join].succs.is_empty(), "the join block returns");
}

#[test]
fn while_loop_schedules_with_a_back_edge() {
    let target = target_for(
        "int main() {
            int x = 10;
            while (x) { x = x - 1; }
            return x;
        }",
    );
    let schedule = run_global_code_motion(&target);
    assert_schedule_invariants(&target, &schedule);

    let head = schedule
        .cfg
        .blocks
        .iter()
        .enumerate()
        .find(|(_, b)| b.preds.len() == 2)
        .map(|(i, _)| i)
        .expect("the loop head joins entry and latch");

    // The head dominates its latch, and the latch jumps back.
    let head_id = brine::schedule::BlockId(head as u32);
    let latch = schedule.cfg.blocks[head].preds[1];
    assert!(schedule.dom.dominates(head_id, latch));
    assert!(schedule.cfg.blocks[latch.index()].succs.contains(&head_id));
}

#[test]
fn unpinned_nodes_sink_to_their_use() {
    let target = target_for(
        "int main() {
            int x = 10;
            int y = 0;
            while (x) { x = x - 1; }
            y = x + 5;
            return y;
        }",
    );
    let schedule = run_global_code_motion(&target);
    assert_schedule_invariants(&target, &schedule);

    // `x + 5` survives as an immediate add (its operand is the loop phi)
    // used only by the return; late placement puts it in the exit block
    // with the end, not in the entry or the loop.
    let add = target
        .reachable()
        .into_iter()
        .find(|&n| target.kind(n) == NodeKind::X64Add32Ri)
        .expect("the exit add survives optimization");
    assert_eq!(schedule.block_of(add), schedule.block_of(target.end_node()));
    assert_ne!(schedule.block_of(add), schedule.cfg.entry);
}

#[test]
fn pinned_flags_are_respected() {
    let target = target_for("int main() { int x = 2; if (x) { x = 3; } return x; }");
    let schedule = run_global_code_motion(&target);

    for node in target.reachable() {
        if target.flags(node).contains(NodeFlags::PINNED)
            && !target.flags(node).intersects(NodeFlags::CFG | NodeFlags::PROJ)
            && target.kind(node) != NodeKind::StartMem
        {
            // Value/memory phis: pinned to their region's block.
            let ctrl = target.input_node(node, 0);
            assert_eq!(schedule.block_of(node), schedule.block_of(ctrl));
        }
    }
}

// tests/isel_tests.rs
use brine::ir::generator::generate_unit;
use brine::ir::{Function, NodeData, NodeId, NodeKind};
use brine::isel::select_x64;
use brine::lexer::{tokenize_with_errors, Lexer};
use brine::parser::brine_parser::BrineParser;
use brine::semantic::lowering::lower_unit;

fn kind_count(func: &Function, kind: NodeKind) -> usize {
    func.reachable().iter().filter(|&&n| func.kind(n) == kind).count()
}

fn find_kind(func: &Function, kind: NodeKind) -> Option<NodeId> {
    func.reachable().into_iter().find(|&n| func.kind(n) == kind)
}

/// Property: after selection only target kinds and the structural
/// leftovers remain.
fn assert_selector_coverage(target: &Function) {
    for node in target.reachable() {
        let kind = target.kind(node);
        assert!(
            kind.is_target()
                || matches!(
                    kind,
                    NodeKind::Start
                        | NodeKind::StartCtrl
                        | NodeKind::StartMem
                        | NodeKind::Region
                        | NodeKind::Phi
                        | NodeKind::Alloca
                        | NodeKind::BranchTrue
                        | NodeKind::BranchFalse
                ),
            "{} survived selection",
            kind.label()
        );
    }
}

#[test]
fn constant_return_selects_to_mov_and_end() {
    let mut func = Function::new("f");
    let start = func.start();
    let value = func.constant(42);
    func.end(start.ctrl, start.mem, value);

    let target = select_x64(&func);
    assert_selector_coverage(&target);

    let end = target.end_node();
    assert_eq!(target.kind(end), NodeKind::X64End32);

    let mov = find_kind(&target, NodeKind::X64Mov32Ri).expect("constant becomes mov32_ri");
    assert_eq!(target.data(mov), NodeData::Imm32(42));
    assert_eq!(target.input(end, 2), Some(mov));
}

#[test]
fn constant_operand_selects_immediate_add() {
    let mut func = Function::new("f");
    let start = func.start();
    let slot = func.alloca();
    let load = func.load(start.ctrl, start.mem, slot);
    let five = func.constant(5);
    let sum = func.add(load, five);
    func.end(start.ctrl, start.mem, sum);

    let target = select_x64(&func);
    assert_selector_coverage(&target);

    let add = find_kind(&target, NodeKind::X64Add32Ri).expect("immediate form wins");
    assert_eq!(target.data(add), NodeData::Imm32(5));
    assert_eq!(kind_count(&target, NodeKind::X64Add32Rr), 0);
    assert_eq!(kind_count(&target, NodeKind::X64Mov32Rm), 1, "the load lowers to a slot read");
}

#[test]
fn division_is_wrapped_in_a_kill() {
    let mut func = Function::new("f");
    let start = func.start();
    let a = func.alloca();
    let b = func.alloca();
    let lhs = func.load(start.ctrl, start.mem, a);
    let rhs = func.load(start.ctrl, start.mem, b);
    let quotient = func.sdiv(lhs, rhs);
    func.end(start.ctrl, start.mem, quotient);

    let target = select_x64(&func);
    assert_selector_coverage(&target);

    let kill = find_kind(&target, NodeKind::X64Kill32).expect("sdiv selects through kill32");
    let idiv = target.input_node(kill, 0);
    assert_eq!(target.kind(idiv), NodeKind::X64Idiv32Rr);
    assert_eq!(target.input(target.end_node(), 2), Some(kill));
}

#[test]
fn stores_pick_register_or_immediate_forms() {
    let mut func = Function::new("f");
    let start = func.start();
    let slot = func.alloca();

    let seven = func.constant(7);
    let immediate_store = func.store(start.ctrl, start.mem, slot, seven);

    let load = func.load(start.ctrl, immediate_store, slot);
    let one = func.constant(1);
    let sum = func.add(load, one);
    let register_store = func.store(start.ctrl, immediate_store, slot, sum);
    let zero = func.constant(0);
    func.end(start.ctrl, register_store, zero);

    let target = select_x64(&func);
    assert_selector_coverage(&target);

    let mi = find_kind(&target, NodeKind::X64Mov32Mi).expect("constant store is mov32_mi");
    assert_eq!(target.data(mi), NodeData::Imm32(7));
    assert_eq!(kind_count(&target, NodeKind::X64Mov32Mr), 1);
}

#[test]
fn shared_subtree_becomes_a_single_root() {
    let mut func = Function::new("f");
    let start = func.start();
    let slot = func.alloca();
    let a = func.load(start.ctrl, start.mem, slot);
    let b = func.load(start.ctrl, start.mem, slot);
    let sum = func.add(a, b);
    // Two users make the add a selection root of its own.
    let square = func.mul(sum, sum);
    func.end(start.ctrl, start.mem, square);

    let target = select_x64(&func);
    assert_selector_coverage(&target);

    assert_eq!(kind_count(&target, NodeKind::X64Add32Rr), 1);
    let mul = find_kind(&target, NodeKind::X64Mul32Rr).expect("selected");
    let add = find_kind(&target, NodeKind::X64Add32Rr).expect("selected");
    assert_eq!(target.input(mul, 0), Some(add));
    assert_eq!(target.input(mul, 1), Some(add));
}

#[test]
fn constants_rematerialize_per_tree() {
    let mut func = Function::new("f");
    let start = func.start();
    let slot = func.alloca();
    let c = func.constant(5);
    let a = func.load(start.ctrl, start.mem, slot);
    let b = func.load(start.ctrl, start.mem, slot);
    // The constant sits in leaf position of two separate roots' trees.
    let t1 = func.add(c, a);
    let t2 = func.add(c, b);
    let product = func.mul(t1, t2);
    let u = func.mul(product, t1);
    let _ = u;
    func.end(start.ctrl, start.mem, product);

    let target = select_x64(&func);
    assert_eq!(
        kind_count(&target, NodeKind::X64Mov32Ri),
        2,
        "constants are never roots: each consuming tree gets its own copy"
    );
}

#[test]
fn branchy_program_selects_completely() {
    let source = "
        int main() {
            int x = 1;
            int y = 0;
            if (x) {
                y = x + 2;
            } else {
                y = x * 3;
            }
            while (y) {
                y = y - 1;
            }
            return y;
        }
    ";
    let mut lexer = Lexer::new("test.c", source);
    let (tokens, lex_errors) = tokenize_with_errors(&mut lexer);
    assert!(lex_errors.is_empty());
    let (functions, parse_errors) = BrineParser::new(tokens).parse();
    assert!(parse_errors.is_empty());
    let (unit, sem_errors) = lower_unit(&functions);
    assert!(sem_errors.is_empty());

    // Selection must cover the raw, unoptimized graph too.
    let funcs = generate_unit(&unit);
    let target = select_x64(&funcs[0]);
    assert_selector_coverage(&target);

    assert!(kind_count(&target, NodeKind::X64Branch32) >= 2);
    assert_eq!(target.kind(target.end_node()), NodeKind::X64End32);
}

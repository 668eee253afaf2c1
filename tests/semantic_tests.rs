// tests/semantic_tests.rs
use brine::lexer::{tokenize_with_errors, Lexer};
use brine::parser::brine_parser::BrineParser;
use brine::semantic::lowering::lower_unit;
use brine::semantic::unit::{SemTerminator, SemUnit};

fn lower(source: &str) -> (SemUnit, Vec<String>) {
    let mut lexer = Lexer::new("test.c", source);
    let (tokens, lex_errors) = tokenize_with_errors(&mut lexer);
    assert!(lex_errors.is_empty(), "{lex_errors:?}");
    let (functions, parse_errors) = BrineParser::new(tokens).parse();
    assert!(parse_errors.is_empty(), "{parse_errors:?}");
    let (unit, errors) = lower_unit(&functions);
    (unit, errors.iter().map(|e| e.to_string()).collect())
}

#[test]
fn variables_become_slots() {
    let (unit, errors) = lower("int main() { int a = 1; int b = 2; return a + b; }");
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(unit.funcs[0].num_slots, 2);
}

#[test]
fn undeclared_variable_is_reported() {
    let (_, errors) = lower("int main() { return y; }");
    assert!(errors.iter().any(|e| e.contains("undeclared variable 'y'")), "{errors:?}");
}

#[test]
fn assignment_to_undeclared_variable_is_reported() {
    let (_, errors) = lower("int main() { y = 1; return 0; }");
    assert!(errors.iter().any(|e| e.contains("undeclared variable 'y'")), "{errors:?}");
}

#[test]
fn duplicate_declaration_in_one_scope_is_reported() {
    let (_, errors) = lower("int main() { int x = 1; int x = 2; return x; }");
    assert!(errors.iter().any(|e| e.contains("already declared")), "{errors:?}");
}

#[test]
fn shadowing_in_an_inner_scope_is_allowed() {
    let (unit, errors) = lower("int main() { int x = 1; { int x = 2; } return x; }");
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(unit.funcs[0].num_slots, 2, "the shadow gets its own slot");
}

#[test]
fn inner_declarations_do_not_escape_their_block() {
    let (_, errors) = lower("int main() { { int x = 1; } return x; }");
    assert!(errors.iter().any(|e| e.contains("undeclared variable 'x'")), "{errors:?}");
}

#[test]
fn missing_return_falls_back_to_zero() {
    let (unit, errors) = lower("int main() { int x = 1; }");
    assert!(errors.is_empty(), "{errors:?}");

    let last_reachable_return = unit.funcs[0]
        .blocks
        .iter()
        .any(|b| matches!(b.terminator, SemTerminator::Return(Some(_))));
    assert!(last_reachable_return, "lowering appends an implicit return 0");
}

#[test]
fn while_builds_the_expected_block_shape() {
    let (unit, errors) = lower("int main() { int x = 3; while (x) { x = x - 1; } return x; }");
    assert!(errors.is_empty(), "{errors:?}");

    let func = &unit.funcs[0];
    // entry, loop head, body, exit.
    assert_eq!(func.blocks.len(), 4);
    let head = &func.blocks[1];
    assert!(matches!(head.terminator, SemTerminator::Branch { .. }));
    // The body jumps back to the head.
    assert!(func
        .blocks
        .iter()
        .any(|b| matches!(b.terminator, SemTerminator::Goto(t) if t.0 == 1)));
}

#[test]
fn code_after_return_lands_in_an_unreachable_block() {
    let (unit, errors) = lower("int main() { return 1; return 2; }");
    assert!(errors.is_empty(), "{errors:?}");
    assert!(unit.funcs[0].blocks.len() >= 2);
    assert!(matches!(unit.funcs[0].blocks[0].terminator, SemTerminator::Return(Some(_))));
}

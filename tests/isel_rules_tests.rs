// tests/isel_rules_tests.rs
use brine::ir::NodeKind;
use brine::isel::rules::{parse_payload, RuleTable, x64_rules};

#[test]
fn embedded_table_parses() {
    let table = x64_rules();
    assert!(table.operator_count() >= 8);
    assert!(table.rule_count() >= 11);
    assert_eq!(table.rules_for(NodeKind::Branch).len(), 1);
    assert_eq!(table.rules_for(NodeKind::Store).len(), 2);
    // Structural kinds have no rules and fall back to the default clone.
    assert!(table.rules_for(NodeKind::Region).is_empty());
    assert!(table.rules_for(NodeKind::Phi).is_empty());
}

#[test]
fn more_specific_rules_match_first() {
    let table = x64_rules();

    // store(..., constant()) counts two subtrees, plain store one.
    let store_rules = table.rules_for(NodeKind::Store);
    assert!(store_rules[0].subtree_count > store_rules[1].subtree_count);

    let add_rules = table.rules_for(NodeKind::Add);
    assert!(add_rules[0].subtree_count > add_rules[1].subtree_count);
}

#[test]
fn declaration_order_breaks_ties() {
    let text = "
        add(lhs, rhs) -> add32_rr(lhs, rhs)
        add(a, b) -> sub32_rr(a, b)
    ";
    let table = RuleTable::parse(text).expect("parses");
    let rules = table.rules_for(NodeKind::Add);
    assert_eq!(rules.len(), 2);
    // Same subtree count: the earlier declaration keeps priority.
    assert_eq!(rules[0].id, 0);
    assert_eq!(rules[1].id, 1);
}

#[test]
fn render_round_trips() {
    let table = x64_rules();
    let rendered = table.render();
    let reparsed = RuleTable::parse(&rendered).expect("rendered table parses");
    assert_eq!(reparsed.rule_count(), table.rule_count());
    assert_eq!(reparsed.operator_count(), table.operator_count());
}

#[test]
fn comments_and_case_are_accepted() {
    let text = "
        // a comment
        ADD(lhs, rhs) -> Add32_RR(lhs, rhs) // trailing comment
    ";
    let table = RuleTable::parse(text).expect("parses");
    assert_eq!(table.rules_for(NodeKind::Add).len(), 1);
}

#[test]
fn payload_literal_form() {
    assert_eq!(parse_payload("imm(c)"), Some("c"));
    assert_eq!(parse_payload(" imm( value ) "), Some("value"));
    assert_eq!(parse_payload("imm()"), None);
    assert_eq!(parse_payload("c"), None);
    assert_eq!(parse_payload("imm(a b)"), None);
}

fn parse_err(text: &str) -> String {
    RuleTable::parse(text).expect_err("must not parse").to_string()
}

#[test]
fn unknown_operator_is_rejected() {
    let message = parse_err("frobnicate(lhs) -> add32_rr(lhs, lhs)");
    assert!(message.contains("unknown operator"), "{message}");
}

#[test]
fn input_side_string_is_rejected() {
    let message = parse_err("add(\"imm(c)\", rhs) -> add32_rr(rhs, rhs)");
    assert!(message.contains("output patterns"), "{message}");
}

#[test]
fn unterminated_string_is_rejected() {
    let message = parse_err("constant:c -> mov32_ri(\"imm(c)");
    assert!(message.contains("unterminated"), "{message}");
}

#[test]
fn duplicate_leaf_names_are_rejected() {
    let message = parse_err("add(lhs, lhs) -> add32_rr(lhs, lhs)");
    assert!(message.contains("duplicate leaf"), "{message}");
}

#[test]
fn output_arity_is_checked() {
    let message = parse_err("add(lhs, rhs) -> add32_rr(lhs)");
    assert!(message.contains("takes 2 inputs"), "{message}");
}

#[test]
fn unknown_output_leaf_is_rejected() {
    let message = parse_err("add(lhs, rhs) -> add32_rr(lhs, other)");
    assert!(message.contains("unknown input leaf"), "{message}");
}

#[test]
fn payload_needs_a_binding() {
    let message = parse_err("add(lhs, rhs) -> add32_ri(lhs, \"imm(c)\")");
    assert!(message.contains("unknown binding"), "{message}");
}

#[test]
fn output_must_build_target_nodes() {
    let message = parse_err("add(lhs, rhs) -> add(lhs, rhs)");
    assert!(message.contains("not a target operator"), "{message}");
}

#[test]
fn rule_error_carries_the_line() {
    let error = RuleTable::parse("\n\nfrobnicate(x) -> kill32(x)").expect_err("must not parse");
    assert_eq!(error.line, 3);
}

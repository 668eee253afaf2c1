// src/isel/selector.rs
use crate::ir::function::Function;
use crate::ir::node::{NodeData, NodeFlags, NodeId, NodeKind};
use crate::ir::validator::finalize;
use crate::isel::rules::{parse_payload, Pattern, Rule, RuleTable, x64_rules};
use fixedbitset::FixedBitSet;
use std::collections::HashMap;

/// Selects the optimized source graph into x86-32 target nodes using the
/// embedded rule table.
#[must_use]
pub fn select_x64(func: &Function) -> Function {
    select(func, x64_rules())
}

/// A deferred cross-root edge: `user` (in the new function) wants input
/// `index` wired to whatever `root` (in the old function) selects to.
#[derive(Debug, Clone, Copy)]
struct RootRef {
    user: NodeId,
    index: usize,
    root: NodeId,
}

struct SelContext<'f> {
    old: &'f Function,
    new_func: Function,
    /// old node id -> selected node in the new function
    map: Vec<Option<NodeId>>,
    is_root: FixedBitSet,
    root_refs: Vec<RootRef>,
}

/// Partitions the graph into selection roots and rewrites each root's
/// subtree bottom-up into a fresh function. Kinds with rules go through
/// the table's match/select; everything else is cloned as-is. Cross-root
/// edges are recorded during selection and patched once every root has
/// been processed.
#[must_use]
pub fn select(func: &Function, table: &RuleTable) -> Function {
    let reachable = func.reachable();

    let mut is_root = FixedBitSet::with_capacity(func.node_count());
    let mut roots = Vec::new();
    for &node in &reachable {
        if should_be_root(func, node) {
            is_root.insert(node.index());
            roots.push(node);
        }
    }

    let mut ctx = SelContext {
        old: func,
        new_func: Function::new(&func.name),
        map: vec![None; func.node_count()],
        is_root,
        root_refs: Vec::new(),
    };

    let mut stack: Vec<(bool, NodeId)> = Vec::new();
    for &root in &roots {
        stack.clear();
        stack.push((false, root));

        // Post-order walk of the root's subtree, stopping at other roots.
        while let Some((ins_processed, node)) = stack.pop() {
            if !ins_processed {
                if node != root && ctx.is_root.contains(node.index()) {
                    continue;
                }
                stack.push((true, node));
                push_leaves(&ctx, table, node, &mut stack);
            } else {
                let selected = select_node(&mut ctx, table, node);
                ctx.map[node.index()] = Some(selected);
            }
        }
    }

    for root_ref in &ctx.root_refs {
        let selected = ctx.map[root_ref.root.index()]
            .unwrap_or_else(|| panic!("root {} was never selected", root_ref.root));
        ctx.new_func.set_input(root_ref.user, root_ref.index, Some(selected));
    }

    let start = func.start_nodes();
    let selected_of = |id: NodeId| {
        ctx.map[id.index()].unwrap_or_else(|| panic!("{id} was never selected"))
    };
    let (new_start, new_ctrl, new_mem) =
        (selected_of(start.start), selected_of(start.ctrl), selected_of(start.mem));
    let new_end = selected_of(func.end_node());
    ctx.new_func.adopt_start(new_start, new_ctrl, new_mem);
    ctx.new_func.adopt_end(new_end);

    let new_func = ctx.new_func;
    finalize(&new_func);
    new_func
}

/// A node starts its own selection subtree if it is control flow, a
/// projection, one of the structural kinds, or has two or more users.
/// Constants are never roots: they are rematerialized into every consuming
/// tree.
fn should_be_root(func: &Function, node: NodeId) -> bool {
    match func.kind(node) {
        NodeKind::Constant => return false,
        NodeKind::Start
        | NodeKind::End
        | NodeKind::Region
        | NodeKind::Phi
        | NodeKind::Branch => return true,
        _ => {}
    }

    if func.flags(node).intersects(NodeFlags::CFG | NodeFlags::PROJ) {
        return true;
    }

    func.uses(node).len() >= 2
}

/// Pre-visit step of the post-order walk: push the nodes the upward pass
/// will need. Rule-matched kinds push the matching pattern's wildcard
/// leaves; structural kinds push every input.
fn push_leaves(ctx: &SelContext, table: &RuleTable, node: NodeId, stack: &mut Vec<(bool, NodeId)>) {
    let kind = ctx.old.kind(node);
    let rules = table.rules_for(kind);
    if !rules.is_empty() {
        let rule = match_rule(ctx, rules, node);
        push_pattern_leaves(ctx.old, &rule.input, node, stack);
        return;
    }

    match kind {
        NodeKind::Start
        | NodeKind::StartCtrl
        | NodeKind::StartMem
        | NodeKind::Region
        | NodeKind::Phi
        | NodeKind::Alloca
        | NodeKind::BranchTrue
        | NodeKind::BranchFalse => {
            for input in ctx.old.node(node).ins.iter().flatten() {
                stack.push((false, *input));
            }
        }
        other => panic!("no selection strategy for {}", other.label()),
    }
}

fn select_node(ctx: &mut SelContext, table: &RuleTable, node: NodeId) -> NodeId {
    let rules = table.rules_for(ctx.old.kind(node));
    if rules.is_empty() {
        return default_clone(ctx, node);
    }
    let rule = match_rule(ctx, rules, node);

    let mut leaves = HashMap::new();
    let mut bindings = HashMap::new();
    bind_pattern(ctx.old, &rule.input, node, &mut leaves, &mut bindings);

    emit_output(ctx, &rule.output, &leaves, &bindings)
}

/// Picks the rule for `node`: buckets are pre-sorted by descending subtree
/// count (declaration order breaking ties), so the first match is the
/// winner of the bottom-up dynamic program.
fn match_rule<'t>(ctx: &SelContext, rules: &'t [Rule], node: NodeId) -> &'t Rule {
    rules
        .iter()
        .find(|rule| pattern_matches(ctx, &rule.input, node, true))
        .unwrap_or_else(|| {
            panic!("no selection rule matches {} {node}", ctx.old.kind(node).label())
        })
}

fn pattern_matches(ctx: &SelContext, pattern: &Pattern, node: NodeId, at_root: bool) -> bool {
    let Pattern::Op { kind, children, parenthesized, .. } = pattern else {
        unreachable!("input patterns at operator positions are always Op");
    };

    if ctx.old.kind(node) != *kind {
        return false;
    }
    // Interior pattern positions must not swallow another tree's root.
    if !at_root && ctx.is_root.contains(node.index()) {
        return false;
    }
    if !parenthesized {
        return true;
    }

    let ins = &ctx.old.node(node).ins;
    if children.len() != ins.len() {
        return false;
    }
    children.iter().zip(ins).all(|(child, input)| {
        let Some(input) = *input else { return false };
        match child {
            Pattern::Wildcard(_) => true,
            Pattern::Op { .. } => pattern_matches(ctx, child, input, false),
            Pattern::Literal(_) => unreachable!("literals cannot appear in input patterns"),
        }
    })
}

fn push_pattern_leaves(
    func: &Function,
    pattern: &Pattern,
    node: NodeId,
    stack: &mut Vec<(bool, NodeId)>,
) {
    let Pattern::Op { children, parenthesized, .. } = pattern else {
        return;
    };
    if !parenthesized {
        return;
    }
    for (i, child) in children.iter().enumerate() {
        let input = func.input_node(node, i);
        match child {
            Pattern::Wildcard(_) => stack.push((false, input)),
            Pattern::Op { .. } => push_pattern_leaves(func, child, input, stack),
            Pattern::Literal(_) => unreachable!("literals cannot appear in input patterns"),
        }
    }
}

/// Records which input node each wildcard leaf and binding matched.
fn bind_pattern(
    func: &Function,
    pattern: &Pattern,
    node: NodeId,
    leaves: &mut HashMap<String, NodeId>,
    bindings: &mut HashMap<String, NodeId>,
) {
    match pattern {
        Pattern::Wildcard(name) => {
            leaves.insert(name.clone(), node);
        }
        Pattern::Op { binding, children, parenthesized, .. } => {
            if let Some(binding) = binding {
                bindings.insert(binding.clone(), node);
            }
            if *parenthesized {
                for (i, child) in children.iter().enumerate() {
                    bind_pattern(func, child, func.input_node(node, i), leaves, bindings);
                }
            }
        }
        Pattern::Literal(_) => unreachable!("literals cannot appear in input patterns"),
    }
}

/// Builds the output tree of a matched rule: constructs target nodes, wires
/// wildcard children from the already-selected leaves (deferring across
/// roots), and lifts payload literals out of bound constants.
fn emit_output(
    ctx: &mut SelContext,
    pattern: &Pattern,
    leaves: &HashMap<String, NodeId>,
    bindings: &HashMap<String, NodeId>,
) -> NodeId {
    let Pattern::Op { kind, children, .. } = pattern else {
        unreachable!("output roots are always constructors");
    };

    let data = children
        .iter()
        .find_map(|child| match child {
            Pattern::Literal(text) => Some(payload_data(ctx.old, text, bindings)),
            _ => None,
        })
        .unwrap_or(NodeData::None);

    let new_node =
        ctx.new_func.new_node(*kind, kind.target_input_count(), kind.target_flags(), data);

    let mut slot = 0;
    for child in children {
        match child {
            Pattern::Literal(_) => {}
            Pattern::Wildcard(name) => {
                let old_input = leaves[name.as_str()];
                map_input(ctx, new_node, slot, old_input);
                slot += 1;
            }
            Pattern::Op { .. } => {
                let inner = emit_output(ctx, child, leaves, bindings);
                ctx.new_func.set_input(new_node, slot, Some(inner));
                slot += 1;
            }
        }
    }

    new_node
}

fn payload_data(func: &Function, literal: &str, bindings: &HashMap<String, NodeId>) -> NodeData {
    let binding = parse_payload(literal).expect("payload literals are validated at parse time");
    let bound = bindings[binding];
    match func.data(bound) {
        NodeData::Constant(value) => NodeData::Imm32(value as u32 as i32),
        other => panic!("payload binding '{binding}' matched a node carrying {other:?}"),
    }
}

/// Fallback for kinds with no rules: a fresh node of the same kind, flags
/// and payload, with each input mapped (or deferred, for roots).
fn default_clone(ctx: &mut SelContext, node: NodeId) -> NodeId {
    let old = ctx.old.node(node);
    let clone = ctx.new_func.new_node(old.kind, old.ins.len(), old.flags, old.data);

    for index in 0..old.ins.len() {
        if let Some(input) = old.ins[index] {
            map_input(ctx, clone, index, input);
        }
    }
    clone
}

/// Wires `user`'s input either directly (subtree-local) or through the
/// deferred cross-root patch list.
fn map_input(ctx: &mut SelContext, user: NodeId, index: usize, old_input: NodeId) {
    if ctx.is_root.contains(old_input.index()) {
        ctx.root_refs.push(RootRef { user, index, root: old_input });
    } else {
        let selected = ctx.map[old_input.index()]
            .unwrap_or_else(|| panic!("{old_input} used before being selected"));
        ctx.new_func.set_input(user, index, Some(selected));
    }
}

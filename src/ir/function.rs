// src/ir/function.rs
use crate::ir::node::{Node, NodeData, NodeFlags, NodeId, NodeKind, Use};
use std::collections::HashMap;

/// The three results of building a function's start: the `START` node itself
/// plus its pinned control and memory projections.
#[derive(Debug, Clone, Copy)]
pub struct StartNodes {
    pub start: NodeId,
    pub ctrl: NodeId,
    pub mem: NodeId,
}

/// A branch plus its two pinned projections.
#[derive(Debug, Clone, Copy)]
pub struct BranchNodes {
    pub branch: NodeId,
    pub on_true: NodeId,
    pub on_false: NodeId,
}

/// One function's node graph. All nodes live in the function's node store
/// and are addressed by dense [`NodeId`]s; edges are input-slot indices plus
/// mirrored use records. Dropping the function frees every node.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    nodes: Vec<Node>,
    start: Option<StartNodes>,
    end: Option<NodeId>,
    /// Value-interned constants: one `CONSTANT` node per distinct payload,
    /// so equal literals are the same node and phis over them collapse.
    constants: HashMap<u64, NodeId>,
}

impl Function {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: Vec::new(),
            start: None,
            end: None,
            constants: HashMap::new(),
        }
    }

    /// Number of node ids ever allocated, tombstones included. Side tables
    /// indexed by node id are sized with this.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    #[must_use]
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.nodes[id.index()].flags
    }

    #[must_use]
    pub fn data(&self, id: NodeId) -> NodeData {
        self.nodes[id.index()].data
    }

    #[must_use]
    pub fn uses(&self, id: NodeId) -> &[Use] {
        &self.nodes[id.index()].uses
    }

    #[must_use]
    pub fn input(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[id.index()].input(index)
    }

    /// Input that must be present; panics on a still-unset slot.
    #[must_use]
    pub fn input_node(&self, id: NodeId, index: usize) -> NodeId {
        self.input(id, index)
            .unwrap_or_else(|| panic!("{}'s input {index} is unset", self.kind(id).label()))
    }

    pub fn add_flags(&mut self, id: NodeId, flags: NodeFlags) {
        let node = &mut self.nodes[id.index()];
        node.flags = node.flags | flags;
    }

    // Raw node construction. Inputs start out as the "none" sentinel and
    // are installed through `set_input` so use lists stay consistent.
    pub fn new_node(
        &mut self,
        kind: NodeKind,
        num_ins: usize,
        flags: NodeFlags,
        data: NodeData,
    ) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("node count fits in u32"));
        self.nodes.push(Node { kind, flags, ins: vec![None; num_ins], uses: Vec::new(), data });
        id
    }

    /// Sets `node`'s input slot `index`, maintaining use-list duality: the
    /// old input (if any) loses its use record, the new one gains it.
    ///
    /// # Panics
    /// Panics if `index` is out of range for the node.
    pub fn set_input(&mut self, node: NodeId, index: usize, input: Option<NodeId>) {
        let num_ins = self.nodes[node.index()].ins.len();
        assert!(
            index < num_ins,
            "input index {index} out of range for {} with {num_ins} inputs",
            self.kind(node).label()
        );

        let old = self.nodes[node.index()].ins[index];
        if old == input {
            return;
        }

        if let Some(old) = old {
            self.remove_use(old, node, index);
        }
        self.nodes[node.index()].ins[index] = input;
        if let Some(new) = input {
            let index = u32::try_from(index).expect("input index fits in u32");
            self.nodes[new.index()].uses.push(Use { node, index });
        }
    }

    fn remove_use(&mut self, of: NodeId, user: NodeId, index: usize) {
        let uses = &mut self.nodes[of.index()].uses;
        let position = uses
            .iter()
            .position(|u| u.node == user && u.index as usize == index)
            .unwrap_or_else(|| {
                panic!("use list of {of} is missing the record for {user} input {index}")
            });
        uses.swap_remove(position);
    }

    fn assert_ctrl(&self, id: NodeId, role: &str) {
        assert!(
            self.flags(id).contains(NodeFlags::CFG),
            "{} input must be a control node, got {}",
            role,
            self.kind(id).label()
        );
    }

    fn assert_value(&self, id: NodeId, role: &str) {
        assert!(
            !self.flags(id).contains(NodeFlags::CFG),
            "{} input must be a value node, got {}",
            role,
            self.kind(id).label()
        );
    }

    // Builders for each source node kind.

    /// Creates the unique `START` node and its control/memory projections.
    ///
    /// # Panics
    /// Panics if the function already has a start.
    pub fn start(&mut self) -> StartNodes {
        assert!(self.start.is_none(), "function {} already has a START node", self.name);

        let start = self.new_node(
            NodeKind::Start,
            0,
            NodeFlags::CFG | NodeFlags::LEAF,
            NodeData::None,
        );
        let ctrl = self.new_node(
            NodeKind::StartCtrl,
            1,
            NodeFlags::CFG | NodeFlags::PROJ | NodeFlags::PINNED,
            NodeData::None,
        );
        self.set_input(ctrl, 0, Some(start));
        let mem = self.new_node(
            NodeKind::StartMem,
            1,
            NodeFlags::PROJ | NodeFlags::PINNED,
            NodeData::None,
        );
        self.set_input(mem, 0, Some(start));

        let nodes = StartNodes { start, ctrl, mem };
        self.start = Some(nodes);
        nodes
    }

    /// Creates the unique `END` node.
    ///
    /// # Panics
    /// Panics if an END was already constructed for this function.
    pub fn end(&mut self, ctrl: NodeId, mem: NodeId, value: NodeId) -> NodeId {
        assert!(self.end.is_none(), "function {} already has an END node", self.name);
        self.assert_ctrl(ctrl, "END ctrl");

        let end = self.new_node(NodeKind::End, 3, NodeFlags::CFG | NodeFlags::PINNED, NodeData::None);
        self.set_input(end, 0, Some(ctrl));
        self.set_input(end, 1, Some(mem));
        self.set_input(end, 2, Some(value));
        self.end = Some(end);
        end
    }

    /// Creates a `REGION` with no predecessors yet; install them later with
    /// [`Function::set_region_inputs`]. This is how construction breaks the
    /// graph's control cycles.
    pub fn region(&mut self) -> NodeId {
        self.new_node(NodeKind::Region, 0, NodeFlags::CFG, NodeData::None)
    }

    pub fn set_region_inputs(&mut self, region: NodeId, ins: &[NodeId]) {
        assert_eq!(self.kind(region), NodeKind::Region, "set_region_inputs needs a REGION");
        assert!(
            self.node(region).ins.is_empty(),
            "region {region} already has its predecessors installed"
        );
        assert!(!ins.is_empty(), "a region needs at least one predecessor");

        self.nodes[region.index()].ins = vec![None; ins.len()];
        for (i, &input) in ins.iter().enumerate() {
            self.assert_ctrl(input, "REGION predecessor");
            self.set_input(region, i, Some(input));
        }
    }

    /// Creates a `PHI` placeholder with no inputs; wire it with
    /// [`Function::set_phi_inputs`] once its region's predecessors exist.
    pub fn phi(&mut self) -> NodeId {
        self.new_node(NodeKind::Phi, 0, NodeFlags::PINNED, NodeData::None)
    }

    /// Installs a phi's region and value inputs together, keeping the
    /// one-more-input-than-the-region invariant by construction.
    pub fn set_phi_inputs(&mut self, phi: NodeId, region: NodeId, values: &[NodeId]) {
        assert_eq!(self.kind(phi), NodeKind::Phi, "set_phi_inputs needs a PHI");
        assert_eq!(self.kind(region), NodeKind::Region, "a PHI's first input must be a REGION");
        assert!(self.node(phi).ins.is_empty(), "phi {phi} already has its inputs installed");
        assert_eq!(
            values.len(),
            self.node(region).ins.len(),
            "a phi carries one value per region predecessor"
        );

        self.nodes[phi.index()].ins = vec![None; 1 + values.len()];
        self.set_input(phi, 0, Some(region));
        for (i, &value) in values.iter().enumerate() {
            self.set_input(phi, 1 + i, Some(value));
        }
    }

    /// Creates a `BRANCH` on `predicate != 0` plus its two projections.
    pub fn branch(&mut self, ctrl: NodeId, predicate: NodeId) -> BranchNodes {
        self.assert_ctrl(ctrl, "BRANCH ctrl");
        self.assert_value(predicate, "BRANCH predicate");

        let branch = self.new_node(
            NodeKind::Branch,
            2,
            NodeFlags::CFG | NodeFlags::PINNED,
            NodeData::None,
        );
        self.set_input(branch, 0, Some(ctrl));
        self.set_input(branch, 1, Some(predicate));

        let proj_flags = NodeFlags::CFG | NodeFlags::PROJ | NodeFlags::PINNED;
        let on_true = self.new_node(NodeKind::BranchTrue, 1, proj_flags, NodeData::None);
        self.set_input(on_true, 0, Some(branch));
        let on_false = self.new_node(NodeKind::BranchFalse, 1, proj_flags, NodeData::None);
        self.set_input(on_false, 0, Some(branch));

        BranchNodes { branch, on_true, on_false }
    }

    pub fn constant(&mut self, value: u64) -> NodeId {
        if let Some(&id) = self.constants.get(&value) {
            return id;
        }
        let id = self.new_node(NodeKind::Constant, 0, NodeFlags::LEAF, NodeData::Constant(value));
        self.constants.insert(value, id);
        id
    }

    pub fn alloca(&mut self) -> NodeId {
        self.new_node(NodeKind::Alloca, 0, NodeFlags::LEAF, NodeData::None)
    }

    pub fn load(&mut self, ctrl: NodeId, mem: NodeId, addr: NodeId) -> NodeId {
        self.assert_ctrl(ctrl, "LOAD ctrl");

        let load = self.new_node(NodeKind::Load, 3, NodeFlags::READS_MEMORY, NodeData::None);
        self.set_input(load, 0, Some(ctrl));
        self.set_input(load, 1, Some(mem));
        self.set_input(load, 2, Some(addr));
        load
    }

    pub fn store(&mut self, ctrl: NodeId, mem: NodeId, addr: NodeId, value: NodeId) -> NodeId {
        self.assert_ctrl(ctrl, "STORE ctrl");
        self.assert_value(value, "STORE value");

        let store = self.new_node(NodeKind::Store, 4, NodeFlags::PRODUCES_MEMORY, NodeData::None);
        self.set_input(store, 0, Some(ctrl));
        self.set_input(store, 1, Some(mem));
        self.set_input(store, 2, Some(addr));
        self.set_input(store, 3, Some(value));
        store
    }

    fn binary(&mut self, kind: NodeKind, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.assert_value(lhs, "binary lhs");
        self.assert_value(rhs, "binary rhs");

        let node = self.new_node(kind, 2, NodeFlags::NONE, NodeData::None);
        self.set_input(node, 0, Some(lhs));
        self.set_input(node, 1, Some(rhs));
        node
    }

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(NodeKind::Add, lhs, rhs)
    }

    pub fn sub(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(NodeKind::Sub, lhs, rhs)
    }

    pub fn mul(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(NodeKind::Mul, lhs, rhs)
    }

    pub fn sdiv(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(NodeKind::Sdiv, lhs, rhs)
    }

    // Start/end access.

    #[must_use]
    pub fn start_nodes(&self) -> StartNodes {
        self.start.expect("function has no START node yet")
    }

    #[must_use]
    pub fn end_node(&self) -> NodeId {
        self.end.expect("function has no END node yet")
    }

    #[must_use]
    pub fn has_end(&self) -> bool {
        self.end.is_some()
    }

    /// Adopts start nodes created through `new_node`, as the instruction
    /// selector does when cloning another function's start family.
    pub fn adopt_start(&mut self, start: NodeId, ctrl: NodeId, mem: NodeId) {
        assert!(self.start.is_none(), "function {} already has a START node", self.name);
        self.start = Some(StartNodes { start, ctrl, mem });
    }

    /// Adopts an end node created through `new_node` (the selector's
    /// `X64_END32`).
    pub fn adopt_end(&mut self, end: NodeId) {
        assert!(self.end.is_none(), "function {} already has an END node", self.name);
        self.end = Some(end);
    }

    /// Every node reachable from END by walking inputs transitively, in an
    /// unspecified order. END itself is included.
    #[must_use]
    pub fn reachable(&self) -> Vec<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.end_node()];
        let mut out = Vec::new();

        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            out.push(id);
            for input in self.nodes[id.index()].ins.iter().flatten() {
                if !seen[input.index()] {
                    stack.push(*input);
                }
            }
        }
        out
    }

    // Mutation primitives used by the optimizer's replace/collect.

    /// Moves every use of `target` over to `source`, updating the users'
    /// input slots. Returns the affected user ids (so callers can requeue
    /// them). `target` is left with an empty use list.
    pub(crate) fn rewire_uses(&mut self, target: NodeId, source: NodeId) -> Vec<NodeId> {
        assert_ne!(target, source, "cannot rewire a node onto itself");

        let uses = std::mem::take(&mut self.nodes[target.index()].uses);
        let mut affected = Vec::with_capacity(uses.len());
        for u in uses {
            let slot = &mut self.nodes[u.node.index()].ins[u.index as usize];
            assert_eq!(*slot, Some(target), "use record out of sync with input slot");
            *slot = Some(source);
            self.nodes[source.index()].uses.push(u);
            affected.push(u.node);
        }
        affected
    }

    /// Detaches all of `node`'s inputs, returning the inputs that became
    /// dead (empty use list) in the process.
    pub(crate) fn detach_inputs(&mut self, node: NodeId) -> Vec<NodeId> {
        let mut now_dead = Vec::new();
        for index in 0..self.nodes[node.index()].ins.len() {
            let Some(input) = self.nodes[node.index()].ins[index] else { continue };
            self.remove_use(input, node, index);
            self.nodes[node.index()].ins[index] = None;
            if self.nodes[input.index()].uses.is_empty() {
                now_dead.push(input);
            }
        }
        now_dead
    }

    /// Turns a fully detached node into a tombstone. The id stays allocated;
    /// nothing may reference it afterwards.
    pub(crate) fn tombstone(&mut self, node: NodeId) {
        if self.nodes[node.index()].kind == NodeKind::Constant {
            if let NodeData::Constant(value) = self.nodes[node.index()].data {
                self.constants.remove(&value);
            }
        }
        let n = &mut self.nodes[node.index()];
        assert!(n.uses.is_empty(), "tombstoning {node} while it still has uses");
        assert!(n.ins.iter().all(Option::is_none), "tombstoning {node} with attached inputs");
        n.kind = NodeKind::Uninitialized;
        n.flags = NodeFlags::NONE;
        n.data = NodeData::None;
        n.ins.clear();
    }
}

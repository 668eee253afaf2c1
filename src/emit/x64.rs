// src/emit/x64.rs
use crate::emit::inst::{format_reg, Inst, VReg, EAX, EDX, FIRST_VR, NULL_REG};
use crate::emit::liveness::compute_live_out;
use crate::ir::function::Function;
use crate::ir::node::{NodeData, NodeFlags, NodeId, NodeKind, END_VALUE};
use crate::schedule::cfg::branch_projection;
use crate::schedule::gcm::Schedule;
use crate::schedule::BlockId;
use fixedbitset::FixedBitSet;
use std::fmt::Write as _;

/// One emitted basic block: its code, how many trailing instructions are
/// terminators (phi copies go in front of them), and the CFG shape
/// liveness needs.
#[derive(Debug, Clone)]
pub struct MachineBlock {
    pub id: BlockId,
    pub code: Vec<Inst>,
    pub terminator_count: usize,
    pub succs: Vec<BlockId>,
    pub preds: Vec<BlockId>,
}

/// The emitter's result: virtual-register machine code per block plus the
/// live-out set of every block.
#[derive(Debug, Clone)]
pub struct MachineFunction {
    pub name: String,
    pub blocks: Vec<MachineBlock>,
    pub live_out: Vec<FixedBitSet>,
    pub num_regs: VReg,
}

struct GenContext {
    /// node id -> the virtual register holding its value (or NULL_REG)
    reg_map: Vec<VReg>,
    next_reg: VReg,
    /// node id -> stack slot, for allocas
    alloca_map: Vec<Option<u32>>,
    next_slot: u32,
    /// value phis, remembered for resolution after all blocks exist
    phis: Vec<NodeId>,
}

impl GenContext {
    fn new_reg(&mut self) -> VReg {
        let reg = self.next_reg;
        self.next_reg += 1;
        reg
    }

    fn reg(&self, node: NodeId) -> VReg {
        let reg = self.reg_map[node.index()];
        assert_ne!(reg, NULL_REG, "{node} produces no register value");
        reg
    }

    fn slot(&self, node: NodeId) -> u32 {
        self.alloca_map[node.index()].unwrap_or_else(|| panic!("{node} is not an alloca"))
    }
}

/// Lowers a scheduled target function to machine instructions. Blocks are
/// generated in dominator-tree pre-order so every definition is assigned
/// its register before any dominated use reads it; phis are the exception
/// and are resolved through predecessor copies afterwards.
#[must_use]
pub fn generate_x64(func: &Function, schedule: &Schedule) -> MachineFunction {
    let cfg = &schedule.cfg;

    let mut blocks: Vec<MachineBlock> = cfg
        .blocks
        .iter()
        .enumerate()
        .map(|(i, block)| MachineBlock {
            id: BlockId(i as u32),
            code: Vec::new(),
            terminator_count: 0,
            succs: block.succs.clone(),
            preds: block.preds.clone(),
        })
        .collect();

    let mut ctx = GenContext {
        reg_map: vec![NULL_REG; func.node_count()],
        next_reg: FIRST_VR,
        alloca_map: vec![None; func.node_count()],
        next_slot: 0,
        phis: Vec::new(),
    };

    for block_id in schedule.dom.preorder() {
        let mb = &mut blocks[block_id.index()];
        for &node in &cfg.block(block_id).nodes {
            let reg = gen_node(&mut ctx, func, schedule, node, mb);
            ctx.reg_map[node.index()] = reg;
        }

        // A single successor means fallthrough: close the block with an
        // unconditional jump.
        if mb.succs.len() == 1 {
            let target = mb.succs[0];
            mb.code.push(Inst::Jmp { target });
            mb.terminator_count = 1;
        }
    }

    resolve_phis(&mut ctx, func, schedule, &mut blocks);

    let live_out = compute_live_out(&blocks, ctx.next_reg);
    MachineFunction { name: func.name.clone(), blocks, live_out, num_regs: ctx.next_reg }
}

fn gen_node(
    ctx: &mut GenContext,
    func: &Function,
    schedule: &Schedule,
    node: NodeId,
    mb: &mut MachineBlock,
) -> VReg {
    let in_reg = |ctx: &GenContext, index: usize| ctx.reg(func.input_node(node, index));

    match func.kind(node) {
        NodeKind::Start
        | NodeKind::StartCtrl
        | NodeKind::StartMem
        | NodeKind::Region
        | NodeKind::BranchTrue
        | NodeKind::BranchFalse => NULL_REG,

        NodeKind::Alloca => {
            ctx.alloca_map[node.index()] = Some(ctx.next_slot);
            ctx.next_slot += 1;
            NULL_REG
        }

        NodeKind::Phi => {
            if func.flags(node).contains(NodeFlags::PRODUCES_MEMORY) {
                return NULL_REG;
            }
            let reg = ctx.new_reg();
            ctx.phis.push(node);
            reg
        }

        NodeKind::X64Mov32Ri => {
            let dst = ctx.new_reg();
            mb.code.push(Inst::MovRi { dst, imm: imm_of(func, node) });
            dst
        }

        NodeKind::X64Mov32Rr => {
            let dst = ctx.new_reg();
            let src = in_reg(ctx, 0);
            mb.code.push(Inst::MovRr { dst, src });
            dst
        }

        NodeKind::X64Mov32Rm => {
            let dst = ctx.new_reg();
            let slot = ctx.slot(func.input_node(node, 2));
            mb.code.push(Inst::MovRm { dst, slot });
            dst
        }

        NodeKind::X64Mov32Mr => {
            let slot = ctx.slot(func.input_node(node, 2));
            let src = in_reg(ctx, 3);
            mb.code.push(Inst::MovMr { slot, src });
            NULL_REG
        }

        NodeKind::X64Mov32Mi => {
            let slot = ctx.slot(func.input_node(node, 2));
            mb.code.push(Inst::MovMi { slot, imm: imm_of(func, node) });
            NULL_REG
        }

        NodeKind::X64Add32Rr => {
            let (lhs, rhs) = (in_reg(ctx, 0), in_reg(ctx, 1));
            gen_binary_rr(ctx, mb, lhs, rhs, |dst, src| Inst::AddRr { dst, src })
        }
        NodeKind::X64Sub32Rr => {
            let (lhs, rhs) = (in_reg(ctx, 0), in_reg(ctx, 1));
            gen_binary_rr(ctx, mb, lhs, rhs, |dst, src| Inst::SubRr { dst, src })
        }
        NodeKind::X64Mul32Rr => {
            let (lhs, rhs) = (in_reg(ctx, 0), in_reg(ctx, 1));
            gen_binary_rr(ctx, mb, lhs, rhs, |dst, src| Inst::MulRr { dst, src })
        }

        NodeKind::X64Add32Ri => {
            let lhs = in_reg(ctx, 0);
            let dst = ctx.new_reg();
            mb.code.push(Inst::MovRr { dst, src: lhs });
            mb.code.push(Inst::AddRi { dst, imm: imm_of(func, node) });
            dst
        }

        // The ISA pins division: dividend in eax (sign-extended through
        // edx by cdq), quotient back in eax.
        NodeKind::X64Idiv32Rr => {
            let lhs = in_reg(ctx, 0);
            let rhs = in_reg(ctx, 1);
            mb.code.push(Inst::MovRr { dst: EAX, src: lhs });
            mb.code.push(Inst::Cdq);
            mb.code.push(Inst::Idiv { src: rhs });
            let dst = ctx.new_reg();
            mb.code.push(Inst::MovRr { dst, src: EAX });
            dst
        }

        NodeKind::X64Kill32 => {
            mb.code.push(Inst::Kill { reg: EDX });
            in_reg(ctx, 0)
        }

        NodeKind::X64Branch32 => {
            let predicate = in_reg(ctx, 1);
            let on_true = branch_projection(func, node, NodeKind::BranchTrue);
            let on_false = branch_projection(func, node, NodeKind::BranchFalse);
            let then_block = schedule.block_of(on_true);
            let else_block = schedule.block_of(on_false);

            mb.code.push(Inst::Test { lhs: predicate, rhs: predicate });
            mb.code.push(Inst::Jz { target: else_block });
            mb.code.push(Inst::Jmp { target: then_block });
            mb.terminator_count = 2;
            NULL_REG
        }

        NodeKind::X64End32 => {
            let value = ctx.reg(func.input_node(node, END_VALUE));
            mb.code.push(Inst::MovRr { dst: EAX, src: value });
            mb.code.push(Inst::Ret);
            mb.terminator_count = 1;
            NULL_REG
        }

        other => panic!("{} reached the emitter unselected", other.label()),
    }
}

fn gen_binary_rr(
    ctx: &mut GenContext,
    mb: &mut MachineBlock,
    lhs: VReg,
    rhs: VReg,
    make: impl FnOnce(VReg, VReg) -> Inst,
) -> VReg {
    // Two-address form: copy the left operand into the destination, then
    // operate in place against the right.
    let dst = ctx.new_reg();
    mb.code.push(Inst::MovRr { dst, src: lhs });
    mb.code.push(make(dst, rhs));
    dst
}

fn imm_of(func: &Function, node: NodeId) -> i32 {
    match func.data(node) {
        NodeData::Imm32(value) => value,
        other => panic!("{} carries {other:?}, expected an immediate", func.kind(node).label()),
    }
}

/// Phi resolution. Every value phi got a fresh register during block
/// generation; here each predecessor copies its incoming value into a
/// shared temporary just before its terminators, and the phi's block opens
/// by copying the temporary into the phi's register.
fn resolve_phis(
    ctx: &mut GenContext,
    func: &Function,
    schedule: &Schedule,
    blocks: &mut [MachineBlock],
) {
    for i in 0..ctx.phis.len() {
        let phi = ctx.phis[i];
        let block = schedule.block_of(phi);
        let temp = ctx.new_reg();

        let num_ins = func.node(phi).ins.len();
        for j in 1..num_ins {
            let input = func.input_node(phi, j);
            let pred = schedule.cfg.block(block).preds[j - 1];
            let src = ctx.reg(input);
            insert_before_terminators(&mut blocks[pred.index()], Inst::MovRr { dst: temp, src });
        }

        let dst = ctx.reg(phi);
        blocks[block.index()].code.insert(0, Inst::MovRr { dst, src: temp });
    }
}

fn insert_before_terminators(mb: &mut MachineBlock, inst: Inst) {
    let at = mb.code.len() - mb.terminator_count;
    mb.code.insert(at, inst);
}

/// Prints the emitted function in the target dialect: a label per block,
/// the block's live-out registers, then its instructions.
#[must_use]
pub fn write_assembly(mf: &MachineFunction) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}:", mf.name);

    for block in &mf.blocks {
        let _ = writeln!(out, "{}:", block.id);

        let _ = writeln!(out, "  ~~~~~ live out ~~~~~");
        for reg in 0..mf.num_regs {
            if mf.live_out[block.id.index()].contains(reg as usize) {
                let _ = writeln!(out, "    {}", format_reg(reg));
            }
        }
        let _ = writeln!(out, "  ~~~~~~~~~~~~~~~~~~~~");

        for inst in &block.code {
            let _ = writeln!(out, "  {inst}");
        }
    }

    out
}

// src/emit/liveness.rs
use crate::emit::inst::VReg;
use crate::emit::x64::MachineBlock;
use fixedbitset::FixedBitSet;

/// Iterative live-out analysis over the machine blocks.
///
/// One linear pass per block collects `UEVar` (registers read before any
/// write in the block) and `VarKill` (registers written); then
/// `LiveOut(n) = ⋃ over successors m of UEVar(m) ∪ (LiveOut(m) ∖
/// VarKill(m))` is iterated to a fixed point.
#[must_use]
pub fn compute_live_out(blocks: &[MachineBlock], num_regs: VReg) -> Vec<FixedBitSet> {
    let bits = num_regs as usize;
    let mut ue_var = vec![FixedBitSet::with_capacity(bits); blocks.len()];
    let mut var_kill = vec![FixedBitSet::with_capacity(bits); blocks.len()];
    let mut live_out = vec![FixedBitSet::with_capacity(bits); blocks.len()];

    for (i, block) in blocks.iter().enumerate() {
        for inst in &block.code {
            for read in inst.reads() {
                if !var_kill[i].contains(read as usize) {
                    ue_var[i].insert(read as usize);
                }
            }
            for write in inst.writes() {
                var_kill[i].insert(write as usize);
            }
        }
    }

    loop {
        let mut changed = false;

        for (i, block) in blocks.iter().enumerate() {
            for succ in &block.succs {
                let m = succ.index();
                let mut incoming = live_out[m].clone();
                incoming.difference_with(&var_kill[m]);
                incoming.union_with(&ue_var[m]);

                if !incoming.is_subset(&live_out[i]) {
                    live_out[i].union_with(&incoming);
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }

    live_out
}

// src/semantic/unit.rs
use crate::parser::ast::BinaryOp;
use std::fmt;

/// A temporary value inside one function, numbered densely from 0. A
/// temporary is always defined and used within a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemValue(pub u32);

/// A stack slot backing one declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemBlockId(pub u32);

impl SemBlockId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SemInst {
    ConstInt { dst: SemValue, value: u64 },
    LoadSlot { dst: SemValue, slot: SlotId },
    StoreSlot { slot: SlotId, src: SemValue },
    Binary { op: BinaryOp, dst: SemValue, lhs: SemValue, rhs: SemValue },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SemTerminator {
    /// Block not yet terminated. Only unreachable blocks keep this past
    /// lowering.
    #[default]
    None,
    Goto(SemBlockId),
    Branch { cond: SemValue, then_block: SemBlockId, else_block: SemBlockId },
    Return(Option<SemValue>),
}

impl SemTerminator {
    /// Successor blocks in a fixed order (branch: then first).
    #[must_use]
    pub fn successors(&self) -> Vec<SemBlockId> {
        match self {
            SemTerminator::None | SemTerminator::Return(_) => Vec::new(),
            SemTerminator::Goto(target) => vec![*target],
            SemTerminator::Branch { then_block, else_block, .. } => vec![*then_block, *else_block],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemBlock {
    pub insts: Vec<SemInst>,
    pub terminator: SemTerminator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemFunc {
    pub name: String,
    /// Block 0 is the entry block.
    pub blocks: Vec<SemBlock>,
    pub num_values: u32,
    pub num_slots: u32,
}

impl SemFunc {
    #[must_use]
    pub fn entry(&self) -> SemBlockId {
        SemBlockId(0)
    }

    #[must_use]
    pub fn block(&self, id: SemBlockId) -> &SemBlock {
        &self.blocks[id.index()]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemUnit {
    pub funcs: Vec<SemFunc>,
}

impl fmt::Display for SemFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "func {} (slots: {})", self.name, self.num_slots)?;
        for (i, block) in self.blocks.iter().enumerate() {
            writeln!(f, "b{i}:")?;
            for inst in &block.insts {
                match inst {
                    SemInst::ConstInt { dst, value } => writeln!(f, "  v{} = {}", dst.0, value)?,
                    SemInst::LoadSlot { dst, slot } => writeln!(f, "  v{} = slot{}", dst.0, slot.0)?,
                    SemInst::StoreSlot { slot, src } => writeln!(f, "  slot{} = v{}", slot.0, src.0)?,
                    SemInst::Binary { op, dst, lhs, rhs } => {
                        writeln!(f, "  v{} = v{} {} v{}", dst.0, lhs.0, op, rhs.0)?;
                    }
                }
            }
            match &block.terminator {
                SemTerminator::None => writeln!(f, "  <unterminated>")?,
                SemTerminator::Goto(t) => writeln!(f, "  goto b{}", t.0)?,
                SemTerminator::Branch { cond, then_block, else_block } => {
                    writeln!(f, "  if v{} then b{} else b{}", cond.0, then_block.0, else_block.0)?;
                }
                SemTerminator::Return(None) => writeln!(f, "  ret")?,
                SemTerminator::Return(Some(v)) => writeln!(f, "  ret v{}", v.0)?,
            }
        }
        Ok(())
    }
}

// src/emit/mod.rs
//! The code emitter: lowers scheduled target nodes to machine instructions
//! over virtual registers (physical registers only where the ISA forces
//! them), resolves phis through predecessor copies, computes live-out sets
//! and prints the result in the target's assembly dialect.
pub mod inst;
pub mod liveness;
pub mod x64;

pub use inst::{Inst, VReg, EAX, ECX, EDX, FIRST_VR, NULL_REG};
pub use x64::{generate_x64, write_assembly, MachineBlock, MachineFunction};

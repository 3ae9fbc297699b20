//! ILOC Backend - Intermediate Representation
//!
//! This crate defines the ILOC program model shared by the backend passes
//! and the interpreter: instructions and operands, functions with their
//! frame sizes, the per-function control flow graph, and the textual
//! listing format (plus its JSON counterpart). It also hosts the two
//! program transformations: canonical renumbering and local register
//! allocation.

pub mod cfg;
pub mod ir;
pub mod parser;
pub mod regalloc;
pub mod renumber;
pub mod source;

pub use cfg::{BasicBlock, BlockId, Cfg};
pub use ir::{Function, FunctionBody, Instruction, Opcode, Operand, Program};
pub use iloc_common::{IlocError, LabelId, RegId};
pub use parser::{parse_instructions, parse_program};
pub use regalloc::{
    verify_register_bound, AllocationStats, BlockAllocator, FurthestUseAllocator,
    LocalRegisterAllocator, DEFAULT_PHYSICAL_REGS,
};
pub use renumber::{RenumberSummary, Renumberer};
pub use source::{read_program, render_program, Format};

/// A whole-program transformation over ILOC
pub trait IlocPass {
    type Output;

    fn process(&mut self, program: &mut Program) -> Result<Self::Output, IlocError>;
}

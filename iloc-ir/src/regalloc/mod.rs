//! Local Register Allocation
//!
//! The framework in this module walks each function's CFG from the entry
//! block, hands every block to a [`BlockAllocator`] policy exactly once, and
//! flattens the blocks back into a single instruction list. Allocation is
//! strictly local: no register assignment survives a block boundary.
//!
//! Spill code addresses the current frame through BP. Every spill store
//! reserves a fresh word below the function's existing locals, so
//! `local_size` only ever grows.

mod next_use;


pub use next_use::{max_block_pressure, FurthestUseAllocator, NextUseTable};

use crate::cfg::{BasicBlock, BlockId, Cfg};
use crate::ir::{Function, Instruction, Opcode, Operand, Program};
use crate::IlocPass;
use iloc_common::{IlocError, RegId, WORD_SIZE};
use log::{debug, trace};

/// Register budget used when none is requested
pub const DEFAULT_PHYSICAL_REGS: usize = 4;

/// Counters reported by an allocation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    pub blocks: usize,
    pub spill_stores: usize,
    pub spill_loads: usize,
}

/// Frame of the function being allocated; spill slots are carved from it
pub struct SpillFrame<'a> {
    function: &'a mut Function,
    stats: &'a mut AllocationStats,
}

impl<'a> SpillFrame<'a> {
    pub fn new(function: &'a mut Function, stats: &'a mut AllocationStats) -> Self {
        Self { function, stats }
    }

    /// Build a store of `reg` into a new frame slot; returns the slot's BP offset
    pub fn spill_store(&mut self, reg: RegId, comment: String) -> (Instruction, i32) {
        let offset = self.function.grow_frame(WORD_SIZE);
        self.stats.spill_stores += 1;
        let instr = Instruction::new(
            Opcode::StoreAI,
            vec![Operand::PhysicalReg(reg), Operand::BaseReg, Operand::IntConst(-offset)],
        )
        .with_comment(comment);
        (instr, offset)
    }

    /// Build a reload of the slot at BP offset `offset` into `reg`
    pub fn spill_load(&mut self, offset: i32, reg: RegId, comment: String) -> Instruction {
        self.stats.spill_loads += 1;
        Instruction::new(
            Opcode::LoadAI,
            vec![Operand::BaseReg, Operand::IntConst(-offset), Operand::PhysicalReg(reg)],
        )
        .with_comment(comment)
    }
}

/// Per-block allocation policy.
///
/// Implementations rewrite every virtual register in `block` to a physical
/// register below `num_regs`, inserting spill code through `frame` so that
/// each value stays available in its register or can be reloaded.
pub trait BlockAllocator {
    fn allocate_block(
        &mut self,
        block: &mut BasicBlock,
        frame: &mut SpillFrame<'_>,
        num_regs: usize,
    ) -> Result<(), IlocError>;
}

/// CFG-walking driver for a block allocation policy
pub struct LocalRegisterAllocator<P: BlockAllocator = FurthestUseAllocator> {
    num_physical_regs: usize,
    policy: P,
}

impl LocalRegisterAllocator<FurthestUseAllocator> {
    /// Allocator using the furthest-next-use policy
    pub fn with_registers(num_physical_regs: usize) -> Self {
        Self::new(num_physical_regs, FurthestUseAllocator::new())
    }
}

impl<P: BlockAllocator> LocalRegisterAllocator<P> {
    pub fn new(num_physical_regs: usize, policy: P) -> Self {
        Self { num_physical_regs, policy }
    }

    pub fn num_physical_regs(&self) -> usize {
        self.num_physical_regs
    }

    fn allocate_function(
        &mut self,
        function: &mut Function,
        stats: &mut AllocationStats,
    ) -> Result<(), IlocError> {
        let mut cfg = Cfg::build(&function.instructions())?;
        let Some(entry) = cfg.entry() else {
            return Ok(());
        };
        debug!(
            "Allocating '{}' ({} blocks, frame {} bytes)",
            function.name(),
            cfg.len(),
            function.local_size
        );

        let mut handled = vec![false; cfg.len()];
        let mut frame = SpillFrame::new(function, stats);

        // Depth-first from the entry; merge points and back edges are skipped
        let mut worklist: Vec<BlockId> = vec![entry];
        while let Some(id) = worklist.pop() {
            if handled[id] {
                continue;
            }
            self.allocate_one(&mut cfg, id, &mut frame)?;
            handled[id] = true;
            if let Some(block) = cfg.block(id) {
                worklist.extend(block.targets.iter().rev().filter(|&&t| !handled[t]));
            }
        }

        // Dead code still has to respect the register bound
        for id in 0..cfg.len() {
            if !handled[id] {
                trace!("B{} is unreachable, allocating in layout order", id);
                self.allocate_one(&mut cfg, id, &mut frame)?;
                handled[id] = true;
            }
        }

        function.set_instructions(cfg.flatten());
        Ok(())
    }

    fn allocate_one(
        &mut self,
        cfg: &mut Cfg,
        id: BlockId,
        frame: &mut SpillFrame<'_>,
    ) -> Result<(), IlocError> {
        let block = cfg.block_mut(id).ok_or_else(|| IlocError::Internal {
            message: format!("block B{} does not exist", id),
        })?;
        self.policy.allocate_block(block, frame, self.num_physical_regs)?;
        frame.stats.blocks += 1;
        Ok(())
    }
}

impl<P: BlockAllocator> IlocPass for LocalRegisterAllocator<P> {
    type Output = AllocationStats;

    fn process(&mut self, program: &mut Program) -> Result<AllocationStats, IlocError> {
        if self.num_physical_regs == 0 {
            return Err(IlocError::RegisterBudget(0));
        }

        let mut stats = AllocationStats::default();
        for function in program.functions.iter_mut() {
            self.allocate_function(function, &mut stats)?;
        }
        debug!(
            "Allocated {} blocks with {} registers: {} spill stores, {} spill loads",
            stats.blocks, self.num_physical_regs, stats.spill_stores, stats.spill_loads
        );
        Ok(stats)
    }
}

/// Check that every register operand is a physical register below `num_regs`
pub fn verify_register_bound(program: &Program, num_regs: usize) -> Result<(), IlocError> {
    for function in &program.functions {
        for instr in function.instructions().iter() {
            for operand in &instr.operands {
                let in_budget = match operand {
                    Operand::PhysicalReg(id) => (*id as usize) < num_regs,
                    Operand::VirtualReg(_) => false,
                    _ => true,
                };
                if !in_budget {
                    return Err(IlocError::RegisterOutOfBudget {
                        function: function.name().to_string(),
                        register: operand.to_string(),
                        budget: num_regs,
                    });
                }
            }
        }
    }
    Ok(())
}

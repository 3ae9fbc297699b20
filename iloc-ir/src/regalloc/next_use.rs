//! Furthest-next-use block allocation
//!
//! Walks a block top to bottom keeping a small table of which virtual
//! register lives in each physical register and where it is next needed.
//! When the file is full, the occupant whose next use is furthest away is
//! spilled to a fresh frame slot and reloaded at its next use.

use super::{BlockAllocator, SpillFrame};
use crate::cfg::BasicBlock;
use crate::ir::{Instruction, Opcode, Operand};
use iloc_common::{IlocError, RegId};
use log::{debug, trace};
use std::collections::{BTreeSet, HashMap};

/// Occurrence positions of every virtual register in one block
#[derive(Debug, Clone, Default)]
pub struct NextUseTable {
    occurrences: HashMap<RegId, Vec<usize>>,
}

impl NextUseTable {
    pub fn build(instructions: &[Instruction]) -> Self {
        let mut occurrences: HashMap<RegId, Vec<usize>> = HashMap::new();
        for (index, instr) in instructions.iter().enumerate() {
            for reg in instr.operands.iter().filter_map(Operand::virtual_reg) {
                let positions = occurrences.entry(reg).or_default();
                if positions.last() != Some(&index) {
                    positions.push(index);
                }
            }
        }
        Self { occurrences }
    }

    /// First position strictly after `index` that mentions `reg`
    pub fn next_after(&self, reg: RegId, index: usize) -> Option<usize> {
        let positions = self.occurrences.get(&reg)?;
        let at = positions.partition_point(|&pos| pos <= index);
        positions.get(at).copied()
    }

    pub fn first_occurrence(&self, reg: RegId) -> Option<usize> {
        self.occurrences.get(&reg).and_then(|p| p.first().copied())
    }

    pub fn last_occurrence(&self, reg: RegId) -> Option<usize> {
        self.occurrences.get(&reg).and_then(|p| p.last().copied())
    }

    pub fn registers(&self) -> impl Iterator<Item = RegId> + '_ {
        self.occurrences.keys().copied()
    }
}

/// Largest number of virtual registers whose first-to-last occurrence spans
/// overlap at any single instruction of `block`
pub fn max_block_pressure(block: &BasicBlock) -> usize {
    let table = NextUseTable::build(&block.instructions);
    let spans: Vec<(usize, usize)> = table
        .registers()
        .filter_map(|reg| Some((table.first_occurrence(reg)?, table.last_occurrence(reg)?)))
        .collect();
    (0..block.instructions.len())
        .map(|index| {
            spans
                .iter()
                .filter(|(first, last)| *first <= index && index <= *last)
                .count()
        })
        .max()
        .unwrap_or(0)
}

const NO_NEXT_USE: usize = usize::MAX;

/// Block policy that evicts the value used furthest in the future.
///
/// Ties go to the lowest-numbered physical register. Every value still
/// needed after a `call` is saved before it and reloaded on demand, since
/// the callee may use any physical register.
#[derive(Debug, Default)]
pub struct FurthestUseAllocator {
    /// Virtual register held by each physical register
    name: Vec<Option<RegId>>,
    /// Position of the occupant's next mention
    next: Vec<usize>,
    /// Frame offset holding the current value of an evicted register
    spill_slots: HashMap<RegId, i32>,
}

impl FurthestUseAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, num_regs: usize) {
        self.name = vec![None; num_regs];
        self.next = vec![NO_NEXT_USE; num_regs];
        self.spill_slots.clear();
    }

    fn lookup(&self, vreg: RegId) -> Option<usize> {
        self.name.iter().position(|held| *held == Some(vreg))
    }

    fn release(&mut self, preg: usize) {
        self.name[preg] = None;
        self.next[preg] = NO_NEXT_USE;
    }

    /// Spill the occupant of `preg` and record where its value went
    fn evict(
        &mut self,
        preg: usize,
        reason: &str,
        frame: &mut SpillFrame<'_>,
        output: &mut Vec<Instruction>,
    ) {
        if let Some(vreg) = self.name[preg] {
            let (store, offset) = frame.spill_store(preg as RegId, format!("{} r{}", reason, vreg));
            output.push(store);
            self.spill_slots.insert(vreg, offset);
            debug!("{} r{} from p{} to bp-{}", reason, vreg, preg, offset);
        }
        self.release(preg);
    }

    /// Find a free physical register, evicting one outside `pinned` if needed
    fn acquire(
        &mut self,
        pinned: &BTreeSet<usize>,
        frame: &mut SpillFrame<'_>,
        output: &mut Vec<Instruction>,
    ) -> Option<usize> {
        if let Some(free) = self.name.iter().position(Option::is_none) {
            return Some(free);
        }

        let mut victim: Option<usize> = None;
        for preg in (0..self.name.len()).filter(|p| !pinned.contains(p)) {
            match victim {
                Some(best) if self.next[best] >= self.next[preg] => {}
                _ => victim = Some(preg),
            }
        }
        let victim = victim?;
        self.evict(victim, "spill", frame, output);
        Some(victim)
    }

    /// Bring `vreg` into a physical register for reading at `index`
    fn ensure(
        &mut self,
        vreg: RegId,
        pinned: &BTreeSet<usize>,
        frame: &mut SpillFrame<'_>,
        output: &mut Vec<Instruction>,
    ) -> Option<usize> {
        if let Some(preg) = self.lookup(vreg) {
            return Some(preg);
        }
        let preg = self.acquire(pinned, frame, output)?;
        match self.spill_slots.get(&vreg) {
            Some(&offset) => {
                output.push(frame.spill_load(offset, preg as RegId, format!("reload r{}", vreg)));
            }
            None => trace!("r{} is read before any definition in this block", vreg),
        }
        self.name[preg] = Some(vreg);
        Some(preg)
    }
}

impl BlockAllocator for FurthestUseAllocator {
    fn allocate_block(
        &mut self,
        block: &mut BasicBlock,
        frame: &mut SpillFrame<'_>,
        num_regs: usize,
    ) -> Result<(), IlocError> {
        self.reset(num_regs);
        let table = NextUseTable::build(&block.instructions);
        let original = std::mem::take(&mut block.instructions);
        let mut output = Vec::with_capacity(original.len());

        for (index, mut instr) in original.into_iter().enumerate() {
            let mut pinned: BTreeSet<usize> = BTreeSet::new();

            // Sources first: each must be resident while the instruction runs
            for op_idx in 0..instr.operands.len() {
                if instr.is_def(op_idx) {
                    continue;
                }
                let Operand::VirtualReg(vreg) = instr.operands[op_idx] else {
                    continue;
                };
                let preg = self
                    .ensure(vreg, &pinned, frame, &mut output)
                    .ok_or_else(|| IlocError::InsufficientRegisters {
                        instruction: instr.to_string(),
                        budget: num_regs,
                    })?;
                self.next[preg] = table.next_after(vreg, index).unwrap_or(NO_NEXT_USE);
                pinned.insert(preg);
                instr.operands[op_idx] = Operand::PhysicalReg(preg as RegId);
            }

            // Values whose last mention is this instruction give their register back
            for &preg in &pinned {
                if self.next[preg] == NO_NEXT_USE {
                    self.release(preg);
                }
            }

            if instr.opcode == Opcode::Call {
                for preg in 0..num_regs {
                    if self.name[preg].is_some() {
                        self.evict(preg, "save", frame, &mut output);
                    }
                }
            }

            // The destination may reuse a source register: sources are read first
            if let Some(&Operand::VirtualReg(vreg)) = instr.defined_operand() {
                if let Some(d) = instr.opcode.dest_index() {
                    let preg = match self.lookup(vreg) {
                        Some(preg) => preg,
                        None => self
                            .acquire(&BTreeSet::new(), frame, &mut output)
                            .ok_or_else(|| IlocError::InsufficientRegisters {
                                instruction: instr.to_string(),
                                budget: num_regs,
                            })?,
                    };
                    // Any memory copy is stale from here on
                    self.spill_slots.remove(&vreg);
                    instr.operands[d] = Operand::PhysicalReg(preg as RegId);
                    match table.next_after(vreg, index) {
                        Some(next) => {
                            self.name[preg] = Some(vreg);
                            self.next[preg] = next;
                        }
                        None => self.release(preg),
                    }
                }
            }

            trace!("  {}", instr);
            output.push(instr);
        }

        block.instructions = output;
        Ok(())
    }
}

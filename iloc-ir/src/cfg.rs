//! Basic-block control flow graph
//!
//! Splits a function's instruction list into basic blocks and links them by
//! their successor ("target") edges. Block ids are layout positions, so
//! flattening the blocks in id order reproduces the original list.

use crate::ir::{Instruction, Opcode, Operand};
use iloc_common::{IlocError, LabelId};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Index of a block within its function
pub type BlockId = usize;

/// Straight-line instruction sequence with a single entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
    /// Successor blocks in branch-operand order
    pub targets: Vec<BlockId>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            targets: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{} ->", self.id)?;
        for target in &self.targets {
            write!(f, " B{}", target)?;
        }
        writeln!(f)?;
        for instr in &self.instructions {
            writeln!(f, "    {}", instr)?;
        }
        Ok(())
    }
}

/// Control flow graph of one function; block 0 is the entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cfg {
    pub blocks: Vec<BasicBlock>,
}

impl Cfg {
    /// Partition `instructions` into blocks and compute successor edges.
    ///
    /// Leaders are the first instruction, every label marker, and every
    /// instruction following a `jump`, `cbr`, or `return`.
    pub fn build(instructions: &[Instruction]) -> Result<Self, IlocError> {
        let mut blocks: Vec<BasicBlock> = Vec::new();
        let mut current = BasicBlock::new(0);

        for instr in instructions {
            if instr.opcode == Opcode::Label && !current.is_empty() {
                let next_id = current.id + 1;
                blocks.push(std::mem::replace(&mut current, BasicBlock::new(next_id)));
            }
            current.instructions.push(instr.clone());
            if instr.opcode.is_terminator() {
                let next_id = current.id + 1;
                blocks.push(std::mem::replace(&mut current, BasicBlock::new(next_id)));
            }
        }
        if !current.is_empty() {
            blocks.push(current);
        }

        // Map each jump label to the block it opens
        let mut label_blocks: HashMap<LabelId, BlockId> = HashMap::new();
        for block in &blocks {
            for instr in &block.instructions {
                if instr.opcode != Opcode::Label {
                    continue;
                }
                if let Some(Operand::JumpLabel(id)) = instr.operands.first() {
                    if label_blocks.insert(*id, block.id).is_some() {
                        return Err(IlocError::DuplicateLabel(*id));
                    }
                }
            }
        }

        let block_count = blocks.len();
        for block in blocks.iter_mut() {
            let mut targets = Vec::new();
            match block.instructions.last() {
                Some(last) if last.opcode == Opcode::Jump => {
                    targets.push(resolve(&label_blocks, last, 0)?);
                }
                Some(last) if last.opcode == Opcode::Cbr => {
                    targets.push(resolve(&label_blocks, last, 1)?);
                    let other = resolve(&label_blocks, last, 2)?;
                    if !targets.contains(&other) {
                        targets.push(other);
                    }
                }
                Some(last) if last.opcode == Opcode::Return => {}
                _ => {
                    if block.id + 1 < block_count {
                        targets.push(block.id + 1);
                    }
                }
            }
            trace!("CFG: B{} -> {:?}", block.id, targets);
            block.targets = targets;
        }

        Ok(Self { blocks })
    }

    /// Entry block, or None for an empty function
    pub fn entry(&self) -> Option<BlockId> {
        if self.blocks.is_empty() { None } else { Some(0) }
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Concatenate all blocks in layout order
    pub fn flatten(&self) -> Vec<Instruction> {
        self.blocks
            .iter()
            .flat_map(|block| block.instructions.iter().cloned())
            .collect()
    }
}

fn resolve(
    label_blocks: &HashMap<LabelId, BlockId>,
    instr: &Instruction,
    idx: usize,
) -> Result<BlockId, IlocError> {
    match instr.operands.get(idx) {
        Some(Operand::JumpLabel(id)) => label_blocks
            .get(id)
            .copied()
            .ok_or(IlocError::UnresolvedLabel(*id)),
        Some(other) => Err(IlocError::invalid_operand(other, instr)),
        None => Err(IlocError::invalid_operand("<missing>", instr)),
    }
}

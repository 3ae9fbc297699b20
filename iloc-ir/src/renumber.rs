//! Register and label renumbering
//!
//! Rewrites every virtual register id and jump label id into a dense
//! canonical numbering (both starting at 1, in order of first appearance),
//! so that independently generated programs can be compared textually.

use crate::ir::{Opcode, Operand, Program};
use crate::IlocPass;
use iloc_common::{IlocError, LabelId, RegId};
use log::{debug, warn};
use std::collections::HashMap;

/// Sizes of the two numbering spaces after a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenumberSummary {
    pub registers: usize,
    pub labels: usize,
}

/// Canonicalization pass over a whole program
#[derive(Debug, Default)]
pub struct Renumberer {
    register_map: HashMap<RegId, RegId>,
    label_map: HashMap<LabelId, LabelId>,
    next_reg: RegId,
    next_label: LabelId,
}

impl Renumberer {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.register_map.clear();
        self.label_map.clear();
        self.next_reg = 1;
        self.next_label = 1;
    }

    fn map_register(&mut self, id: RegId) -> RegId {
        let next = &mut self.next_reg;
        *self.register_map.entry(id).or_insert_with(|| {
            let assigned = *next;
            *next += 1;
            assigned
        })
    }

    fn map_label(&mut self, id: LabelId) -> LabelId {
        let next = &mut self.next_label;
        *self.label_map.entry(id).or_insert_with(|| {
            let assigned = *next;
            *next += 1;
            assigned
        })
    }
}

impl IlocPass for Renumberer {
    type Output = RenumberSummary;

    fn process(&mut self, program: &mut Program) -> Result<RenumberSummary, IlocError> {
        self.reset();

        // Pass 1: registers in order of first appearance, labels in order of definition
        for function in &program.functions {
            for instr in function.instructions().iter() {
                for operand in &instr.operands {
                    if let Operand::VirtualReg(id) = operand {
                        self.map_register(*id);
                    }
                }
                if instr.opcode == Opcode::Label {
                    if let Some(Operand::JumpLabel(id)) = instr.operands.first() {
                        self.map_label(*id);
                    }
                }
            }
        }

        // Pass 2: rewrite copies of every instruction
        for function in program.functions.iter_mut() {
            let mut rewritten = function.instructions().into_owned();
            for instr in rewritten.iter_mut() {
                for operand in instr.operands.iter_mut() {
                    match operand {
                        Operand::VirtualReg(id) => *id = self.map_register(*id),
                        Operand::JumpLabel(id) => {
                            if !self.label_map.contains_key(id) {
                                warn!(
                                    "Label l{} in '{}' is never defined",
                                    id, function.symbol.name
                                );
                            }
                            *id = self.map_label(*id);
                        }
                        _ => {}
                    }
                }
            }
            function.set_instructions(rewritten);
        }

        let summary = RenumberSummary {
            registers: self.register_map.len(),
            labels: self.label_map.len(),
        };
        debug!("Renumbered {} registers and {} labels", summary.registers, summary.labels);
        Ok(summary)
    }
}

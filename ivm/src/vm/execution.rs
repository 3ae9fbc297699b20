use super::{Interpreter, RegName};
use iloc_common::IlocError;
use iloc_ir::{Instruction, Opcode, Operand};
use log::warn;
use std::io::Write;

impl<W: Write> Interpreter<W> {
    /// Execute one instruction; returns true when the outermost frame returned
    pub(super) fn execute_instruction(&mut self, instr: &Instruction) -> Result<bool, IlocError> {
        match &instr.opcode {
            Opcode::LoadI | Opcode::I2I => {
                let value = self.read(instr, 0)?;
                self.write(instr, 1, value)?;
            }
            Opcode::Load => {
                let address = self.read(instr, 0)?;
                let value = self.memory.load_word(address)?;
                self.write(instr, 1, value)?;
            }
            Opcode::LoadAI | Opcode::LoadAO => {
                let address = self.read(instr, 0)?.wrapping_add(self.read(instr, 1)?);
                let value = self.memory.load_word(address)?;
                self.write(instr, 2, value)?;
            }
            Opcode::Store => {
                let value = self.read(instr, 0)?;
                let address = self.read(instr, 1)?;
                self.memory.store_word(address, value)?;
            }
            Opcode::StoreAI | Opcode::StoreAO => {
                let value = self.read(instr, 0)?;
                let address = self.read(instr, 1)?.wrapping_add(self.read(instr, 2)?);
                self.memory.store_word(address, value)?;
            }

            Opcode::Add | Opcode::AddI => self.binary(instr, |a, b| Ok(a.wrapping_add(b)))?,
            Opcode::Sub => self.binary(instr, |a, b| Ok(a.wrapping_sub(b)))?,
            Opcode::Mult | Opcode::MultI => self.binary(instr, |a, b| Ok(a.wrapping_mul(b)))?,
            Opcode::Div => self.binary(instr, |a, b| {
                if b == 0 {
                    Err(IlocError::DivisionByZero { instruction: instr.to_string() })
                } else {
                    Ok(a.wrapping_div(b))
                }
            })?,
            Opcode::Neg => {
                let value = self.read(instr, 0)?;
                self.write(instr, 1, value.wrapping_neg())?;
            }

            Opcode::And => self.binary(instr, |a, b| Ok(bool_word(a != 0 && b != 0)))?,
            Opcode::Or => self.binary(instr, |a, b| Ok(bool_word(a != 0 || b != 0)))?,
            Opcode::Not => {
                let value = self.read(instr, 0)?;
                self.write(instr, 1, bool_word(value == 0))?;
            }

            Opcode::CmpLt => self.binary(instr, |a, b| Ok(bool_word(a < b)))?,
            Opcode::CmpLe => self.binary(instr, |a, b| Ok(bool_word(a <= b)))?,
            Opcode::CmpEq => self.binary(instr, |a, b| Ok(bool_word(a == b)))?,
            Opcode::CmpGe => self.binary(instr, |a, b| Ok(bool_word(a >= b)))?,
            Opcode::CmpGt => self.binary(instr, |a, b| Ok(bool_word(a > b)))?,
            Opcode::CmpNe => self.binary(instr, |a, b| Ok(bool_word(a != b)))?,

            Opcode::Jump => {
                self.ip = self.jump_target(instr.operands.first(), instr)? as i32;
            }
            Opcode::Cbr => {
                let branch = if self.read(instr, 0)? != 0 { 1 } else { 2 };
                self.ip = self.jump_target(instr.operands.get(branch), instr)? as i32;
            }

            Opcode::Param => {
                let value = self.read(instr, 0)?;
                self.push(value)?;
            }
            Opcode::Call => match instr.operands.first() {
                Some(Operand::CallLabel(name)) => self.call_function(name)?,
                Some(other) => return Err(IlocError::invalid_operand(other, instr)),
                None => return Err(IlocError::invalid_operand("<missing>", instr)),
            },
            Opcode::Return => return self.return_from_function(),

            Opcode::Print => match instr.operands.first() {
                Some(Operand::VirtualReg(_) | Operand::PhysicalReg(_)) => {
                    let value = self.read(instr, 0)?;
                    write!(self.writer, "{}", value)?;
                }
                Some(Operand::StrConst(text)) => write!(self.writer, "{}", text)?,
                _ => self.advise(format!("Invalid print operand: {}", instr)),
            },

            Opcode::Label | Opcode::Nop => {}
            Opcode::Unknown(_) => self.advise(format!("Unhandled instruction: {}", instr)),
        }
        Ok(false)
    }

    fn advise(&mut self, message: String) {
        warn!("{}", message);
        self.advisories += 1;
    }

    /// Apply `op` to source operands 0 and 1 and write the result to operand 2
    fn binary<F>(&mut self, instr: &Instruction, op: F) -> Result<(), IlocError>
    where
        F: FnOnce(i32, i32) -> Result<i32, IlocError>,
    {
        let lhs = self.read(instr, 0)?;
        let rhs = self.read(instr, 1)?;
        let result = op(lhs, rhs)?;
        self.write(instr, 2, result)
    }

    /// Integer value of operand `idx`
    pub(super) fn read(&self, instr: &Instruction, idx: usize) -> Result<i32, IlocError> {
        match instr.operands.get(idx) {
            Some(Operand::BaseReg) => Ok(self.bp),
            Some(Operand::ReturnReg) => Ok(self.ret),
            Some(Operand::IntConst(value)) => Ok(*value),
            Some(operand) => match RegName::of(operand) {
                Some(name) => self.registers.get(name),
                None => Err(IlocError::invalid_operand(operand, instr)),
            },
            None => Err(IlocError::invalid_operand("<missing>", instr)),
        }
    }

    /// Store `value` into the register named by operand `idx`
    pub(super) fn write(
        &mut self,
        instr: &Instruction,
        idx: usize,
        value: i32,
    ) -> Result<(), IlocError> {
        match instr.operands.get(idx) {
            Some(Operand::BaseReg) => self.bp = value,
            Some(Operand::ReturnReg) => self.ret = value,
            Some(operand) => match RegName::of(operand) {
                Some(name) => self.registers.set(name, value),
                None => return Err(IlocError::invalid_operand(operand, instr)),
            },
            None => return Err(IlocError::invalid_operand("<missing>", instr)),
        }
        Ok(())
    }
}

fn bool_word(value: bool) -> i32 {
    if value { 1 } else { 0 }
}

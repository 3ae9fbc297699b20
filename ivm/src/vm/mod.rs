/// VM module - ILOC interpreter over a flat code array and byte memory

mod display;
mod execution;
mod memory;
mod state;

#[cfg(test)]
mod tests;

pub use memory::Memory;
pub use state::{RegName, RegisterFile, VMState};

use crate::constants::*;
use iloc_common::{IlocError, LabelId, MemLoc, Symbol};
use iloc_ir::{Instruction, Opcode, Operand, Program};
use log::{debug, trace};
use std::collections::HashMap;
use std::io::{self, Stdout, Write};

/// The ILOC virtual machine
///
/// Code lives in its own instruction-indexed array: IP is an index into it,
/// never a memory address. Each `process` call starts from a fresh machine.
pub struct Interpreter<W: Write = Stdout> {
    // Flattened code of every function, each preceded by its entry label
    code: Vec<Instruction>,

    // Label id / function name -> index of the instruction after the label
    jump_targets: HashMap<LabelId, usize>,
    call_targets: HashMap<String, usize>,

    // Frame size of every function, by name
    frame_sizes: HashMap<String, i32>,

    // Global data symbols for state dumps
    globals: Vec<Symbol>,

    pub registers: RegisterFile,
    pub memory: Memory,
    pub ip: i32,
    pub sp: i32,
    pub bp: i32,
    pub ret: i32,

    pub state: VMState,
    trace: bool,
    advisories: usize,
    steps: u64,
    return_value: i32,

    // Destination of print output and trace dumps
    writer: W,
}

impl Interpreter<Stdout> {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for Interpreter<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_writer(writer: W) -> Self {
        Interpreter {
            code: Vec::new(),
            jump_targets: HashMap::new(),
            call_targets: HashMap::new(),
            frame_sizes: HashMap::new(),
            globals: Vec::new(),
            registers: RegisterFile::default(),
            memory: Memory::new(),
            ip: RETURN_SENTINEL,
            sp: STACK_TOP,
            bp: STACK_TOP,
            ret: INITIAL_RET,
            state: VMState::Setup,
            trace: false,
            advisories: 0,
            steps: 0,
            return_value: INITIAL_RET,
            writer,
        }
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Run `program` from `main` until it returns, yielding the return register
    pub fn process(&mut self, program: &Program) -> Result<i32, IlocError> {
        self.reset();
        self.load(program)?;

        if self.trace {
            self.write_listing()?;
            self.dump_state()?;
            writeln!(self.writer, "Calling {}()\n", ENTRY_FUNCTION)?;
        }

        self.call_function(ENTRY_FUNCTION)?;
        if self.trace {
            self.dump_state()?;
        }

        self.state = VMState::Running;
        self.run()?;

        self.return_value = self.ret;
        debug!(
            "Program returned {} after {} steps ({} advisories)",
            self.return_value, self.steps, self.advisories
        );
        self.writer.flush()?;
        Ok(self.return_value)
    }

    pub fn run(&mut self) -> Result<(), IlocError> {
        while self.state == VMState::Running {
            self.step()?;
        }
        Ok(())
    }

    /// Fetch the instruction at IP, advance IP, then execute it
    pub fn step(&mut self) -> Result<(), IlocError> {
        if self.state != VMState::Running {
            return Ok(());
        }

        let instr = usize::try_from(self.ip)
            .ok()
            .and_then(|idx| self.code.get(idx))
            .cloned()
            .ok_or_else(|| IlocError::Internal {
                message: format!("instruction pointer {} is outside the code", self.ip),
            })?;
        if self.trace {
            writeln!(self.writer, "Executing: {}", instr)?;
        }

        self.ip += 1;
        self.steps += 1;
        if self.execute_instruction(&instr)? {
            self.state = VMState::Halted;
        }

        if self.trace {
            self.dump_state()?;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.code.clear();
        self.jump_targets.clear();
        self.call_targets.clear();
        self.frame_sizes.clear();
        self.globals.clear();
        self.registers.clear();
        self.memory.clear();
        self.ip = RETURN_SENTINEL;
        self.sp = STACK_TOP;
        self.bp = STACK_TOP;
        self.ret = INITIAL_RET;
        self.state = VMState::Setup;
        self.advisories = 0;
        self.steps = 0;
        self.return_value = INITIAL_RET;
    }

    /// Flatten the program and resolve every jump and call target
    fn load(&mut self, program: &Program) -> Result<(), IlocError> {
        for function in &program.functions {
            let name = function.name().to_string();
            if self.call_targets.contains_key(&name) {
                return Err(IlocError::Internal {
                    message: format!("function '{}' is defined twice", name),
                });
            }
            self.code.push(Instruction::new(
                Opcode::Label,
                vec![Operand::CallLabel(name.clone())],
            ));
            self.call_targets.insert(name.clone(), self.code.len());
            self.frame_sizes.insert(name, function.local_size);

            for instr in function.instructions().iter() {
                self.code.push(instr.clone());
                if instr.opcode != Opcode::Label {
                    continue;
                }
                if let Some(Operand::JumpLabel(id)) = instr.operands.first() {
                    if self.jump_targets.insert(*id, self.code.len()).is_some() {
                        return Err(IlocError::DuplicateLabel(*id));
                    }
                }
            }
        }

        self.globals = program
            .statics
            .symbols()
            .iter()
            .filter(|sym| sym.location != MemLoc::StaticFunc)
            .cloned()
            .collect();

        self.validate_targets()?;
        debug!(
            "Loaded {} instructions: {} functions, {} jump labels",
            self.code.len(),
            self.call_targets.len(),
            self.jump_targets.len()
        );
        Ok(())
    }

    fn validate_targets(&self) -> Result<(), IlocError> {
        if !self.call_targets.contains_key(ENTRY_FUNCTION) {
            return Err(IlocError::UnresolvedCall(ENTRY_FUNCTION.to_string()));
        }
        for instr in &self.code {
            let labels: &[usize] = match instr.opcode {
                Opcode::Jump => &[0],
                Opcode::Cbr => &[1, 2],
                Opcode::Call => {
                    self.call_target(instr.operands.first(), instr)?;
                    continue;
                }
                _ => continue,
            };
            for &idx in labels {
                self.jump_target(instr.operands.get(idx), instr)?;
            }
        }
        Ok(())
    }

    pub(super) fn jump_target(
        &self,
        operand: Option<&Operand>,
        instr: &Instruction,
    ) -> Result<usize, IlocError> {
        match operand {
            Some(Operand::JumpLabel(id)) => self
                .jump_targets
                .get(id)
                .copied()
                .ok_or(IlocError::UnresolvedLabel(*id)),
            Some(other) => Err(IlocError::invalid_operand(other, instr)),
            None => Err(IlocError::invalid_operand("<missing>", instr)),
        }
    }

    pub(super) fn call_target(
        &self,
        operand: Option<&Operand>,
        instr: &Instruction,
    ) -> Result<usize, IlocError> {
        match operand {
            Some(Operand::CallLabel(name)) => self
                .call_targets
                .get(name)
                .copied()
                .ok_or_else(|| IlocError::UnresolvedCall(name.clone())),
            Some(other) => Err(IlocError::invalid_operand(other, instr)),
            None => Err(IlocError::invalid_operand("<missing>", instr)),
        }
    }

    pub(super) fn push(&mut self, value: i32) -> Result<(), IlocError> {
        self.sp -= WORD_SIZE;
        self.check_stack()?;
        self.memory.store_word(self.sp, value)
    }

    pub(super) fn pop(&mut self) -> Result<i32, IlocError> {
        let value = self.memory.load_word(self.sp)?;
        self.sp += WORD_SIZE;
        Ok(value)
    }

    fn check_stack(&self) -> Result<(), IlocError> {
        if self.sp < 0 {
            return Err(IlocError::StackOverflow { sp: self.sp });
        }
        Ok(())
    }

    /// Push the return address, open a frame for `name`, and jump to its entry
    pub(super) fn call_function(&mut self, name: &str) -> Result<(), IlocError> {
        let entry = *self
            .call_targets
            .get(name)
            .ok_or_else(|| IlocError::UnresolvedCall(name.to_string()))?;
        let local_size = self.frame_sizes.get(name).copied().unwrap_or(0);

        self.push(self.ip)?;
        self.push(self.bp)?;
        self.bp = self.sp;
        self.sp -= local_size;
        self.check_stack()?;

        trace!("call {}: bp={} sp={} return to {}", name, self.bp, self.sp, self.ip);
        self.ip = entry as i32;
        Ok(())
    }

    /// Tear down the current frame; true once the outermost frame is gone
    pub(super) fn return_from_function(&mut self) -> Result<bool, IlocError> {
        self.sp = self.bp;
        self.bp = self.pop()?;
        self.ip = self.pop()?;
        trace!("return to {} with ret={}", self.ip, self.ret);
        Ok(self.ip == RETURN_SENTINEL)
    }

    /// Value of the return register after the last run
    pub fn return_value(&self) -> i32 {
        self.return_value
    }

    /// Count of advisory diagnostics (unknown opcodes, bad print operands)
    pub fn advisories(&self) -> usize {
        self.advisories
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

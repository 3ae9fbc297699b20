use super::Interpreter;
use crate::constants::{LISTING_INDEX_WIDTH, STACK_TOP, WORD_SIZE};
use iloc_common::IlocError;
use std::io::Write;

impl<W: Write> Interpreter<W> {
    /// Print the flattened program with instruction indices
    pub(super) fn write_listing(&mut self) -> Result<(), IlocError> {
        writeln!(self.writer)?;
        writeln!(self.writer, "All code:")?;
        for (idx, instr) in self.code.iter().enumerate() {
            writeln!(self.writer, "{:>width$}: {}", idx, instr, width = LISTING_INDEX_WIDTH)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    /// Print globals, special registers, the register file, and the stack
    pub fn dump_state(&mut self) -> Result<(), IlocError> {
        for sym in &self.globals {
            write!(self.writer, "  global {} = ", sym.name)?;
            if sym.length > 1 {
                let mut values = Vec::new();
                for i in 0..sym.length {
                    let address =
                        i64::from(sym.offset) + i64::from(i) * i64::from(sym.element_size);
                    let address = i32::try_from(address)
                        .map_err(|_| IlocError::MemoryOutOfBounds { address })?;
                    values.push(self.memory.load_word(address)?.to_string());
                }
                writeln!(self.writer, "[{}]", values.join(","))?;
            } else {
                writeln!(self.writer, "{}", self.memory.load_word(sym.offset)?)?;
            }
        }

        writeln!(
            self.writer,
            "  ip={} sp={} bp={} ret={}",
            self.ip, self.sp, self.bp, self.ret
        )?;
        let registers: Vec<String> = self
            .registers
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        writeln!(self.writer, "  registers: {{ {} }}", registers.join(", "))?;

        writeln!(self.writer, "  stack:")?;
        let mut address = STACK_TOP - WORD_SIZE;
        while address >= self.sp {
            writeln!(self.writer, "    {}: {}", address, self.memory.load_word(address)?)?;
            address -= WORD_SIZE;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

use crate::constants::{MEM_SIZE, WORD_SIZE};
use iloc_common::IlocError;

/// Byte-addressable data and stack region
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self { bytes: vec![0; MEM_SIZE] }
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    fn word_range(&self, address: i32) -> Result<std::ops::Range<usize>, IlocError> {
        let start = usize::try_from(address)
            .ok()
            .filter(|start| start + WORD_SIZE as usize <= self.bytes.len())
            .ok_or(IlocError::MemoryOutOfBounds { address: address as i64 })?;
        Ok(start..start + WORD_SIZE as usize)
    }

    /// Read the big-endian word at `address`
    pub fn load_word(&self, address: i32) -> Result<i32, IlocError> {
        let range = self.word_range(address)?;
        let mut word = [0u8; WORD_SIZE as usize];
        word.copy_from_slice(&self.bytes[range]);
        Ok(i32::from_be_bytes(word))
    }

    /// Write `value` as a big-endian word at `address`
    pub fn store_word(&mut self, address: i32, value: i32) -> Result<(), IlocError> {
        let range = self.word_range(address)?;
        self.bytes[range].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_are_big_endian() {
        let mut memory = Memory::new();
        memory.store_word(8, 0x0102_0304).unwrap();
        assert_eq!(&memory.bytes()[8..12], &[1, 2, 3, 4]);
        assert_eq!(memory.load_word(8).unwrap(), 0x0102_0304);

        memory.store_word(100, -2).unwrap();
        assert_eq!(memory.load_word(100).unwrap(), -2);
    }

    #[test]
    fn test_bounds() {
        let mut memory = Memory::new();
        let last = MEM_SIZE as i32 - WORD_SIZE;
        assert!(memory.store_word(last, 7).is_ok());
        assert_eq!(
            memory.load_word(last + 1),
            Err(IlocError::MemoryOutOfBounds { address: last as i64 + 1 })
        );
        assert_eq!(
            memory.store_word(-4, 1),
            Err(IlocError::MemoryOutOfBounds { address: -4 })
        );
    }
}

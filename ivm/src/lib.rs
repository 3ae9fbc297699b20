//! ILOC Virtual Machine
//!
//! Executes ILOC programs against an emulated register file and a 64KB
//! byte-addressable memory. Memory layout:
//!
//! ```text
//! ---------------  2^16-1
//! |    Stack    |
//! |      v      |
//! |             |
//! |      ^      |
//! |     Heap    |   (unused)
//! ---------------
//! |     Data    |
//! ---------------  0
//! ```

pub mod constants;
pub mod vm;

// Re-export commonly used types
pub use vm::{Interpreter, Memory, RegName, RegisterFile, VMState};

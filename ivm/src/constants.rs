//! Central configuration and constants for the ILOC VM

pub use iloc_common::WORD_SIZE;

// Memory layout: data grows up from 0, the stack grows down from MEM_SIZE
pub const MEM_SIZE: usize = 65536;
pub const STACK_TOP: i32 = MEM_SIZE as i32;

// Return address pushed for main(); popping it ends execution
pub const RETURN_SENTINEL: i32 = -1;

// Initial value of the return register
pub const INITIAL_RET: i32 = -1;

pub const ENTRY_FUNCTION: &str = "main";

// Register budget used by `ivm --alloc` when no count is given
pub const DEFAULT_PHYSICAL_REGS: usize = iloc_ir::DEFAULT_PHYSICAL_REGS;

// Trace listing column width for instruction indices
pub const LISTING_INDEX_WIDTH: usize = 4;

//! ILOC backend - Common Types and Utilities
//! 
//! This crate contains shared identifiers, symbol definitions, and the error
//! type used by the IR, the register allocator, and the interpreter.

pub mod error;
pub mod types;

pub use error::IlocError;
pub use types::*;

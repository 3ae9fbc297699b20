//! Error handling for the ILOC backend
//! 
//! Every failure the passes or the interpreter can report is a variant of
//! [`IlocError`]. Interpreter variants are internal-consistency violations:
//! the IR handed to the backend is assumed to be valid, so any of them halts
//! execution.

use crate::types::LabelId;
use thiserror::Error;

/// Main error type shared by all backend components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IlocError {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid operand {operand} for instruction '{instruction}'")]
    InvalidOperand { operand: String, instruction: String },

    #[error("Read of unassigned register {0}")]
    UnassignedRegister(String),

    #[error("Unresolved jump label l{0}")]
    UnresolvedLabel(LabelId),

    #[error("Jump label l{0} is defined more than once")]
    DuplicateLabel(LabelId),

    #[error("Unresolved call target '{0}'")]
    UnresolvedCall(String),

    #[error("Stack overflow (sp={sp})")]
    StackOverflow { sp: i32 },

    #[error("Memory access out of bounds at address {address}")]
    MemoryOutOfBounds { address: i64 },

    #[error("Division by zero in '{instruction}'")]
    DivisionByZero { instruction: String },

    #[error("Invalid register budget {0}: at least one physical register is required")]
    RegisterBudget(usize),

    #[error("Cannot allocate '{instruction}' with {budget} physical registers")]
    InsufficientRegisters { instruction: String, budget: usize },

    #[error("Register {register} in function '{function}' exceeds the budget of {budget}")]
    RegisterOutOfBudget { function: String, register: String, budget: usize },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl IlocError {
    /// Create a parse error
    pub fn parse_error(line: usize, message: impl Into<String>) -> Self {
        IlocError::Parse { line, message: message.into() }
    }

    /// Create an invalid-operand error from displayable parts
    pub fn invalid_operand(operand: impl ToString, instruction: impl ToString) -> Self {
        IlocError::InvalidOperand {
            operand: operand.to_string(),
            instruction: instruction.to_string(),
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for IlocError {
    fn from(err: std::io::Error) -> Self {
        IlocError::Io {
            message: err.to_string(),
        }
    }
}

/// Convert from String (for simple error cases)
impl From<String> for IlocError {
    fn from(message: String) -> Self {
        IlocError::Internal { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = IlocError::parse_error(3, "unknown operand 'x1'");
        assert_eq!(err.to_string(), "Parse error at line 3: unknown operand 'x1'");

        let err = IlocError::StackOverflow { sp: -4 };
        assert_eq!(err.to_string(), "Stack overflow (sp=-4)");

        let err = IlocError::UnresolvedLabel(7);
        assert_eq!(err.to_string(), "Unresolved jump label l7");
    }

    #[test]
    fn test_conversions() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(IlocError::from(io), IlocError::Io { .. }));

        let err: IlocError = "oops".to_string().into();
        assert_eq!(err, IlocError::Internal { message: "oops".to_string() });
    }
}

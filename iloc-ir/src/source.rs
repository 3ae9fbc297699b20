//! Reading and writing whole programs as ILOC text or JSON

use crate::ir::Program;
use crate::parser::parse_program;
use iloc_common::IlocError;
use std::fs;
use std::path::Path;

/// Program encoding on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    /// `.json` files hold serialized programs, anything else is ILOC text
    pub fn from_path(path: &Path) -> Format {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Format::Json,
            _ => Format::Text,
        }
    }
}

pub fn parse_source(source: &str, format: Format) -> Result<Program, IlocError> {
    match format {
        Format::Text => parse_program(source),
        Format::Json => serde_json::from_str(source).map_err(|e| IlocError::Parse {
            line: e.line(),
            message: e.to_string(),
        }),
    }
}

pub fn read_program(path: &Path) -> Result<Program, IlocError> {
    let source = fs::read_to_string(path)?;
    parse_source(&source, Format::from_path(path))
}

pub fn render_program(program: &Program, format: Format) -> Result<String, IlocError> {
    match format {
        Format::Text => Ok(program.to_string()),
        Format::Json => serde_json::to_string_pretty(program).map_err(|e| IlocError::Internal {
            message: format!("cannot serialize program: {}", e),
        }),
    }
}

//! Common types used throughout the backend
//! 
//! This module defines the identifiers and symbol descriptions shared by the
//! IR, the register allocator, and the interpreter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Register identifier (virtual before allocation, physical after)
pub type RegId = u32;

/// Anonymous jump label identifier
pub type LabelId = u32;

/// Size of a machine word in bytes
pub const WORD_SIZE: i32 = 4;

/// Declared type of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Bool,
    Str,
    Void,
}

impl DataType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(DataType::Int),
            "bool" => Some(DataType::Bool),
            "str" => Some(DataType::Str),
            "void" => Some(DataType::Void),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::Bool => write!(f, "bool"),
            DataType::Str => write!(f, "str"),
            DataType::Void => write!(f, "void"),
        }
    }
}

/// Where a symbol's storage lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemLoc {
    /// Static data region, addressed from 0
    Global,
    /// Current stack frame, addressed from BP
    Local,
    /// A function; occupies no data memory
    StaticFunc,
}

/// A named entity produced by the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub data_type: DataType,
    pub location: MemLoc,
    pub is_array: bool,
    /// Number of elements (1 for scalars)
    pub length: u32,
    pub element_size: i32,
    /// Byte offset from the start of the owning region
    pub offset: i32,
    /// Parameter types, only meaningful for functions
    #[serde(default)]
    pub param_types: Vec<DataType>,
}

impl Symbol {
    /// Scalar global variable at `offset`
    pub fn global(name: &str, data_type: DataType, offset: i32) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            location: MemLoc::Global,
            is_array: false,
            length: 1,
            element_size: WORD_SIZE,
            offset,
            param_types: Vec::new(),
        }
    }

    /// Global array of `length` words at `offset`
    pub fn global_array(name: &str, data_type: DataType, length: u32, offset: i32) -> Self {
        Self {
            is_array: true,
            length,
            ..Self::global(name, data_type, offset)
        }
    }

    /// Function symbol with its signature
    pub fn function(name: &str, return_type: DataType, param_types: Vec<DataType>) -> Self {
        Self {
            name: name.to_string(),
            data_type: return_type,
            location: MemLoc::StaticFunc,
            is_array: false,
            length: 1,
            element_size: 0,
            offset: 0,
            param_types,
        }
    }
}

/// Ordered collection of symbols (declaration order is preserved)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a symbol, replacing an earlier one with the same name
    pub fn insert(&mut self, symbol: Symbol) {
        match self.symbols.iter_mut().find(|s| s.name == symbol.name) {
            Some(existing) => *existing = symbol,
            None => self.symbols.push(symbol),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

//! ILOC Intermediate Representation
//!
//! This module defines the three-address IR consumed by the backend. A
//! program is produced once by an external front end and then mutated in
//! place by canonicalization and register allocation before it is executed.

use crate::cfg::Cfg;
use iloc_common::{IlocError, LabelId, MemLoc, RegId, Symbol, SymbolTable};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// IR operand
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    /// Symbolic register assigned before allocation
    VirtualReg(RegId),

    /// Machine register slot assigned by allocation
    PhysicalReg(RegId),

    /// Base pointer of the current frame
    BaseReg,

    /// Function return value register
    ReturnReg,

    IntConst(i32),

    StrConst(String),

    /// Anonymous label used by jumps and branches
    JumpLabel(LabelId),

    /// Function name used by calls
    CallLabel(String),
}

impl Operand {
    pub fn virtual_reg(&self) -> Option<RegId> {
        match self {
            Operand::VirtualReg(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::VirtualReg(id) => write!(f, "r{}", id),
            Operand::PhysicalReg(id) => write!(f, "p{}", id),
            Operand::BaseReg => write!(f, "bp"),
            Operand::ReturnReg => write!(f, "ret"),
            Operand::IntConst(value) => write!(f, "{}", value),
            Operand::StrConst(text) => write!(f, "\"{}\"", escape_string(text)),
            Operand::JumpLabel(id) => write!(f, "l{}", id),
            Operand::CallLabel(name) => write!(f, "{}", name),
        }
    }
}

/// Escape a string constant for the textual form
pub(crate) fn escape_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Instruction opcodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Nop,
    Label,

    // Loads and stores
    LoadI,
    I2I,
    Load,
    LoadAI,
    LoadAO,
    Store,
    StoreAI,
    StoreAO,

    // Arithmetic
    Add,
    AddI,
    Sub,
    Mult,
    MultI,
    Div,
    Neg,

    // Boolean
    And,
    Or,
    Not,

    // Control flow
    Jump,
    Cbr,

    // Comparison (produce 0 or 1)
    CmpLt,
    CmpLe,
    CmpEq,
    CmpGe,
    CmpGt,
    CmpNe,

    // Calls
    Param,
    Call,
    Return,

    Print,

    /// Mnemonic the backend does not know; executes as a no-op
    Unknown(String),
}

impl Opcode {
    pub fn mnemonic(&self) -> &str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Label => "label",
            Opcode::LoadI => "loadI",
            Opcode::I2I => "i2i",
            Opcode::Load => "load",
            Opcode::LoadAI => "loadAI",
            Opcode::LoadAO => "loadAO",
            Opcode::Store => "store",
            Opcode::StoreAI => "storeAI",
            Opcode::StoreAO => "storeAO",
            Opcode::Add => "add",
            Opcode::AddI => "addI",
            Opcode::Sub => "sub",
            Opcode::Mult => "mult",
            Opcode::MultI => "multI",
            Opcode::Div => "div",
            Opcode::Neg => "neg",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Not => "not",
            Opcode::Jump => "jump",
            Opcode::Cbr => "cbr",
            Opcode::CmpLt => "cmp_LT",
            Opcode::CmpLe => "cmp_LE",
            Opcode::CmpEq => "cmp_EQ",
            Opcode::CmpGe => "cmp_GE",
            Opcode::CmpGt => "cmp_GT",
            Opcode::CmpNe => "cmp_NE",
            Opcode::Param => "param",
            Opcode::Call => "call",
            Opcode::Return => "return",
            Opcode::Print => "print",
            Opcode::Unknown(name) => name,
        }
    }

    /// Look up an opcode by mnemonic; unrecognized names become `Unknown`
    pub fn from_mnemonic(name: &str) -> Opcode {
        match name {
            "nop" => Opcode::Nop,
            "loadI" => Opcode::LoadI,
            "i2i" => Opcode::I2I,
            "load" => Opcode::Load,
            "loadAI" => Opcode::LoadAI,
            "loadAO" => Opcode::LoadAO,
            "store" => Opcode::Store,
            "storeAI" => Opcode::StoreAI,
            "storeAO" => Opcode::StoreAO,
            "add" => Opcode::Add,
            "addI" => Opcode::AddI,
            "sub" => Opcode::Sub,
            "mult" => Opcode::Mult,
            "multI" => Opcode::MultI,
            "div" => Opcode::Div,
            "neg" => Opcode::Neg,
            "and" => Opcode::And,
            "or" => Opcode::Or,
            "not" => Opcode::Not,
            "jump" => Opcode::Jump,
            "cbr" => Opcode::Cbr,
            "cmp_LT" => Opcode::CmpLt,
            "cmp_LE" => Opcode::CmpLe,
            "cmp_EQ" => Opcode::CmpEq,
            "cmp_GE" => Opcode::CmpGe,
            "cmp_GT" => Opcode::CmpGt,
            "cmp_NE" => Opcode::CmpNe,
            "param" => Opcode::Param,
            "call" => Opcode::Call,
            "return" => Opcode::Return,
            "print" => Opcode::Print,
            other => Opcode::Unknown(other.to_string()),
        }
    }

    /// Number of operands the opcode takes (None for unknown opcodes)
    pub fn arity(&self) -> Option<usize> {
        match self {
            Opcode::Nop | Opcode::Return => Some(0),
            Opcode::Label | Opcode::Jump | Opcode::Param | Opcode::Call | Opcode::Print => Some(1),
            Opcode::LoadI | Opcode::I2I | Opcode::Load | Opcode::Store
            | Opcode::Not | Opcode::Neg => Some(2),
            Opcode::LoadAI | Opcode::LoadAO | Opcode::StoreAI | Opcode::StoreAO
            | Opcode::Add | Opcode::AddI | Opcode::Sub | Opcode::Mult | Opcode::MultI
            | Opcode::Div | Opcode::And | Opcode::Or | Opcode::Cbr
            | Opcode::CmpLt | Opcode::CmpLe | Opcode::CmpEq
            | Opcode::CmpGe | Opcode::CmpGt | Opcode::CmpNe => Some(3),
            Opcode::Unknown(_) => None,
        }
    }

    /// Operands printed before the `=>` arrow in the textual form
    pub fn source_count(&self) -> Option<usize> {
        match self {
            Opcode::LoadI | Opcode::I2I | Opcode::Load | Opcode::Store
            | Opcode::StoreAI | Opcode::StoreAO | Opcode::Not | Opcode::Neg
            | Opcode::Cbr => Some(1),
            Opcode::LoadAI | Opcode::LoadAO
            | Opcode::Add | Opcode::AddI | Opcode::Sub | Opcode::Mult | Opcode::MultI
            | Opcode::Div | Opcode::And | Opcode::Or
            | Opcode::CmpLt | Opcode::CmpLe | Opcode::CmpEq
            | Opcode::CmpGe | Opcode::CmpGt | Opcode::CmpNe => Some(2),
            _ => None,
        }
    }

    /// Index of the operand this opcode writes, if any
    pub fn dest_index(&self) -> Option<usize> {
        match self {
            Opcode::LoadI | Opcode::I2I | Opcode::Load | Opcode::Not | Opcode::Neg => Some(1),
            Opcode::LoadAI | Opcode::LoadAO
            | Opcode::Add | Opcode::AddI | Opcode::Sub | Opcode::Mult | Opcode::MultI
            | Opcode::Div | Opcode::And | Opcode::Or
            | Opcode::CmpLt | Opcode::CmpLe | Opcode::CmpEq
            | Opcode::CmpGe | Opcode::CmpGt | Opcode::CmpNe => Some(2),
            _ => None,
        }
    }

    /// Check if this opcode ends a basic block
    pub fn is_terminator(&self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Cbr | Opcode::Return)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// IR Instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
    /// Free text shown in listings and traces only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Self { opcode, operands, comment: None }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Label marker for an anonymous jump label
    pub fn label(id: LabelId) -> Self {
        Self::new(Opcode::Label, vec![Operand::JumpLabel(id)])
    }

    /// The operand written by this instruction, if it writes one
    pub fn defined_operand(&self) -> Option<&Operand> {
        self.opcode.dest_index().and_then(|idx| self.operands.get(idx))
    }

    /// Check if the operand at `idx` is written rather than read
    pub fn is_def(&self, idx: usize) -> bool {
        self.opcode.dest_index() == Some(idx)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode == Opcode::Label {
            match self.operands.first() {
                Some(target) => write!(f, "{}:", target)?,
                None => write!(f, "label")?,
            }
        } else {
            write!(f, "{}", self.opcode)?;
            let split = self
                .opcode
                .source_count()
                .unwrap_or(self.operands.len())
                .min(self.operands.len());
            let (sources, dests) = self.operands.split_at(split);
            for (i, op) in sources.iter().enumerate() {
                write!(f, "{}{}", if i == 0 { " " } else { ", " }, op)?;
            }
            if !dests.is_empty() {
                write!(f, " =>")?;
                for (i, op) in dests.iter().enumerate() {
                    write!(f, "{}{}", if i == 0 { " " } else { ", " }, op)?;
                }
            }
        }
        if let Some(comment) = &self.comment {
            write!(f, "  // {}", comment)?;
        }
        Ok(())
    }
}

/// Function body: a straight instruction list or a block graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionBody {
    Linear(Vec<Instruction>),
    Blocks(Cfg),
}

/// Function in IR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub symbol: Symbol,
    pub body: FunctionBody,
    /// Bytes reserved below BP for locals and spill slots
    pub local_size: i32,
}

impl Function {
    pub fn new(symbol: Symbol, instructions: Vec<Instruction>, local_size: i32) -> Self {
        Self {
            symbol,
            body: FunctionBody::Linear(instructions),
            local_size,
        }
    }

    pub fn name(&self) -> &str {
        &self.symbol.name
    }

    /// Flat instruction view, regardless of how the body is stored
    pub fn instructions(&self) -> Cow<'_, [Instruction]> {
        match &self.body {
            FunctionBody::Linear(instructions) => Cow::Borrowed(instructions.as_slice()),
            FunctionBody::Blocks(cfg) => Cow::Owned(cfg.flatten()),
        }
    }

    pub fn set_instructions(&mut self, instructions: Vec<Instruction>) {
        self.body = FunctionBody::Linear(instructions);
    }

    /// Block view of the body, building the CFG on first use
    pub fn cfg_mut(&mut self) -> Result<&mut Cfg, IlocError> {
        if let FunctionBody::Linear(instructions) = &self.body {
            let cfg = Cfg::build(instructions)?;
            self.body = FunctionBody::Blocks(cfg);
        }
        match &mut self.body {
            FunctionBody::Blocks(cfg) => Ok(cfg),
            FunctionBody::Linear(_) => Err(IlocError::Internal {
                message: format!("CFG for '{}' was not built", self.symbol.name),
            }),
        }
    }

    /// Reserve another `bytes` in the frame and return the new frame size
    pub fn grow_frame(&mut self, bytes: i32) -> i32 {
        self.local_size += bytes.max(0);
        self.local_size
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".function {} {}(", self.symbol.data_type, self.symbol.name)?;
        for (i, param) in self.symbol.param_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        writeln!(f, ") locals={}", self.local_size)?;
        for instr in self.instructions().iter() {
            if instr.opcode == Opcode::Label {
                writeln!(f, "{}", instr)?;
            } else {
                writeln!(f, "    {}", instr)?;
            }
        }
        Ok(())
    }
}

/// Whole program: functions plus the static symbol table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<Function>,
    pub statics: SymbolTable,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function and register its symbol in the static table
    pub fn add_function(&mut self, function: Function) {
        self.statics.insert(function.symbol.clone());
        self.functions.push(function);
    }

    pub fn add_global(&mut self, symbol: Symbol) {
        self.statics.insert(symbol);
    }

    /// Global data symbols in declaration order
    pub fn globals(&self) -> impl Iterator<Item = &Symbol> {
        self.statics
            .symbols()
            .iter()
            .filter(|s| s.location != MemLoc::StaticFunc)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for global in self.globals() {
            write!(f, ".global {} {}", global.name, global.data_type)?;
            if global.is_array {
                write!(f, "[{}]", global.length)?;
            }
            writeln!(f, " @{}", global.offset)?;
        }
        for function in &self.functions {
            write!(f, "{}", function)?;
        }
        Ok(())
    }
}

use iloc_common::{IlocError, RegId};
use iloc_ir::Operand;
use std::collections::BTreeMap;
use std::fmt;

/// VM execution states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VMState {
    Setup,
    Running,
    Halted,
}

/// Key of a general-purpose register; virtual and physical ids never alias
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegName {
    Virtual(RegId),
    Physical(RegId),
}

impl RegName {
    pub fn of(operand: &Operand) -> Option<RegName> {
        match operand {
            Operand::VirtualReg(id) => Some(RegName::Virtual(*id)),
            Operand::PhysicalReg(id) => Some(RegName::Physical(*id)),
            _ => None,
        }
    }
}

impl fmt::Display for RegName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegName::Virtual(id) => write!(f, "r{}", id),
            RegName::Physical(id) => write!(f, "p{}", id),
        }
    }
}

/// Unbounded general-purpose register file
#[derive(Debug, Default, Clone)]
pub struct RegisterFile {
    values: BTreeMap<RegName, i32>,
}

impl RegisterFile {
    pub fn get(&self, name: RegName) -> Result<i32, IlocError> {
        self.values
            .get(&name)
            .copied()
            .ok_or_else(|| IlocError::UnassignedRegister(name.to_string()))
    }

    pub fn set(&mut self, name: RegName, value: i32) {
        self.values.insert(name, value);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Registers in id order, virtual before physical
    pub fn iter(&self) -> impl Iterator<Item = (RegName, i32)> + '_ {
        self.values.iter().map(|(name, value)| (*name, *value))
    }
}

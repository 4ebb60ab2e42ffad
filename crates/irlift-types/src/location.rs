//! Parameter and return value locations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TypeId;

/// Where a value is passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    /// In a register.
    Register { name: String },
    /// In memory at `base + offset`.
    Memory { base: String, offset: i64 },
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Register { name } => write!(f, "{}", name),
            Storage::Memory { base, offset } if *offset < 0 => {
                write!(f, "[{} - {:#x}]", base, offset.unsigned_abs())
            }
            Storage::Memory { base, offset } => write!(f, "[{} + {:#x}]", base, offset),
        }
    }
}

/// A typed parameter or return value binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub storage: Storage,
    pub ty: TypeId,
}

impl Location {
    pub fn register(name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            storage: Storage::Register { name: name.into() },
            ty,
        }
    }

    pub fn memory(base: impl Into<String>, offset: i64, ty: TypeId) -> Self {
        Self {
            storage: Storage::Memory {
                base: base.into(),
                offset,
            },
            ty,
        }
    }

    /// The register name, for register locations.
    pub fn register_name(&self) -> Option<&str> {
        match &self.storage {
            Storage::Register { name } => Some(name),
            Storage::Memory { .. } => None,
        }
    }
}

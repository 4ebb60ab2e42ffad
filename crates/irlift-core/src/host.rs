//! Traits for host analysis engine abstraction.

use crate::{LlilExpr, LlilInstruction, TypeDescriptor};

/// A binary loaded into the host analysis engine.
///
/// This trait abstracts over the engine's view of a program so the rest of
/// the workspace can translate its types and functions without linking
/// against the engine.
pub trait BinaryView {
    /// The engine's function object.
    type Function: HostFunction;

    /// Returns the engine's architecture identifier (e.g. `x86_64`).
    fn architecture_name(&self) -> &str;

    /// Returns the engine's platform identifier (e.g. `linux-x86_64`).
    fn platform_name(&self) -> &str;

    /// Returns the name of the stack pointer register.
    fn stack_pointer(&self) -> &str;

    /// Resolves a register storage index to its name.
    fn register_name(&self, storage: i64) -> Option<&str>;

    /// Returns the function starting at `addr`, if any.
    fn function_at(&self, addr: u64) -> Option<&Self::Function>;

    /// Returns every function whose body contains `addr`.
    fn functions_containing(&self, addr: u64) -> Vec<&Self::Function>;

    /// Returns an iterator over all functions.
    fn functions(&self) -> Box<dyn Iterator<Item = &Self::Function> + '_>;

    /// Reads one byte of the binary image.
    fn read_u8(&self, addr: u64) -> Option<u8>;

    /// Returns the segment containing `addr`.
    fn segment_at(&self, addr: u64) -> Option<&Segment>;

    /// Returns the sections overlapping `addr`.
    fn sections_at(&self, addr: u64) -> Vec<&Section>;

    /// Looks up a registered type by its stable id.
    fn type_by_id(&self, id: &str) -> Option<&TypeDescriptor>;

    /// Looks up a registered type by name.
    fn type_by_name(&self, name: &str) -> Option<&TypeDescriptor>;

    /// Returns true if `addr` lies in a read-only code section.
    fn is_code(&self, addr: u64) -> bool {
        self.sections_at(addr)
            .into_iter()
            .find(|section| section.contains(addr))
            .map(|section| section.semantics == SectionSemantics::ReadOnlyCode)
            .unwrap_or(false)
    }
}

/// A function recovered by the host engine.
pub trait HostFunction {
    /// Function name.
    fn name(&self) -> &str;

    /// Entry address.
    fn start(&self) -> u64;

    /// The function's type descriptor.
    fn function_type(&self) -> &TypeDescriptor;

    /// The return type descriptor.
    fn return_type(&self) -> &TypeDescriptor;

    /// The calling convention the host assigned.
    fn calling_convention(&self) -> &CallingConventionInfo;

    /// Registers that carry the return value.
    fn return_registers(&self) -> &[String];

    /// Parameter variables in declaration order.
    fn parameter_vars(&self) -> &[Variable];

    /// Basic block address ranges.
    fn basic_blocks(&self) -> &[BlockRange];

    /// The lifted IL expression of the instruction at `addr`.
    fn lifted_il_at(&self, addr: u64) -> Option<&LlilExpr>;

    /// All low-level IL instructions of the function.
    fn low_level_il(&self) -> &[LlilInstruction];

    /// Returns true if any basic block contains `addr`.
    fn contains(&self, addr: u64) -> bool {
        self.basic_blocks().iter().any(|block| block.contains(addr))
    }
}

/// A basic block's `[start, end)` address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// A memory segment with its permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    pub start: u64,
    pub end: u64,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

impl Segment {
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Section semantics as classified by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SectionSemantics {
    Default,
    ReadOnlyCode,
    ReadOnlyData,
    ReadWriteData,
    External,
}

/// A named section.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Section {
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub semantics: SectionSemantics,
}

impl Section {
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// A calling convention as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallingConventionInfo {
    pub name: String,
    /// Integer argument registers in assignment order.
    pub int_arg_regs: Vec<String>,
    /// Floating-point argument registers in assignment order.
    pub float_arg_regs: Vec<String>,
}

impl CallingConventionInfo {
    pub fn new(name: &str, int_arg_regs: &[&str], float_arg_regs: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            int_arg_regs: int_arg_regs.iter().map(|r| r.to_string()).collect(),
            float_arg_regs: float_arg_regs.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// x86-64 System V.
    pub fn sysv() -> Self {
        Self::new(
            "sysv",
            &["rdi", "rsi", "rdx", "rcx", "r8", "r9"],
            &["xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7"],
        )
    }
}

/// Where a variable lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariableSource {
    Register,
    Stack,
    Flag,
}

/// A host variable (parameter or MLIL variable).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variable {
    pub name: String,
    pub source: VariableSource,
    /// Register storage index or stack offset, depending on `source`.
    pub storage: i64,
    pub ty: TypeDescriptor,
}

impl Variable {
    pub fn register(name: &str, storage: i64, ty: TypeDescriptor) -> Self {
        Self {
            name: name.to_string(),
            source: VariableSource::Register,
            storage,
            ty,
        }
    }

    pub fn stack(name: &str, offset: i64, ty: TypeDescriptor) -> Self {
        Self {
            name: name.to_string(),
            source: VariableSource::Stack,
            storage: offset,
            ty,
        }
    }
}

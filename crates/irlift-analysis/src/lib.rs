//! # irlift-analysis
//!
//! Per-function facts derived from a host engine's view of a program.
//!
//! This crate provides:
//! - Calling convention binding of parameters and return values
//! - Byte maps of function bodies with segment permissions
//! - Cross-reference classification over lifted IL trees
//! - Typed-register recovery from register value analysis and MLIL

pub mod calling_convention;
pub mod memory;
pub mod typed_registers;
pub mod xrefs;

pub use calling_convention::{bind_parameters, bind_returns, ArgumentRegisters, BindError, RegisterClass};
pub use memory::{ByteMap, MappedByte, MemoryRun};
pub use typed_registers::{recover, RegisterBinding, TypedRegister};
pub use xrefs::{collect_code_xrefs, extract, XrefKind, XrefSet};

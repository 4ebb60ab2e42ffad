//! # irlift-core
//!
//! Core abstractions shared by the irlift crates. This crate defines the
//! architecture and operating system handlers, the data model of the host
//! analysis engine (type descriptors, variables, segments, IL trees) and the
//! traits through which the rest of the workspace talks to that engine.

pub mod arch;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod il;
pub mod static_host;

pub use arch::{Architecture, OperatingSystem};
pub use descriptor::{NamedTypeClass, StructureMember, StructureVariant, TypeDescriptor, TypeKind};
pub use error::Error;
pub use host::{
    BinaryView, BlockRange, CallingConventionInfo, HostFunction, Section, SectionSemantics,
    Segment, Variable, VariableSource,
};
pub use il::{
    LlilExpr, LlilInstruction, LlilOperand, LowLevelOperation, MediumLevelOperation, MlilExpr,
    MlilOperand, RegisterValue,
};
pub use static_host::{StaticFunction, StaticHost};

//! # irlift
//!
//! Normalizes a host analysis engine's view of a binary into an
//! engine-independent Type IR and derives the per-function facts a binary
//! lifter needs: parameter and return locations, byte maps with segment
//! permissions, code cross-references and typed-register timelines.
//!
//! The host engine is reached through the [`BinaryView`] and
//! [`HostFunction`] traits of `irlift-core`; [`StaticHost`] implements them
//! over plain data.
//!
//! # Example
//!
//! ```ignore
//! use irlift::{Program, ProgramCache, ProgramConfig};
//!
//! let mut cache = ProgramCache::new();
//! let mut program = cache.get_or_load(&view, ProgramConfig::default())?;
//! let main = program.function(0x401000)?;
//! let body = program.function_body(&main)?;
//! for entity in program.resolve_references(&body) {
//!     println!("{:?}", entity);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod program;

pub use cache::{ProgramCache, ProgramHandle};
pub use config::{CachePolicy, ProgramConfig};
pub use error::{Error, Result};
pub use program::{EntityRef, Function, FunctionBody, Program};

pub use irlift_core::{Architecture, BinaryView, HostFunction, OperatingSystem, StaticFunction, StaticHost};
pub use irlift_types::{Location, Storage, Type, TypeArena, TypeId};

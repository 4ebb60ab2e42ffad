//! # irlift-types
//!
//! Engine-independent Type IR for irlift.
//!
//! This crate provides:
//! - The Type IR node set and the arena that owns it
//! - Type normalization from host descriptors, with an identity cache that
//!   makes recursive type graphs terminate
//! - Structure layout reconstruction with synthetic padding
//! - Parameter/return [`Location`]s
//!
//! # Example
//!
//! ```ignore
//! use irlift_core::{StaticHost, TypeDescriptor};
//! use irlift_types::TypeNormalizer;
//!
//! let host = StaticHost::linux_x86_64();
//! let mut types = TypeNormalizer::new(8);
//! let id = types.normalize(&host, &TypeDescriptor::int(4, true))?;
//! println!("{}", types.arena().display(id));
//! ```

pub mod display;
pub mod ir;
pub mod layout;
pub mod location;
pub mod normalize;

pub use display::TypeDisplay;
pub use ir::{Type, TypeArena, TypeId};
pub use layout::{plan_structure, LayoutElement, MemberSpan};
pub use location::{Location, Storage};
pub use normalize::{NormalizeError, TypeNormalizer};

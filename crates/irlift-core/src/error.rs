//! Error types for irlift-core.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The host reported an architecture with no handler.
    #[error("missing architecture handler for '{0}'")]
    UnsupportedArchitecture(String),

    /// The host platform string names no known operating system.
    #[error("missing operating system handler for platform '{0}'")]
    UnsupportedOs(String),
}

//! Error types for program loading and function lookup.

use irlift_analysis::BindError;
use irlift_types::NormalizeError;
use thiserror::Error;

/// Errors raised by [`Program`](crate::Program).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No host function starts at or contains the address.
    #[error("no function defined at or containing address {0:#x}")]
    FunctionNotFound(u64),

    #[error(transparent)]
    Core(#[from] irlift_core::Error),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Result alias for irlift operations.
pub type Result<T> = std::result::Result<T, Error>;

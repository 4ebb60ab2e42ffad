//! Architecture and operating system identification.

use crate::Error;

/// Supported CPU architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Architecture {
    /// 32-bit x86
    X86,
    /// x86-64 / AMD64
    Amd64,
    /// ARM 64-bit (AArch64)
    AArch64,
}

impl Architecture {
    /// Resolves the host engine's architecture identifier.
    pub fn from_host_name(name: &str) -> Result<Self, Error> {
        match name {
            "x86_64" => Ok(Self::Amd64),
            "x86" => Ok(Self::X86),
            "aarch64" => Ok(Self::AArch64),
            _ => Err(Error::UnsupportedArchitecture(name.to_string())),
        }
    }

    /// Returns the pointer size in bytes for this architecture.
    pub fn pointer_size(&self) -> usize {
        match self {
            Self::Amd64 | Self::AArch64 => 8,
            Self::X86 => 4,
        }
    }

    /// Returns whether this is a 64-bit architecture.
    pub fn is_64bit(&self) -> bool {
        matches!(self, Self::Amd64 | Self::AArch64)
    }

    /// Returns the name of this architecture.
    pub fn name(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::Amd64 => "amd64",
            Self::AArch64 => "aarch64",
        }
    }
}

/// Supported operating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperatingSystem {
    Linux,
    MacOs,
    Windows,
}

impl OperatingSystem {
    /// Resolves the host engine's platform string (e.g. `linux-x86_64`).
    ///
    /// Matching is by substring, checked in the order linux, mac, windows.
    pub fn from_platform(platform: &str) -> Result<Self, Error> {
        if platform.contains("linux") {
            Ok(Self::Linux)
        } else if platform.contains("mac") {
            Ok(Self::MacOs)
        } else if platform.contains("windows") {
            Ok(Self::Windows)
        } else {
            Err(Error::UnsupportedOs(platform.to_string()))
        }
    }

    /// Returns the name of this operating system.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
        }
    }
}

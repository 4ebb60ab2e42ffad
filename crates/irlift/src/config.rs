//! Program configuration.

/// Whether a load may reuse the program held by a
/// [`ProgramCache`](crate::ProgramCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Reuse the cached program and cache newly loaded ones.
    #[default]
    Reuse,
    /// Build a fresh program and leave the cache untouched.
    Bypass,
}

/// Configuration for a loaded [`Program`](crate::Program).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramConfig {
    /// Recover typed-register timelines for function bodies.
    pub typed_registers: bool,
    /// Classify cross-references while mapping function bytes.
    pub xrefs: bool,
    pub cache_policy: CachePolicy,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            typed_registers: true,
            xrefs: true,
            cache_policy: CachePolicy::Reuse,
        }
    }
}

impl ProgramConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables typed-register recovery.
    pub fn with_typed_registers(mut self, enabled: bool) -> Self {
        self.typed_registers = enabled;
        self
    }

    /// Enables or disables xref classification.
    pub fn with_xrefs(mut self, enabled: bool) -> Self {
        self.xrefs = enabled;
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Shorthand for [`CachePolicy::Bypass`].
    pub fn bypass_cache(self) -> Self {
        self.with_cache_policy(CachePolicy::Bypass)
    }
}

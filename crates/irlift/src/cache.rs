//! Single-slot program cache.

use std::ops::{Deref, DerefMut};

use irlift_core::BinaryView;
use tracing::debug;

use crate::config::{CachePolicy, ProgramConfig};
use crate::error::Result;
use crate::program::Program;

/// Holds at most one loaded program.
///
/// A cached program is reused for requests naming the same view and
/// configuration. Any other request replaces it; the last writer wins.
#[derive(Debug)]
pub struct ProgramCache<'v, V: BinaryView + ?Sized> {
    slot: Option<Program<'v, V>>,
}

impl<'v, V: BinaryView + ?Sized> Default for ProgramCache<'v, V> {
    fn default() -> Self {
        Self { slot: None }
    }
}

/// A program returned by [`ProgramCache::get_or_load`].
#[derive(Debug)]
pub enum ProgramHandle<'c, 'v, V: BinaryView + ?Sized> {
    /// The program held by the cache.
    Cached(&'c mut Program<'v, V>),
    /// A program built for a [`CachePolicy::Bypass`] request.
    Uncached(Program<'v, V>),
}

impl<'c, 'v, V: BinaryView + ?Sized> ProgramHandle<'c, 'v, V> {
    pub fn is_cached(&self) -> bool {
        matches!(self, ProgramHandle::Cached(_))
    }
}

impl<'c, 'v, V: BinaryView + ?Sized> Deref for ProgramHandle<'c, 'v, V> {
    type Target = Program<'v, V>;

    fn deref(&self) -> &Program<'v, V> {
        match self {
            ProgramHandle::Cached(program) => program,
            ProgramHandle::Uncached(program) => program,
        }
    }
}

impl<'c, 'v, V: BinaryView + ?Sized> DerefMut for ProgramHandle<'c, 'v, V> {
    fn deref_mut(&mut self) -> &mut Program<'v, V> {
        match self {
            ProgramHandle::Cached(program) => program,
            ProgramHandle::Uncached(program) => program,
        }
    }
}

impl<'v, V: BinaryView + ?Sized> ProgramCache<'v, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// The cached program, if any.
    pub fn get(&mut self) -> Option<&mut Program<'v, V>> {
        self.slot.as_mut()
    }

    /// Get the program for `view`, loading it on a miss.
    ///
    /// With [`CachePolicy::Bypass`] a fresh program is built and the cache
    /// is neither consulted nor changed. A failed load leaves the cache as
    /// it was.
    pub fn get_or_load(&mut self, view: &'v V, config: ProgramConfig) -> Result<ProgramHandle<'_, 'v, V>> {
        if config.cache_policy == CachePolicy::Bypass {
            debug!("program cache bypassed");
            return Ok(ProgramHandle::Uncached(Program::load(view, config)?));
        }

        let program = match self.slot.take() {
            Some(cached) if cached.is_view(view) && *cached.config() == config => {
                debug!("reusing cached program");
                cached
            }
            previous => match Program::load(view, config) {
                Ok(program) => program,
                Err(err) => {
                    self.slot = previous;
                    return Err(err);
                }
            },
        };
        Ok(ProgramHandle::Cached(self.slot.insert(program)))
    }

    /// Put `program` in the cache, returning the one it replaces.
    pub fn store(&mut self, program: Program<'v, V>) -> Option<Program<'v, V>> {
        self.slot.replace(program)
    }

    /// Drop the cached program.
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

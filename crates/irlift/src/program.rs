//! The loaded program and its function facts.

use irlift_analysis::{bind_parameters, bind_returns, extract, recover, ByteMap, TypedRegister, XrefSet};
use irlift_core::{Architecture, BinaryView, HostFunction, OperatingSystem, TypeDescriptor};
use irlift_types::{Location, TypeArena, TypeId, TypeNormalizer};
use tracing::debug;

use crate::config::ProgramConfig;
use crate::error::{Error, Result};

/// Signature facts of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Function {
    /// Entry address of the host function.
    pub address: u64,
    pub name: String,
    pub function_type: TypeId,
    /// Parameter locations in declaration order.
    pub parameters: Vec<Location>,
    /// One location per return register; empty for void functions.
    pub returns: Vec<Location>,
}

/// Body facts of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionBody {
    pub address: u64,
    pub memory: ByteMap,
    pub xrefs: XrefSet,
    pub typed_registers: Vec<TypedRegister>,
}

/// What a cross-reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityRef {
    /// A function starts at the address.
    Function(u64),
    Data(u64),
}

impl EntityRef {
    pub fn address(&self) -> u64 {
        match self {
            EntityRef::Function(addr) | EntityRef::Data(addr) => *addr,
        }
    }
}

/// A program loaded from a host binary view.
///
/// Owns the Type IR of the program: every type reachable from the
/// functions looked up so far lives in one arena, and named types are
/// built once.
#[derive(Debug)]
pub struct Program<'v, V: BinaryView + ?Sized> {
    view: &'v V,
    architecture: Architecture,
    os: OperatingSystem,
    config: ProgramConfig,
    types: TypeNormalizer,
}

impl<'v, V: BinaryView + ?Sized> Program<'v, V> {
    /// Load a program, resolving the view's architecture and operating
    /// system.
    pub fn load(view: &'v V, config: ProgramConfig) -> Result<Self> {
        let architecture = Architecture::from_host_name(view.architecture_name())?;
        let os = OperatingSystem::from_platform(view.platform_name())?;
        debug!(
            architecture = architecture.name(),
            os = os.name(),
            "loaded program"
        );

        Ok(Self {
            view,
            architecture,
            os,
            config,
            types: TypeNormalizer::new(architecture.pointer_size()),
        })
    }

    pub fn view(&self) -> &'v V {
        self.view
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn os(&self) -> OperatingSystem {
        self.os
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Returns true if this program was loaded from `view`.
    pub fn is_view(&self, view: &V) -> bool {
        std::ptr::eq(self.view, view)
    }

    /// `(start, name)` of every host function.
    pub fn functions(&self) -> Vec<(u64, String)> {
        self.view
            .functions()
            .map(|func| (func.start(), func.name().to_string()))
            .collect()
    }

    /// The arena holding the program's Type IR.
    pub fn types(&self) -> &TypeArena {
        self.types.arena()
    }

    /// Normalize a host type descriptor into the program's Type IR.
    pub fn type_of(&mut self, desc: &TypeDescriptor) -> Result<TypeId> {
        Ok(self.types.normalize(self.view, desc)?)
    }

    /// The host function starting at `addr`, or else the first one
    /// containing it.
    fn host_function(&self, addr: u64) -> Result<&'v V::Function> {
        let view = self.view;
        view.function_at(addr)
            .or_else(|| view.functions_containing(addr).into_iter().next())
            .ok_or(Error::FunctionNotFound(addr))
    }

    /// Signature of the function at or containing `addr`.
    pub fn function(&mut self, addr: u64) -> Result<Function> {
        let view = self.view;
        let func = self.host_function(addr)?;
        if func.start() != addr {
            debug!(addr, start = func.start(), name = func.name(), "address resolved to containing function");
        }

        let function_type = self.types.normalize(view, func.function_type())?;
        let parameters = bind_parameters(view, func, &mut self.types)?;
        let returns = bind_returns(view, func, &mut self.types)?;

        Ok(Function {
            address: func.start(),
            name: func.name().to_string(),
            function_type,
            parameters,
            returns,
        })
    }

    /// Byte map, xrefs and typed registers of `function`.
    pub fn function_body(&mut self, function: &Function) -> Result<FunctionBody> {
        let view = self.view;
        let func = self.host_function(function.address)?;

        let (memory, xrefs) = extract(view, func, self.config.xrefs);
        let typed_registers = if self.config.typed_registers {
            recover(view, func, &mut self.types)?
        } else {
            Vec::new()
        };

        Ok(FunctionBody {
            address: func.start(),
            memory,
            xrefs,
            typed_registers,
        })
    }

    /// Resolve each xref of `body` to the entity it references.
    pub fn resolve_references(&self, body: &FunctionBody) -> Vec<EntityRef> {
        body.xrefs
            .iter()
            .map(|&addr| match self.view.function_at(addr) {
                Some(_) => EntityRef::Function(addr),
                None => EntityRef::Data(addr),
            })
            .collect()
    }
}

//! Calling convention binding.
//!
//! Maps a function's parameter variables and return type to [`Location`]s:
//! - Register-resident integer and pointer parameters take the next integer
//!   argument register, floating-point parameters the next float register
//! - Stack-resident parameters live at `stack pointer + storage offset`
//! - A non-void return value is reported in every return register
//!
//! Register classes are decided on the normalized type with typedefs peeled
//! off, so an x87 extended-precision value reported as an 80-bit integer
//! travels in a float register. Only a parameter declared void (directly or
//! through typedefs) is an invalid parameter; classes that normalize to void
//! without being declared void have no register binding.
//!
//! The `cdecl` convention passes floating-point values on the x87 stack,
//! so for it (and only it) the float registers are `st0` to `st5`,
//! whatever the host reports.

use std::collections::HashSet;
use std::fmt;

use irlift_core::{
    BinaryView, CallingConventionInfo, HostFunction, NamedTypeClass, TypeDescriptor, TypeKind, VariableSource,
};
use irlift_types::{Location, NormalizeError, Type, TypeArena, TypeId, TypeNormalizer};
use thiserror::Error;
use tracing::debug;

/// Float argument registers used by `cdecl`.
pub const CDECL_FLOAT_REGISTERS: [&str; 6] = ["st0", "st1", "st2", "st3", "st4", "st5"];

/// Errors raised while binding a signature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// A register-resident parameter is void-typed.
    #[error("parameter '{parameter}' of '{function}' is void but passed in a register")]
    InvalidParameterType { function: String, parameter: String },

    /// A register-resident parameter has no register class.
    #[error("no argument register class for parameter '{parameter}' of '{function}'")]
    MissingRegisterBinding { function: String, parameter: String },

    /// The convention ran out of argument registers.
    #[error("calling convention '{convention}' has no {class} argument register left for parameter '{parameter}'")]
    RegisterListExhausted {
        convention: String,
        class: RegisterClass,
        parameter: String,
    },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Argument register class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    Integer,
    Float,
}

impl fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterClass::Integer => write!(f, "integer"),
            RegisterClass::Float => write!(f, "float"),
        }
    }
}

/// Hands out a convention's argument registers in assignment order.
#[derive(Debug, Clone)]
pub struct ArgumentRegisters<'a> {
    convention: &'a str,
    int_regs: Vec<&'a str>,
    float_regs: Vec<&'a str>,
    next_int: usize,
    next_float: usize,
}

impl<'a> ArgumentRegisters<'a> {
    pub fn new(cc: &'a CallingConventionInfo) -> Self {
        let float_regs = if cc.name == "cdecl" {
            CDECL_FLOAT_REGISTERS.to_vec()
        } else {
            cc.float_arg_regs.iter().map(String::as_str).collect()
        };
        Self {
            convention: &cc.name,
            int_regs: cc.int_arg_regs.iter().map(String::as_str).collect(),
            float_regs,
            next_int: 0,
            next_float: 0,
        }
    }

    /// Name of the convention.
    pub fn convention(&self) -> &'a str {
        self.convention
    }

    /// Take the next unused register of `class`.
    pub fn next(&mut self, class: RegisterClass) -> Option<&'a str> {
        let (regs, next) = match class {
            RegisterClass::Integer => (&self.int_regs, &mut self.next_int),
            RegisterClass::Float => (&self.float_regs, &mut self.next_float),
        };
        let reg = regs.get(*next).copied()?;
        *next += 1;
        Some(reg)
    }
}

/// Bind every parameter of `func` to a location, in declaration order.
///
/// Flag-resident parameters have no location and are skipped.
pub fn bind_parameters<V>(view: &V, func: &V::Function, types: &mut TypeNormalizer) -> Result<Vec<Location>, BindError>
where
    V: BinaryView + ?Sized,
{
    let mut registers = ArgumentRegisters::new(func.calling_convention());
    let stack_pointer = view.stack_pointer().to_uppercase();
    let mut locations = Vec::with_capacity(func.parameter_vars().len());

    for var in func.parameter_vars() {
        match var.source {
            VariableSource::Register => {
                let ty = types.normalize(view, &var.ty)?;
                let class = match strip_typedefs(types.arena(), ty) {
                    Type::Integer { .. } | Type::Pointer { .. } => RegisterClass::Integer,
                    Type::Float { .. } => RegisterClass::Float,
                    Type::Void if declared_void(view, &var.ty) => {
                        return Err(BindError::InvalidParameterType {
                            function: func.name().to_string(),
                            parameter: var.name.clone(),
                        })
                    }
                    _ => {
                        return Err(BindError::MissingRegisterBinding {
                            function: func.name().to_string(),
                            parameter: var.name.clone(),
                        })
                    }
                };
                let reg = registers
                    .next(class)
                    .ok_or_else(|| BindError::RegisterListExhausted {
                        convention: registers.convention().to_string(),
                        class,
                        parameter: var.name.clone(),
                    })?;
                locations.push(Location::register(reg.to_uppercase(), ty));
            }
            VariableSource::Stack => {
                let ty = types.normalize(view, &var.ty)?;
                locations.push(Location::memory(stack_pointer.clone(), var.storage, ty));
            }
            VariableSource::Flag => {
                debug!(
                    function = func.name(),
                    parameter = %var.name,
                    "flag-resident parameter has no location, skipping"
                );
            }
        }
    }

    Ok(locations)
}

/// Bind the return value of `func`: one location per return register,
/// none for a void return.
pub fn bind_returns<V>(view: &V, func: &V::Function, types: &mut TypeNormalizer) -> Result<Vec<Location>, BindError>
where
    V: BinaryView + ?Sized,
{
    let ty = types.normalize(view, func.return_type())?;
    if types.arena()[ty].is_void() {
        return Ok(Vec::new());
    }
    Ok(func
        .return_registers()
        .iter()
        .map(|reg| Location::register(reg.to_uppercase(), ty))
        .collect())
}

/// Returns true if `desc` is void, directly or through typedef references.
fn declared_void<V>(view: &V, desc: &TypeDescriptor) -> bool
where
    V: BinaryView + ?Sized,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = desc;
    loop {
        match &current.kind {
            TypeKind::Void => return true,
            TypeKind::NamedTypeReference {
                class: NamedTypeClass::Typedef,
                type_id,
                name,
            } => {
                if !seen.insert(current.key.as_str()) {
                    return false;
                }
                let next = type_id
                    .as_deref()
                    .and_then(|id| view.type_by_id(id))
                    .or_else(|| view.type_by_name(name));
                match next {
                    Some(next) => current = next,
                    None => return false,
                }
            }
            _ => return false,
        }
    }
}

/// Follow typedefs to the aliased type. Typedef cycles stop at a typedef.
fn strip_typedefs(arena: &TypeArena, mut id: TypeId) -> &Type {
    for _ in 0..arena.len() {
        match arena[id] {
            Type::Typedef { underlying } if underlying != id => id = underlying,
            _ => break,
        }
    }
    &arena[id]
}

#[cfg(test)]
mod tests {
    use super::*;
    use irlift_core::{StaticFunction, StaticHost, StructureMember, TypeDescriptor, Variable};
    use irlift_types::Storage;

    fn int() -> TypeDescriptor {
        TypeDescriptor::int(4, true)
    }

    fn bind(func: &StaticFunction) -> Result<Vec<Location>, BindError> {
        let host = StaticHost::linux_x86_64();
        let mut types = TypeNormalizer::new(8);
        bind_parameters(&host, func, &mut types)
    }

    fn names(locations: &[Location]) -> Vec<String> {
        locations.iter().map(|l| l.storage.to_string()).collect()
    }

    #[test]
    fn test_assignment_order() {
        let func = StaticFunction::new("f", 0x1000)
            .with_calling_convention(CallingConventionInfo::new("test", &["r0", "r1"], &["f0"]))
            .with_parameter(Variable::register("a", 0, int()))
            .with_parameter(Variable::register("b", 1, int()))
            .with_parameter(Variable::register("c", 2, TypeDescriptor::float(8)));
        assert_eq!(names(&bind(&func).unwrap()), ["R0", "R1", "F0"]);
    }

    #[test]
    fn test_interleaved_classes() {
        let func = StaticFunction::new("f", 0x1000)
            .with_parameter(Variable::register("x", 0, TypeDescriptor::float(8)))
            .with_parameter(Variable::register("p", 1, TypeDescriptor::pointer(int(), 8)))
            .with_parameter(Variable::register("y", 2, TypeDescriptor::float(4)))
            .with_parameter(Variable::register("n", 3, int()));
        assert_eq!(names(&bind(&func).unwrap()), ["XMM0", "RDI", "XMM1", "RSI"]);
    }

    #[test]
    fn test_stack_parameters() {
        let func = StaticFunction::new("f", 0x1000)
            .with_parameter(Variable::register("a", 0, int()))
            .with_parameter(Variable::stack("b", 8, TypeDescriptor::structure(None, 24, vec![])))
            .with_parameter(Variable::stack("c", 32, int()));
        let locations = bind(&func).unwrap();
        assert_eq!(names(&locations), ["RDI", "[RSP + 0x8]", "[RSP + 0x20]"]);
        assert_eq!(
            locations[2].storage,
            Storage::Memory {
                base: "RSP".to_string(),
                offset: 32
            }
        );
    }

    #[test]
    fn test_void_register_parameter() {
        let func = StaticFunction::new("f", 0x1000).with_parameter(Variable::register("v", 0, TypeDescriptor::void()));
        assert!(matches!(
            bind(&func),
            Err(BindError::InvalidParameterType { parameter, .. }) if parameter == "v"
        ));
    }

    #[test]
    fn test_void_typedef_register_parameter() {
        let mut host = StaticHost::linux_x86_64();
        host.register_type("nothing_t", None, TypeDescriptor::void());
        let nothing = TypeDescriptor::named_reference(irlift_core::NamedTypeClass::Typedef, "nothing_t", None);
        let func = StaticFunction::new("f", 0x1000).with_parameter(Variable::register("v", 0, nothing));

        let mut types = TypeNormalizer::new(8);
        assert!(matches!(
            bind_parameters(&host, &func, &mut types),
            Err(BindError::InvalidParameterType { .. })
        ));
    }

    #[test]
    fn test_degraded_register_parameter() {
        let missing = TypeDescriptor::named_reference(irlift_core::NamedTypeClass::Struct, "missing", None);
        for ty in [TypeDescriptor::wide_char(4), TypeDescriptor::var_args(), missing] {
            let func = StaticFunction::new("f", 0x1000).with_parameter(Variable::register("w", 0, ty));
            assert_eq!(
                bind(&func),
                Err(BindError::MissingRegisterBinding {
                    function: "f".to_string(),
                    parameter: "w".to_string(),
                })
            );
        }
    }

    #[test]
    fn test_aggregate_register_parameter() {
        let pair = TypeDescriptor::structure(
            Some("pair"),
            8,
            vec![
                StructureMember::new("a", 0, int()),
                StructureMember::new("b", 4, int()),
            ],
        );
        let func = StaticFunction::new("f", 0x1000).with_parameter(Variable::register("p", 0, pair));
        assert!(matches!(bind(&func), Err(BindError::MissingRegisterBinding { .. })));
    }

    #[test]
    fn test_register_exhaustion() {
        let func = StaticFunction::new("f", 0x1000)
            .with_calling_convention(CallingConventionInfo::new("tiny", &["r0"], &[]))
            .with_parameter(Variable::register("a", 0, int()))
            .with_parameter(Variable::register("b", 1, int()));
        let err = bind(&func).unwrap_err();
        assert_eq!(
            err,
            BindError::RegisterListExhausted {
                convention: "tiny".to_string(),
                class: RegisterClass::Integer,
                parameter: "b".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "calling convention 'tiny' has no integer argument register left for parameter 'b'"
        );
    }

    #[test]
    fn test_cdecl_uses_x87_stack() {
        let cdecl = CallingConventionInfo::new("cdecl", &[], &["xmm0", "xmm1"]);
        let func = StaticFunction::new("f", 0x1000)
            .with_calling_convention(cdecl)
            .with_parameter(Variable::register("x", 0, TypeDescriptor::float(8)))
            .with_parameter(Variable::register("y", 1, TypeDescriptor::int(10, true)));
        assert_eq!(names(&bind(&func).unwrap()), ["ST0", "ST1"]);

        let stdcall = CallingConventionInfo::new("stdcall", &[], &["xmm0"]);
        let func = StaticFunction::new("g", 0x1000)
            .with_calling_convention(stdcall)
            .with_parameter(Variable::register("x", 0, TypeDescriptor::float(8)));
        assert_eq!(names(&bind(&func).unwrap()), ["XMM0"]);
    }

    #[test]
    fn test_typedef_parameter() {
        let mut host = StaticHost::linux_x86_64();
        host.register_type("size_t", None, TypeDescriptor::int(8, false));
        let size_t = TypeDescriptor::named_reference(irlift_core::NamedTypeClass::Typedef, "size_t", None);
        let func = StaticFunction::new("f", 0x1000).with_parameter(Variable::register("n", 0, size_t));

        let mut types = TypeNormalizer::new(8);
        let locations = bind_parameters(&host, &func, &mut types).unwrap();
        assert_eq!(locations[0].register_name(), Some("RDI"));
        assert!(matches!(types.arena()[locations[0].ty], Type::Typedef { .. }));
    }

    #[test]
    fn test_flag_parameter_skipped() {
        let mut carry = Variable::register("cf", 0, TypeDescriptor::bool());
        carry.source = VariableSource::Flag;
        let func = StaticFunction::new("f", 0x1000)
            .with_parameter(carry)
            .with_parameter(Variable::register("a", 0, int()));
        assert_eq!(names(&bind(&func).unwrap()), ["RDI"]);
    }

    #[test]
    fn test_returns() {
        let host = StaticHost::linux_x86_64();
        let mut types = TypeNormalizer::new(8);

        let void = StaticFunction::new("v", 0x1000);
        assert!(bind_returns(&host, &void, &mut types).unwrap().is_empty());

        let wide = StaticFunction::new("w", 0x2000)
            .with_return_type(TypeDescriptor::int(16, false))
            .with_return_registers(&["rax", "rdx"]);
        let locations = bind_returns(&host, &wide, &mut types).unwrap();
        assert_eq!(names(&locations), ["RAX", "RDX"]);
        assert_eq!(locations[0].ty, locations[1].ty);
        assert_eq!(types.arena()[locations[0].ty], Type::Integer { size: 16, signed: true });
    }
}

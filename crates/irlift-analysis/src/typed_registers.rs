//! Typed-register recovery.
//!
//! Builds a per-instruction timeline of what registers are known to hold:
//! a concrete pointer value from the host's register value analysis, or a
//! pointer type taken from register-resident MLIL variables of the same
//! instruction.
//!
//! Every register operand of an instruction triggers both lookups, so an
//! instruction with several register operands repeats the MLIL entries.
//! The timeline is not deduplicated.

use irlift_core::{
    BinaryView, HostFunction, LlilInstruction, LlilOperand, MlilExpr, MlilOperand, TypeKind, Variable,
    VariableSource,
};
use irlift_types::{NormalizeError, TypeId, TypeNormalizer};
use tracing::debug;

/// What a register holds at an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterBinding {
    /// A concrete pointer value.
    Value(u64),
    /// A pointer type.
    Type(TypeId),
}

/// One timeline entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypedRegister {
    pub address: u64,
    /// Upper-cased register name.
    pub register: String,
    pub binding: RegisterBinding,
}

/// Recover the typed-register timeline of `func`, in instruction then
/// operand order.
pub fn recover<V>(view: &V, func: &V::Function, types: &mut TypeNormalizer) -> Result<Vec<TypedRegister>, NormalizeError>
where
    V: BinaryView + ?Sized,
{
    let mut timeline = Vec::new();

    for insn in func.low_level_il() {
        let registers = register_operands(&insn.expr.operands);
        if registers.is_empty() {
            continue;
        }
        let pointer_vars = insn.mlil.as_ref().map(pointer_variables).unwrap_or_default();

        for register in registers {
            if let Some(value) = insn.reg_value(register).pointer_value() {
                timeline.push(TypedRegister {
                    address: insn.address,
                    register: register.to_uppercase(),
                    binding: RegisterBinding::Value(value),
                });
            }
            push_variable_types(view, insn, &pointer_vars, types, &mut timeline)?;
        }
    }

    Ok(timeline)
}

fn push_variable_types<V>(
    view: &V,
    insn: &LlilInstruction,
    vars: &[&Variable],
    types: &mut TypeNormalizer,
    timeline: &mut Vec<TypedRegister>,
) -> Result<(), NormalizeError>
where
    V: BinaryView + ?Sized,
{
    for var in vars {
        let Some(name) = view.register_name(var.storage) else {
            debug!(
                address = insn.address,
                variable = %var.name,
                storage = var.storage,
                "register variable without a register name, skipping"
            );
            continue;
        };
        let ty = types.normalize(view, &var.ty)?;
        timeline.push(TypedRegister {
            address: insn.address,
            register: name.to_uppercase(),
            binding: RegisterBinding::Type(ty),
        });
    }
    Ok(())
}

/// Register operands of an LLIL tree, pre-order.
fn register_operands(operands: &[LlilOperand]) -> Vec<&str> {
    let mut found = Vec::new();
    let mut stack: Vec<&LlilOperand> = operands.iter().rev().collect();
    while let Some(operand) = stack.pop() {
        match operand {
            LlilOperand::Register(name) => found.push(name.as_str()),
            LlilOperand::Expr(expr) => stack.extend(expr.operands.iter().rev()),
            LlilOperand::List(items) => stack.extend(items.iter().rev()),
            LlilOperand::Int(_) => {}
        }
    }
    found
}

/// Register-resident pointer variables of an MLIL tree, pre-order.
fn pointer_variables(expr: &MlilExpr) -> Vec<&Variable> {
    let mut found = Vec::new();
    let mut stack: Vec<&MlilOperand> = expr.operands.iter().rev().collect();
    while let Some(operand) = stack.pop() {
        match operand {
            MlilOperand::Variable(var) => {
                if var.source == VariableSource::Register && matches!(var.ty.kind, TypeKind::Pointer { .. }) {
                    found.push(var);
                }
            }
            MlilOperand::Expr(expr) => stack.extend(expr.operands.iter().rev()),
            MlilOperand::List(items) => stack.extend(items.iter().rev()),
            MlilOperand::Int(_) => {}
        }
    }
    found
}

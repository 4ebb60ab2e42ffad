//! Cross-reference (xref) analysis.
//!
//! Walks the lifted IL of each instruction and collects constant pointers
//! into code that are not memory operands. The reference class of a node is
//! decided top-down, first match wins, and is inherited by its operands:
//! - Unimplemented and undefined nodes contribute nothing
//! - Calls and jumps mark their operands as control flow
//! - Loads and stores mark the addressed operand as memory (constant
//!   address) or displacement (computed address); the other operands start
//!   over with no class
//! - A constant pointer into a read-only code section is recorded unless
//!   its class is memory-like
//!
//! So `load(const_ptr(code))` never records its address, while
//! `call(const_ptr(code))` does.

use std::collections::BTreeSet;

use irlift_core::{BinaryView, HostFunction, LlilExpr, LlilOperand, LowLevelOperation};
use tracing::debug;

use crate::memory::ByteMap;

/// Addresses referenced by code, deduplicated.
pub type XrefSet = BTreeSet<u64>;

/// How an IL node references an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum XrefKind {
    #[default]
    None,
    /// Plain immediate operand. Mirrors the host's reference classes; the
    /// classifier here never produces it.
    Immediate,
    /// Address computed from a base and an offset.
    Displacement,
    /// Constant memory operand.
    Memory,
    ControlFlow,
}

impl XrefKind {
    /// Returns true for memory operand classes.
    pub fn is_memory(&self) -> bool {
        matches!(self, XrefKind::Displacement | XrefKind::Memory)
    }
}

/// Collect the code xrefs of one lifted IL expression into `refs`.
pub fn collect_code_xrefs<V>(view: &V, expr: &LlilExpr, refs: &mut XrefSet)
where
    V: BinaryView + ?Sized,
{
    let mut stack = vec![(expr, XrefKind::None)];

    while let Some((expr, kind)) = stack.pop() {
        let operation = expr.operation;

        if matches!(operation, LowLevelOperation::Unimpl | LowLevelOperation::Undef) {
            continue;
        }

        if operation.is_call() || operation.is_jump() {
            push_operands(&mut stack, &expr.operands, XrefKind::ControlFlow);
        } else if let Some((index, addressed)) = expr.memory_operand() {
            let addressed_kind = if addressed.operation.is_constant() {
                XrefKind::Memory
            } else {
                XrefKind::Displacement
            };
            for (i, operand) in expr.operands.iter().enumerate().rev() {
                if i != index {
                    push_operand(&mut stack, operand, XrefKind::None);
                }
            }
            stack.push((addressed, addressed_kind));
        } else if operation == LowLevelOperation::ConstPtr {
            if let Some(target) = expr.constant_value() {
                if !kind.is_memory() && view.is_code(target) {
                    refs.insert(target);
                }
            }
        } else {
            push_operands(&mut stack, &expr.operands, kind);
        }
    }
}

/// Push operands so that they are popped in operand order.
fn push_operands<'a>(stack: &mut Vec<(&'a LlilExpr, XrefKind)>, operands: &'a [LlilOperand], kind: XrefKind) {
    for operand in operands.iter().rev() {
        push_operand(stack, operand, kind);
    }
}

fn push_operand<'a>(stack: &mut Vec<(&'a LlilExpr, XrefKind)>, operand: &'a LlilOperand, kind: XrefKind) {
    match operand {
        LlilOperand::Expr(expr) => stack.push((expr, kind)),
        LlilOperand::List(items) => push_operands(stack, items, kind),
        LlilOperand::Register(_) | LlilOperand::Int(_) => {}
    }
}

/// Map the bytes of every basic block of `func` and, if `collect_xrefs` is
/// set, collect the code xrefs of the lifted IL at each address.
///
/// Addresses outside any segment, or that the image cannot read, are left
/// out of the byte map.
pub fn extract<V>(view: &V, func: &V::Function, collect_xrefs: bool) -> (ByteMap, XrefSet)
where
    V: BinaryView + ?Sized,
{
    let mut memory = ByteMap::new();
    let mut refs = XrefSet::new();

    for block in func.basic_blocks() {
        for addr in block.start..block.end {
            match (view.segment_at(addr), view.read_u8(addr)) {
                (Some(segment), Some(value)) => {
                    memory.map_byte(addr, value, segment.writable, segment.executable);
                }
                (None, _) => debug!(addr, function = func.name(), "address outside any segment, skipping byte"),
                (Some(_), None) => debug!(addr, function = func.name(), "unreadable byte, skipping"),
            }

            if collect_xrefs {
                if let Some(expr) = func.lifted_il_at(addr) {
                    collect_code_xrefs(view, expr, &mut refs);
                }
            }
        }
    }

    (memory, refs)
}

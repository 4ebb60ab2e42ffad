//! Host intermediate-language trees.
//!
//! The host engine lifts each machine instruction into a low-level IL
//! (LLIL) expression tree, and optionally into a medium-level IL (MLIL)
//! tree where registers have been replaced by typed variables. Operands are
//! heterogeneous: nested expressions, register names, integers, or lists.

use std::collections::HashMap;

use crate::Variable;

/// Low-level IL operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LowLevelOperation {
    Nop,
    SetReg,
    SetFlag,
    Reg,
    Flag,
    Const,
    ConstPtr,
    ExternPtr,
    Load,
    Store,
    Push,
    Pop,
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Lsl,
    Lsr,
    Neg,
    Not,
    CmpE,
    CmpNe,
    Call,
    TailCall,
    CallStackAdjust,
    Jump,
    JumpTo,
    Goto,
    If,
    Ret,
    Syscall,
    Intrinsic,
    Unimpl,
    UnimplMem,
    Undef,
}

impl LowLevelOperation {
    /// Returns true for call-like operations.
    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call | Self::TailCall | Self::CallStackAdjust)
    }

    /// Returns true for indirect or direct jumps (not `goto`).
    pub fn is_jump(&self) -> bool {
        matches!(self, Self::Jump | Self::JumpTo)
    }

    /// Returns true for operations that address memory.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Load | Self::Store | Self::UnimplMem)
    }

    /// Returns true for constant leaves.
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Const | Self::ConstPtr)
    }
}

/// An LLIL operand.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LlilOperand {
    Expr(LlilExpr),
    Register(String),
    Int(u64),
    List(Vec<LlilOperand>),
}

/// An LLIL expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LlilExpr {
    pub operation: LowLevelOperation,
    pub operands: Vec<LlilOperand>,
}

impl LlilExpr {
    pub fn new(operation: LowLevelOperation, operands: Vec<LlilOperand>) -> Self {
        Self {
            operation,
            operands,
        }
    }

    pub fn constant(value: u64) -> Self {
        Self::new(LowLevelOperation::Const, vec![LlilOperand::Int(value)])
    }

    pub fn const_ptr(value: u64) -> Self {
        Self::new(LowLevelOperation::ConstPtr, vec![LlilOperand::Int(value)])
    }

    pub fn reg(name: &str) -> Self {
        Self::new(LowLevelOperation::Reg, vec![LlilOperand::Register(name.to_string())])
    }

    pub fn set_reg(name: &str, src: LlilExpr) -> Self {
        Self::new(
            LowLevelOperation::SetReg,
            vec![LlilOperand::Register(name.to_string()), LlilOperand::Expr(src)],
        )
    }

    pub fn load(src: LlilExpr) -> Self {
        Self::new(LowLevelOperation::Load, vec![LlilOperand::Expr(src)])
    }

    pub fn store(dest: LlilExpr, src: LlilExpr) -> Self {
        Self::new(
            LowLevelOperation::Store,
            vec![LlilOperand::Expr(dest), LlilOperand::Expr(src)],
        )
    }

    pub fn binary(operation: LowLevelOperation, left: LlilExpr, right: LlilExpr) -> Self {
        Self::new(operation, vec![LlilOperand::Expr(left), LlilOperand::Expr(right)])
    }

    pub fn call(dest: LlilExpr) -> Self {
        Self::new(LowLevelOperation::Call, vec![LlilOperand::Expr(dest)])
    }

    pub fn jump(dest: LlilExpr) -> Self {
        Self::new(LowLevelOperation::Jump, vec![LlilOperand::Expr(dest)])
    }

    /// The constant value of a `Const`/`ConstPtr`/`ExternPtr` node.
    pub fn constant_value(&self) -> Option<u64> {
        match self.operation {
            LowLevelOperation::Const | LowLevelOperation::ConstPtr | LowLevelOperation::ExternPtr => {
                match self.operands.first() {
                    Some(LlilOperand::Int(value)) => Some(*value),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// The addressed sub-expression of a memory operation, with its operand
    /// index. Stores address their destination, loads their source.
    pub fn memory_operand(&self) -> Option<(usize, &LlilExpr)> {
        if !self.operation.is_memory() {
            return None;
        }
        match self.operands.first() {
            Some(LlilOperand::Expr(expr)) => Some((0, expr)),
            _ => None,
        }
    }
}

/// Result of the host's per-instruction register value analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterValue {
    #[default]
    Undetermined,
    Entry,
    Constant(u64),
    ConstantPointer(u64),
    ExternalPointer(u64),
    StackFrameOffset(i64),
}

impl RegisterValue {
    /// Returns the concrete pointer value, if the host resolved one.
    pub fn pointer_value(&self) -> Option<u64> {
        match self {
            RegisterValue::ConstantPointer(value) | RegisterValue::ExternalPointer(value) => Some(*value),
            _ => None,
        }
    }
}

/// Medium-level IL operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MediumLevelOperation {
    Nop,
    SetVar,
    Var,
    AddressOf,
    Const,
    ConstPtr,
    Load,
    Store,
    Add,
    Sub,
    Call,
    TailCall,
    Ret,
    Jump,
    If,
    Intrinsic,
}

/// An MLIL operand.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MlilOperand {
    Expr(MlilExpr),
    Variable(Variable),
    Int(u64),
    List(Vec<MlilOperand>),
}

/// An MLIL expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MlilExpr {
    pub operation: MediumLevelOperation,
    pub operands: Vec<MlilOperand>,
}

impl MlilExpr {
    pub fn new(operation: MediumLevelOperation, operands: Vec<MlilOperand>) -> Self {
        Self {
            operation,
            operands,
        }
    }

    pub fn var(variable: Variable) -> Self {
        Self::new(MediumLevelOperation::Var, vec![MlilOperand::Variable(variable)])
    }

    /// A call whose parameters are given as a list operand.
    pub fn call(dest: MlilExpr, params: Vec<MlilExpr>) -> Self {
        Self::new(
            MediumLevelOperation::Call,
            vec![
                MlilOperand::List(Vec::new()),
                MlilOperand::Expr(dest),
                MlilOperand::List(params.into_iter().map(MlilOperand::Expr).collect()),
            ],
        )
    }
}

/// One lifted low-level instruction together with the host's analysis
/// results for it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LlilInstruction {
    pub address: u64,
    pub expr: LlilExpr,
    /// Register values known at this instruction, keyed by register name.
    pub register_values: HashMap<String, RegisterValue>,
    /// The medium-level form of the instruction, when the host has one.
    pub mlil: Option<MlilExpr>,
}

impl LlilInstruction {
    pub fn new(address: u64, expr: LlilExpr) -> Self {
        Self {
            address,
            expr,
            register_values: HashMap::new(),
            mlil: None,
        }
    }

    pub fn with_register_value(mut self, register: &str, value: RegisterValue) -> Self {
        self.register_values.insert(register.to_string(), value);
        self
    }

    pub fn with_mlil(mut self, mlil: MlilExpr) -> Self {
        self.mlil = Some(mlil);
        self
    }

    /// The host's value for `register` at this instruction.
    pub fn reg_value(&self, register: &str) -> RegisterValue {
        self.register_values.get(register).copied().unwrap_or_default()
    }
}

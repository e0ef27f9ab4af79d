use crate::types::Type;
use crate::values::{Value, ValueId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    AndNot,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Logical negation of a bool.
    Not,
    /// Pointer dereference.
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Builtin {
    Print,
    Println,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    Builtin(Builtin),
    /// Direct call, by raw member name (qualified on demand).
    Function(String),
    /// Call through a function value. Not in the lowered fragment.
    Indirect(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Instruction {
    Alloc {
        result: ValueId,
        /// The allocated type, i.e. the pointee of the produced pointer.
        ty: Type,
        heap: bool,
        comment: String,
    },
    BinOp {
        result: ValueId,
        op: BinOp,
        left: Value,
        right: Value,
    },
    UnOp {
        result: ValueId,
        op: UnOp,
        operand: Value,
        /// Type of the produced value; the loaded type for `Load`.
        ty: Type,
    },
    Call {
        result: ValueId,
        callee: Callee,
        args: Vec<Value>,
    },
    FieldAddr {
        result: ValueId,
        base: Value,
        /// The struct type `base` points at.
        struct_type: Type,
        field: u32,
    },
    /// Edge `i` carries the value flowing in from predecessor `i` of the
    /// containing block.
    Phi {
        result: ValueId,
        ty: Type,
        edges: Vec<Value>,
    },
    Store {
        addr: Value,
        value: Value,
    },
    IndexAddr {
        result: ValueId,
        base: Value,
        index: Value,
    },
    Extract {
        result: ValueId,
        tuple: ValueId,
        index: u32,
    },
}

impl Instruction {
    pub fn result(&self) -> Option<ValueId> {
        match self {
            Instruction::Alloc { result, .. }
            | Instruction::BinOp { result, .. }
            | Instruction::UnOp { result, .. }
            | Instruction::Call { result, .. }
            | Instruction::FieldAddr { result, .. }
            | Instruction::Phi { result, .. }
            | Instruction::IndexAddr { result, .. }
            | Instruction::Extract { result, .. } => Some(*result),
            Instruction::Store { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Instruction::Alloc { .. } => "alloc",
            Instruction::BinOp { .. } => "binop",
            Instruction::UnOp { .. } => "unop",
            Instruction::Call { .. } => "call",
            Instruction::FieldAddr { .. } => "field address",
            Instruction::Phi { .. } => "phi",
            Instruction::Store { .. } => "store",
            Instruction::IndexAddr { .. } => "index address",
            Instruction::Extract { .. } => "extract",
        }
    }
}

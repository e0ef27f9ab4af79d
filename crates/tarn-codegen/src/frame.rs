use inkwell::basic_block::BasicBlock;
use inkwell::values::{BasicValueEnum, FunctionValue, PhiValue};
use std::collections::HashMap;
use tarn_ssa::{BlockId, Value, ValueId};

/// Per-function lowering state. Created by the declaration pass, filled in
/// by the definition pass, dropped when the function is done.
pub struct Frame<'ctx> {
    pub pkg_prefix: String,
    /// Fully qualified function name.
    pub name: String,
    pub function: FunctionValue<'ctx>,
    /// Lowered value of every value-producing instruction seen so far.
    pub locals: HashMap<ValueId, BasicValueEnum<'ctx>>,
    pub blocks: HashMap<BlockId, BasicBlock<'ctx>>,
    pub phis: Vec<PendingPhi<'ctx>>,
}

/// A phi placeholder emitted before its incoming values exist. The edges
/// are attached after every block of the function has been lowered.
pub struct PendingPhi<'ctx> {
    /// The block holding the phi; its predecessor list pairs off with
    /// `edges`.
    pub block: BlockId,
    pub edges: Vec<Value>,
    pub phi: PhiValue<'ctx>,
}

impl<'ctx> Frame<'ctx> {
    pub fn new(pkg_prefix: &str, name: String, function: FunctionValue<'ctx>) -> Self {
        Self {
            pkg_prefix: pkg_prefix.to_string(),
            name,
            function,
            locals: HashMap::new(),
            blocks: HashMap::new(),
            phis: Vec::new(),
        }
    }

    /// Package-qualifies a raw member name. Names that already carry a
    /// package stay as they are.
    pub fn qualify(&self, raw: &str) -> String {
        if raw.contains('.') {
            raw.to_string()
        } else {
            format!("{}.{}", self.pkg_prefix, raw)
        }
    }
}

/// Initial upper-case letter marks an exported identifier in the source
/// language.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

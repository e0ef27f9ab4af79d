/*! Typed SSA program model for the Tarn compiler.
 *
 * The front end (parsing, type checking, SSA construction) lives outside this
 * repository. What it hands over is a `Program`: packages of members whose
 * function bodies are basic blocks of typed SSA instructions. This crate
 * defines that shape, a builder for constructing it, dominator analysis over
 * it, and a serialized form for carrying it across a process boundary.
 */

pub mod analysis;
pub mod block;
pub mod builder;
pub mod function;
pub mod instructions;
pub mod package;
pub mod persist;
pub mod types;
pub mod values;

pub use analysis::DominatorTree;
pub use block::{BasicBlock, BlockId, Terminator};
pub use builder::FunctionBuilder;
pub use function::{Function, FunctionBody, Parameter, Signature};
pub use instructions::{BinOp, Builtin, Callee, Instruction, UnOp};
pub use package::{Member, Package, Program};
pub use types::{Field, Type};
pub use values::{Const, ParamId, Value, ValueId};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SsaError {
    #[error("builder error: {0}")]
    Builder(String),
    #[error("block {0} has no terminator")]
    UnterminatedBlock(String),
    #[error("branch to unknown block {0}")]
    UnknownBlock(String),
    #[error("phi in block {block} has {edges} edges for {preds} predecessors")]
    PhiEdgeMismatch {
        block: String,
        edges: usize,
        preds: usize,
    },
    #[error("function {0} has no entry block")]
    MissingEntry(String),
}

pub type Result<T> = std::result::Result<T, SsaError>;

#[cfg(test)]
mod tests;

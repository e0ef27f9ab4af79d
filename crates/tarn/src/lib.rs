/*! Unified interface to the Tarn compiler.
 *
 * Single import for building or loading a typed SSA program and lowering it
 * to a native object through LLVM.
 */

pub use tarn_codegen as codegen;
pub use tarn_ssa as ssa;

pub use tarn_codegen::{compile, Codegen, CompileError, CompileOptions};

pub use tarn_ssa::{
    BasicBlock, BinOp, BlockId, Builtin, Callee, Const, DominatorTree, Function, FunctionBuilder,
    Instruction, Member, Package, Program, Terminator, Type, UnOp, Value,
};

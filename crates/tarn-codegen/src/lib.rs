/*! Lower typed SSA programs to LLVM and emit native objects.
 *
 * The front end hands over packages of typed SSA; LLVM wants explicit
 * basic-block CFG, address-typed memory operations and flat record strings.
 * This crate mediates the two: a declaration pass makes every symbol
 * resolvable before any body is lowered, a definition pass walks blocks in
 * dominator preorder filling in instructions, and pending phi nodes are
 * patched once all blocks exist.
 */

pub mod frame;
pub mod lowering;
pub mod module;
mod types;

pub use frame::{Frame, PendingPhi};
pub use module::Codegen;

use inkwell::context::Context;
use inkwell::targets::TargetMachine;
use std::path::Path;
use tarn_ssa::Program;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("unsupported constant: {0}")]
    UnsupportedConst(String),
    #[error("unsupported instruction: {0}")]
    UnsupportedInstruction(String),
    #[error("unsupported print argument type: {0}")]
    UnsupportedPrintArg(String),
    #[error("multiple return values are not supported")]
    MultipleReturns,
    #[error("undefined function: {0}")]
    UndefinedFunction(String),
    #[error("undefined global: {0}")]
    UndefinedGlobal(String),
    #[error("use of {0} before definition")]
    UndefinedValue(String),
    #[error("verifier error: {0}")]
    Verifier(String),
    #[error("emit error: {0}")]
    Emit(String),
    #[error("builder error: {0}")]
    Builder(#[from] inkwell::builder::BuilderError),
}

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// LLVM target triple; host triple when absent.
    pub target: Option<String>,
    pub opt_level: u32,
    /// Print the final IR to stdout after optimization.
    pub print_ir: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target: None,
            opt_level: 2,
            print_ir: false,
        }
    }
}

pub fn host_triple() -> String {
    TargetMachine::get_default_triple()
        .as_str()
        .to_string_lossy()
        .into_owned()
}

/// Front-to-back driver: lower, verify, optimize, verify again, emit.
pub fn compile(program: &Program, output: &Path, options: &CompileOptions) -> Result<()> {
    let triple = options.target.clone().unwrap_or_else(host_triple);
    let module_name = program
        .entry_package()
        .map(|p| p.prefix().to_string())
        .unwrap_or_else(|| "main".to_string());

    let context = Context::create();
    let codegen = Codegen::new(&context, &module_name, &triple)?;

    codegen.compile_program(program)?;
    codegen.verify()?;
    codegen.optimize(options.opt_level);
    codegen.verify()?;
    if options.print_ir {
        println!("{}", codegen.ir());
    }
    codegen.emit_object(output)?;
    Ok(())
}

use crate::frame::{is_exported, Frame};
use crate::{CompileError, Result};
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::passes::{PassManager, PassManagerBuilder};
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple,
};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, IntType, PointerType, StructType};
use inkwell::values::FunctionValue;
use inkwell::{AddressSpace, OptimizationLevel};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tarn_ssa::{Function, Member, Package, Program};

/// Owner of the LLVM module, builder cursor and target machine, plus the
/// handful of types and runtime declarations everything else leans on.
pub struct Codegen<'ctx> {
    pub(crate) context: &'ctx Context,
    pub module: Module<'ctx>,
    pub(crate) builder: Builder<'ctx>,
    machine: TargetMachine,
    /// Source-language `int`. Pinned to 32 bits for every target for now.
    pub(crate) int_type: IntType<'ctx>,
    pub(crate) string_len_type: IntType<'ctx>,
    /// Length-prefixed string record `{ i32, ptr }`; its layout is runtime
    /// ABI shared with `print_string`.
    pub(crate) string_type: StructType<'ctx>,
    pub(crate) byte_ptr_type: PointerType<'ctx>,
    pub(crate) print_string: FunctionValue<'ctx>,
    pub(crate) print_int: FunctionValue<'ctx>,
    pub(crate) print_space: FunctionValue<'ctx>,
    pub(crate) print_newline: FunctionValue<'ctx>,
}

impl<'ctx> Codegen<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str, triple: &str) -> Result<Self> {
        Target::initialize_all(&InitializationConfig::default());

        let triple = TargetTriple::create(triple);
        let target =
            Target::from_triple(&triple).map_err(|e| CompileError::Emit(e.to_string()))?;
        let machine = target
            .create_target_machine(
                &triple,
                "",
                "",
                OptimizationLevel::Default,
                RelocMode::Default,
                CodeModel::Default,
            )
            .ok_or_else(|| {
                CompileError::Emit(format!(
                    "no machine for target {}",
                    triple.as_str().to_string_lossy()
                ))
            })?;

        let module = context.create_module(module_name);
        let builder = context.create_builder();

        let int_type = context.i32_type();
        let string_len_type = context.i32_type();
        let byte_ptr_type = context.i8_type().ptr_type(AddressSpace::default());
        let string_type = context.struct_type(
            &[string_len_type.into(), byte_ptr_type.into()],
            false,
        );

        let void = context.void_type();
        let print_string = module.add_function(
            "print_string",
            void.fn_type(&[string_type.into()], false),
            None,
        );
        let print_int =
            module.add_function("print_int", void.fn_type(&[int_type.into()], false), None);
        let print_space = module.add_function("print_space", void.fn_type(&[], false), None);
        let print_newline = module.add_function("print_newline", void.fn_type(&[], false), None);

        Ok(Self {
            context,
            module,
            builder,
            machine,
            int_type,
            string_len_type,
            string_type,
            byte_ptr_type,
            print_string,
            print_int,
            print_space,
            print_newline,
        })
    }

    /// Declares every member of every package, then lowers every function
    /// body. Completing all declarations first is what lets forward
    /// references, within and across packages, resolve during lowering.
    pub fn compile_program(&self, program: &Program) -> Result<()> {
        let mut frames = HashMap::new();

        for package in &program.packages {
            self.declare_package(package, &mut frames)?;
        }
        for package in &program.packages {
            self.define_package(package, &mut frames)?;
        }

        Ok(())
    }

    fn declare_package(
        &self,
        package: &Package,
        frames: &mut HashMap<String, Frame<'ctx>>,
    ) -> Result<()> {
        let prefix = package.prefix();

        // Walk members in sorted order so repeated runs emit identical IR.
        for name in package.sorted_member_names() {
            match &package.members[&name] {
                Member::Function(function) => {
                    let frame = self.declare_function(prefix, function)?;
                    frames.insert(frame.name.clone(), frame);
                }
                Member::NamedConst { name, value } => {
                    let init = self.lower_const(value)?;
                    let global =
                        self.module
                            .add_global(init.get_type(), None, &format!("{}.{}", prefix, name));
                    global.set_initializer(&init);
                    global.set_constant(true);
                    if is_exported(name) {
                        global.set_linkage(Linkage::Private);
                    }
                }
                Member::Global { name, ty } => {
                    let ty = self.lower_type(ty)?;
                    let global =
                        self.module
                            .add_global(ty, None, &format!("{}.{}", prefix, name));
                    if is_exported(name) {
                        global.set_linkage(Linkage::Private);
                    }
                }
                Member::TypeDef { .. } => {}
            }
        }

        Ok(())
    }

    fn declare_function(&self, prefix: &str, function: &Function) -> Result<Frame<'ctx>> {
        let name = format!("{}.{}", prefix, function.name());
        let signature = &function.signature;

        let mut param_types: Vec<BasicMetadataTypeEnum> =
            Vec::with_capacity(signature.params.len());
        for param in &signature.params {
            param_types.push(self.lower_type(&param.ty)?.into());
        }

        let fn_type = match signature.results.as_slice() {
            [] => self.context.void_type().fn_type(&param_types, false),
            [result] => self.lower_type(result)?.fn_type(&param_types, false),
            _ => return Err(CompileError::MultipleReturns),
        };

        let value = self.module.add_function(&name, fn_type, None);
        Ok(Frame::new(prefix, name, value))
    }

    fn define_package(
        &self,
        package: &Package,
        frames: &mut HashMap<String, Frame<'ctx>>,
    ) -> Result<()> {
        let prefix = package.prefix();

        for name in package.sorted_member_names() {
            let Member::Function(function) = &package.members[&name] else {
                continue;
            };
            let Some(body) = &function.body else {
                continue; // external function, declaration only
            };

            let qualified = format!("{}.{}", prefix, function.name());
            let frame = frames
                .get_mut(&qualified)
                .ok_or_else(|| CompileError::UndefinedFunction(qualified))?;
            self.lower_function(frame, body)?;
        }

        Ok(())
    }

    /// Runs the backend verifier over the whole module.
    pub fn verify(&self) -> Result<()> {
        self.module
            .verify()
            .map_err(|e| CompileError::Verifier(e.to_string()))
    }

    /// Standard pass pipeline for the given level. The pass managers and
    /// their builder are released when this returns, pass or fail.
    pub fn optimize(&self, level: u32) {
        let builder = PassManagerBuilder::create();
        builder.set_optimization_level(match level {
            0 => OptimizationLevel::None,
            1 => OptimizationLevel::Less,
            2 => OptimizationLevel::Default,
            _ => OptimizationLevel::Aggressive,
        });
        builder.set_inliner_with_threshold(200);

        let function_passes = PassManager::create(&self.module);
        builder.populate_function_pass_manager(&function_passes);

        let module_passes = PassManager::create(());
        builder.populate_module_pass_manager(&module_passes);

        module_passes.run_on(&self.module);
    }

    /// Serializes the module as an object file. The bytes are produced in
    /// memory first, so a failed emission never leaves a partial file
    /// behind.
    pub fn emit_object(&self, path: &Path) -> Result<()> {
        let buffer = self
            .machine
            .write_to_memory_buffer(&self.module, FileType::Object)
            .map_err(|e| CompileError::Emit(e.to_string()))?;
        fs::write(path, buffer.as_slice()).map_err(|e| CompileError::Emit(e.to_string()))
    }

    /// The whole module as human-readable IR.
    pub fn ir(&self) -> String {
        self.module.print_to_string().to_string()
    }
}

use crate::frame::{Frame, PendingPhi};
use crate::module::Codegen;
use crate::{CompileError, Result};
use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, IntValue, PointerValue};
use inkwell::IntPredicate;
use tarn_ssa::{
    BasicBlock, BinOp, Builtin, Callee, DominatorTree, FunctionBody, Instruction, Terminator,
    UnOp, Value,
};

impl<'ctx> Codegen<'ctx> {
    /// Lowers one function body into its pre-declared LLVM function.
    ///
    /// Blocks are created up front, in dominator preorder, so that every
    /// branch target exists before any terminator is emitted. The same
    /// order drives the instruction sweep: in SSA, definitions dominate
    /// uses, so each non-phi operand is already in `frame.locals` when it
    /// is consumed. Phis are the one exception and are patched last.
    pub(crate) fn lower_function(
        &self,
        frame: &mut Frame<'ctx>,
        body: &FunctionBody,
    ) -> Result<()> {
        let dom = DominatorTree::build(body);
        let order = dom.preorder(body.entry_block);

        for id in &order {
            let block = &body.blocks[id];
            let bb = self
                .context
                .append_basic_block(frame.function, &block.comment);
            frame.blocks.insert(*id, bb);
        }

        for id in &order {
            let block = &body.blocks[id];
            self.builder.position_at_end(frame.blocks[id]);
            for inst in &block.instructions {
                self.lower_instruction(frame, block, inst)?;
            }
            self.lower_terminator(frame, &block.terminator)?;
        }

        for pending in std::mem::take(&mut frame.phis) {
            let block = &body.blocks[&pending.block];
            for (edge, pred) in pending.edges.iter().zip(&block.preds) {
                let value = self.lower_value(frame, edge)?;
                pending.phi.add_incoming(&[(&value, frame.blocks[pred])]);
            }
        }

        Ok(())
    }

    fn lower_instruction(
        &self,
        frame: &mut Frame<'ctx>,
        block: &BasicBlock,
        inst: &Instruction,
    ) -> Result<()> {
        match inst {
            Instruction::Alloc {
                result,
                ty,
                heap,
                comment,
            } => {
                let ty = self.lower_type(ty)?;
                let ptr = if *heap {
                    self.builder.build_malloc(ty, comment)?
                } else {
                    self.builder.build_alloca(ty, comment)?
                };
                frame.locals.insert(*result, ptr.into());
            }
            Instruction::BinOp {
                result,
                op,
                left,
                right,
            } => {
                let left = int_operand(self.lower_value(frame, left)?, "binop")?;
                let right = int_operand(self.lower_value(frame, right)?, "binop")?;
                let value = self.lower_binop(*op, left, right)?;
                frame.locals.insert(*result, value.into());
            }
            Instruction::UnOp {
                result,
                op,
                operand,
                ty,
            } => {
                let value = match op {
                    UnOp::Not => {
                        let operand = int_operand(self.lower_value(frame, operand)?, "not")?;
                        self.builder.build_not(operand, "")?.into()
                    }
                    UnOp::Load => {
                        let _pointee = self.lower_type(ty)?;
                        let addr = pointer_operand(self.lower_value(frame, operand)?, "load")?;
                        self.builder.build_load(addr, "")?
                    }
                };
                frame.locals.insert(*result, value);
            }
            Instruction::Call {
                result,
                callee,
                args,
            } => match callee {
                Callee::Builtin(builtin) => self.lower_print(frame, *builtin, args)?,
                Callee::Function(raw) => {
                    let name = frame.qualify(raw);
                    let target = self
                        .module
                        .get_function(&name)
                        .ok_or(CompileError::UndefinedFunction(name))?;

                    let mut lowered: Vec<BasicMetadataValueEnum> =
                        Vec::with_capacity(args.len());
                    for arg in args {
                        lowered.push(self.lower_value(frame, arg)?.into());
                    }

                    let call = self.builder.build_call(target, &lowered, "")?;
                    if let Some(value) = call.try_as_basic_value().left() {
                        frame.locals.insert(*result, value);
                    }
                }
                Callee::Indirect(_) => {
                    return Err(CompileError::UnsupportedInstruction(
                        "call through a function value".to_string(),
                    ))
                }
            },
            Instruction::FieldAddr {
                result,
                base,
                struct_type,
                field,
            } => {
                let base = pointer_operand(self.lower_value(frame, base)?, "field address")?;
                let BasicTypeEnum::StructType(_struct_type) = self.lower_type(struct_type)?
                else {
                    return Err(CompileError::UnsupportedInstruction(
                        "field address into a non-struct".to_string(),
                    ));
                };
                let ptr = self.builder.build_struct_gep(base, *field, "")?;
                frame.locals.insert(*result, ptr.into());
            }
            Instruction::Phi { result, ty, edges } => {
                let ty = self.lower_type(ty)?;
                let phi = self.builder.build_phi(ty, "")?;
                // Incoming values may be defined later in the function;
                // leave the node empty and patch it after the block sweep.
                frame.phis.push(PendingPhi {
                    block: block.id,
                    edges: edges.clone(),
                    phi,
                });
                frame.locals.insert(*result, phi.as_basic_value());
            }
            Instruction::Store { addr, value } => {
                let addr = pointer_operand(self.lower_value(frame, addr)?, "store")?;
                let value = self.lower_value(frame, value)?;
                self.builder.build_store(addr, value)?;
            }
            Instruction::IndexAddr { .. } | Instruction::Extract { .. } => {
                return Err(CompileError::UnsupportedInstruction(
                    inst.kind().to_string(),
                ))
            }
        }

        Ok(())
    }

    fn lower_terminator(&self, frame: &Frame<'ctx>, term: &Terminator) -> Result<()> {
        match term {
            Terminator::Jump(target) => {
                self.builder
                    .build_unconditional_branch(frame.blocks[target])?;
            }
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => {
                let cond = int_operand(self.lower_value(frame, cond)?, "branch")?;
                self.builder.build_conditional_branch(
                    cond,
                    frame.blocks[then_block],
                    frame.blocks[else_block],
                )?;
            }
            Terminator::Return(results) => match results.as_slice() {
                [] => {
                    self.builder.build_return(None)?;
                }
                [result] => {
                    let value = self.lower_value(frame, result)?;
                    self.builder.build_return(Some(&value))?;
                }
                _ => return Err(CompileError::MultipleReturns),
            },
            Terminator::Invalid => {
                return Err(CompileError::UnsupportedInstruction(
                    "block without terminator".to_string(),
                ))
            }
        }

        Ok(())
    }

    /// Resolves an operand: constants, parameters and globals on demand,
    /// instruction results from the locals table.
    fn lower_value(&self, frame: &Frame<'ctx>, value: &Value) -> Result<BasicValueEnum<'ctx>> {
        match value {
            Value::Const(c) => self.lower_const(c),
            Value::Param(p) => frame
                .function
                .get_nth_param(p.0)
                .ok_or_else(|| CompileError::UndefinedValue(p.to_string())),
            Value::Global(name) => {
                let qualified = frame.qualify(name);
                self.module
                    .get_global(&qualified)
                    .map(|g| g.as_pointer_value().into())
                    .ok_or(CompileError::UndefinedGlobal(qualified))
            }
            Value::Instr(id) => frame
                .locals
                .get(id)
                .copied()
                .ok_or_else(|| CompileError::UndefinedValue(id.to_string())),
        }
    }

    fn lower_binop(&self, op: BinOp, x: IntValue<'ctx>, y: IntValue<'ctx>) -> Result<IntValue<'ctx>> {
        Ok(match op {
            BinOp::Add => self.builder.build_int_add(x, y, "")?,
            BinOp::Sub => self.builder.build_int_sub(x, y, "")?,
            BinOp::Mul => self.builder.build_int_mul(x, y, "")?,
            BinOp::Div => self.builder.build_int_signed_div(x, y, "")?,
            BinOp::Rem => self.builder.build_int_signed_rem(x, y, "")?,
            BinOp::And => self.builder.build_and(x, y, "")?,
            BinOp::Or => self.builder.build_or(x, y, "")?,
            BinOp::Xor => self.builder.build_xor(x, y, "")?,
            BinOp::Shl => self.builder.build_left_shift(x, y, "")?,
            BinOp::Shr => self.builder.build_right_shift(x, y, true, "")?,
            BinOp::AndNot => {
                // x &^ y is x & ~y.
                let inverted = self.builder.build_not(y, "")?;
                self.builder.build_and(x, inverted, "")?
            }
            BinOp::Eq => self.builder.build_int_compare(IntPredicate::EQ, x, y, "")?,
            BinOp::Ne => self.builder.build_int_compare(IntPredicate::NE, x, y, "")?,
            BinOp::Lt => self.builder.build_int_compare(IntPredicate::SLT, x, y, "")?,
            BinOp::Le => self.builder.build_int_compare(IntPredicate::SLE, x, y, "")?,
            BinOp::Gt => self.builder.build_int_compare(IntPredicate::SGT, x, y, "")?,
            BinOp::Ge => self.builder.build_int_compare(IntPredicate::SGE, x, y, "")?,
        })
    }

    /// `print` and `println`: one runtime call per argument, separated by
    /// `print_space`, with `println` closed off by `print_newline`. The
    /// argument's lowered type picks the runtime entry point.
    fn lower_print(&self, frame: &Frame<'ctx>, builtin: Builtin, args: &[Value]) -> Result<()> {
        for (i, arg) in args.iter().enumerate() {
            if i >= 1 {
                self.builder.build_call(self.print_space, &[], "")?;
            }

            let value = self.lower_value(frame, arg)?;
            match value {
                BasicValueEnum::IntValue(v) if v.get_type().get_bit_width() == 32 => {
                    self.builder.build_call(self.print_int, &[v.into()], "")?;
                }
                BasicValueEnum::StructValue(v) if v.get_type() == self.string_type => {
                    self.builder.build_call(self.print_string, &[v.into()], "")?;
                }
                other => {
                    return Err(CompileError::UnsupportedPrintArg(
                        other.get_type().print_to_string().to_string(),
                    ))
                }
            }
        }

        if matches!(builtin, Builtin::Println) {
            self.builder.build_call(self.print_newline, &[], "")?;
        }

        Ok(())
    }
}

fn int_operand<'ctx>(value: BasicValueEnum<'ctx>, what: &str) -> Result<IntValue<'ctx>> {
    match value {
        BasicValueEnum::IntValue(v) => Ok(v),
        _ => Err(CompileError::UnsupportedInstruction(format!(
            "{} on a non-integer operand",
            what
        ))),
    }
}

fn pointer_operand<'ctx>(value: BasicValueEnum<'ctx>, what: &str) -> Result<PointerValue<'ctx>> {
    match value {
        BasicValueEnum::PointerValue(v) => Ok(v),
        _ => Err(CompileError::UnsupportedInstruction(format!(
            "{} on a non-pointer operand",
            what
        ))),
    }
}

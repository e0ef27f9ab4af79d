use crate::block::{BlockId, Terminator};
use crate::function::{Function, FunctionBody, Parameter, Signature};
use crate::instructions::{BinOp, Callee, Instruction, UnOp};
use crate::types::Type;
use crate::values::{ParamId, Value};
use crate::{Result, SsaError};

/// Cursor-style constructor for a single SSA function.
///
/// Front ends and tests build a function block by block: create blocks up
/// front, switch the cursor between them, append instructions, terminate.
/// `build` seals the function, deriving predecessor lists from the
/// terminators.
pub struct FunctionBuilder {
    signature: Signature,
    body: FunctionBody,
    current: BlockId,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let body = FunctionBody::new();
        let current = body.entry_block;
        Self {
            signature: Signature {
                name: name.into(),
                params: Vec::new(),
                results: Vec::new(),
            },
            body,
            current,
        }
    }

    pub fn param(&mut self, name: impl Into<String>, ty: Type) -> Value {
        let index = self.signature.params.len() as u32;
        self.signature.params.push(Parameter::new(name, ty));
        Value::Param(ParamId(index))
    }

    pub fn returns(&mut self, ty: Type) -> &mut Self {
        self.signature.results.push(ty);
        self
    }

    pub fn entry_block(&self) -> BlockId {
        self.body.entry_block
    }

    pub fn create_block(&mut self, comment: impl Into<String>) -> BlockId {
        self.body.create_block(comment)
    }

    pub fn switch_to_block(&mut self, block: BlockId) -> Result<()> {
        if !self.body.blocks.contains_key(&block) {
            return Err(SsaError::Builder(format!("block {} does not exist", block)));
        }
        self.current = block;
        Ok(())
    }

    fn push(&mut self, inst: Instruction) {
        self.body
            .get_block_mut(self.current)
            .expect("cursor points at a live block")
            .add_instruction(inst);
    }

    fn push_value(&mut self, make: impl FnOnce(crate::values::ValueId) -> Instruction) -> Value {
        let result = self.body.fresh_value();
        self.push(make(result));
        Value::Instr(result)
    }

    pub fn alloc(&mut self, ty: Type, heap: bool, comment: impl Into<String>) -> Value {
        let comment = comment.into();
        self.push_value(|result| Instruction::Alloc {
            result,
            ty,
            heap,
            comment,
        })
    }

    pub fn binop(&mut self, op: BinOp, left: Value, right: Value) -> Value {
        self.push_value(|result| Instruction::BinOp {
            result,
            op,
            left,
            right,
        })
    }

    pub fn unop(&mut self, op: UnOp, operand: Value, ty: Type) -> Value {
        self.push_value(|result| Instruction::UnOp {
            result,
            op,
            operand,
            ty,
        })
    }

    pub fn call(&mut self, callee: Callee, args: Vec<Value>) -> Value {
        self.push_value(|result| Instruction::Call {
            result,
            callee,
            args,
        })
    }

    pub fn field_addr(&mut self, base: Value, struct_type: Type, field: u32) -> Value {
        self.push_value(|result| Instruction::FieldAddr {
            result,
            base,
            struct_type,
            field,
        })
    }

    pub fn phi(&mut self, ty: Type, edges: Vec<Value>) -> Value {
        self.push_value(|result| Instruction::Phi { result, ty, edges })
    }

    /// Replaces the edge list of a previously created phi. Loop back edges
    /// make this necessary: the value flowing in from the latch does not
    /// exist yet when the header phi is created.
    ///
    /// Panics if `phi` was not produced by [`FunctionBuilder::phi`].
    pub fn set_phi_edges(&mut self, phi: &Value, edges: Vec<Value>) {
        let Value::Instr(id) = phi else {
            panic!("set_phi_edges needs an instruction value, got {}", phi);
        };
        let mut edges = Some(edges);
        for block in self.body.blocks.values_mut() {
            for inst in &mut block.instructions {
                if let Instruction::Phi { result, edges: slot, .. } = inst {
                    if result == id {
                        *slot = edges.take().expect("one phi per value id");
                        return;
                    }
                }
            }
        }
        panic!("no phi produces {}", id);
    }

    pub fn store(&mut self, addr: Value, value: Value) {
        self.push(Instruction::Store { addr, value });
    }

    fn terminate(&mut self, term: Terminator) {
        self.body
            .get_block_mut(self.current)
            .expect("cursor points at a live block")
            .set_terminator(term);
    }

    pub fn jump(&mut self, target: BlockId) {
        self.terminate(Terminator::Jump(target));
    }

    pub fn branch(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::Branch {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, results: Vec<Value>) {
        self.terminate(Terminator::Return(results));
    }

    pub fn build(mut self) -> Function {
        self.body.recompute_preds();
        Function {
            signature: self.signature,
            body: Some(self.body),
        }
    }
}

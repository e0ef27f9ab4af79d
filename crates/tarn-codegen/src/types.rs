use crate::module::Codegen;
use crate::{CompileError, Result};
use inkwell::module::Linkage;
use inkwell::types::{BasicType, BasicTypeEnum};
use inkwell::values::BasicValueEnum;
use inkwell::AddressSpace;
use tarn_ssa::{Const, Type};

impl<'ctx> Codegen<'ctx> {
    /// Maps a source-language type onto its LLVM representation. Named
    /// types map through their underlying type; everything outside the
    /// lowered fragment is rejected.
    pub(crate) fn lower_type(&self, ty: &Type) -> Result<BasicTypeEnum<'ctx>> {
        match ty {
            Type::Bool => Ok(self.context.bool_type().into()),
            Type::Int => Ok(self.int_type.into()),
            Type::Int32 => Ok(self.context.i32_type().into()),
            Type::String => Ok(self.string_type.into()),
            Type::UnsafePointer => Ok(self.byte_ptr_type.into()),
            Type::Named { underlying, .. } => self.lower_type(underlying),
            Type::Pointer(elem) => {
                let elem = self.lower_type(elem)?;
                Ok(elem.ptr_type(AddressSpace::default()).into())
            }
            Type::Struct(fields) => {
                let mut members = Vec::with_capacity(fields.len());
                for field in fields {
                    members.push(self.lower_type(&field.ty)?);
                }
                Ok(self.context.struct_type(&members, false).into())
            }
            other => Err(CompileError::UnsupportedType(other.to_string())),
        }
    }

    /// Lowers a typed constant. Integers land in the `int` type with their
    /// signed value; string literals become a private byte-array global
    /// wrapped in the `{ len, ptr }` string record.
    pub(crate) fn lower_const(&self, value: &Const) -> Result<BasicValueEnum<'ctx>> {
        match value {
            Const::Int(n) => Ok(self.int_type.const_int(*n as u64, true).into()),
            Const::Str(s) => {
                let bytes = s.as_bytes();
                let data = self.context.const_string(bytes, false);
                let global = self.module.add_global(data.get_type(), None, ".str");
                global.set_initializer(&data);
                global.set_constant(true);
                global.set_linkage(Linkage::Private);

                let len = self
                    .string_len_type
                    .const_int(bytes.len() as u64, false);
                let ptr = global.as_pointer_value().const_cast(self.byte_ptr_type);
                let record = self.context.const_struct(&[len.into(), ptr.into()], false);
                Ok(record.into())
            }
            other => Err(CompileError::UnsupportedConst(other.kind().to_string())),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic types of the source language, as the front end reports them.
///
/// Only a fragment is lowerable; the rest of the constructors exist so the
/// code generator can name what it rejects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Bool,
    Int,
    Int32,
    String,
    UnsafePointer,
    Named { name: String, underlying: Box<Type> },
    Pointer(Box<Type>),
    Struct(Vec<Field>),
    Slice(Box<Type>),
    Array(Box<Type>, u64),
    Map(Box<Type>, Box<Type>),
    Chan(Box<Type>),
    Func { params: Vec<Type>, results: Vec<Type> },
    Interface(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl Type {
    pub fn pointer_to(elem: Type) -> Self {
        Type::Pointer(Box::new(elem))
    }

    pub fn named(name: impl Into<String>, underlying: Type) -> Self {
        Type::Named {
            name: name.into(),
            underlying: Box::new(underlying),
        }
    }

    /// Resolves chains of named types down to their structural type.
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Named { underlying, .. } => underlying.underlying(),
            other => other,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Int32 => write!(f, "int32"),
            Type::String => write!(f, "string"),
            Type::UnsafePointer => write!(f, "unsafe pointer"),
            Type::Named { name, .. } => write!(f, "{}", name),
            Type::Pointer(elem) => write!(f, "*{}", elem),
            Type::Struct(fields) => {
                write!(f, "struct {{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {}", field.name, field.ty)?;
                }
                write!(f, "}}")
            }
            Type::Slice(elem) => write!(f, "[]{}", elem),
            Type::Array(elem, len) => write!(f, "[{}]{}", len, elem),
            Type::Map(key, value) => write!(f, "map[{}]{}", key, value),
            Type::Chan(elem) => write!(f, "chan {}", elem),
            Type::Func { params, results } => {
                write!(f, "func(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")?;
                match results.len() {
                    0 => Ok(()),
                    1 => write!(f, " {}", results[0]),
                    _ => {
                        write!(f, " (")?;
                        for (i, r) in results.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", r)?;
                        }
                        write!(f, ")")
                    }
                }
            }
            Type::Interface(name) => write!(f, "interface {}", name),
        }
    }
}

use crate::block::Terminator;
use crate::function::Function;
use crate::instructions::Instruction;
use crate::types::Type;
use crate::values::Const;
use crate::{Result, SsaError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Member {
    Function(Function),
    NamedConst { name: String, value: Const },
    Global { name: String, ty: Type },
    TypeDef { name: String, ty: Type },
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Function(f) => f.name(),
            Member::NamedConst { name, .. }
            | Member::Global { name, .. }
            | Member::TypeDef { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Import path, unique across the program.
    pub path: String,
    /// Source-level package name.
    pub name: String,
    pub members: IndexMap<String, Member>,
}

impl Package {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            members: IndexMap::new(),
        }
    }

    pub fn add_function(&mut self, function: Function) {
        self.members
            .insert(function.name().to_string(), Member::Function(function));
    }

    pub fn add_named_const(&mut self, name: impl Into<String>, value: Const) {
        let name = name.into();
        self.members
            .insert(name.clone(), Member::NamedConst { name, value });
    }

    pub fn add_global(&mut self, name: impl Into<String>, ty: Type) {
        let name = name.into();
        self.members.insert(name.clone(), Member::Global { name, ty });
    }

    pub fn add_type(&mut self, name: impl Into<String>, ty: Type) {
        let name = name.into();
        self.members.insert(name.clone(), Member::TypeDef { name, ty });
    }

    /// Member names in lexicographic order. Lowering walks members through
    /// this so the same input always emits identical IR.
    pub fn sorted_member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.members.keys().cloned().collect();
        names.sort();
        names
    }

    /// Symbol prefix for this package's members. The program-entry package
    /// is always `main`, whatever its import path.
    pub fn prefix(&self) -> &str {
        if self.name == "main" {
            "main"
        } else {
            &self.path
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub packages: Vec<Package>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_package(&mut self, package: Package) {
        self.packages.push(package);
    }

    pub fn entry_package(&self) -> Option<&Package> {
        self.packages
            .iter()
            .find(|p| p.name == "main")
            .or_else(|| self.packages.first())
    }

    /// Structural sanity check, reporting the first problem of the first
    /// broken package: every reachable block must be terminated, branch
    /// targets must exist, and phi edges must pair off with predecessors.
    pub fn validate(&self) -> Result<()> {
        for package in &self.packages {
            for member in package.members.values() {
                let Member::Function(function) = member else {
                    continue;
                };
                let Some(body) = &function.body else {
                    continue;
                };
                let where_at = |block: &crate::block::BasicBlock| {
                    format!("{}.{} {}", package.path, function.name(), block.id)
                };
                if !body.blocks.contains_key(&body.entry_block) {
                    return Err(SsaError::MissingEntry(format!(
                        "{}.{}",
                        package.path,
                        function.name()
                    )));
                }
                for block in body.blocks.values() {
                    if matches!(block.terminator, Terminator::Invalid) {
                        return Err(SsaError::UnterminatedBlock(where_at(block)));
                    }
                    for succ in block.successors() {
                        if !body.blocks.contains_key(&succ) {
                            return Err(SsaError::UnknownBlock(format!(
                                "{} (from {})",
                                succ,
                                where_at(block)
                            )));
                        }
                    }
                    for inst in &block.instructions {
                        if let Instruction::Phi { edges, .. } = inst {
                            if edges.len() != block.preds.len() {
                                return Err(SsaError::PhiEdgeMismatch {
                                    block: where_at(block),
                                    edges: edges.len(),
                                    preds: block.preds.len(),
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

use crate::block::{BasicBlock, BlockId};
use crate::types::Type;
use crate::values::ValueId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Parameter>,
    pub results: Vec<Type>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub signature: Signature,
    /// `None` marks an external function: declared here, defined at link
    /// time.
    pub body: Option<FunctionBody>,
}

impl Function {
    pub fn declaration(name: impl Into<String>, params: Vec<Parameter>, results: Vec<Type>) -> Self {
        Self {
            signature: Signature {
                name: name.into(),
                params,
                results,
            },
            body: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionBody {
    pub entry_block: BlockId,
    pub blocks: IndexMap<BlockId, BasicBlock>,
    next_block_id: u32,
    next_value_id: u32,
}

impl FunctionBody {
    pub fn new() -> Self {
        let entry_block = BlockId(0);
        let mut blocks = IndexMap::new();
        blocks.insert(entry_block, BasicBlock::new(entry_block, "entry"));

        Self {
            entry_block,
            blocks,
            next_block_id: 1,
            next_value_id: 0,
        }
    }

    pub fn create_block(&mut self, comment: impl Into<String>) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.insert(id, BasicBlock::new(id, comment));
        id
    }

    pub fn fresh_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value_id);
        self.next_value_id += 1;
        id
    }

    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    pub fn get_block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(&id)
    }

    /// Rebuilds every predecessor list from the terminators. Blocks are
    /// visited in insertion order, so the lists come out the same on every
    /// run.
    pub fn recompute_preds(&mut self) {
        let ids: Vec<BlockId> = self.blocks.keys().copied().collect();
        for id in &ids {
            self.blocks[id].preds.clear();
        }
        for id in ids {
            for succ in self.blocks[&id].successors() {
                if let Some(block) = self.blocks.get_mut(&succ) {
                    block.preds.push(id);
                }
            }
        }
    }
}

impl Default for FunctionBody {
    fn default() -> Self {
        Self::new()
    }
}

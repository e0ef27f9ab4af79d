use crate::block::BlockId;
use crate::function::FunctionBody;
use std::collections::{HashMap, HashSet};

/// Dominator tree of a function body, built with the classic iterative
/// data-flow algorithm. Child lists are kept in block-id order so every
/// traversal derived from the tree is deterministic.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    idom: HashMap<BlockId, BlockId>,
    children: HashMap<BlockId, Vec<BlockId>>,
}

impl DominatorTree {
    pub fn build(body: &FunctionBody) -> Self {
        let entry = body.entry_block;
        let mut idom = HashMap::new();
        let mut children: HashMap<BlockId, Vec<BlockId>> = HashMap::new();

        let blocks = Self::reverse_postorder(body, entry);

        if blocks.len() <= 1 {
            return Self { idom, children };
        }

        let mut doms: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();
        doms.insert(entry, HashSet::from([entry]));
        for &block in &blocks[1..] {
            doms.insert(block, blocks.iter().copied().collect());
        }

        let mut changed = true;
        while changed {
            changed = false;

            for &block in &blocks[1..] {
                let preds = &body.blocks[&block].preds;
                if preds.is_empty() {
                    continue;
                }

                let mut new_dom: Option<HashSet<BlockId>> = None;
                for pred in preds {
                    if let Some(pred_dom) = doms.get(pred) {
                        new_dom = Some(match new_dom {
                            Some(acc) => acc.intersection(pred_dom).copied().collect(),
                            None => pred_dom.clone(),
                        });
                    }
                }

                if let Some(mut new_dom) = new_dom {
                    new_dom.insert(block);
                    if doms[&block] != new_dom {
                        doms.insert(block, new_dom);
                        changed = true;
                    }
                }
            }
        }

        for &block in &blocks {
            if block == entry {
                continue;
            }

            let dominators = &doms[&block];
            for &candidate in dominators {
                if candidate == block {
                    continue;
                }

                let is_immediate = dominators.iter().all(|&other| {
                    other == block
                        || other == candidate
                        || !doms
                            .get(&candidate)
                            .is_some_and(|c_doms| c_doms.contains(&other))
                });

                if is_immediate {
                    idom.insert(block, candidate);
                    children.entry(candidate).or_default().push(block);
                    break;
                }
            }
        }

        for kids in children.values_mut() {
            kids.sort();
        }

        Self { idom, children }
    }

    fn reverse_postorder(body: &FunctionBody, entry: BlockId) -> Vec<BlockId> {
        let mut visited = HashSet::new();
        let mut postorder = Vec::new();
        Self::dfs_postorder(body, entry, &mut visited, &mut postorder);
        postorder.reverse();
        postorder
    }

    fn dfs_postorder(
        body: &FunctionBody,
        block: BlockId,
        visited: &mut HashSet<BlockId>,
        postorder: &mut Vec<BlockId>,
    ) {
        if !visited.insert(block) {
            return;
        }

        if let Some(block_data) = body.blocks.get(&block) {
            for succ in block_data.successors() {
                Self::dfs_postorder(body, succ, visited, postorder);
            }
        }

        postorder.push(block);
    }

    pub fn dominates(&self, dominator: BlockId, dominated: BlockId) -> bool {
        if dominator == dominated {
            return true;
        }

        let mut current = dominated;
        while let Some(&idom) = self.idom.get(&current) {
            if idom == dominator {
                return true;
            }
            if idom == current {
                break;
            }
            current = idom;
        }

        false
    }

    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(&block).copied()
    }

    pub fn children(&self, block: BlockId) -> &[BlockId] {
        self.children.get(&block).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Preorder walk of the dominator tree from `entry`. Definitions
    /// dominate uses in SSA, so visiting blocks in this order guarantees
    /// every non-phi operand has been lowered before it is consumed.
    pub fn preorder(&self, entry: BlockId) -> Vec<BlockId> {
        let mut order = Vec::new();
        let mut stack = vec![entry];
        while let Some(block) = stack.pop() {
            order.push(block);
            for &child in self.children(block).iter().rev() {
                stack.push(child);
            }
        }
        order
    }
}

//! The finalized flow graph
//!
//! Immutable output of the builder: ordered basic blocks with Entry fixed
//! at `B0` and Exit at the highest id, a region tree, and derived
//! predecessor lists.

use super::block::{BasicBlock, BlockId, BlockKind, EdgeKind};
use super::region::{Region, RegionId};
use rustc_hash::FxHashMap;
use serde::Serialize;

/// A control flow graph over lowered operations
#[derive(Debug, Clone, Serialize)]
pub struct FlowGraph {
    /// Blocks in id order; `blocks[i].id == Bi`
    pub blocks: Vec<BasicBlock>,
    /// Regions in dump order; `regions[0]` is the implicit root
    pub regions: Vec<Region>,
    /// Derived predecessor lists, sorted and deduplicated, indexed by block
    pub predecessors: Vec<Vec<BlockId>>,
    /// Number of flow-capture temporaries introduced during lowering
    pub capture_count: u32,
}

impl FlowGraph {
    /// Lower an operation tree into a flow graph.
    ///
    /// Convenience wrapper over [`crate::builder::GraphBuilder`].
    pub fn build(root: &crate::ops::Operation) -> Result<Self, crate::error::FlowError> {
        crate::builder::GraphBuilder::new().build(root)
    }

    /// The entry block, always `B0`
    pub fn entry(&self) -> &BasicBlock {
        &self.blocks[0]
    }

    /// The exit block, always the highest id
    pub fn exit(&self) -> &BasicBlock {
        self.blocks.last().expect("graph always has an exit block")
    }

    /// Look up a block by id
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.as_u32() as usize)
    }

    /// Look up a region by id
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.as_u32() as usize)
    }

    /// Predecessors of a block
    pub fn predecessors_of(&self, id: BlockId) -> &[BlockId] {
        &self.predecessors[id.as_u32() as usize]
    }

    /// Number of blocks, including Entry and Exit
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Total number of lowered statements
    pub fn statement_count(&self) -> usize {
        self.blocks.iter().map(|b| b.len()).sum()
    }

    /// Child regions of a region, in dump order
    pub fn child_regions(&self, id: RegionId) -> Vec<RegionId> {
        self.regions
            .iter()
            .filter(|r| r.parent == Some(id))
            .map(|r| r.id)
            .collect()
    }

    /// Validate structural invariants of the finished graph.
    ///
    /// Checks that Entry and Exit are positioned correctly, every edge
    /// target exists, every non-exit block has an outgoing edge, and the
    /// predecessor lists mirror the edges exactly.
    pub fn validate(&self) -> Result<(), String> {
        if self.blocks.is_empty() {
            return Err("graph has no blocks".to_string());
        }
        if self.blocks[0].kind != BlockKind::Entry {
            return Err("first block is not the entry".to_string());
        }
        if self.exit().kind != BlockKind::Exit {
            return Err("last block is not the exit".to_string());
        }

        for (i, block) in self.blocks.iter().enumerate() {
            if block.id.as_u32() as usize != i {
                return Err(format!("block {} stored at index {}", block.id, i));
            }
            for succ in block.successors() {
                if self.block(succ).is_none() {
                    return Err(format!(
                        "block {} references non-existent successor {}",
                        block.id, succ
                    ));
                }
            }
            match block.kind {
                BlockKind::Exit => {
                    if block.cond_branch.is_some() || block.next.is_some() {
                        return Err("exit block has an outgoing edge".to_string());
                    }
                }
                _ => {
                    let throws = block
                        .next
                        .as_ref()
                        .is_some_and(|e| e.kind == EdgeKind::Throw);
                    if block.next.is_none() && !throws {
                        return Err(format!("block {} has no outgoing edge", block.id));
                    }
                }
            }
        }

        // Edge/predecessor symmetry.
        let mut derived: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        for block in &self.blocks {
            for succ in block.successors() {
                derived.entry(succ).or_default().push(block.id);
            }
        }
        for block in &self.blocks {
            let mut expected = derived.remove(&block.id).unwrap_or_default();
            expected.sort();
            expected.dedup();
            if expected != self.predecessors[block.id.as_u32() as usize] {
                return Err(format!(
                    "predecessor list of {} does not match incoming edges",
                    block.id
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Operation;

    #[test]
    fn test_build_empty_block() {
        let graph = FlowGraph::build(&Operation::stmts(vec![])).unwrap();
        assert_eq!(graph.block_count(), 2);
        assert_eq!(graph.entry().kind, BlockKind::Entry);
        assert_eq!(graph.exit().kind, BlockKind::Exit);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_entry_flows_to_exit() {
        let graph = FlowGraph::build(&Operation::stmts(vec![])).unwrap();
        let next = graph.entry().next.as_ref().unwrap();
        assert_eq!(next.target, Some(graph.exit().id));
        assert_eq!(graph.predecessors_of(graph.exit().id), &[graph.entry().id]);
    }

    #[test]
    fn test_statement_count() {
        let tree = Operation::stmts(vec![
            Operation::assign(Operation::param("a"), Operation::int(1)),
            Operation::assign(Operation::param("b"), Operation::int(2)),
        ]);
        let graph = FlowGraph::build(&tree).unwrap();
        assert_eq!(graph.statement_count(), 2);
    }
}

//! Basic blocks and edges
//!
//! A basic block is a maximal straight-line statement sequence with one
//! entry and one successor-edge set: an optional conditional jump plus a
//! fall-through edge. Region entering/leaving lists per edge are derived
//! at finalize from the region tree.

use super::region::RegionId;
use crate::ops::Operation;
use serde::Serialize;

/// Basic block identifier; `B0` is Entry and the highest id is Exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Wrap a raw block index
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw block index
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Role of a block within the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockKind {
    /// The unique entry block, always `B0`
    Entry,
    /// An ordinary block
    Block,
    /// The unique exit block, always the highest id
    Exit,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlockKind::Entry => "Entry",
            BlockKind::Block => "Block",
            BlockKind::Exit => "Exit",
        };
        write!(f, "{}", s)
    }
}

/// Direction of a conditional jump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JumpSense {
    /// Taken when the condition is true
    IfTrue,
    /// Taken when the condition is false
    IfFalse,
}

impl JumpSense {
    /// The opposite sense; used when lowering a negated condition
    pub fn invert(self) -> Self {
        match self {
            JumpSense::IfTrue => JumpSense::IfFalse,
            JumpSense::IfFalse => JumpSense::IfTrue,
        }
    }
}

impl std::fmt::Display for JumpSense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JumpSense::IfTrue => write!(f, "Jump if True"),
            JumpSense::IfFalse => write!(f, "Jump if False"),
        }
    }
}

/// Semantics of an outgoing edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeKind {
    /// Ordinary fall-through or jump
    Regular,
    /// Return edge into the exit block
    Return,
    /// Throw; leaves the graph with no target block
    Throw,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeKind::Regular => "Regular",
            EdgeKind::Return => "Return",
            EdgeKind::Throw => "Throw",
        };
        write!(f, "{}", s)
    }
}

/// An outgoing edge with its region deltas
#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    /// Edge semantics
    pub kind: EdgeKind,
    /// Destination block; `None` only for `Throw`
    pub target: Option<BlockId>,
    /// Value carried by the edge (return value or thrown value)
    pub value: Option<Operation>,
    /// Regions entered along this edge, outermost first
    pub entering: Vec<RegionId>,
    /// Regions left along this edge, innermost first
    pub leaving: Vec<RegionId>,
}

/// Conditional jump taken out of a block before its fall-through edge
#[derive(Debug, Clone, Serialize)]
pub struct CondBranch {
    /// The guard value, evaluated exactly once
    pub condition: Operation,
    /// Whether the jump fires on true or on false
    pub sense: JumpSense,
    /// Jump destination
    pub target: BlockId,
    /// Regions entered along the jump, outermost first
    pub entering: Vec<RegionId>,
    /// Regions left along the jump, innermost first
    pub leaving: Vec<RegionId>,
}

/// A finalized basic block
#[derive(Debug, Clone, Serialize)]
pub struct BasicBlock {
    /// Block id; ids are dense and ordered
    pub id: BlockId,
    /// Entry, Exit, or ordinary block
    pub kind: BlockKind,
    /// Lowered statements in order
    pub statements: Vec<Operation>,
    /// Conditional jump, if the block ends in a boolean test
    pub cond_branch: Option<CondBranch>,
    /// Fall-through edge; absent only on Exit and after Throw
    pub next: Option<Edge>,
    /// Innermost region owning this block
    pub region: RegionId,
    /// Whether any path from Entry reaches this block
    pub is_reachable: bool,
}

impl BasicBlock {
    /// All successor block ids, conditional target first
    pub fn successors(&self) -> Vec<BlockId> {
        let mut out = Vec::new();
        if let Some(cond) = &self.cond_branch {
            out.push(cond.target);
        }
        if let Some(next) = &self.next {
            if let Some(target) = next.target {
                out.push(target);
            }
        }
        out
    }

    /// Number of lowered statements
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the block carries no statements
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_display() {
        assert_eq!(format!("{}", BlockId::new(0)), "B0");
        assert_eq!(format!("{}", BlockId::new(12)), "B12");
    }

    #[test]
    fn test_jump_sense_display() {
        assert_eq!(format!("{}", JumpSense::IfFalse), "Jump if False");
        assert_eq!(format!("{}", JumpSense::IfTrue), "Jump if True");
    }

    #[test]
    fn test_successors() {
        let block = BasicBlock {
            id: BlockId::new(1),
            kind: BlockKind::Block,
            statements: Vec::new(),
            cond_branch: Some(CondBranch {
                condition: crate::ops::Operation::bool(true),
                sense: JumpSense::IfFalse,
                target: BlockId::new(3),
                entering: Vec::new(),
                leaving: Vec::new(),
            }),
            next: Some(Edge {
                kind: EdgeKind::Regular,
                target: Some(BlockId::new(2)),
                value: None,
                entering: Vec::new(),
                leaving: Vec::new(),
            }),
            region: RegionId::new(0),
            is_reachable: true,
        };
        assert_eq!(block.successors(), vec![BlockId::new(3), BlockId::new(2)]);
    }

    #[test]
    fn test_throw_edge_has_no_target() {
        let edge = Edge {
            kind: EdgeKind::Throw,
            target: None,
            value: Some(crate::ops::Operation::param("ex")),
            entering: Vec::new(),
            leaving: Vec::new(),
        };
        assert!(edge.target.is_none());
    }
}

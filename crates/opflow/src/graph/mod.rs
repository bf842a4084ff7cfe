//! Flow graph data model
//!
//! Blocks, regions, edges, the finished [`FlowGraph`], and its textual
//! renderer.

mod block;
mod flow;
mod pretty;
mod region;

pub use block::{BasicBlock, BlockId, BlockKind, CondBranch, Edge, EdgeKind, JumpSense};
pub use flow::FlowGraph;
pub use pretty::PrettyPrint;
pub use region::{Region, RegionId};

pub(crate) use region::edge_delta;

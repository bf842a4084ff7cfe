//! Operation Flow Graph Engine
//!
//! This crate lowers a structured operation tree into a control flow
//! graph of basic blocks annotated with nested lexical regions:
//! - **Ops**: The input operation tree (`ops` module)
//! - **Builder**: Lowering, flow-capture decomposition, and the patch
//!   passes (`builder` module)
//! - **Graph**: Blocks, regions, edges, and the textual dump (`graph`
//!   module)
//!
//! # Example
//!
//! ```rust,ignore
//! use opflow::{FlowGraph, Operation, PrettyPrint};
//!
//! // { int x = 1; if (x < 2) return; }
//! let tree = Operation::block(
//!     vec!["x"],
//!     vec![
//!         Operation::decl_init("x", Operation::int(1)),
//!         Operation::if_then(
//!             Operation::binary(BinaryOp::LessThan, Operation::local("x"), Operation::int(2)),
//!             Operation::ret(),
//!         ),
//!     ],
//! );
//!
//! let graph = FlowGraph::build(&tree).unwrap();
//! println!("{}", graph.pretty_print());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Builder module: lowering, captures, and finalization
pub mod builder;

/// Error types
pub mod error;

/// Graph module: blocks, regions, edges, and rendering
pub mod graph;

/// Ops module: the structured operation tree
pub mod ops;

pub use builder::GraphBuilder;
pub use error::FlowError;
pub use graph::{
    BasicBlock, BlockId, BlockKind, CondBranch, Edge, EdgeKind, FlowGraph, JumpSense,
    PrettyPrint, Region, RegionId,
};
pub use ops::{
    BinaryOp, BranchOperation, CaptureId, LiteralValue, LoopKind, LoopOperation, Operation,
    ReferenceKind, UnaryOp,
};

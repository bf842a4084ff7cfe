//! Error types for graph construction
//!
//! The builder treats a well-formed, previously validated operation tree
//! as a precondition; these errors report contract violations rather than
//! user-facing diagnostics.

use thiserror::Error;

/// Errors that can occur while lowering an operation tree into a flow graph
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Malformed operation-tree shape
    #[error("Malformed operation tree: {message}")]
    StructuralInput {
        /// Description of the structural problem
        message: String,
    },

    /// A goto, break, or continue had no matching target in any enclosing scope
    #[error("Unresolved branch target '{name}'")]
    UnresolvedLabel {
        /// The label that could not be resolved
        name: String,
    },

    /// Source nesting exceeded the builder's recursion limit
    #[error("Operation tree nesting exceeds the supported depth of {limit}")]
    NestingTooDeep {
        /// The depth limit that was exceeded
        limit: usize,
    },
}

impl FlowError {
    pub(crate) fn structural(message: impl Into<String>) -> Self {
        FlowError::StructuralInput {
            message: message.into(),
        }
    }
}

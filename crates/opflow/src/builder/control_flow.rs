//! Control flow bookkeeping during lowering
//!
//! Loop contexts for break/continue resolution and the label table used
//! by the two-pass goto resolver.

use crate::error::FlowError;
use rustc_hash::FxHashMap;

/// Builder-internal block index
pub(crate) type BlockIx = usize;

/// Context for managing loop control flow
#[derive(Debug, Clone)]
pub(crate) struct LoopContext {
    /// Block to jump to for `break`
    pub break_target: BlockIx,
    /// Block to jump to for `continue`
    pub continue_target: BlockIx,
    /// Optional loop label
    pub label: Option<String>,
}

/// Stack of active loop contexts for nested loops
#[derive(Debug, Default)]
pub(crate) struct LoopStack {
    stack: Vec<LoopContext>,
}

impl LoopStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new loop context
    pub fn push(&mut self, ctx: LoopContext) {
        self.stack.push(ctx);
    }

    /// Pop the current loop context
    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// Find a loop by label
    fn find_by_label(&self, label: &str) -> Option<&LoopContext> {
        self.stack
            .iter()
            .rev()
            .find(|ctx| ctx.label.as_deref() == Some(label))
    }

    /// Get the break target for the current or labeled loop
    pub fn break_target(&self, label: Option<&str>) -> Option<BlockIx> {
        match label {
            Some(l) => self.find_by_label(l).map(|ctx| ctx.break_target),
            None => self.stack.last().map(|ctx| ctx.break_target),
        }
    }

    /// Get the continue target for the current or labeled loop
    pub fn continue_target(&self, label: Option<&str>) -> Option<BlockIx> {
        match label {
            Some(l) => self.find_by_label(l).map(|ctx| ctx.continue_target),
            None => self.stack.last().map(|ctx| ctx.continue_target),
        }
    }
}

/// Named jump targets defined so far
#[derive(Debug, Default)]
pub(crate) struct LabelTable {
    defined: FxHashMap<String, BlockIx>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a label definition; duplicate names are a structural error
    pub fn define(&mut self, name: &str, block: BlockIx) -> Result<(), FlowError> {
        if self.defined.insert(name.to_string(), block).is_some() {
            return Err(FlowError::structural(format!(
                "duplicate label '{}'",
                name
            )));
        }
        Ok(())
    }

    /// Resolve a label to its block, if defined
    pub fn get(&self, name: &str) -> Option<BlockIx> {
        self.defined.get(name).copied()
    }
}

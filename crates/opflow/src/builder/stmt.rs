//! Statement lowering
//!
//! Each handler leaves the builder with an open, unsealed current block
//! so callers can keep appending. Branch statements seal the open block
//! and continue in a fresh one with no incoming edge; if nothing ever
//! jumps there the pack pass drops it, otherwise it stays as an
//! unreachable block.

use super::control_flow::{BlockIx, LoopContext};
use super::{GraphBuilder, PendingTarget};
use crate::error::FlowError;
use crate::graph::{EdgeKind, JumpSense};
use crate::ops::{BranchOperation, LoopKind, LoopOperation, Operation};

impl GraphBuilder {
    pub(super) fn lower_stmt(&mut self, op: &Operation) -> Result<(), FlowError> {
        self.enter()?;
        let result = self.lower_stmt_inner(op);
        self.leave();
        result
    }

    fn lower_stmt_inner(&mut self, op: &Operation) -> Result<(), FlowError> {
        match op {
            Operation::Block { locals, statements } => self.lower_block(locals, statements),
            Operation::VariableDeclaration { name, initializer } => {
                if let Some(init) = initializer {
                    let value = self.lower_expr(init)?;
                    self.emit(Operation::assign(Operation::local(name.clone()), value));
                }
                Ok(())
            }
            Operation::Conditional {
                condition,
                when_true,
                when_false,
            } => self.lower_if(condition, when_true, when_false.as_deref()),
            Operation::Loop(descriptor) => self.lower_loop(descriptor),
            Operation::Branch(branch) => self.lower_branch(branch),
            Operation::Label { name } => self.lower_label(name),
            Operation::Throw { value } => self.lower_throw(value),
            Operation::FlowCapture { .. } | Operation::FlowCaptureReference { .. } => {
                Err(FlowError::structural(
                    "flow captures are produced by lowering, not accepted as input",
                ))
            }
            other => self.lower_expr_stmt(other),
        }
    }

    fn lower_block(&mut self, locals: &[String], statements: &[Operation]) -> Result<(), FlowError> {
        if locals.is_empty() {
            for stmt in statements {
                self.lower_stmt(stmt)?;
            }
            return Ok(());
        }
        self.push_scope(locals.to_vec(), false);
        for stmt in statements {
            self.lower_stmt(stmt)?;
        }
        self.pop_scope_and_continue();
        Ok(())
    }

    /// Expression in statement position. Pure values have no effect and
    /// are dropped, which lets declaration-only scopes elide cleanly.
    fn lower_expr_stmt(&mut self, op: &Operation) -> Result<(), FlowError> {
        let lowered = self.lower_expr(op)?;
        match lowered {
            Operation::Literal(_)
            | Operation::Reference { .. }
            | Operation::FlowCaptureReference { .. } => {}
            other => self.emit(other),
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        condition: &Operation,
        when_true: &Operation,
        when_false: Option<&Operation>,
    ) -> Result<(), FlowError> {
        match when_false {
            None => {
                let join = self.alloc_block();
                self.lower_condition_branch(condition, JumpSense::IfFalse, join)?;
                self.lower_stmt(when_true)?;
                self.seal_regular(join);
                self.start_block(join);
            }
            Some(else_arm) => {
                let else_block = self.alloc_block();
                let join = self.alloc_block();
                self.lower_condition_branch(condition, JumpSense::IfFalse, else_block)?;
                self.lower_stmt(when_true)?;
                self.seal_regular(join);
                self.start_block(else_block);
                self.lower_stmt(else_arm)?;
                self.seal_regular(join);
                self.start_block(join);
            }
        }
        Ok(())
    }

    fn lower_branch(&mut self, branch: &BranchOperation) -> Result<(), FlowError> {
        match branch {
            BranchOperation::Break { label } => {
                let target = self
                    .loops
                    .break_target(label.as_deref())
                    .ok_or_else(|| match label {
                        Some(name) => FlowError::UnresolvedLabel { name: name.clone() },
                        None => FlowError::structural("break outside of a loop"),
                    })?;
                self.seal_regular(target);
                self.start_unreachable();
            }
            BranchOperation::Continue { label } => {
                let target = self
                    .loops
                    .continue_target(label.as_deref())
                    .ok_or_else(|| match label {
                        Some(name) => FlowError::UnresolvedLabel { name: name.clone() },
                        None => FlowError::structural("continue outside of a loop"),
                    })?;
                self.seal_regular(target);
                self.start_unreachable();
            }
            BranchOperation::Goto { label } => {
                // Forward gotos resolve in the label patch pass.
                self.seal(
                    EdgeKind::Regular,
                    PendingTarget::LabelRef(label.clone()),
                    None,
                );
                self.start_unreachable();
            }
            BranchOperation::Return { value } => {
                let value = match value {
                    Some(v) => Some(self.lower_expr(v)?),
                    None => None,
                };
                let exit = self.exit;
                self.seal(EdgeKind::Return, PendingTarget::Block(exit), value);
                self.start_unreachable();
            }
        }
        Ok(())
    }

    /// Labels open a fresh block so jumps can land on the statement that
    /// follows them.
    fn lower_label(&mut self, name: &str) -> Result<(), FlowError> {
        let target = self.alloc_block();
        self.seal_regular(target);
        self.start_block(target);
        self.labels.define(name, target)
    }

    fn lower_throw(&mut self, value: &Operation) -> Result<(), FlowError> {
        let value = self.lower_expr(value)?;
        self.seal(EdgeKind::Throw, PendingTarget::None, Some(value));
        self.start_unreachable();
        Ok(())
    }

    fn lower_loop(&mut self, descriptor: &LoopOperation) -> Result<(), FlowError> {
        let has_before_region = !descriptor.before_locals.is_empty();
        if has_before_region {
            self.push_scope(descriptor.before_locals.clone(), false);
        }
        for stmt in &descriptor.before {
            self.lower_stmt(stmt)?;
        }

        let exit = match descriptor.kind {
            LoopKind::TopTest => self.lower_top_test(descriptor)?,
            LoopKind::BottomTest => self.lower_bottom_test(descriptor)?,
        };

        // The break target sits outside every loop region.
        if has_before_region {
            self.pop_scope_only();
        }
        self.start_block(exit);
        Ok(())
    }

    /// `for`/`while` shape. The header block is the back-edge target; the
    /// condition evaluates there, or in a condition-scoped region directly
    /// below it when the condition binds locals. Returns the unplaced
    /// break-target block.
    fn lower_top_test(&mut self, descriptor: &LoopOperation) -> Result<BlockIx, FlowError> {
        let exit = self.alloc_block();
        let header = self.alloc_block();
        self.seal_regular(header);
        self.start_block(header);

        let has_condition_region = !descriptor.condition_locals.is_empty();
        if has_condition_region {
            self.push_scope(descriptor.condition_locals.clone(), true);
        }
        if let Some(condition) = &descriptor.condition {
            // A literal condition still produces a real branch.
            self.lower_condition_branch(condition, JumpSense::IfFalse, exit)?;
        }

        let bottom = if descriptor.at_bottom.is_empty() {
            None
        } else {
            Some(self.alloc_block())
        };
        self.loops.push(LoopContext {
            break_target: exit,
            continue_target: bottom.unwrap_or(header),
            label: descriptor.label.clone(),
        });
        self.lower_stmt(&descriptor.body)?;
        self.loops.pop();

        if let Some(bottom) = bottom {
            self.seal_regular(bottom);
            self.start_block(bottom);
            for stmt in &descriptor.at_bottom {
                self.lower_stmt(stmt)?;
            }
        }
        self.seal_regular(header);

        if has_condition_region {
            self.pop_scope_only();
        }
        Ok(exit)
    }

    /// `do` shape: the body runs before the first test, and `continue`
    /// jumps to the condition rather than the body head. Returns the
    /// unplaced break-target block.
    fn lower_bottom_test(&mut self, descriptor: &LoopOperation) -> Result<BlockIx, FlowError> {
        let exit = self.alloc_block();
        let body_head = self.alloc_block();
        let cond_block = self.alloc_block();
        self.seal_regular(body_head);
        self.start_block(body_head);

        let has_condition_region = !descriptor.condition_locals.is_empty();
        if has_condition_region {
            self.push_scope(descriptor.condition_locals.clone(), true);
        }

        self.loops.push(LoopContext {
            break_target: exit,
            continue_target: cond_block,
            label: descriptor.label.clone(),
        });
        self.lower_stmt(&descriptor.body)?;
        self.loops.pop();

        self.seal_regular(cond_block);
        self.start_block(cond_block);
        for stmt in &descriptor.at_bottom {
            self.lower_stmt(stmt)?;
        }
        match &descriptor.condition {
            Some(condition) => {
                self.lower_condition_branch(condition, JumpSense::IfTrue, body_head)?;
            }
            None => {
                self.seal_regular(body_head);
                self.start_unreachable();
            }
        }

        if has_condition_region {
            self.pop_scope_only();
        }
        self.seal_regular(exit);
        Ok(exit)
    }
}

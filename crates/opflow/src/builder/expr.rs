//! Expression lowering and flow-capture decomposition
//!
//! Expressions with embedded control flow (`?:`, `??`, short-circuit
//! operators) cannot live inside a single statement, so they are
//! decomposed into capture writes across branching blocks and replaced
//! by a capture reference at the use site. Operands evaluated before a
//! branch point are spilled into captures first so observable evaluation
//! order stays strictly left to right.
//!
//! Conditions in branch position decompose structurally instead: the
//! short-circuit operators and `?:` become jump shapes with no captures.

use super::control_flow::BlockIx;
use super::GraphBuilder;
use crate::error::FlowError;
use crate::graph::JumpSense;
use crate::ops::{BinaryOp, Operation, UnaryOp};

impl GraphBuilder {
    /// Lower an expression in value position, emitting capture writes as
    /// needed, and return the pure operation standing for its value.
    pub(super) fn lower_expr(&mut self, op: &Operation) -> Result<Operation, FlowError> {
        self.enter()?;
        let result = self.lower_expr_inner(op);
        self.leave();
        result
    }

    fn lower_expr_inner(&mut self, op: &Operation) -> Result<Operation, FlowError> {
        match op {
            Operation::Literal(_) | Operation::Reference { .. } => Ok(op.clone()),
            Operation::Assignment { target, value } => self.lower_assignment(target, value),
            Operation::Binary { op, left, right } if op.is_short_circuit() => {
                self.lower_logical_value(*op, left, right)
            }
            Operation::Binary { op, left, right } => {
                // Spill the left operand when the right one branches, so
                // it is evaluated before any of the right's side effects.
                let left = self.lower_expr(left)?;
                let left = if right.needs_decomposition() {
                    self.spill(left)
                } else {
                    left
                };
                let right = self.lower_expr(right)?;
                Ok(Operation::binary(*op, left, right))
            }
            Operation::Unary { op, operand } => {
                let operand = self.lower_expr(operand)?;
                Ok(Operation::unary(*op, operand))
            }
            Operation::Conversion {
                target_type,
                operand,
            } => {
                // Conversions are transparent: decomposition happens on
                // the operand and the conversion wraps the result.
                let operand = self.lower_expr(operand)?;
                Ok(Operation::convert(target_type.clone(), operand))
            }
            Operation::Conditional {
                condition,
                when_true,
                when_false,
            } => self.lower_conditional_value(condition, when_true, when_false.as_deref()),
            Operation::NullCoalesce { value, fallback } => {
                self.lower_coalesce_value(value, fallback)
            }
            Operation::Invocation { target, arguments } => {
                let last_branching = arguments
                    .iter()
                    .rposition(Operation::needs_decomposition);
                let mut lowered = Vec::with_capacity(arguments.len());
                for (pos, arg) in arguments.iter().enumerate() {
                    let value = self.lower_expr(arg)?;
                    let value = match last_branching {
                        Some(last) if pos < last => self.spill(value),
                        _ => value,
                    };
                    lowered.push(value);
                }
                Ok(Operation::invoke(target.clone(), lowered))
            }
            Operation::FlowCaptureReference { .. } => Ok(op.clone()),
            Operation::FlowCapture { .. } => Err(FlowError::structural(
                "flow captures are produced by lowering, not accepted as input",
            )),
            Operation::Block { .. }
            | Operation::VariableDeclaration { .. }
            | Operation::Loop(_)
            | Operation::Branch(_)
            | Operation::Label { .. }
            | Operation::Throw { .. } => Err(FlowError::structural(
                "statement operation in value position",
            )),
        }
    }

    /// When the value branches, the target location is captured before
    /// the value's control flow runs so the write still lands left to
    /// right.
    fn lower_assignment(
        &mut self,
        target: &Operation,
        value: &Operation,
    ) -> Result<Operation, FlowError> {
        if !target.is_lvalue() {
            return Err(FlowError::structural("assignment to a non-storage value"));
        }
        if value.needs_decomposition() {
            let target = self.lower_expr(target)?;
            let target = self.spill(target);
            let value = self.lower_expr(value)?;
            Ok(Operation::assign(target, value))
        } else {
            let value = self.lower_expr(value)?;
            Ok(Operation::assign(target.clone(), value))
        }
    }

    /// Value-position `?:`: both arms write the same result capture and
    /// control merges on the capture reference.
    fn lower_conditional_value(
        &mut self,
        condition: &Operation,
        when_true: &Operation,
        when_false: Option<&Operation>,
    ) -> Result<Operation, FlowError> {
        let when_false = when_false.ok_or_else(|| {
            FlowError::structural("conditional in value position requires both arms")
        })?;
        let false_arm = self.alloc_block();
        let join = self.alloc_block();
        self.lower_condition_branch(condition, JumpSense::IfFalse, false_arm)?;

        let result = self.next_capture();
        let value = self.lower_expr(when_true)?;
        self.emit(Operation::FlowCapture {
            id: result,
            value: Box::new(value),
        });
        self.seal_regular(join);

        self.start_block(false_arm);
        let value = self.lower_expr(when_false)?;
        self.emit(Operation::FlowCapture {
            id: result,
            value: Box::new(value),
        });
        self.seal_regular(join);

        self.start_block(join);
        Ok(Operation::FlowCaptureReference { id: result })
    }

    /// `a ?? b`: the subject is spilled once, tested for null, and reused
    /// as the result on the non-null path.
    fn lower_coalesce_value(
        &mut self,
        value: &Operation,
        fallback: &Operation,
    ) -> Result<Operation, FlowError> {
        let subject = self.lower_expr(value)?;
        let subject = self.spill(subject);

        let fallback_arm = self.alloc_block();
        let join = self.alloc_block();
        self.branch_to(
            Operation::unary(UnaryOp::IsNull, subject.clone()),
            JumpSense::IfTrue,
            fallback_arm,
        );

        let result = self.next_capture();
        self.emit(Operation::FlowCapture {
            id: result,
            value: Box::new(subject),
        });
        self.seal_regular(join);

        self.start_block(fallback_arm);
        let value = self.lower_expr(fallback)?;
        self.emit(Operation::FlowCapture {
            id: result,
            value: Box::new(value),
        });
        self.seal_regular(join);

        self.start_block(join);
        Ok(Operation::FlowCaptureReference { id: result })
    }

    /// Value-position `&&`/`||`: the left operand decides whether the
    /// right one runs; the short path writes the deciding literal.
    fn lower_logical_value(
        &mut self,
        op: BinaryOp,
        left: &Operation,
        right: &Operation,
    ) -> Result<Operation, FlowError> {
        let short_arm = self.alloc_block();
        let join = self.alloc_block();
        let sense = match op {
            BinaryOp::AndAlso => JumpSense::IfFalse,
            BinaryOp::OrElse => JumpSense::IfTrue,
            _ => return Err(FlowError::structural("not a short-circuit operator")),
        };
        self.lower_condition_branch(left, sense, short_arm)?;

        let result = self.next_capture();
        let value = self.lower_expr(right)?;
        self.emit(Operation::FlowCapture {
            id: result,
            value: Box::new(value),
        });
        self.seal_regular(join);

        self.start_block(short_arm);
        self.emit(Operation::FlowCapture {
            id: result,
            value: Box::new(Operation::bool(matches!(op, BinaryOp::OrElse))),
        });
        self.seal_regular(join);

        self.start_block(join);
        Ok(Operation::FlowCaptureReference { id: result })
    }

    /// Lower a condition in branch position: jump to `target` when the
    /// condition evaluates to `sense`, fall through otherwise. Literal
    /// conditions are not folded.
    pub(super) fn lower_condition_branch(
        &mut self,
        condition: &Operation,
        sense: JumpSense,
        target: BlockIx,
    ) -> Result<(), FlowError> {
        self.enter()?;
        let result = self.lower_condition_inner(condition, sense, target);
        self.leave();
        result
    }

    fn lower_condition_inner(
        &mut self,
        condition: &Operation,
        sense: JumpSense,
        target: BlockIx,
    ) -> Result<(), FlowError> {
        match condition {
            Operation::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.lower_condition_branch(operand, sense.invert(), target),
            Operation::Binary { op, left, right } if op.is_short_circuit() => {
                // For `a && b`, false on either side decides; for
                // `a || b`, true does. When the jump fires on the
                // deciding value both operands branch to the target,
                // otherwise the left short-circuits past the jump.
                let deciding = match op {
                    BinaryOp::AndAlso => JumpSense::IfFalse,
                    BinaryOp::OrElse => JumpSense::IfTrue,
                    _ => unreachable!("guard matched a short-circuit operator"),
                };
                if sense == deciding {
                    self.lower_condition_branch(left, deciding, target)?;
                    self.lower_condition_branch(right, deciding, target)
                } else {
                    let fall_through = self.alloc_block();
                    self.lower_condition_branch(left, deciding, fall_through)?;
                    self.lower_condition_branch(right, sense, target)?;
                    self.seal_regular(fall_through);
                    self.start_block(fall_through);
                    Ok(())
                }
            }
            Operation::Conditional {
                condition: inner,
                when_true,
                when_false: Some(when_false),
            } => {
                // Branch-position `?:` forks into two condition arms
                // with no result capture.
                let false_arm = self.alloc_block();
                let done = self.alloc_block();
                self.lower_condition_branch(inner, JumpSense::IfFalse, false_arm)?;
                self.lower_condition_branch(when_true, sense, target)?;
                self.seal_regular(done);
                self.start_block(false_arm);
                self.lower_condition_branch(when_false, sense, target)?;
                self.seal_regular(done);
                self.start_block(done);
                Ok(())
            }
            other => {
                let value = self.lower_expr(other)?;
                self.branch_to(value, sense, target);
                Ok(())
            }
        }
    }
}

//! The Operation Tree
//!
//! The immutable, structured input IR: a closed set of tagged node kinds
//! for blocks, declarations, expressions, loops, and branches. The tree
//! is assumed to be bound and validated upstream; the builder consumes it
//! without modifying it.
//!
//! `FlowCapture` and `FlowCaptureReference` belong to the *output* side of
//! lowering: they are emitted by the builder and are rejected when found
//! in an input tree.

use serde::{Deserialize, Serialize};

/// Numbered synthetic temporary introduced by flow-capture decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureId(pub u32);

impl CaptureId {
    /// Wrap a raw capture index
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw capture index
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CaptureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Binary operator kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Remainder,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `==`
    Equals,
    /// `!=`
    NotEquals,
    /// Short-circuiting `&&`
    AndAlso,
    /// Short-circuiting `||`
    OrElse,
}

impl BinaryOp {
    /// Whether this operator introduces its own control flow
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
        };
        write!(f, "{}", s)
    }
}

/// Unary operator kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Logical negation
    Not,
    /// Arithmetic negation
    Negate,
    /// Synthetic null test emitted when decomposing `??`
    IsNull,
}

/// Literal payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// Integer literal
    Int(i64),
    /// Boolean literal
    Bool(bool),
    /// String literal
    Str(String),
    /// The null literal
    Null,
}

/// Whether a reference names a local or an enclosing parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// A block- or loop-declared local
    Local,
    /// A parameter of the enclosing body
    Parameter,
}

/// Whether a loop tests its condition before or after the body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopKind {
    /// `for`/`while` shape: condition runs before each iteration
    TopTest,
    /// `do` shape: body runs once before the first test
    BottomTest,
}

/// Structured loop descriptor
///
/// Covers the full `for` shape; `while` is the degenerate form with no
/// initializers or iterators. Initializer-declared locals span the whole
/// loop; condition-declared locals get a narrower, condition-scoped
/// region wrapping condition, body, and iterators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopOperation {
    /// Condition placement
    pub kind: LoopKind,
    /// Initializer operations, run once in source order
    pub before: Vec<Operation>,
    /// Locals declared by the initializers (whole-loop lifetime)
    pub before_locals: Vec<String>,
    /// Loop condition; `None` means loop forever (`for(;;)`)
    pub condition: Option<Operation>,
    /// Locals bound inside the condition (pattern outputs)
    pub condition_locals: Vec<String>,
    /// Loop body
    pub body: Operation,
    /// Iterator operations, run after the body in source order
    pub at_bottom: Vec<Operation>,
    /// Optional loop label for labeled break/continue
    pub label: Option<String>,
}

impl LoopOperation {
    /// A `while (condition) body` loop
    pub fn while_loop(condition: Operation, body: Operation) -> Self {
        Self {
            kind: LoopKind::TopTest,
            before: Vec::new(),
            before_locals: Vec::new(),
            condition: Some(condition),
            condition_locals: Vec::new(),
            body,
            at_bottom: Vec::new(),
            label: None,
        }
    }

    /// A `do body while (condition)` loop
    pub fn do_loop(body: Operation, condition: Operation) -> Self {
        Self {
            kind: LoopKind::BottomTest,
            before: Vec::new(),
            before_locals: Vec::new(),
            condition: Some(condition),
            condition_locals: Vec::new(),
            body,
            at_bottom: Vec::new(),
            label: None,
        }
    }

    /// A full `for (before; condition; at_bottom) body` loop
    pub fn for_loop(
        before_locals: Vec<String>,
        before: Vec<Operation>,
        condition: Option<Operation>,
        at_bottom: Vec<Operation>,
        body: Operation,
    ) -> Self {
        Self {
            kind: LoopKind::TopTest,
            before,
            before_locals,
            condition,
            condition_locals: Vec::new(),
            body,
            at_bottom: Vec::new(),
            label: None,
        }
        .with_bottom(at_bottom)
    }

    fn with_bottom(mut self, at_bottom: Vec<Operation>) -> Self {
        self.at_bottom = at_bottom;
        self
    }

    /// Attach condition-declared locals (pattern outputs)
    pub fn with_condition_locals(mut self, locals: Vec<String>) -> Self {
        self.condition_locals = locals;
        self
    }

    /// Attach a loop label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Break, continue, goto, and return branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BranchOperation {
    /// Leave the innermost (or labeled) loop
    Break {
        /// Optional loop label
        label: Option<String>,
    },
    /// Jump to the innermost (or labeled) loop's iterator/condition point
    Continue {
        /// Optional loop label
        label: Option<String>,
    },
    /// Jump to a named label
    Goto {
        /// Target label name
        label: String,
    },
    /// Return from the body, optionally with a value
    Return {
        /// Returned value, if any
        value: Option<Box<Operation>>,
    },
}

/// A node of the operation tree
///
/// This kind set is closed: every component of the builder pattern-matches
/// exhaustively over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Statement block introducing an ordered list of locals
    Block {
        /// Locals declared directly in this block's scope
        locals: Vec<String>,
        /// Statements in source order
        statements: Vec<Operation>,
    },
    /// Local declaration, optionally initialized
    VariableDeclaration {
        /// Declared local name
        name: String,
        /// Initializer expression
        initializer: Option<Box<Operation>>,
    },
    /// Simple assignment
    Assignment {
        /// Storage location being written
        target: Box<Operation>,
        /// Value expression
        value: Box<Operation>,
    },
    /// Binary operation, including short-circuit forms
    Binary {
        /// Operator kind
        op: BinaryOp,
        /// Left operand
        left: Box<Operation>,
        /// Right operand
        right: Box<Operation>,
    },
    /// Unary operation
    Unary {
        /// Operator kind
        op: UnaryOp,
        /// Operand
        operand: Box<Operation>,
    },
    /// Conditional: `?:` in expression position, `if`/`else` in statement position
    Conditional {
        /// Guard condition
        condition: Box<Operation>,
        /// Consequence
        when_true: Box<Operation>,
        /// Alternative; required in expression position
        when_false: Option<Box<Operation>>,
    },
    /// Null-coalescing `a ?? b`
    NullCoalesce {
        /// Subject value
        value: Box<Operation>,
        /// Fallback evaluated only when the subject is null
        fallback: Box<Operation>,
    },
    /// Conversion wrapping one operand; the payload is opaque to the builder
    Conversion {
        /// Target type name, carried through verbatim
        target_type: String,
        /// Converted operand
        operand: Box<Operation>,
    },
    /// Structured loop
    Loop(Box<LoopOperation>),
    /// Break/continue/goto/return
    Branch(BranchOperation),
    /// Named jump target
    Label {
        /// Label name, unique within the body
        name: String,
    },
    /// Throw; terminates the path with no successor block
    Throw {
        /// Thrown value
        value: Box<Operation>,
    },
    /// Call to a named target
    Invocation {
        /// Callee name
        target: String,
        /// Arguments in source order
        arguments: Vec<Operation>,
    },
    /// Literal value
    Literal(LiteralValue),
    /// Reference to a local or parameter
    Reference {
        /// Referenced name
        name: String,
        /// Local or parameter
        kind: ReferenceKind,
    },
    /// Write to a numbered capture temporary (output-only)
    FlowCapture {
        /// Capture id
        id: CaptureId,
        /// Captured value
        value: Box<Operation>,
    },
    /// Read of a numbered capture temporary (output-only)
    FlowCaptureReference {
        /// Capture id
        id: CaptureId,
    },
}

impl Operation {
    /// A statement block with locals
    pub fn block<S: Into<String>>(locals: Vec<S>, statements: Vec<Operation>) -> Self {
        Operation::Block {
            locals: locals.into_iter().map(Into::into).collect(),
            statements,
        }
    }

    /// A statement block declaring no locals
    pub fn stmts(statements: Vec<Operation>) -> Self {
        Operation::Block {
            locals: Vec::new(),
            statements,
        }
    }

    /// Local declaration without an initializer
    pub fn decl(name: impl Into<String>) -> Self {
        Operation::VariableDeclaration {
            name: name.into(),
            initializer: None,
        }
    }

    /// Local declaration with an initializer
    pub fn decl_init(name: impl Into<String>, initializer: Operation) -> Self {
        Operation::VariableDeclaration {
            name: name.into(),
            initializer: Some(Box::new(initializer)),
        }
    }

    /// Simple assignment
    pub fn assign(target: Operation, value: Operation) -> Self {
        Operation::Assignment {
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    /// Binary operation
    pub fn binary(op: BinaryOp, left: Operation, right: Operation) -> Self {
        Operation::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Unary operation
    pub fn unary(op: UnaryOp, operand: Operation) -> Self {
        Operation::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Logical negation
    pub fn not(operand: Operation) -> Self {
        Operation::unary(UnaryOp::Not, operand)
    }

    /// Conditional with both arms
    pub fn cond(condition: Operation, when_true: Operation, when_false: Operation) -> Self {
        Operation::Conditional {
            condition: Box::new(condition),
            when_true: Box::new(when_true),
            when_false: Some(Box::new(when_false)),
        }
    }

    /// Conditional statement without an alternative
    pub fn if_then(condition: Operation, when_true: Operation) -> Self {
        Operation::Conditional {
            condition: Box::new(condition),
            when_true: Box::new(when_true),
            when_false: None,
        }
    }

    /// Null-coalescing expression
    pub fn coalesce(value: Operation, fallback: Operation) -> Self {
        Operation::NullCoalesce {
            value: Box::new(value),
            fallback: Box::new(fallback),
        }
    }

    /// Conversion node
    pub fn convert(target_type: impl Into<String>, operand: Operation) -> Self {
        Operation::Conversion {
            target_type: target_type.into(),
            operand: Box::new(operand),
        }
    }

    /// Structured loop
    pub fn loop_(descriptor: LoopOperation) -> Self {
        Operation::Loop(Box::new(descriptor))
    }

    /// Unlabeled break
    pub fn brk() -> Self {
        Operation::Branch(BranchOperation::Break { label: None })
    }

    /// Unlabeled continue
    pub fn cont() -> Self {
        Operation::Branch(BranchOperation::Continue { label: None })
    }

    /// Goto a named label
    pub fn goto(label: impl Into<String>) -> Self {
        Operation::Branch(BranchOperation::Goto {
            label: label.into(),
        })
    }

    /// Return without a value
    pub fn ret() -> Self {
        Operation::Branch(BranchOperation::Return { value: None })
    }

    /// Return a value
    pub fn ret_value(value: Operation) -> Self {
        Operation::Branch(BranchOperation::Return {
            value: Some(Box::new(value)),
        })
    }

    /// Named jump target
    pub fn label(name: impl Into<String>) -> Self {
        Operation::Label { name: name.into() }
    }

    /// Throw a value
    pub fn throw(value: Operation) -> Self {
        Operation::Throw {
            value: Box::new(value),
        }
    }

    /// Call a named target
    pub fn invoke(target: impl Into<String>, arguments: Vec<Operation>) -> Self {
        Operation::Invocation {
            target: target.into(),
            arguments,
        }
    }

    /// Integer literal
    pub fn int(value: i64) -> Self {
        Operation::Literal(LiteralValue::Int(value))
    }

    /// Boolean literal
    pub fn bool(value: bool) -> Self {
        Operation::Literal(LiteralValue::Bool(value))
    }

    /// String literal
    pub fn str(value: impl Into<String>) -> Self {
        Operation::Literal(LiteralValue::Str(value.into()))
    }

    /// The null literal
    pub fn null() -> Self {
        Operation::Literal(LiteralValue::Null)
    }

    /// Reference to a local
    pub fn local(name: impl Into<String>) -> Self {
        Operation::Reference {
            name: name.into(),
            kind: ReferenceKind::Local,
        }
    }

    /// Reference to a parameter
    pub fn param(name: impl Into<String>) -> Self {
        Operation::Reference {
            name: name.into(),
            kind: ReferenceKind::Parameter,
        }
    }

    /// Whether this node is a storage location an assignment may target
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            Operation::Reference { .. } | Operation::FlowCaptureReference { .. }
        )
    }

    /// Whether lowering this expression requires flow-capture decomposition
    pub fn needs_decomposition(&self) -> bool {
        match self {
            Operation::Conditional { .. } | Operation::NullCoalesce { .. } => true,
            Operation::Binary { op, left, right } => {
                op.is_short_circuit()
                    || left.needs_decomposition()
                    || right.needs_decomposition()
            }
            Operation::Unary { operand, .. } => operand.needs_decomposition(),
            Operation::Conversion { operand, .. } => operand.needs_decomposition(),
            Operation::Assignment { target, value } => {
                target.needs_decomposition() || value.needs_decomposition()
            }
            Operation::Invocation { arguments, .. } => {
                arguments.iter().any(Operation::needs_decomposition)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_id_display() {
        assert_eq!(format!("{}", CaptureId::new(3)), "#3");
    }

    #[test]
    fn test_short_circuit_ops() {
        assert!(BinaryOp::AndAlso.is_short_circuit());
        assert!(BinaryOp::OrElse.is_short_circuit());
        assert!(!BinaryOp::Add.is_short_circuit());
    }

    #[test]
    fn test_needs_decomposition() {
        let pure = Operation::binary(BinaryOp::Add, Operation::local("a"), Operation::int(1));
        assert!(!pure.needs_decomposition());

        let ternary = Operation::cond(
            Operation::param("b"),
            Operation::local("l"),
            Operation::local("m"),
        );
        assert!(ternary.needs_decomposition());

        let nested = Operation::binary(BinaryOp::Add, Operation::local("a"), ternary);
        assert!(nested.needs_decomposition());

        let short = Operation::binary(
            BinaryOp::AndAlso,
            Operation::param("a"),
            Operation::param("b"),
        );
        assert!(short.needs_decomposition());
    }

    #[test]
    fn test_lvalue() {
        assert!(Operation::local("x").is_lvalue());
        assert!(!Operation::int(1).is_lvalue());
    }

    #[test]
    fn test_while_descriptor() {
        let w = LoopOperation::while_loop(Operation::param("c"), Operation::stmts(vec![]));
        assert_eq!(w.kind, LoopKind::TopTest);
        assert!(w.before.is_empty());
        assert!(w.at_bottom.is_empty());
        assert!(w.condition.is_some());
    }
}

//! Textual rendering for flow graphs
//!
//! A thin formatter over the graph structure; the dump shape mirrors the
//! verifier format the builder's behavior is specified against:
//! `Block[Bn] - Entry|Block|Exit`, `Predecessors: [...]`,
//! `Statements (k)`, `Jump if True|False (Regular) to Block[Bm]`,
//! `Next (Regular|Return|Throw) Block[...]` with `Entering:`/`Leaving:`
//! region lists, and `.locals {Rn}` braces nesting with the region tree.

use super::block::{BasicBlock, BlockKind, Edge};
use super::flow::FlowGraph;
use super::region::RegionId;
use crate::ops::{BranchOperation, LiteralValue, Operation, UnaryOp};
use std::fmt::Write;

/// Trait for pretty-printing graph constructs
pub trait PrettyPrint {
    /// Render as the textual dump format
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for FlowGraph {
    fn pretty_print(&self) -> String {
        let mut out = String::new();
        self.render_region_span(
            RegionId::new(0),
            0,
            self.blocks.len() as u32,
            0,
            &mut out,
        );
        out
    }
}

impl PrettyPrint for Operation {
    fn pretty_print(&self) -> String {
        format_operation(self)
    }
}

impl FlowGraph {
    /// Render every block ordinal in `[first, last)` that belongs to
    /// `region`, descending into child regions at their first block.
    fn render_region_span(
        &self,
        region: RegionId,
        first: u32,
        last: u32,
        indent: usize,
        out: &mut String,
    ) {
        let mut children = self.child_regions(region);
        children.sort_by_key(|r| self.regions[r.as_u32() as usize].first_block);

        let mut ordinal = first;
        while ordinal < last {
            if let Some(&child) = children.iter().find(|c| {
                self.regions[c.as_u32() as usize].first_block == ordinal
            }) {
                let child_region = &self.regions[child.as_u32() as usize];
                let pad = " ".repeat(indent);
                writeln!(out, "{}.locals {{{}}}", pad, child).unwrap();
                writeln!(out, "{}{{", pad).unwrap();
                if !child_region.locals.is_empty() {
                    let locals: Vec<String> = child_region
                        .locals
                        .iter()
                        .map(|l| format!("[{}]", l))
                        .collect();
                    writeln!(out, "{}    Locals: {}", pad, locals.join(" ")).unwrap();
                }
                self.render_region_span(
                    child,
                    child_region.first_block,
                    child_region.last_block + 1,
                    indent + 4,
                    out,
                );
                writeln!(out, "{}}}", pad).unwrap();
                ordinal = child_region.last_block + 1;
            } else {
                self.render_block(&self.blocks[ordinal as usize], indent, out);
                ordinal += 1;
            }
        }
    }

    fn render_block(&self, block: &BasicBlock, indent: usize, out: &mut String) {
        let pad = " ".repeat(indent);
        let unreachable = if block.is_reachable {
            ""
        } else {
            " [UnReachable]"
        };
        writeln!(out, "{}Block[{}] - {}{}", pad, block.id, block.kind, unreachable).unwrap();

        if block.kind != BlockKind::Entry {
            let preds = self.predecessors_of(block.id);
            if preds.is_empty() {
                writeln!(out, "{}    Predecessors (0)", pad).unwrap();
            } else {
                let list: Vec<String> = preds.iter().map(|p| format!("[{}]", p)).collect();
                writeln!(out, "{}    Predecessors: {}", pad, list.join(" ")).unwrap();
            }
        }

        writeln!(out, "{}    Statements ({})", pad, block.statements.len()).unwrap();
        for stmt in &block.statements {
            writeln!(out, "{}        {}", pad, format_operation(stmt)).unwrap();
        }

        if let Some(cond) = &block.cond_branch {
            writeln!(
                out,
                "{}    {} (Regular) to Block[{}]",
                pad, cond.sense, cond.target
            )
            .unwrap();
            writeln!(out, "{}        {}", pad, format_operation(&cond.condition)).unwrap();
            render_deltas(&cond.leaving, &cond.entering, &pad, out);
        }

        if let Some(next) = &block.next {
            match next.target {
                Some(target) => {
                    writeln!(out, "{}    Next ({}) Block[{}]", pad, next.kind, target).unwrap()
                }
                None => writeln!(out, "{}    Next ({}) Block[null]", pad, next.kind).unwrap(),
            }
            if let Some(value) = &next.value {
                writeln!(out, "{}        {}", pad, format_operation(value)).unwrap();
            }
            render_deltas(&next.leaving, &next.entering, &pad, out);
        }
    }
}

fn render_deltas(leaving: &[RegionId], entering: &[RegionId], pad: &str, out: &mut String) {
    if !leaving.is_empty() {
        let list: Vec<String> = leaving.iter().map(|r| format!("{{{}}}", r)).collect();
        writeln!(out, "{}        Leaving: {}", pad, list.join(" ")).unwrap();
    }
    if !entering.is_empty() {
        let list: Vec<String> = entering.iter().map(|r| format!("{{{}}}", r)).collect();
        writeln!(out, "{}        Entering: {}", pad, list.join(" ")).unwrap();
    }
}

/// Compact single-line rendering of a lowered operation.
fn format_operation(op: &Operation) -> String {
    match op {
        Operation::Literal(lit) => format_literal(lit),
        Operation::Reference { name, .. } => name.clone(),
        Operation::FlowCaptureReference { id } => format!("{}", id),
        Operation::FlowCapture { id, value } => {
            format!("{} = {}", id, format_operation(value))
        }
        Operation::Assignment { target, value } => {
            format!("{} = {}", format_operation(target), format_operation(value))
        }
        Operation::Binary { op, left, right } => {
            format!("{} {} {}", format_operand(left), op, format_operand(right))
        }
        Operation::Unary { op, operand } => match op {
            UnaryOp::Not => format!("!{}", format_operand(operand)),
            UnaryOp::Negate => format!("-{}", format_operand(operand)),
            UnaryOp::IsNull => format!("isnull({})", format_operation(operand)),
        },
        Operation::Conversion {
            target_type,
            operand,
        } => format!("({}) {}", target_type, format_operand(operand)),
        Operation::Invocation { target, arguments } => {
            let args: Vec<String> = arguments.iter().map(format_operation).collect();
            format!("{}({})", target, args.join(", "))
        }
        Operation::Conditional {
            condition,
            when_true,
            when_false,
        } => {
            let alt = when_false
                .as_deref()
                .map(format_operand)
                .unwrap_or_else(|| "<none>".to_string());
            format!(
                "{} ? {} : {}",
                format_operand(condition),
                format_operand(when_true),
                alt
            )
        }
        Operation::NullCoalesce { value, fallback } => {
            format!("{} ?? {}", format_operand(value), format_operand(fallback))
        }
        Operation::VariableDeclaration { name, initializer } => match initializer {
            Some(init) => format!("var {} = {}", name, format_operation(init)),
            None => format!("var {}", name),
        },
        Operation::Throw { value } => format!("throw {}", format_operation(value)),
        Operation::Branch(branch) => match branch {
            BranchOperation::Break { .. } => "break".to_string(),
            BranchOperation::Continue { .. } => "continue".to_string(),
            BranchOperation::Goto { label } => format!("goto {}", label),
            BranchOperation::Return { .. } => "return".to_string(),
        },
        Operation::Label { name } => format!("{}:", name),
        Operation::Block { statements, .. } => format!("{{ {} statements }}", statements.len()),
        Operation::Loop(_) => "loop".to_string(),
    }
}

/// Parenthesize compound operands so the rendering stays unambiguous.
fn format_operand(op: &Operation) -> String {
    match op {
        Operation::Binary { .. }
        | Operation::Conditional { .. }
        | Operation::NullCoalesce { .. }
        | Operation::Assignment { .. } => format!("({})", format_operation(op)),
        _ => format_operation(op),
    }
}

fn format_literal(lit: &LiteralValue) -> String {
    match lit {
        LiteralValue::Int(v) => format!("{}", v),
        LiteralValue::Bool(v) => format!("{}", v),
        LiteralValue::Str(v) => format!("\"{}\"", v),
        LiteralValue::Null => "null".to_string(),
    }
}

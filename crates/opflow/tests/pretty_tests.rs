//! Dump format tests
//!
//! Locks down the textual rendering: block headers, predecessor lists,
//! jump and next lines, region braces, and the unreachable marker.

use opflow::{BinaryOp, FlowGraph, Operation, PrettyPrint};

fn dump(tree: Operation) -> String {
    let graph = FlowGraph::build(&tree).expect("lowering failed");
    graph.validate().expect("invalid graph");
    graph.pretty_print()
}

#[test]
fn test_full_dump_with_region() {
    // { int x = 1; if (x < 2) return; }
    let tree = Operation::block(
        vec!["x"],
        vec![
            Operation::decl_init("x", Operation::int(1)),
            Operation::if_then(
                Operation::binary(BinaryOp::LessThan, Operation::local("x"), Operation::int(2)),
                Operation::ret(),
            ),
        ],
    );
    let expected = "\
Block[B0] - Entry
    Statements (0)
    Next (Regular) Block[B1]
        Entering: {R1}
.locals {R1}
{
    Locals: [x]
    Block[B1] - Block
        Predecessors: [B0]
        Statements (1)
            x = 1
        Jump if False (Regular) to Block[B3]
            x < 2
            Leaving: {R1}
        Next (Regular) Block[B2]
    Block[B2] - Block
        Predecessors: [B1]
        Statements (0)
        Next (Return) Block[B3]
            Leaving: {R1}
}
Block[B3] - Exit
    Predecessors: [B1] [B2]
    Statements (0)
";
    assert_eq!(dump(tree), expected);
}

#[test]
fn test_nested_regions_indent() {
    // { int a = 1; { int b = a; } }
    let tree = Operation::block(
        vec!["a"],
        vec![
            Operation::decl_init("a", Operation::int(1)),
            Operation::block(
                vec!["b"],
                vec![Operation::decl_init("b", Operation::local("a"))],
            ),
        ],
    );
    let out = dump(tree);
    assert!(out.contains(".locals {R1}\n{\n    Locals: [a]\n"));
    assert!(out.contains("    .locals {R2}\n    {\n        Locals: [b]\n"));
    assert!(out.contains("        Block[B2] - Block\n"));
    assert!(out.contains("                Leaving: {R2} {R1}\n"));
    assert!(out.contains("            Entering: {R2}\n"));
}

#[test]
fn test_throw_renders_null_target() {
    let tree = Operation::stmts(vec![Operation::throw(Operation::param("e"))]);
    let out = dump(tree);
    assert!(out.contains("    Next (Throw) Block[null]\n        e\n"));
}

#[test]
fn test_unreachable_marker_and_empty_predecessors() {
    let tree = Operation::stmts(vec![
        Operation::ret(),
        Operation::assign(Operation::param("x"), Operation::int(1)),
    ]);
    let out = dump(tree);
    assert!(out.contains("Block[B2] - Block [UnReachable]\n"));
    assert!(out.contains("    Predecessors (0)\n"));
}

#[test]
fn test_multiple_predecessors_listed_in_order() {
    let tree = Operation::stmts(vec![
        Operation::cond(
            Operation::param("c"),
            Operation::assign(Operation::param("x"), Operation::int(1)),
            Operation::assign(Operation::param("x"), Operation::int(2)),
        ),
        Operation::assign(Operation::param("y"), Operation::int(3)),
    ]);
    let out = dump(tree);
    assert!(out.contains("    Predecessors: [B2] [B3]\n"));
}

#[test]
fn test_jump_line_shape() {
    let tree = Operation::stmts(vec![Operation::if_then(
        Operation::param("c"),
        Operation::assign(Operation::param("x"), Operation::int(1)),
    )]);
    let out = dump(tree);
    assert!(out.contains("    Jump if False (Regular) to Block[B3]\n        c\n"));
}

#[test]
fn test_capture_statements_render_with_ids() {
    let tree = Operation::stmts(vec![Operation::assign(
        Operation::param("r"),
        Operation::coalesce(Operation::param("a"), Operation::param("b")),
    )]);
    let out = dump(tree);
    assert!(out.contains("#0 = r\n"));
    assert!(out.contains("#1 = a\n"));
    assert!(out.contains("isnull(#1)\n"));
    assert!(out.contains("#0 = #2\n"));
}

#[test]
fn test_return_value_rendered_under_edge() {
    let tree = Operation::stmts(vec![Operation::ret_value(Operation::int(42))]);
    let out = dump(tree);
    assert!(out.contains("    Next (Return) Block[B2]\n        42\n"));
}

//! Flow graph construction tests
//!
//! Covers block structure, branching shapes, goto resolution, throw
//! edges, and structural error reporting.

use opflow::{
    BlockId, BlockKind, EdgeKind, FlowError, FlowGraph, GraphBuilder, JumpSense, Operation,
    PrettyPrint,
};

fn build(tree: Operation) -> FlowGraph {
    let graph = FlowGraph::build(&tree).expect("lowering failed");
    graph.validate().expect("invalid graph");
    graph
}

mod structure {
    use super::*;
    use opflow::BinaryOp;

    #[test]
    fn test_empty_body() {
        let graph = build(Operation::stmts(vec![]));
        assert_eq!(graph.block_count(), 2);
        assert_eq!(graph.entry().kind, BlockKind::Entry);
        assert_eq!(graph.exit().kind, BlockKind::Exit);
        assert_eq!(graph.entry().id, BlockId::new(0));
    }

    #[test]
    fn test_straight_line_statements_share_a_block() {
        let graph = build(Operation::stmts(vec![
            Operation::assign(Operation::param("a"), Operation::int(1)),
            Operation::assign(Operation::param("b"), Operation::int(2)),
            Operation::assign(Operation::param("c"), Operation::int(3)),
        ]));
        assert_eq!(graph.block_count(), 3);
        assert_eq!(graph.blocks[1].statements.len(), 3);
        assert_eq!(graph.statement_count(), 3);
    }

    #[test]
    fn test_if_else_diamond() {
        let graph = build(Operation::stmts(vec![
            Operation::cond(
                Operation::param("c"),
                Operation::assign(Operation::param("x"), Operation::int(1)),
                Operation::assign(Operation::param("y"), Operation::int(2)),
            ),
            Operation::assign(Operation::param("r"), Operation::int(3)),
        ]));
        assert_eq!(graph.block_count(), 6);

        let test = &graph.blocks[1];
        let cond = test.cond_branch.as_ref().unwrap();
        assert_eq!(cond.sense, JumpSense::IfFalse);
        assert_eq!(cond.target, BlockId::new(3));
        assert_eq!(test.next.as_ref().unwrap().target, Some(BlockId::new(2)));

        // Both arms join on the continuation block.
        assert_eq!(
            graph.predecessors_of(BlockId::new(4)),
            &[BlockId::new(2), BlockId::new(3)]
        );
    }

    #[test]
    fn test_return_edge_targets_exit() {
        let graph = build(Operation::stmts(vec![
            Operation::if_then(Operation::param("c"), Operation::ret_value(Operation::int(1))),
            Operation::assign(Operation::param("x"), Operation::int(2)),
        ]));
        let ret = graph
            .blocks
            .iter()
            .find_map(|b| {
                b.next
                    .as_ref()
                    .filter(|e| e.kind == EdgeKind::Return)
                    .map(|e| e.clone())
            })
            .expect("no return edge");
        assert_eq!(ret.target, Some(graph.exit().id));
        assert_eq!(ret.value.as_ref().unwrap().pretty_print(), "1");
    }

    #[test]
    fn test_sibling_scopes_keep_separate_blocks() {
        let graph = build(Operation::stmts(vec![
            Operation::block(
                vec!["i"],
                vec![Operation::decl_init("i", Operation::int(1))],
            ),
            Operation::block(
                vec!["j"],
                vec![Operation::decl_init("j", Operation::int(1))],
            ),
        ]));
        // One block per scope; the fall-through edge crosses the
        // region boundary instead of merging the two.
        assert_eq!(graph.block_count(), 4);
        let first = &graph.blocks[1];
        let second = &graph.blocks[2];
        assert_ne!(first.region, second.region);
        let edge = first.next.as_ref().unwrap();
        assert_eq!(edge.target, Some(second.id));
        assert_eq!(edge.leaving, vec![first.region]);
        assert_eq!(edge.entering, vec![second.region]);
    }

    #[test]
    fn test_ids_are_dense_and_ordered() {
        let graph = build(Operation::stmts(vec![Operation::cond(
            Operation::binary(
                BinaryOp::LessThan,
                Operation::param("a"),
                Operation::param("b"),
            ),
            Operation::assign(Operation::param("x"), Operation::int(1)),
            Operation::assign(Operation::param("x"), Operation::int(2)),
        )]));
        for (i, block) in graph.blocks.iter().enumerate() {
            assert_eq!(block.id, BlockId::new(i as u32));
        }
    }
}

mod gotos {
    use super::*;

    #[test]
    fn test_forward_goto_skips_statements() {
        let graph = build(Operation::stmts(vec![
            Operation::if_then(Operation::param("c"), Operation::goto("end")),
            Operation::assign(Operation::param("x"), Operation::int(1)),
            Operation::label("end"),
            Operation::assign(Operation::param("y"), Operation::int(2)),
        ]));
        assert_eq!(graph.block_count(), 5);

        // The goto (taken when the test falls through) lands past x = 1.
        let test = &graph.blocks[1];
        assert_eq!(test.next.as_ref().unwrap().target, Some(BlockId::new(3)));
        assert_eq!(graph.blocks[3].statements[0].pretty_print(), "y = 2");
        assert_eq!(
            graph.predecessors_of(BlockId::new(3)),
            &[BlockId::new(1), BlockId::new(2)]
        );
    }

    #[test]
    fn test_unresolved_goto() {
        let err = FlowGraph::build(&Operation::stmts(vec![Operation::goto("missing")]))
            .unwrap_err();
        assert!(matches!(err, FlowError::UnresolvedLabel { name } if name == "missing"));
    }

    #[test]
    fn test_duplicate_label() {
        let err = FlowGraph::build(&Operation::stmts(vec![
            Operation::label("a"),
            Operation::label("a"),
        ]))
        .unwrap_err();
        assert!(matches!(err, FlowError::StructuralInput { .. }));
    }
}

mod throws {
    use super::*;

    #[test]
    fn test_throw_has_no_successor() {
        let graph = build(Operation::stmts(vec![Operation::throw(Operation::param(
            "e",
        ))]));
        let thrower = &graph.blocks[1];
        let edge = thrower.next.as_ref().unwrap();
        assert_eq!(edge.kind, EdgeKind::Throw);
        assert_eq!(edge.target, None);
        assert_eq!(edge.value.as_ref().unwrap().pretty_print(), "e");
    }

    #[test]
    fn test_code_after_throw_is_kept_unreachable() {
        let graph = build(Operation::block(
            vec!["x"],
            vec![
                Operation::assign(Operation::local("x"), Operation::int(1)),
                Operation::throw(Operation::param("e")),
                Operation::assign(Operation::local("x"), Operation::int(2)),
            ],
        ));
        // The write after the throw keeps both its block and its region.
        assert_eq!(graph.regions.len(), 2);
        let dead = &graph.blocks[2];
        assert!(!dead.is_reachable);
        assert_eq!(dead.statements[0].pretty_print(), "x = 2");
        // Exit is only reachable through the dead block.
        assert!(!graph.exit().is_reachable);
        assert_eq!(graph.predecessors_of(graph.exit().id), &[dead.id]);
    }
}

mod errors {
    use super::*;

    #[test]
    fn test_break_outside_loop() {
        let err = FlowGraph::build(&Operation::stmts(vec![Operation::brk()])).unwrap_err();
        assert!(matches!(err, FlowError::StructuralInput { .. }));
    }

    #[test]
    fn test_continue_outside_loop() {
        let err = FlowGraph::build(&Operation::stmts(vec![Operation::cont()])).unwrap_err();
        assert!(matches!(err, FlowError::StructuralInput { .. }));
    }

    #[test]
    fn test_statement_in_value_position() {
        let err = FlowGraph::build(&Operation::stmts(vec![Operation::assign(
            Operation::param("x"),
            Operation::ret(),
        )]))
        .unwrap_err();
        assert!(matches!(err, FlowError::StructuralInput { .. }));
    }

    #[test]
    fn test_error_message_names_the_label() {
        let err = FlowGraph::build(&Operation::stmts(vec![Operation::goto("sink")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unresolved branch target 'sink'");
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_tree_from_json() {
        let json = r#"{
            "Block": {
                "locals": [],
                "statements": [
                    {
                        "Assignment": {
                            "target": {"Reference": {"name": "x", "kind": "Parameter"}},
                            "value": {"Literal": {"Int": 7}}
                        }
                    }
                ]
            }
        }"#;
        let tree: Operation = serde_json::from_str(json).expect("bad tree json");
        let graph = build(tree);
        assert_eq!(graph.blocks[1].statements[0].pretty_print(), "x = 7");
    }

    #[test]
    fn test_graph_serializes() {
        let graph = build(Operation::stmts(vec![Operation::assign(
            Operation::param("a"),
            Operation::int(1),
        )]));
        let json = serde_json::to_value(&graph).expect("graph not serializable");
        assert_eq!(json["blocks"].as_array().unwrap().len(), 3);
        assert_eq!(json["capture_count"], 0);
    }
}

mod builder_reuse {
    use super::*;

    #[test]
    fn test_explicit_builder_entry_point() {
        let graph = GraphBuilder::new()
            .build(&Operation::stmts(vec![]))
            .unwrap();
        assert_eq!(graph.block_count(), 2);
    }
}

use std::sync::Arc;

use crate::diagnostics::{Position, Span};
use crate::symbols::IdGen;
use crate::syntax::factory::{
    assign, binary, call, clause, conditional_access, declare, element, element_access, ident,
    int, invocation, lambda, member, member_access, member_binding, new_object, pipe,
    placeholder, receiver_ref, statement, with_expr,
};
use crate::syntax::{
    contains_placeholder, desugar_with, is_canonical_with, lower, map_children,
    replace_placeholders, splice_pipe_argument, AccessorPath, AssignOp, BinaryOp, Expr, ExprKind,
    PipeTarget,
};
use crate::types::Type;

fn at() -> crate::syntax::ExprRef {
    placeholder(Span::default())
}

#[test]
fn every_compound_assignment_maps_to_its_operator() {
    let cases = [
        (AssignOp::LeftShiftAssign, BinaryOp::LeftShift),
        (AssignOp::RightShiftAssign, BinaryOp::RightShift),
        (AssignOp::DivideAssign, BinaryOp::Divide),
        (AssignOp::MultiplyAssign, BinaryOp::Multiply),
        (AssignOp::OrAssign, BinaryOp::BitwiseOr),
        (AssignOp::AndAssign, BinaryOp::BitwiseAnd),
        (AssignOp::AddAssign, BinaryOp::Add),
        (AssignOp::SubtractAssign, BinaryOp::Subtract),
        (AssignOp::ExclusiveOrAssign, BinaryOp::ExclusiveOr),
        (AssignOp::ModuloAssign, BinaryOp::Modulo),
    ];
    for (assign_op, binary_op) in cases {
        assert_eq!(assign_op.compound_operator(), Some(binary_op), "{assign_op:?}");
    }
    assert_eq!(AssignOp::Assign.compound_operator(), None);
}

#[test]
fn empty_accessor_path_is_rejected() {
    assert!(AccessorPath::new(Vec::new()).is_err());
    let parsed: Result<AccessorPath, _> = serde_json::from_str("[]");
    assert!(parsed.is_err());
}

#[test]
fn accessor_path_splits_off_its_head() {
    let path = AccessorPath::new(vec![member("a"), member("b"), member("c")]).expect("path");
    let (head, tail) = path.split_first();
    assert_eq!(head, member("a"));
    let tail = tail.expect("tail");
    assert_eq!(tail.segment_count(), 2);
    assert_eq!(tail.head(), &member("b"));

    let (_, rest) = AccessorPath::single(member("x")).split_first();
    assert!(rest.is_none());
}

#[test]
fn materialize_folds_segments_onto_receiver() {
    let path =
        AccessorPath::new(vec![member("items"), element(int(2)), member("x")]).expect("path");
    let expected = member_access(element_access(member_access(ident("r"), "items"), int(2)), "x");
    assert_eq!(path.materialize(ident("r")), expected);
}

#[test]
fn parses_pipe_from_json() {
    let json = r#"{
        "kind": "Binary",
        "op": "|>",
        "left": { "kind": "Literal", "value": 5 },
        "right": { "kind": "Ident", "name": "Double" }
    }"#;
    let expr: Expr = serde_json::from_str(json).expect("parse pipe");
    assert_eq!(expr, *pipe(int(5), ident("Double")));
    assert!(expr.is_pipe());
}

#[test]
fn parses_with_clauses_from_json() {
    let json = r#"{
        "kind": "With",
        "receiver": { "kind": "Ident", "name": "r" },
        "clauses": [
            {
                "path": [{ "kind": "Member", "name": "a" }, { "kind": "Member", "name": "b" }],
                "op": "+=",
                "value": { "kind": "Literal", "value": 1 }
            }
        ]
    }"#;
    let expr: Expr = serde_json::from_str(json).expect("parse with");
    assert_eq!(
        expr,
        *with_expr(ident("r"), vec![assign(&["a", "b"], AssignOp::AddAssign, int(1))])
    );
}

#[test]
fn generated_receiver_markers_are_not_accepted_as_input() {
    let json = r#"{ "kind": "WithReceiver", "id": 0 }"#;
    assert!(serde_json::from_str::<Expr>(json).is_err());
}

#[test]
fn map_children_keeps_unchanged_node() {
    let expr = call("f", vec![ident("x"), int(1)]);
    let same = map_children(&expr, |child| child.clone());
    assert!(Arc::ptr_eq(&expr, &same));

    let changed = map_children(&expr, |child| match &child.kind {
        ExprKind::Ident { name } if name == "x" => ident("y"),
        _ => child.clone(),
    });
    assert_eq!(changed, call("f", vec![ident("y"), int(1)]));
    // The callee was not touched and is still shared.
    let (ExprKind::Invocation { callee: a, .. }, ExprKind::Invocation { callee: b, .. }) =
        (&expr.kind, &changed.kind)
    else {
        panic!("expected invocations");
    };
    assert!(Arc::ptr_eq(a, b));
}

#[test]
fn placeholder_search_skips_nested_pipe_targets() {
    // 1 |> (x => x |> F(@))
    let inner = pipe(ident("x"), call("F", vec![at()]));
    let lambda = lambda(vec![("x", Type::Int)], inner);
    assert!(!contains_placeholder(&lambda));
    assert!(contains_placeholder(&pipe(at(), ident("G"))));

    let replaced = replace_placeholders(&lambda, &ident("outer"));
    assert!(Arc::ptr_eq(&replaced, &lambda));
}

#[test]
fn replace_placeholders_substitutes_every_marker() {
    let target = binary(BinaryOp::Add, at(), call("F", vec![at()]));
    let replaced = replace_placeholders(&target, &ident("v"));
    assert_eq!(
        replaced,
        binary(BinaryOp::Add, ident("v"), call("F", vec![ident("v")]))
    );
}

#[test]
fn splice_invokes_plain_target() {
    let target = ident("Double");
    assert_eq!(
        splice_pipe_argument(&target, &ident("v")),
        PipeTarget::Spliced(invocation(ident("Double"), vec![ident("v")]))
    );
}

#[test]
fn splice_keeps_explicit_placeholder_target() {
    let target = call("Add", vec![int(1), at()]);
    let PipeTarget::Explicit(kept) = splice_pipe_argument(&target, &ident("v")) else {
        panic!("expected explicit target");
    };
    assert!(Arc::ptr_eq(&kept, &target));
}

#[test]
fn splice_invokes_innermost_conditional_branch() {
    // a?.b?.M
    let target = conditional_access(
        ident("a"),
        conditional_access(member_binding("b"), member_binding("M")),
    );
    let expected = conditional_access(
        ident("a"),
        conditional_access(
            member_binding("b"),
            invocation(member_binding("M"), vec![ident("v")]),
        ),
    );
    assert_eq!(
        splice_pipe_argument(&target, &ident("v")),
        PipeTarget::Spliced(expected)
    );
}

#[test]
fn splice_fills_bare_object_creation() {
    assert_eq!(
        splice_pipe_argument(&new_object("Box", None), &ident("v")),
        PipeTarget::Spliced(new_object("Box", Some(vec![ident("v")])))
    );
    assert_eq!(
        splice_pipe_argument(&new_object("Box", Some(Vec::new())), &ident("v")),
        PipeTarget::NotInvocable
    );
    assert_eq!(
        splice_pipe_argument(&new_object("Box", Some(vec![int(1)])), &ident("v")),
        PipeTarget::NotInvocable
    );
}

#[test]
fn desugars_nested_compound_assignment() {
    // r with { .a.b += v }
    let node = with_expr(
        ident("r"),
        vec![assign(&["a", "b"], AssignOp::AddAssign, ident("v"))],
    );
    let mut ids = IdGen::new();
    let desugared = desugar_with(&node, &mut ids);

    let tmp = || receiver_ref(0, Span::default());
    let nested = with_expr(
        member_access(tmp(), "a"),
        vec![assign(
            &["b"],
            AssignOp::Assign,
            binary(
                BinaryOp::Add,
                member_access(member_access(tmp(), "a"), "b"),
                ident("v"),
            ),
        )],
    );
    let expected = Expr::new(
        ExprKind::With {
            receiver: ident("r"),
            clauses: im::vector![assign(&["a"], AssignOp::Assign, nested)],
            receiver_id: Some(0),
        },
        Span::default(),
    );
    assert_eq!(desugared, expected);
    assert!(is_canonical_with(&desugared));
}

#[test]
fn desugars_every_generated_level() {
    // r with { .a.b.c = 1 }
    let node = with_expr(
        ident("r"),
        vec![assign(&["a", "b", "c"], AssignOp::Assign, int(1))],
    );
    let desugared = desugar_with(&node, &mut IdGen::new());

    fn check(node: &Expr, depth: usize) -> usize {
        assert!(is_canonical_with(node), "level {depth} is not canonical");
        let ExprKind::With { clauses, .. } = &node.kind else {
            unreachable!();
        };
        match &clauses[0].value.kind {
            ExprKind::With { .. } => check(&clauses[0].value, depth + 1),
            _ => depth,
        }
    }
    assert_eq!(check(&desugared, 0), 2);

    // The innermost receiver reads through the second level's own temporary.
    let ExprKind::With {
        clauses,
        receiver_id,
        ..
    } = &desugared.kind
    else {
        unreachable!();
    };
    assert_eq!(*receiver_id, Some(0));
    let ExprKind::With {
        receiver,
        receiver_id,
        ..
    } = &clauses[0].value.kind
    else {
        unreachable!();
    };
    assert_eq!(*receiver, member_access(receiver_ref(0, Span::default()), "a"));
    assert_eq!(*receiver_id, Some(1));
}

#[test]
fn clauses_sharing_a_head_become_one_nested_update() {
    // r with { .a.b = 10, .n = 1, .a.c = 20 }
    let node = with_expr(
        ident("r"),
        vec![
            assign(&["a", "b"], AssignOp::Assign, int(10)),
            assign(&["n"], AssignOp::Assign, int(1)),
            assign(&["a", "c"], AssignOp::Assign, int(20)),
        ],
    );
    let desugared = desugar_with(&node, &mut IdGen::new());

    let nested = with_expr(
        member_access(receiver_ref(0, Span::default()), "a"),
        vec![
            assign(&["b"], AssignOp::Assign, int(10)),
            assign(&["c"], AssignOp::Assign, int(20)),
        ],
    );
    let expected = Expr::new(
        ExprKind::With {
            receiver: ident("r"),
            clauses: im::vector![
                assign(&["a"], AssignOp::Assign, nested),
                assign(&["n"], AssignOp::Assign, int(1)),
            ],
            receiver_id: Some(0),
        },
        Span::default(),
    );
    assert_eq!(desugared, expected);
}

#[test]
fn same_element_index_groups_regardless_of_span() {
    let at_span = |offset| Span {
        start: Position { line: 1, column: offset },
        end: Position { line: 1, column: offset + 1 },
    };
    let index = |offset| Expr::new(int(0).kind.clone(), at_span(offset));
    let first = AccessorPath::new(vec![element(index(3)), member("x")]).expect("path");
    let second = AccessorPath::new(vec![element(index(12)), member("y")]).expect("path");
    let node = with_expr(
        ident("points"),
        vec![
            clause(first, AssignOp::Assign, int(1)),
            clause(second, AssignOp::Assign, int(2)),
        ],
    );
    let desugared = desugar_with(&node, &mut IdGen::new());
    let ExprKind::With { clauses, .. } = &desugared.kind else {
        unreachable!();
    };
    assert_eq!(clauses.len(), 1);
    let ExprKind::With { clauses: inner, .. } = &clauses[0].value.kind else {
        panic!("expected nested with-expression");
    };
    assert_eq!(inner.len(), 2);
}

#[test]
fn desugars_element_paths() {
    // r with { .items[1].x = 5 }
    let path =
        AccessorPath::new(vec![member("items"), element(int(1)), member("x")]).expect("path");
    let node = with_expr(ident("r"), vec![clause(path, AssignOp::Assign, int(5))]);
    let desugared = desugar_with(&node, &mut IdGen::new());
    assert!(is_canonical_with(&desugared));

    let ExprKind::With { clauses, .. } = &desugared.kind else {
        unreachable!();
    };
    let ExprKind::With {
        receiver,
        clauses: inner,
        ..
    } = &clauses[0].value.kind
    else {
        panic!("expected nested with-expression");
    };
    assert_eq!(*receiver, member_access(receiver_ref(0, Span::default()), "items"));
    assert_eq!(inner[0].path.head(), &element(int(1)));
}

#[test]
fn canonical_with_is_returned_unchanged() {
    let node = with_expr(
        ident("r"),
        vec![
            assign(&["x"], AssignOp::Assign, int(1)),
            assign(&["y"], AssignOp::Assign, int(2)),
        ],
    );
    let mut ids = IdGen::new();
    let desugared = desugar_with(&node, &mut ids);
    assert!(Arc::ptr_eq(&node, &desugared));
    let ExprKind::With { receiver_id, .. } = &desugared.kind else {
        unreachable!();
    };
    assert_eq!(*receiver_id, None);
}

#[test]
fn desugaring_is_idempotent() {
    let node = with_expr(
        ident("r"),
        vec![assign(&["a", "b"], AssignOp::MultiplyAssign, int(3))],
    );
    let mut ids = IdGen::new();
    let once = desugar_with(&node, &mut ids);
    let twice = desugar_with(&once, &mut ids);
    assert!(Arc::ptr_eq(&once, &twice));
}

#[test]
fn desugaring_preserves_clause_order() {
    let node = with_expr(
        ident("r"),
        vec![
            assign(&["c"], AssignOp::Assign, int(1)),
            assign(&["a", "x"], AssignOp::Assign, int(2)),
            assign(&["b"], AssignOp::AddAssign, int(3)),
        ],
    );
    let desugared = desugar_with(&node, &mut IdGen::new());
    let ExprKind::With { clauses, .. } = &desugared.kind else {
        unreachable!();
    };
    let names: Vec<_> = clauses
        .iter()
        .map(|clause| match clause.path.head() {
            crate::syntax::PathSegment::Member { name, .. } => name.clone(),
            other => panic!("unexpected segment {other:?}"),
        })
        .collect();
    assert_eq!(names, ["c", "a", "b"]);
}

#[test]
fn lowers_pipe_to_statement_expression() {
    let lowered = lower(&pipe(int(5), ident("Double")), &mut IdGen::new());
    let expected = statement(
        vec![declare("$pipe0", None, int(5))],
        call("Double", vec![ident("$pipe0")]),
    );
    assert_eq!(lowered, expected);
}

#[test]
fn lowers_explicit_placeholder_through_rewriter() {
    let lowered = lower(
        &pipe(int(5), call("Add", vec![at(), at()])),
        &mut IdGen::new(),
    );
    let expected = statement(
        vec![declare("$pipe0", None, int(5))],
        call("Add", vec![ident("$pipe0"), ident("$pipe0")]),
    );
    assert_eq!(lowered, expected);
}

#[test]
fn lowers_chained_pipes_left_to_right() {
    // 5 |> Double |> Increment
    let lowered = lower(
        &pipe(pipe(int(5), ident("Double")), ident("Increment")),
        &mut IdGen::new(),
    );
    let inner = statement(
        vec![declare("$pipe0", None, int(5))],
        call("Double", vec![ident("$pipe0")]),
    );
    let expected = statement(
        vec![declare("$pipe1", None, inner)],
        call("Increment", vec![ident("$pipe1")]),
    );
    assert_eq!(lowered, expected);
}

#[test]
fn lowering_keeps_pipe_onto_constructor_call() {
    let node = pipe(int(1), new_object("Box", Some(vec![int(2)])));
    let lowered = lower(&node, &mut IdGen::new());
    assert!(Arc::ptr_eq(&node, &lowered));
}

#[test]
fn lowering_leaves_plain_expressions_shared() {
    let node = binary(BinaryOp::Add, ident("a"), call("F", vec![int(1)]));
    let lowered = lower(&node, &mut IdGen::new());
    assert!(Arc::ptr_eq(&node, &lowered));
}

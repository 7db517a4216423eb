use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::binder::bind_root;
use crate::symbols::{IdGen, RecordSymbol};
use crate::syntax::factory::{
    assign, binary, call, clause, conditional_access, declare, element, element_access, ident,
    int, lambda, list, member_access, member_binding, new_object, null, pipe, placeholder,
    statement, text, with_expr,
};
use crate::syntax::{lower, AccessorPath, AssignOp, Param};
use crate::types::Type;

fn syntax_function(
    name: &str,
    params: &[(&str, Type)],
    ret: Type,
    body: ExprRef,
) -> FunctionSymbol {
    FunctionSymbol {
        name: name.to_string(),
        params: params
            .iter()
            .map(|(name, ty)| Param {
                name: name.to_string(),
                ty: ty.clone(),
            })
            .collect(),
        ret,
        body: FunctionBody::Syntax(body),
    }
}

fn env_with_counter(counter: Arc<AtomicUsize>) -> Environment {
    let mut env = Environment::new();
    let mut point = RecordSymbol::new("Point", vec![("x", Type::Int), ("y", Type::Int)]);
    point.methods.push(syntax_function(
        "Scale",
        &[("k", Type::Int)],
        Type::record("Point"),
        new_object(
            "Point",
            Some(vec![
                binary(BinaryOp::Multiply, member_access(ident("this"), "x"), ident("k")),
                binary(BinaryOp::Multiply, member_access(ident("this"), "y"), ident("k")),
            ]),
        ),
    ));
    env.define_record(point);
    env.define_record(RecordSymbol::new(
        "Line",
        vec![("start", Type::record("Point")), ("end", Type::record("Point"))],
    ));
    env.define_function(syntax_function(
        "Double",
        &[("x", Type::Int)],
        Type::Int,
        binary(BinaryOp::Multiply, ident("x"), int(2)),
    ));
    env.define_function(syntax_function(
        "Increment",
        &[("x", Type::Int)],
        Type::Int,
        binary(BinaryOp::Add, ident("x"), int(1)),
    ));
    env.define_native("Add", vec![Type::Int, Type::Int], Type::Int, |args| {
        match (&args[0], &args[1]) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (other, _) => Err(RuntimeError::Native(format!("Add: unexpected {other}"))),
        }
    });
    env.define_native("Tick", Vec::new(), Type::Int, move |_| {
        Ok(Value::Int(counter.fetch_add(1, Ordering::SeqCst) as i64 + 1))
    });
    env
}

fn env() -> Environment {
    env_with_counter(Arc::new(AtomicUsize::new(0)))
}

fn run_in(env: &Environment, expr: &ExprRef) -> Result<Value, RuntimeError> {
    let (bound, diagnostics) = bind_root(env, expr);
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    evaluate(env, &bound)
}

fn run(expr: &ExprRef) -> Result<Value, RuntimeError> {
    run_in(&env(), expr)
}

fn point(x: i64, y: i64) -> ExprRef {
    new_object("Point", Some(vec![int(x), int(y)]))
}

fn point_value(x: i64, y: i64) -> Value {
    Value::record("Point", vec![("x", Value::Int(x)), ("y", Value::Int(y))])
}

#[test]
fn chained_pipes_apply_left_to_right() {
    let expr = pipe(pipe(int(5), ident("Double")), ident("Increment"));
    assert_eq!(run(&expr), Ok(Value::Int(11)));
}

#[test]
fn piped_receiver_is_evaluated_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let env = env_with_counter(counter.clone());
    let expr = pipe(
        call("Tick", Vec::new()),
        call("Add", vec![placeholder(Default::default()), placeholder(Default::default())]),
    );
    assert_eq!(run_in(&env, &expr), Ok(Value::Int(2)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn conditional_pipe_skips_call_but_evaluates_receiver() {
    let counter = Arc::new(AtomicUsize::new(0));
    let env = env_with_counter(counter.clone());
    let expr = statement(
        vec![declare("p", Some(Type::record("Point")), null())],
        pipe(
            call("Tick", Vec::new()),
            conditional_access(ident("p"), member_binding("Scale")),
        ),
    );
    assert_eq!(run_in(&env, &expr), Ok(Value::Null));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn conditional_pipe_calls_method_on_value() {
    let expr = statement(
        vec![declare("p", None, point(1, 2))],
        pipe(int(3), conditional_access(ident("p"), member_binding("Scale"))),
    );
    assert_eq!(run(&expr), Ok(point_value(3, 6)));
}

#[test]
fn nested_updates_sharing_a_member_are_combined() {
    // (var l = new Line(new Point(1, 2), new Point(3, 4));
    //  l with { .end.y += 10, .end.x = 0 })
    let line = new_object("Line", Some(vec![point(1, 2), point(3, 4)]));
    let update = with_expr(
        ident("l"),
        vec![
            assign(&["end", "y"], AssignOp::AddAssign, int(10)),
            assign(&["end", "x"], AssignOp::Assign, int(0)),
        ],
    );
    let expr = statement(vec![declare("l", None, line)], update);
    // Both clauses land in one update of `end`.
    let expected = Value::record(
        "Line",
        vec![("start", point_value(1, 2)), ("end", point_value(0, 14))],
    );
    assert_eq!(run(&expr), Ok(expected));
}

#[test]
fn plain_write_between_nested_updates_starts_a_new_group() {
    // l with { .end.y = 7, .end = new Point(5, 5), .end.x = 9 }
    let line = new_object("Line", Some(vec![point(1, 2), point(3, 4)]));
    let update = with_expr(
        ident("l"),
        vec![
            assign(&["end", "y"], AssignOp::Assign, int(7)),
            assign(&["end"], AssignOp::Assign, point(5, 5)),
            assign(&["end", "x"], AssignOp::Assign, int(9)),
        ],
    );
    let expr = statement(vec![declare("l", None, line)], update);
    let env = env();
    let (bound, diagnostics) = bind_root(&env, &expr);
    assert!(
        diagnostics
            .iter()
            .all(|diag| diag.code == crate::diagnostics::codes::OVERWRITTEN_UPDATE),
        "{diagnostics:?}"
    );
    assert_eq!(diagnostics.len(), 2);
    // The last write to `end` starts from the original `end`.
    let expected = Value::record(
        "Line",
        vec![("start", point_value(1, 2)), ("end", point_value(9, 4))],
    );
    assert_eq!(evaluate(&env, &bound), Ok(expected));
}

#[test]
fn update_leaves_original_value_untouched() {
    let update = with_expr(
        ident("p"),
        vec![assign(&["x"], AssignOp::MultiplyAssign, int(5))],
    );
    let expr = statement(
        vec![
            declare("p", None, point(2, 3)),
            declare("q", None, update),
        ],
        list(vec![ident("p"), ident("q")]),
    );
    assert_eq!(
        run(&expr),
        Ok(Value::list([point_value(2, 3), point_value(10, 3)]))
    );
}

#[test]
fn list_update_replaces_element() {
    let path = AccessorPath::single(element(int(1)));
    let expr = with_expr(
        list(vec![int(1), int(2), int(3)]),
        vec![clause(path, AssignOp::SubtractAssign, int(5))],
    );
    assert_eq!(
        run(&expr),
        Ok(Value::list([Value::Int(1), Value::Int(-3), Value::Int(3)]))
    );
}

#[test]
fn list_update_out_of_range_fails() {
    let path = AccessorPath::single(element(int(4)));
    let expr = with_expr(list(vec![int(1)]), vec![clause(path, AssignOp::Assign, int(0))]);
    assert_eq!(
        run(&expr),
        Err(RuntimeError::IndexOutOfRange { index: 4, len: 1 })
    );
}

#[test]
fn element_access_reads_list() {
    let expr = element_access(list(vec![text("a"), text("b")]), int(1));
    assert_eq!(run(&expr), Ok(Value::text("b")));
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let expr = binary(BinaryOp::Divide, int(1), int(0));
    assert_eq!(run(&expr), Err(RuntimeError::DivideByZero));
}

#[test]
fn field_access_on_null_is_a_null_reference() {
    let expr = statement(
        vec![declare("p", Some(Type::record("Point")), null())],
        member_access(ident("p"), "x"),
    );
    assert_eq!(run(&expr), Err(RuntimeError::NullReference));
}

#[test]
fn error_nodes_fail_evaluation() {
    let env = env();
    let (bound, diagnostics) = bind_root(&env, &ident("missing"));
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(
        evaluate(&env, &bound),
        Err(RuntimeError::ErrorNode { .. })
    ));
}

#[test]
fn closures_capture_enclosing_locals() {
    // (var k = 3; var f = (x: Int) => x * k; 5 |> f)
    let expr = statement(
        vec![
            declare("k", None, int(3)),
            declare(
                "f",
                None,
                lambda(
                    vec![("x", Type::Int)],
                    binary(BinaryOp::Multiply, ident("x"), ident("k")),
                ),
            ),
        ],
        pipe(int(5), ident("f")),
    );
    assert_eq!(run(&expr), Ok(Value::Int(15)));
}

#[test]
fn nullable_arithmetic_propagates_null() {
    let expr = statement(
        vec![declare("p", Some(Type::record("Point")), null())],
        binary(
            BinaryOp::Add,
            conditional_access(ident("p"), member_binding("x")),
            int(1),
        ),
    );
    assert_eq!(run(&expr), Ok(Value::Null));
}

#[test]
fn lowered_tree_evaluates_like_original() {
    // (var l = new Line(...); l with { .start.x += Tick() |> Double |> Increment })
    let bump = pipe(
        pipe(call("Tick", Vec::new()), ident("Double")),
        ident("Increment"),
    );
    let expr = statement(
        vec![declare(
            "l",
            None,
            new_object("Line", Some(vec![point(1, 2), point(3, 4)])),
        )],
        with_expr(
            ident("l"),
            vec![assign(&["start", "x"], AssignOp::AddAssign, bump)],
        ),
    );
    let expected = Value::record(
        "Line",
        vec![("start", point_value(4, 2)), ("end", point_value(3, 4))],
    );

    let counter = Arc::new(AtomicUsize::new(0));
    let direct = run_in(&env_with_counter(counter.clone()), &expr);
    assert_eq!(direct, Ok(expected.clone()));
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let counter = Arc::new(AtomicUsize::new(0));
    let lowered = lower(&expr, &mut IdGen::new());
    let via_lowering = run_in(&env_with_counter(counter.clone()), &lowered);
    assert_eq!(via_lowering, Ok(expected));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn placeholder_argument_runs_as_lambda() {
    let mut env = env();
    env.define_function(syntax_function(
        "ApplyToTwo",
        &[("func", Type::function(vec![Type::Int], Type::Int))],
        Type::Int,
        call("func", vec![int(2)]),
    ));
    // ApplyToTwo(@ + 1)
    let expr = call(
        "ApplyToTwo",
        vec![binary(BinaryOp::Add, placeholder(Default::default()), int(1))],
    );
    assert_eq!(run_in(&env, &expr), Ok(Value::Int(3)));
}

#[test]
fn native_failure_surfaces_as_runtime_error() {
    let mut env = env();
    env.define_native("Fail", vec![Type::Int], Type::Int, |_| {
        Err(RuntimeError::Native("boom".to_string()))
    });
    let expr = pipe(int(1), ident("Fail"));
    assert_eq!(
        run_in(&env, &expr),
        Err(RuntimeError::Native("boom".to_string()))
    );
}

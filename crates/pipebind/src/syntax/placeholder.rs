use super::{
    map_children, with_arguments, with_operands, with_when_not_null, BinaryOp, Expr, ExprKind,
    ExprRef,
};

/// Whether `@` occurs in `expr`. Pipes are scanned on their left operand only:
/// markers on a nested pipe's right belong to that pipe.
pub fn contains_placeholder(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Placeholder => true,
        ExprKind::Binary {
            op: BinaryOp::Pipe,
            left,
            ..
        } => contains_placeholder(left),
        _ => expr
            .children()
            .into_iter()
            .any(|child| contains_placeholder(child)),
    }
}

/// Substitutes `replacement` for every marker `contains_placeholder` would find.
pub fn replace_placeholders(expr: &ExprRef, replacement: &ExprRef) -> ExprRef {
    match &expr.kind {
        ExprKind::Placeholder => replacement.clone(),
        ExprKind::Binary {
            op: BinaryOp::Pipe,
            left,
            right,
        } => with_operands(expr, replace_placeholders(left, replacement), right.clone()),
        _ => map_children(expr, |child| replace_placeholders(child, replacement)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipeTarget {
    /// The right-hand side already names `@` and is used as written.
    Explicit(ExprRef),
    /// The right-hand side with `argument` spliced in as a call argument.
    Spliced(ExprRef),
    /// `new T(...)` with an explicit argument list.
    NotInvocable,
}

/// Decides where the piped value goes in `target`.
pub fn splice_pipe_argument(target: &ExprRef, argument: &ExprRef) -> PipeTarget {
    if contains_placeholder(target) {
        return PipeTarget::Explicit(target.clone());
    }
    match &target.kind {
        ExprKind::ConditionalAccess { .. } => {
            PipeTarget::Spliced(insert_invocation_into_conditional_access(target, argument))
        }
        ExprKind::ObjectCreation { args: None, .. } => {
            PipeTarget::Spliced(with_arguments(target, vec![argument.clone()]))
        }
        ExprKind::ObjectCreation { args: Some(_), .. } => PipeTarget::NotInvocable,
        _ => PipeTarget::Spliced(invoke(target, argument)),
    }
}

/// `a?.b?.M` becomes `a?.b?.M(argument)`: only the innermost branch is invoked.
fn insert_invocation_into_conditional_access(node: &ExprRef, argument: &ExprRef) -> ExprRef {
    let ExprKind::ConditionalAccess { when_not_null, .. } = &node.kind else {
        unreachable!("expected conditional access, found {}", node.kind.name());
    };
    let invoked = match &when_not_null.kind {
        ExprKind::ConditionalAccess { .. } => {
            insert_invocation_into_conditional_access(when_not_null, argument)
        }
        _ => invoke(when_not_null, argument),
    };
    with_when_not_null(node, invoked)
}

fn invoke(callee: &ExprRef, argument: &ExprRef) -> ExprRef {
    Expr::new(
        ExprKind::Invocation {
            callee: callee.clone(),
            args: vec![argument.clone()],
        },
        callee.span,
    )
}

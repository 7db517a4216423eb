use crate::symbols::IdGen;

use super::{
    desugar_with, map_children, replace_placeholders, splice_pipe_argument, with_operands,
    BinaryOp, Expr, ExprKind, ExprRef, LocalDeclaration, PipeTarget,
};

/// Removes both extensions at the syntax level.
///
/// `e |> f` becomes `(var $pipeN = e; f($pipeN))` and every with-expression is
/// desugared to canonical form. A pipe onto `new T(...)` is left in place so the
/// binder still reports it.
pub fn lower(expr: &ExprRef, ids: &mut IdGen) -> ExprRef {
    match &expr.kind {
        ExprKind::Binary {
            op: BinaryOp::Pipe,
            left,
            right,
        } => {
            let receiver = lower(left, ids);
            let name = format!("$pipe{}", ids.next_pipe());
            let reference = Expr::new(ExprKind::Ident { name: name.clone() }, left.span);
            let body = match splice_pipe_argument(right, &reference) {
                PipeTarget::Explicit(target) => replace_placeholders(&target, &reference),
                PipeTarget::Spliced(target) => target,
                PipeTarget::NotInvocable => {
                    let right = lower(right, ids);
                    return with_operands(expr, receiver, right);
                }
            };
            Expr::new(
                ExprKind::Statement {
                    declarations: vec![LocalDeclaration {
                        name,
                        ty: None,
                        init: receiver,
                        span: left.span,
                    }],
                    value: lower(&body, ids),
                },
                expr.span,
            )
        }
        ExprKind::With { .. } => {
            let lowered = map_children(expr, |child| lower(child, ids));
            desugar_with(&lowered, ids)
        }
        _ => map_children(expr, |child| lower(child, ids)),
    }
}

use crate::bound::{BoundExpr, BoundKind};
use crate::diagnostics::{codes, Span};
use crate::syntax::{BinaryOp, ExprRef};
use crate::types::Type;

use super::{BindContext, Binder};

impl Binder<'_> {
    pub(super) fn bind_binary(
        &self,
        op: BinaryOp,
        left: &ExprRef,
        right: &ExprRef,
        span: Span,
        cx: &mut BindContext<'_>,
    ) -> BoundExpr {
        let left = self.bind_expression(left, cx);
        let right = self.bind_expression(right, cx);
        if left.is_error_typed() || right.is_error_typed() {
            return BoundExpr::error(span, vec![left, right]);
        }
        let Some(ty) = binary_result_type(op, &left.ty, &right.ty) else {
            cx.report(
                codes::OPERATOR_NOT_APPLICABLE,
                span,
                format!(
                    "operator `{}` cannot be applied to `{}` and `{}`",
                    op.token(),
                    left.ty,
                    right.ty
                ),
            );
            return BoundExpr::error(span, vec![left, right]);
        };
        BoundExpr::new(
            BoundKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
            span,
        )
    }
}

/// Result type of `left op right`, or `None` when the operator does not apply.
/// Arithmetic on `Int?` operands is lifted to `Int?`.
pub(super) fn binary_result_type(op: BinaryOp, left: &Type, right: &Type) -> Option<Type> {
    match op {
        BinaryOp::Equals | BinaryOp::NotEquals => {
            (left.is_assignable_from(right) || right.is_assignable_from(left))
                .then_some(Type::Bool)
        }
        BinaryOp::LessThan | BinaryOp::GreaterThan => {
            lifted(&Type::Int, left, right).map(|_| Type::Bool)
        }
        BinaryOp::Add if *left == Type::Text && *right == Type::Text => Some(Type::Text),
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo
        | BinaryOp::LeftShift
        | BinaryOp::RightShift => lifted(&Type::Int, left, right),
        BinaryOp::BitwiseAnd | BinaryOp::BitwiseOr | BinaryOp::ExclusiveOr => {
            lifted(&Type::Int, left, right).or_else(|| lifted(&Type::Bool, left, right))
        }
        BinaryOp::Pipe => unreachable!("pipes are bound by ForwardPipeBinder"),
    }
}

fn lifted(operand: &Type, left: &Type, right: &Type) -> Option<Type> {
    if left.strip_nullable() != *operand || right.strip_nullable() != *operand {
        return None;
    }
    let nullable = matches!(left, Type::Nullable(_)) || matches!(right, Type::Nullable(_));
    Some(if nullable {
        Type::Nullable(Box::new(operand.clone()))
    } else {
        operand.clone()
    })
}

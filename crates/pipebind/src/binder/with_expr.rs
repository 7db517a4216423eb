use tracing::debug;

use crate::bound::{BoundExpr, BoundKind, BoundUpdate};
use crate::diagnostics::{codes, Diagnostic, Span};
use crate::symbols::{LocalKind, RecordSymbol};
use crate::syntax::{
    desugar_with, is_canonical_with, ExprKind, ExprRef, PathSegment, WithClause,
};
use crate::types::Type;

use super::{BindContext, Binder, Scope};

impl Binder<'_> {
    /// Desugars `syntax` to canonical form, then binds every clause against a
    /// single evaluation of the receiver.
    pub(super) fn bind_with(&self, syntax: &ExprRef, cx: &mut BindContext<'_>) -> BoundExpr {
        let desugared = desugar_with(syntax, cx.ids());
        assert!(
            is_canonical_with(&desugared),
            "with-expression is not canonical after desugaring"
        );
        let ExprKind::With {
            receiver,
            clauses,
            receiver_id,
        } = &desugared.kind
        else {
            unreachable!("desugar_with returned {}", desugared.kind.name());
        };
        let span = syntax.span;
        let receiver = self.bind_expression(receiver, cx);
        debug!(
            clauses = clauses.len(),
            temporary = receiver_id.is_some(),
            receiver = %receiver.ty,
            "binding with-expression"
        );

        let Some(id) = *receiver_id else {
            let ty = receiver.ty.clone();
            return bind_update(self, receiver, &ty, clauses, cx);
        };
        let local = cx.new_local(
            &format!("$with{id}"),
            LocalKind::WithReceiver,
            receiver.ty.clone(),
        );
        let inner = self.with_scope(Scope::WithReceiver { id, local: &local });
        let update = bind_update(
            &inner,
            BoundExpr::local(&local, receiver.span),
            &local.ty,
            clauses,
            cx,
        );
        let side_effect = BoundExpr::assignment(&local, receiver);
        BoundExpr::sequence(vec![local.clone()], vec![side_effect], update, span)
    }
}

/// `receiver with { clauses }` for canonical clauses, whose values are bound
/// in `binder`.
fn bind_update(
    binder: &Binder<'_>,
    receiver: BoundExpr,
    ty: &Type,
    clauses: &im::Vector<WithClause>,
    cx: &mut BindContext<'_>,
) -> BoundExpr {
    let span = receiver.span;
    let record = match ty {
        Type::Error => None,
        Type::Record(name) => {
            let Some(record) = cx.env().record(name) else {
                cx.report(codes::UNKNOWN_TYPE, span, format!("unknown type `{name}`"));
                return BoundExpr::error(span, vec![receiver]);
            };
            Some(&**record)
        }
        Type::List(_) => None,
        other => {
            cx.report(
                codes::NOT_UPDATABLE,
                span,
                format!("a with-expression needs a record or list receiver, found `{other}`"),
            );
            let values = clauses
                .iter()
                .map(|clause| binder.bind_expression(&clause.value, cx));
            return BoundExpr::error(span, std::iter::once(receiver).chain(values).collect());
        }
    };

    let mut updates = Vec::with_capacity(clauses.len());
    let mut failed = ty.is_error();
    let mut written: Vec<(&str, Span)> = Vec::new();
    for clause in clauses {
        if let (PathSegment::Member { name, span }, Some(_)) = (clause.path.head(), record) {
            match written.iter().find(|(field, _)| *field == name.as_str()) {
                Some((_, first)) => cx.push(
                    Diagnostic::warning(
                        codes::OVERWRITTEN_UPDATE,
                        *span,
                        format!("`.{name}` is assigned again; the earlier update is discarded"),
                    )
                    .with_label(*first, "first assigned here"),
                ),
                None => written.push((name, *span)),
            }
        }
        let value = binder.bind_expression(&clause.value, cx);
        match bind_clause(binder, ty, record, clause, value, cx) {
            Some(update) => updates.push(update),
            None => failed = true,
        }
    }
    if failed {
        let children = std::iter::once(receiver)
            .chain(updates.into_iter().map(|update| match update {
                BoundUpdate::Field { value, .. } | BoundUpdate::Element { value, .. } => value,
            }))
            .collect();
        return BoundExpr::error(span, children);
    }
    BoundExpr::new(
        BoundKind::RecordUpdate {
            receiver: Box::new(receiver),
            updates,
        },
        ty.clone(),
        span,
    )
}

fn bind_clause(
    binder: &Binder<'_>,
    ty: &Type,
    record: Option<&RecordSymbol>,
    clause: &WithClause,
    value: BoundExpr,
    cx: &mut BindContext<'_>,
) -> Option<BoundUpdate> {
    match (clause.path.head(), ty) {
        (_, Type::Error) => None,
        (PathSegment::Member { name, span }, Type::Record(record_name)) => {
            let field = record.and_then(|record| record.field(name));
            let Some((index, field)) = field else {
                cx.report(
                    codes::UNKNOWN_MEMBER,
                    *span,
                    format!("`{record_name}` has no field `{name}`"),
                );
                return None;
            };
            if value.is_error_typed() {
                return None;
            }
            if !field.ty.is_assignable_from(&value.ty) {
                cx.report(
                    codes::TYPE_MISMATCH,
                    value.span,
                    format!(
                        "field `{name}` of `{record_name}` expects `{}`, found `{}`",
                        field.ty, value.ty
                    ),
                );
                return None;
            }
            Some(BoundUpdate::Field {
                name: name.clone(),
                index,
                value,
            })
        }
        (PathSegment::Element { index, span }, Type::List(element)) => {
            let index = binder.bind_expression(index, cx);
            if index.is_error_typed() || value.is_error_typed() {
                return None;
            }
            if !Type::Int.is_assignable_from(&index.ty) {
                cx.report(
                    codes::TYPE_MISMATCH,
                    *span,
                    format!("list index must be `Int`, found `{}`", index.ty),
                );
                return None;
            }
            if !element.is_assignable_from(&value.ty) {
                cx.report(
                    codes::TYPE_MISMATCH,
                    value.span,
                    format!("list element expects `{element}`, found `{}`", value.ty),
                );
                return None;
            }
            Some(BoundUpdate::Element { index, value })
        }
        (PathSegment::Member { name, span }, other) => {
            cx.report(
                codes::UNKNOWN_MEMBER,
                *span,
                format!("type `{other}` has no field `{name}`"),
            );
            None
        }
        (PathSegment::Element { span, .. }, other) => {
            cx.report(
                codes::NOT_INDEXABLE,
                *span,
                format!("cannot index into a value of type `{other}`"),
            );
            None
        }
    }
}

use crate::bound::{BoundExpr, BoundKind};
use crate::diagnostics::{codes, Span};
use crate::symbols::{FunctionRef, LocalKind};
use crate::syntax::{ExprKind, ExprRef};
use crate::types::Type;

use super::{BindContext, Binder, Scope};

impl Binder<'_> {
    /// Binds a name or member that may denote an overload set.
    ///
    /// With `invoked` set, a set of functions or methods binds to a
    /// `MethodGroup` for `bind_invocation` to resolve. Otherwise a method
    /// group is reported, as not indexable when `indexed` is set and as a
    /// misused value when it is not.
    pub fn bind_method_group(
        &self,
        syntax: &ExprRef,
        invoked: bool,
        indexed: bool,
        cx: &mut BindContext<'_>,
    ) -> BoundExpr {
        let span = syntax.span;
        match &syntax.kind {
            ExprKind::Ident { name } if invoked => {
                if let Some(local) = self.lookup_local(name) {
                    return BoundExpr::local(&local, span);
                }
                let candidates = cx.env().function_refs(name);
                if candidates.is_empty() {
                    cx.report(
                        codes::UNRESOLVED_NAME,
                        span,
                        format!("cannot find function `{name}` in this scope"),
                    );
                    return BoundExpr::error(span, Vec::new());
                }
                method_group(None, name, candidates, span)
            }
            ExprKind::MemberAccess { base, name } => {
                let receiver = self.bind_expression(base, cx);
                self.bind_member(receiver, name, invoked, indexed, span, cx)
            }
            ExprKind::MemberBinding { name } => {
                let Some(local) = self.conditional_receiver() else {
                    cx.report(
                        codes::BINDING_OUTSIDE_CONDITIONAL,
                        span,
                        format!("`.{name}` is only valid after `?.`"),
                    );
                    return BoundExpr::error(span, Vec::new());
                };
                let receiver = BoundExpr::local(&local, span);
                self.bind_member(receiver, name, invoked, indexed, span, cx)
            }
            _ => self.bind_expression(syntax, cx),
        }
    }

    fn bind_member(
        &self,
        receiver: BoundExpr,
        name: &str,
        invoked: bool,
        indexed: bool,
        span: Span,
        cx: &mut BindContext<'_>,
    ) -> BoundExpr {
        if receiver.is_error_typed() {
            return BoundExpr::error(span, vec![receiver]);
        }
        let Type::Record(record_name) = &receiver.ty else {
            cx.report(
                codes::UNKNOWN_MEMBER,
                span,
                format!("type `{}` has no member `{name}`", receiver.ty),
            );
            return BoundExpr::error(span, vec![receiver]);
        };
        let record_name = record_name.clone();
        let Some(record) = cx.env().record(&record_name) else {
            cx.report(
                codes::UNKNOWN_TYPE,
                span,
                format!("unknown type `{record_name}`"),
            );
            return BoundExpr::error(span, vec![receiver]);
        };
        if let Some((index, field)) = record.field(name) {
            return BoundExpr::new(
                BoundKind::FieldAccess {
                    receiver: Box::new(receiver),
                    field: name.to_string(),
                    index,
                },
                field.ty.clone(),
                span,
            );
        }
        let candidates = cx.env().method_refs(&record_name, name);
        if candidates.is_empty() {
            cx.report(
                codes::UNKNOWN_MEMBER,
                span,
                format!("`{record_name}` has no member `{name}`"),
            );
            return BoundExpr::error(span, vec![receiver]);
        }
        if !invoked {
            if indexed {
                cx.report(
                    codes::NOT_INDEXABLE,
                    span,
                    format!("method `{record_name}.{name}` cannot be indexed"),
                );
            } else {
                cx.report(
                    codes::METHOD_GROUP_AS_VALUE,
                    span,
                    format!("method `{record_name}.{name}` must be invoked"),
                );
            }
            return BoundExpr::error(span, vec![receiver]);
        }
        method_group(Some(receiver), name, candidates, span)
    }

    pub(super) fn bind_element_access(
        &self,
        base: &ExprRef,
        index: &ExprRef,
        span: Span,
        cx: &mut BindContext<'_>,
    ) -> BoundExpr {
        let receiver = self.bind_method_group(base, false, true, cx);
        let index = self.bind_expression(index, cx);
        bind_element(receiver, index, span, cx)
    }

    pub(super) fn bind_element_binding(
        &self,
        index: &ExprRef,
        span: Span,
        cx: &mut BindContext<'_>,
    ) -> BoundExpr {
        let Some(local) = self.conditional_receiver() else {
            cx.report(
                codes::BINDING_OUTSIDE_CONDITIONAL,
                span,
                "`[...]` is only valid after `?.`",
            );
            return BoundExpr::error(span, Vec::new());
        };
        let index = self.bind_expression(index, cx);
        bind_element(BoundExpr::local(&local, span), index, span, cx)
    }

    /// `base?.rest`: `base` is evaluated once into a conditional receiver
    /// local that member and element bindings in `rest` read from.
    pub(super) fn bind_conditional_access(
        &self,
        base: &ExprRef,
        when_not_null: &ExprRef,
        span: Span,
        cx: &mut BindContext<'_>,
    ) -> BoundExpr {
        let receiver = self.bind_expression(base, cx);
        let local = cx.new_local(
            "?",
            LocalKind::ConditionalReceiver,
            receiver.ty.strip_nullable(),
        );
        let value = self
            .with_scope(Scope::ConditionalReceiver(&local))
            .bind_expression(when_not_null, cx);
        if receiver.is_error_typed() || value.is_error_typed() {
            return BoundExpr::error(span, vec![receiver, value]);
        }
        let ty = value.ty.clone().lift_nullable();
        BoundExpr::new(
            BoundKind::ConditionalAccess {
                receiver: Box::new(receiver),
                local,
                when_not_null: Box::new(value),
            },
            ty,
            span,
        )
    }
}

fn bind_element(
    receiver: BoundExpr,
    index: BoundExpr,
    span: Span,
    cx: &mut BindContext<'_>,
) -> BoundExpr {
    if receiver.is_error_typed() || index.is_error_typed() {
        return BoundExpr::error(span, vec![receiver, index]);
    }
    let Type::List(element) = &receiver.ty else {
        cx.report(
            codes::NOT_INDEXABLE,
            span,
            format!("cannot index into a value of type `{}`", receiver.ty),
        );
        return BoundExpr::error(span, vec![receiver, index]);
    };
    let element = (**element).clone();
    if !Type::Int.is_assignable_from(&index.ty) {
        cx.report(
            codes::TYPE_MISMATCH,
            index.span,
            format!("list index must be `Int`, found `{}`", index.ty),
        );
        return BoundExpr::error(span, vec![receiver, index]);
    }
    BoundExpr::new(
        BoundKind::ElementAccess {
            receiver: Box::new(receiver),
            index: Box::new(index),
        },
        element,
        span,
    )
}

fn method_group(
    receiver: Option<BoundExpr>,
    name: &str,
    candidates: Vec<FunctionRef>,
    span: Span,
) -> BoundExpr {
    BoundExpr::new(
        BoundKind::MethodGroup {
            receiver: receiver.map(Box::new),
            name: name.to_string(),
            candidates,
        },
        Type::Error,
        span,
    )
}

use tracing::debug;

use crate::bound::BoundExpr;
use crate::diagnostics::{codes, Diagnostic};
use crate::symbols::{LocalKind, LocalRef};
use crate::syntax::{factory, splice_pipe_argument, BinaryOp, ExprKind, ExprRef, PipeTarget};

use super::{BindContext, Binder, LocalScope, Scope};

/// Binder for one `e |> f` node before its receiver is bound.
///
/// The placeholder local does not exist yet: it is created by `bind` from
/// the receiver's bound type and handed out only through the resulting
/// `PipeScope`.
pub struct ForwardPipeBinder<'a> {
    enclosing: &'a Binder<'a>,
    syntax: &'a ExprRef,
}

/// The scope owning an `@` local: a bound pipe, or a placeholder lambda
/// argument.
pub struct PipeScope {
    syntax: ExprRef,
    locals: Vec<LocalRef>,
}

impl PipeScope {
    /// Scope of a placeholder lambda argument, whose parameter is the `@` local.
    pub(super) fn new(syntax: ExprRef, local: LocalRef) -> Self {
        Self {
            syntax,
            locals: vec![local],
        }
    }

    pub fn local(&self) -> &LocalRef {
        &self.locals[0]
    }
}

impl LocalScope for PipeScope {
    fn scope_designator(&self) -> &ExprRef {
        &self.syntax
    }

    fn locals(&self) -> &[LocalRef] {
        &self.locals
    }
}

impl<'a> ForwardPipeBinder<'a> {
    pub fn new(enclosing: &'a Binder<'a>, syntax: &'a ExprRef) -> Self {
        Self { enclosing, syntax }
    }

    pub fn bind(self, cx: &mut BindContext<'_>) -> BoundExpr {
        let ExprKind::Binary {
            op: BinaryOp::Pipe,
            left,
            right,
        } = &self.syntax.kind
        else {
            unreachable!("ForwardPipeBinder on {}", self.syntax.kind.name());
        };
        let span = self.syntax.span;

        let receiver = self.enclosing.bind_expression(left, cx);
        let scope = PipeScope {
            syntax: self.syntax.clone(),
            locals: vec![cx.new_local(
                "@",
                LocalKind::PlaceholderReceiver,
                receiver.ty.clone(),
            )],
        };
        let local = scope.local().clone();
        debug!(local = %local.id, receiver = %receiver.ty, "binding forward pipe");
        let side_effect = BoundExpr::assignment(&local, receiver);

        let placeholder = factory::placeholder(left.span);
        let target = match splice_pipe_argument(right, &placeholder) {
            PipeTarget::Explicit(target) | PipeTarget::Spliced(target) => target,
            PipeTarget::NotInvocable => {
                cx.push(
                    Diagnostic::error(
                        codes::NOT_INVOCABLE,
                        right.span,
                        "an object creation with an argument list cannot receive a piped value; \
                         drop the argument list or pass `@` explicitly",
                    )
                    .with_label(left.span, "piped value"),
                );
                return BoundExpr::error(span, vec![side_effect]);
            }
        };

        let value = self
            .enclosing
            .with_scope(Scope::Pipe(&scope))
            .bind_expression(&target, cx);
        let locals = scope.locals_for_scope(self.syntax).to_vec();
        BoundExpr::sequence(locals, vec![side_effect], value, span)
    }
}

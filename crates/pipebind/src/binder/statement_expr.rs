use crate::bound::BoundExpr;
use crate::diagnostics::codes;
use crate::symbols::{LocalKind, LocalRef};
use crate::syntax::{ExprKind, ExprRef};

use super::{BindContext, Binder, LocalScope, Scope};

/// Locals declared by `(var a = ...; var b = ...; value)`.
pub struct StatementScope {
    syntax: ExprRef,
    locals: Vec<LocalRef>,
}

impl LocalScope for StatementScope {
    fn scope_designator(&self) -> &ExprRef {
        &self.syntax
    }

    fn locals(&self) -> &[LocalRef] {
        &self.locals
    }
}

impl Binder<'_> {
    /// Each initializer sees only the declarations before it; the value sees
    /// all of them.
    pub(super) fn bind_statement(&self, syntax: &ExprRef, cx: &mut BindContext<'_>) -> BoundExpr {
        let ExprKind::Statement {
            declarations,
            value,
        } = &syntax.kind
        else {
            unreachable!("bind_statement on {}", syntax.kind.name());
        };
        let mut scope = StatementScope {
            syntax: syntax.clone(),
            locals: Vec::with_capacity(declarations.len()),
        };
        let mut side_effects = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            let init = self
                .with_scope(Scope::Locals(&scope))
                .bind_expression(&declaration.init, cx);
            if scope
                .locals
                .iter()
                .any(|local| local.name == declaration.name)
            {
                cx.report(
                    codes::DUPLICATE_LOCAL,
                    declaration.span,
                    format!(
                        "`{}` is already declared in this statement expression",
                        declaration.name
                    ),
                );
            }
            let ty = match &declaration.ty {
                Some(declared) => {
                    if !declared.is_assignable_from(&init.ty) {
                        cx.report(
                            codes::TYPE_MISMATCH,
                            init.span,
                            format!(
                                "`{}` is declared as `{declared}` but initialized with `{}`",
                                declaration.name, init.ty
                            ),
                        );
                    }
                    declared.clone()
                }
                None => init.ty.clone(),
            };
            let local = cx.new_local(&declaration.name, LocalKind::User, ty);
            side_effects.push(BoundExpr::assignment(&local, init));
            scope.locals.push(local);
        }
        let value = self
            .with_scope(Scope::Locals(&scope))
            .bind_expression(value, cx);
        let locals = scope.locals_for_scope(syntax).to_vec();
        BoundExpr::sequence(locals, side_effects, value, syntax.span)
    }
}

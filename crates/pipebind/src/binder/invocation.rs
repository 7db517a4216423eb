use std::sync::Arc;

use tracing::debug;

use crate::bound::{BoundExpr, BoundKind};
use crate::diagnostics::{codes, Span};
use crate::symbols::{FunctionRef, LocalKind};
use crate::syntax::{contains_placeholder, ExprRef};
use crate::types::{FunctionType, Type};

use super::{BindContext, Binder, LocalScope, PipeScope, Scope};

impl Binder<'_> {
    /// Binds the argument list of a call to `callee`.
    ///
    /// Outside any pipe, an argument containing `@` is a one-parameter lambda
    /// (`Apply(@ + 1)` is `Apply(x => x + 1)`) typed from the callee's
    /// function-typed parameter at that position. Without such a parameter
    /// the `@` is reported as usual.
    pub(super) fn bind_arguments(
        &self,
        callee: &BoundExpr,
        args: &[ExprRef],
        cx: &mut BindContext<'_>,
    ) -> Vec<BoundExpr> {
        let owned = self.placeholder_local().is_some();
        args.iter()
            .enumerate()
            .map(|(position, arg)| {
                if owned || !contains_placeholder(arg) {
                    return self.bind_expression(arg, cx);
                }
                match placeholder_lambda_target(callee, args.len(), position) {
                    Some(target) => self.bind_placeholder_lambda(arg, target, cx),
                    None => self.bind_expression(arg, cx),
                }
            })
            .collect()
    }

    fn bind_placeholder_lambda(
        &self,
        syntax: &ExprRef,
        target: FunctionType,
        cx: &mut BindContext<'_>,
    ) -> BoundExpr {
        let param = target.params[0].clone();
        let scope = PipeScope::new(
            syntax.clone(),
            cx.new_local("@", LocalKind::Parameter, param.clone()),
        );
        debug!(param = %param, "binding placeholder lambda");
        let body = self
            .with_scope(Scope::Pipe(&scope))
            .bind_expression(syntax, cx);
        let ty = Type::function(vec![param], body.ty.clone());
        BoundExpr::new(
            BoundKind::Lambda {
                params: scope.locals_for_scope(syntax).to_vec(),
                body: Arc::new(body),
            },
            ty,
            syntax.span,
        )
    }

    /// Applies `args` to an already bound callee: overload resolution for
    /// method groups, delegate invocation for function-typed values.
    pub fn bind_invocation(
        &self,
        syntax: &ExprRef,
        callee_name: &str,
        callee: BoundExpr,
        args: Vec<BoundExpr>,
        cx: &mut BindContext<'_>,
    ) -> BoundExpr {
        let span = syntax.span;
        let callee = match callee.kind {
            BoundKind::MethodGroup {
                receiver,
                name,
                candidates,
            } => return bind_call(receiver, &name, candidates, args, span, cx),
            kind => BoundExpr { kind, ..callee },
        };
        if callee.is_error_typed() || args.iter().any(BoundExpr::is_error_typed) {
            return BoundExpr::error(span, with_callee(callee, args));
        }
        let Type::Function(signature) = &callee.ty else {
            cx.report(
                codes::NOT_INVOCABLE,
                callee.span,
                format!(
                    "`{callee_name}` has type `{}` and cannot be invoked",
                    callee.ty
                ),
            );
            return BoundExpr::error(span, with_callee(callee, args));
        };
        let signature = signature.clone();
        if !check_arguments(callee_name, &signature, &args, span, cx) {
            return BoundExpr::error(span, with_callee(callee, args));
        }
        BoundExpr::new(
            BoundKind::Invoke {
                callee: Box::new(callee),
                args,
            },
            *signature.ret,
            span,
        )
    }
}

/// First one-parameter function type expected at `position` by a callee
/// taking `arity` arguments.
fn placeholder_lambda_target(
    callee: &BoundExpr,
    arity: usize,
    position: usize,
) -> Option<FunctionType> {
    let one_param = |signature: &FunctionType| {
        if signature.params.len() != arity {
            return None;
        }
        match signature.params.get(position) {
            Some(Type::Function(param)) if param.params.len() == 1 => Some(param.clone()),
            _ => None,
        }
    };
    match &callee.kind {
        BoundKind::MethodGroup { candidates, .. } => candidates
            .iter()
            .find_map(|candidate| one_param(&candidate.signature)),
        _ => match &callee.ty {
            Type::Function(signature) => one_param(signature),
            _ => None,
        },
    }
}

/// Picks the first overload whose arity matches and whose parameters accept
/// every argument.
fn bind_call(
    receiver: Option<Box<BoundExpr>>,
    name: &str,
    candidates: Vec<FunctionRef>,
    args: Vec<BoundExpr>,
    span: Span,
    cx: &mut BindContext<'_>,
) -> BoundExpr {
    let error_children =
        |receiver: Option<Box<BoundExpr>>, args: Vec<BoundExpr>| -> Vec<BoundExpr> {
            receiver.map(|receiver| *receiver).into_iter().chain(args).collect()
        };
    if receiver.as_ref().is_some_and(|receiver| receiver.is_error_typed())
        || args.iter().any(BoundExpr::is_error_typed)
    {
        return BoundExpr::error(span, error_children(receiver, args));
    }
    let matching_arity: Vec<&FunctionRef> = candidates
        .iter()
        .filter(|candidate| candidate.signature.params.len() == args.len())
        .collect();
    let Some(first) = matching_arity.first() else {
        let message = match candidates.as_slice() {
            [only] => format!(
                "`{name}` expects {} argument(s), found {}",
                only.signature.params.len(),
                args.len()
            ),
            _ => format!("no overload of `{name}` takes {} argument(s)", args.len()),
        };
        cx.report(codes::ARITY_MISMATCH, span, message);
        return BoundExpr::error(span, error_children(receiver, args));
    };
    let chosen = matching_arity.iter().find(|candidate| {
        candidate
            .signature
            .params
            .iter()
            .zip(&args)
            .all(|(param, arg)| param.is_assignable_from(&arg.ty))
    });
    let Some(function) = chosen else {
        check_arguments(name, &first.signature, &args, span, cx);
        return BoundExpr::error(span, error_children(receiver, args));
    };
    let function = (*function).clone();
    let ret = (*function.signature.ret).clone();
    BoundExpr::new(
        BoundKind::Call {
            function,
            receiver,
            args,
        },
        ret,
        span,
    )
}

/// Reports arity and argument type mismatches; `true` when none were found.
fn check_arguments(
    name: &str,
    signature: &FunctionType,
    args: &[BoundExpr],
    span: Span,
    cx: &mut BindContext<'_>,
) -> bool {
    if signature.params.len() != args.len() {
        cx.report(
            codes::ARITY_MISMATCH,
            span,
            format!(
                "`{name}` expects {} argument(s), found {}",
                signature.params.len(),
                args.len()
            ),
        );
        return false;
    }
    let mut ok = true;
    for (idx, (param, arg)) in signature.params.iter().zip(args).enumerate() {
        if !param.is_assignable_from(&arg.ty) {
            cx.report(
                codes::TYPE_MISMATCH,
                arg.span,
                format!(
                    "argument {} of `{name}` expects `{param}`, found `{}`",
                    idx + 1,
                    arg.ty
                ),
            );
            ok = false;
        }
    }
    ok
}

fn with_callee(callee: BoundExpr, args: Vec<BoundExpr>) -> Vec<BoundExpr> {
    std::iter::once(callee).chain(args).collect()
}

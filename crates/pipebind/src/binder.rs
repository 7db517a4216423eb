use std::sync::Arc;

use tracing::debug;

use crate::bound::{BoundExpr, BoundKind};
use crate::diagnostics::{codes, Diagnostic, DiagnosticBag, Span};
use crate::symbols::{Environment, FunctionSymbol, IdGen, LocalKind, LocalRef, LocalSymbol};
use crate::syntax::{BinaryOp, ExprKind, ExprRef, Literal, Param};
use crate::types::Type;

mod access;
mod forward_pipe;
mod invocation;
mod operators;
mod statement_expr;
mod with_expr;

pub use self::forward_pipe::{ForwardPipeBinder, PipeScope};
pub use self::statement_expr::StatementScope;

/// State shared by every binder of one top-level bind.
pub struct BindContext<'env> {
    env: &'env Environment,
    diagnostics: DiagnosticBag,
    ids: IdGen,
}

impl<'env> BindContext<'env> {
    pub fn new(env: &'env Environment) -> Self {
        Self::with_ids(env, IdGen::new())
    }

    /// Continues an id sequence, e.g. the one a lowering pass already used.
    pub fn with_ids(env: &'env Environment, ids: IdGen) -> Self {
        Self {
            env,
            diagnostics: DiagnosticBag::new(),
            ids,
        }
    }

    pub fn env(&self) -> &'env Environment {
        self.env
    }

    pub fn report(&mut self, code: &str, span: Span, message: impl Into<String>) {
        self.diagnostics.add(code, span, message);
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &DiagnosticBag {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_vec()
    }

    pub(crate) fn ids(&mut self) -> &mut IdGen {
        &mut self.ids
    }

    fn new_local(&mut self, name: &str, kind: LocalKind, ty: Type) -> LocalRef {
        LocalSymbol::new(self.ids.next_local(), name, kind, ty)
    }
}

/// A syntax region owning a fixed set of locals, keyed by the node that
/// introduces it.
pub trait LocalScope {
    fn scope_designator(&self) -> &ExprRef;

    fn locals(&self) -> &[LocalRef];

    /// Panics unless `designator` is this scope's own node.
    fn locals_for_scope(&self, designator: &ExprRef) -> &[LocalRef] {
        assert!(
            Arc::ptr_eq(self.scope_designator(), designator),
            "no such scope: {} does not introduce this scope",
            designator.kind.name()
        );
        self.locals()
    }
}

/// Lambda parameters and function parameters.
struct ParameterScope {
    syntax: ExprRef,
    locals: Vec<LocalRef>,
}

impl LocalScope for ParameterScope {
    fn scope_designator(&self) -> &ExprRef {
        &self.syntax
    }

    fn locals(&self) -> &[LocalRef] {
        &self.locals
    }
}

#[derive(Clone, Copy)]
pub enum Scope<'a> {
    Root,
    Locals(&'a dyn LocalScope),
    Pipe(&'a PipeScope),
    WithReceiver { id: u32, local: &'a LocalRef },
    ConditionalReceiver(&'a LocalRef),
}

/// One link of the binder chain.
pub struct Binder<'a> {
    next: Option<&'a Binder<'a>>,
    scope: Scope<'a>,
}

impl Binder<'static> {
    pub fn root() -> Self {
        Binder {
            next: None,
            scope: Scope::Root,
        }
    }
}

impl<'a> Binder<'a> {
    pub fn with_scope<'b>(&'b self, scope: Scope<'b>) -> Binder<'b>
    where
        'a: 'b,
    {
        Binder {
            next: Some(self),
            scope,
        }
    }

    fn find_scope<T>(&self, mut found: impl FnMut(&Scope<'_>) -> Option<T>) -> Option<T> {
        let mut current: Option<&Binder<'_>> = Some(self);
        while let Some(binder) = current {
            if let Some(result) = found(&binder.scope) {
                return Some(result);
            }
            current = binder.next;
        }
        None
    }

    fn lookup_local(&self, name: &str) -> Option<LocalRef> {
        self.find_scope(|scope| match scope {
            Scope::Locals(scope) => scope
                .locals()
                .iter()
                .rev()
                .find(|local| local.name == name)
                .cloned(),
            _ => None,
        })
    }

    fn placeholder_local(&self) -> Option<LocalRef> {
        self.find_scope(|scope| match scope {
            Scope::Pipe(pipe) => Some(pipe.local().clone()),
            _ => None,
        })
    }

    fn with_receiver_local(&self, id: u32) -> Option<LocalRef> {
        self.find_scope(|scope| match scope {
            Scope::WithReceiver { id: owner, local } if *owner == id => Some((*local).clone()),
            _ => None,
        })
    }

    fn conditional_receiver(&self) -> Option<LocalRef> {
        self.find_scope(|scope| match scope {
            Scope::ConditionalReceiver(local) => Some((*local).clone()),
            _ => None,
        })
    }

    pub fn bind_expression(&self, syntax: &ExprRef, cx: &mut BindContext<'_>) -> BoundExpr {
        let span = syntax.span;
        match &syntax.kind {
            ExprKind::Ident { name } => self.bind_name(name, span, cx),
            ExprKind::Literal { value } => bind_literal(value, span),
            ExprKind::Placeholder => match self.placeholder_local() {
                Some(local) => BoundExpr::local(&local, span),
                None => {
                    cx.report(
                        codes::PLACEHOLDER_OUTSIDE_PIPE,
                        span,
                        "`@` is only valid on the right-hand side of `|>`",
                    );
                    BoundExpr::error(span, Vec::new())
                }
            },
            ExprKind::WithReceiver { id } => match self.with_receiver_local(*id) {
                Some(local) => BoundExpr::local(&local, span),
                None => panic!("no such scope: with-receiver {id} is not being bound"),
            },
            ExprKind::List { items } => self.bind_list(items, span, cx),
            ExprKind::MemberAccess { .. } | ExprKind::MemberBinding { .. } => {
                self.bind_method_group(syntax, false, false, cx)
            }
            ExprKind::ElementAccess { base, index } => {
                self.bind_element_access(base, index, span, cx)
            }
            ExprKind::ConditionalAccess {
                base,
                when_not_null,
            } => self.bind_conditional_access(base, when_not_null, span, cx),
            ExprKind::ElementBinding { index } => self.bind_element_binding(index, span, cx),
            ExprKind::Invocation { callee, args } => {
                let callee_name = callee_name(callee);
                let callee = self.bind_method_group(callee, true, false, cx);
                let args = self.bind_arguments(&callee, args, cx);
                self.bind_invocation(syntax, callee_name, callee, args, cx)
            }
            ExprKind::ObjectCreation { type_name, args } => {
                self.bind_object_creation(type_name, args.as_deref().unwrap_or(&[]), span, cx)
            }
            ExprKind::Binary {
                op: BinaryOp::Pipe,
                ..
            } => ForwardPipeBinder::new(self, syntax).bind(cx),
            ExprKind::Binary { op, left, right } => self.bind_binary(*op, left, right, span, cx),
            ExprKind::Lambda { params, body } => self.bind_lambda(syntax, params, body, cx),
            ExprKind::With { .. } => self.bind_with(syntax, cx),
            ExprKind::Statement { .. } => self.bind_statement(syntax, cx),
        }
    }

    fn bind_name(&self, name: &str, span: Span, cx: &mut BindContext<'_>) -> BoundExpr {
        if let Some(local) = self.lookup_local(name) {
            return BoundExpr::local(&local, span);
        }
        let mut functions = cx.env().function_refs(name);
        match functions.len() {
            0 => {
                cx.report(
                    codes::UNRESOLVED_NAME,
                    span,
                    format!("cannot find `{name}` in this scope"),
                );
                BoundExpr::error(span, Vec::new())
            }
            1 => {
                let function = functions.remove(0);
                let ty = Type::Function(function.signature.clone());
                BoundExpr::new(BoundKind::FunctionValue { function }, ty, span)
            }
            count => {
                cx.report(
                    codes::METHOD_GROUP_AS_VALUE,
                    span,
                    format!("`{name}` has {count} overloads and cannot be used as a value"),
                );
                BoundExpr::error(span, Vec::new())
            }
        }
    }

    fn bind_list(&self, items: &[ExprRef], span: Span, cx: &mut BindContext<'_>) -> BoundExpr {
        let items: Vec<BoundExpr> = items
            .iter()
            .map(|item| self.bind_expression(item, cx))
            .collect();
        if items.iter().any(BoundExpr::is_error_typed) {
            return BoundExpr::error(span, items);
        }
        let mut element = items
            .first()
            .map(|item| item.ty.clone())
            .unwrap_or(Type::Null);
        for item in items.iter().skip(1) {
            match unify_element(&element, &item.ty) {
                Some(unified) => element = unified,
                None => {
                    cx.report(
                        codes::TYPE_MISMATCH,
                        item.span,
                        format!(
                            "list elements must share a type, found `{element}` and `{}`",
                            item.ty
                        ),
                    );
                    return BoundExpr::error(span, items);
                }
            }
        }
        BoundExpr::new(BoundKind::List { items }, Type::list(element), span)
    }

    fn bind_object_creation(
        &self,
        type_name: &str,
        args: &[ExprRef],
        span: Span,
        cx: &mut BindContext<'_>,
    ) -> BoundExpr {
        let args: Vec<BoundExpr> = args
            .iter()
            .map(|arg| self.bind_expression(arg, cx))
            .collect();
        let Some(record) = cx.env().record(type_name) else {
            cx.report(
                codes::UNKNOWN_TYPE,
                span,
                format!("unknown type `{type_name}`"),
            );
            return BoundExpr::error(span, args);
        };
        if record.fields.len() != args.len() {
            cx.report(
                codes::ARITY_MISMATCH,
                span,
                format!(
                    "`{type_name}` has {} field(s) but {} argument(s) were given",
                    record.fields.len(),
                    args.len()
                ),
            );
            return BoundExpr::error(span, args);
        }
        let mut failed = false;
        for (field, arg) in record.fields.iter().zip(&args) {
            if arg.is_error_typed() {
                failed = true;
            } else if !field.ty.is_assignable_from(&arg.ty) {
                cx.report(
                    codes::TYPE_MISMATCH,
                    arg.span,
                    format!(
                        "field `{}` of `{type_name}` expects `{}`, found `{}`",
                        field.name, field.ty, arg.ty
                    ),
                );
                failed = true;
            }
        }
        if failed {
            return BoundExpr::error(span, args);
        }
        BoundExpr::new(
            BoundKind::ObjectCreation {
                record: type_name.to_string(),
                args,
            },
            Type::record(type_name),
            span,
        )
    }

    fn bind_lambda(
        &self,
        syntax: &ExprRef,
        params: &[Param],
        body: &ExprRef,
        cx: &mut BindContext<'_>,
    ) -> BoundExpr {
        let scope = ParameterScope {
            syntax: syntax.clone(),
            locals: params
                .iter()
                .map(|param| cx.new_local(&param.name, LocalKind::Parameter, param.ty.clone()))
                .collect(),
        };
        let body = self
            .with_scope(Scope::Locals(&scope))
            .bind_expression(body, cx);
        let ty = Type::function(
            params.iter().map(|param| param.ty.clone()).collect(),
            body.ty.clone(),
        );
        BoundExpr::new(
            BoundKind::Lambda {
                params: scope.locals_for_scope(syntax).to_vec(),
                body: Arc::new(body),
            },
            ty,
            syntax.span,
        )
    }
}

fn bind_literal(value: &Literal, span: Span) -> BoundExpr {
    let ty = match value {
        Literal::Null => Type::Null,
        Literal::Bool(_) => Type::Bool,
        Literal::Int(_) => Type::Int,
        Literal::Text(_) => Type::Text,
    };
    BoundExpr::new(
        BoundKind::Literal {
            value: value.clone(),
        },
        ty,
        span,
    )
}

fn unify_element(current: &Type, next: &Type) -> Option<Type> {
    if current.is_assignable_from(next) {
        return Some(current.clone());
    }
    if next.is_assignable_from(current) {
        return Some(next.clone());
    }
    match (current, next) {
        (Type::Null, other) | (other, Type::Null) => Some(other.clone().lift_nullable()),
        _ => None,
    }
}

/// Name used for the callee in invocation diagnostics.
fn callee_name(callee: &ExprRef) -> &str {
    match &callee.kind {
        ExprKind::Ident { name }
        | ExprKind::MemberAccess { name, .. }
        | ExprKind::MemberBinding { name } => name,
        other => other.name(),
    }
}

/// Binds `expr` at the root scope.
pub fn bind_root(env: &Environment, expr: &ExprRef) -> (BoundExpr, Vec<Diagnostic>) {
    bind_root_with_ids(env, expr, IdGen::new())
}

pub fn bind_root_with_ids(
    env: &Environment,
    expr: &ExprRef,
    ids: IdGen,
) -> (BoundExpr, Vec<Diagnostic>) {
    let mut cx = BindContext::with_ids(env, ids);
    let bound = Binder::root().bind_expression(expr, &mut cx);
    debug!(
        ty = %bound.ty,
        diagnostics = cx.diagnostics().len(),
        "bound expression"
    );
    (bound, cx.into_diagnostics())
}

/// A syntax-bodied function with its parameters as locals; methods get
/// `this` as their first parameter.
#[derive(Debug, Clone)]
pub struct BoundFunction {
    pub params: Vec<LocalRef>,
    pub body: BoundExpr,
}

pub fn bind_function(
    env: &Environment,
    owner: Option<&str>,
    function: &FunctionSymbol,
    body: &ExprRef,
) -> (BoundFunction, Vec<Diagnostic>) {
    let mut cx = BindContext::new(env);
    let mut locals = Vec::new();
    if let Some(owner) = owner {
        locals.push(cx.new_local("this", LocalKind::Parameter, Type::record(owner)));
    }
    for param in &function.params {
        locals.push(cx.new_local(&param.name, LocalKind::Parameter, param.ty.clone()));
    }
    let scope = ParameterScope {
        syntax: body.clone(),
        locals,
    };
    let bound = Binder::root()
        .with_scope(Scope::Locals(&scope))
        .bind_expression(body, &mut cx);
    if !bound.is_error_typed() && !function.ret.is_assignable_from(&bound.ty) {
        cx.report(
            codes::TYPE_MISMATCH,
            bound.span,
            format!(
                "`{}` returns `{}` but its body has type `{}`",
                function.name, function.ret, bound.ty
            ),
        );
    }
    debug!(function = %function.name, "bound function body");
    (
        BoundFunction {
            params: scope.locals,
            body: bound,
        },
        cx.into_diagnostics(),
    )
}

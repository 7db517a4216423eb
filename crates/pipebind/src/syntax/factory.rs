//! Span-less node constructors for building trees by hand.

use crate::diagnostics::Span;
use crate::types::Type;

use super::{
    AccessorPath, AssignOp, BinaryOp, Expr, ExprKind, ExprRef, Literal, LocalDeclaration, Param,
    PathSegment, WithClause,
};

pub fn ident(name: &str) -> ExprRef {
    Expr::new(
        ExprKind::Ident {
            name: name.to_string(),
        },
        Span::default(),
    )
}

pub fn int(value: i64) -> ExprRef {
    literal(Literal::Int(value))
}

pub fn boolean(value: bool) -> ExprRef {
    literal(Literal::Bool(value))
}

pub fn text(value: &str) -> ExprRef {
    literal(Literal::Text(value.to_string()))
}

pub fn null() -> ExprRef {
    literal(Literal::Null)
}

pub fn literal(value: Literal) -> ExprRef {
    Expr::new(ExprKind::Literal { value }, Span::default())
}

pub fn placeholder(span: Span) -> ExprRef {
    Expr::new(ExprKind::Placeholder, span)
}

pub fn receiver_ref(id: u32, span: Span) -> ExprRef {
    Expr::new(ExprKind::WithReceiver { id }, span)
}

pub fn list(items: Vec<ExprRef>) -> ExprRef {
    Expr::new(ExprKind::List { items }, Span::default())
}

pub fn member_access(base: ExprRef, name: &str) -> ExprRef {
    Expr::new(
        ExprKind::MemberAccess {
            base,
            name: name.to_string(),
        },
        Span::default(),
    )
}

pub fn element_access(base: ExprRef, index: ExprRef) -> ExprRef {
    Expr::new(ExprKind::ElementAccess { base, index }, Span::default())
}

pub fn conditional_access(base: ExprRef, when_not_null: ExprRef) -> ExprRef {
    Expr::new(
        ExprKind::ConditionalAccess {
            base,
            when_not_null,
        },
        Span::default(),
    )
}

pub fn member_binding(name: &str) -> ExprRef {
    Expr::new(
        ExprKind::MemberBinding {
            name: name.to_string(),
        },
        Span::default(),
    )
}

pub fn element_binding(index: ExprRef) -> ExprRef {
    Expr::new(ExprKind::ElementBinding { index }, Span::default())
}

pub fn invocation(callee: ExprRef, args: Vec<ExprRef>) -> ExprRef {
    Expr::new(ExprKind::Invocation { callee, args }, Span::default())
}

pub fn call(name: &str, args: Vec<ExprRef>) -> ExprRef {
    invocation(ident(name), args)
}

pub fn new_object(type_name: &str, args: Option<Vec<ExprRef>>) -> ExprRef {
    Expr::new(
        ExprKind::ObjectCreation {
            type_name: type_name.to_string(),
            args,
        },
        Span::default(),
    )
}

pub fn binary(op: BinaryOp, left: ExprRef, right: ExprRef) -> ExprRef {
    Expr::new(ExprKind::Binary { op, left, right }, Span::default())
}

pub fn pipe(left: ExprRef, right: ExprRef) -> ExprRef {
    binary(BinaryOp::Pipe, left, right)
}

pub fn lambda(params: Vec<(&str, Type)>, body: ExprRef) -> ExprRef {
    let params = params
        .into_iter()
        .map(|(name, ty)| Param {
            name: name.to_string(),
            ty,
        })
        .collect();
    Expr::new(ExprKind::Lambda { params, body }, Span::default())
}

pub fn with_expr(receiver: ExprRef, clauses: Vec<WithClause>) -> ExprRef {
    Expr::new(
        ExprKind::With {
            receiver,
            clauses: clauses.into_iter().collect(),
            receiver_id: None,
        },
        Span::default(),
    )
}

pub fn member(name: &str) -> PathSegment {
    PathSegment::Member {
        name: name.to_string(),
        span: Span::default(),
    }
}

pub fn element(index: ExprRef) -> PathSegment {
    PathSegment::Element {
        index,
        span: Span::default(),
    }
}

/// `.a.b = value` from `["a", "b"]`.
pub fn assign(path: &[&str], op: AssignOp, value: ExprRef) -> WithClause {
    let path = AccessorPath::new(path.iter().map(|name| member(name)))
        .expect("assign needs at least one path segment");
    clause(path, op, value)
}

pub fn clause(path: AccessorPath, op: AssignOp, value: ExprRef) -> WithClause {
    WithClause {
        path,
        op,
        value,
        span: Span::default(),
    }
}

pub fn declare(name: &str, ty: Option<Type>, init: ExprRef) -> LocalDeclaration {
    LocalDeclaration {
        name: name.to_string(),
        ty,
        init,
        span: Span::default(),
    }
}

pub fn statement(declarations: Vec<LocalDeclaration>, value: ExprRef) -> ExprRef {
    Expr::new(
        ExprKind::Statement {
            declarations,
            value,
        },
        Span::default(),
    )
}

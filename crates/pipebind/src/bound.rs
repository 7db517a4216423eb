use std::sync::Arc;

use serde::Serialize;

use crate::diagnostics::Span;
use crate::symbols::{FunctionRef, LocalRef};
use crate::syntax::{BinaryOp, Literal};
use crate::types::Type;

/// A typed, fully resolved expression.
#[derive(Debug, Clone, Serialize)]
pub struct BoundExpr {
    #[serde(flatten)]
    pub kind: BoundKind,
    pub ty: Type,
    #[serde(skip)]
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum BoundKind {
    Literal {
        value: Literal,
    },
    Local {
        local: LocalRef,
    },
    List {
        items: Vec<BoundExpr>,
    },
    FieldAccess {
        receiver: Box<BoundExpr>,
        field: String,
        index: usize,
    },
    ElementAccess {
        receiver: Box<BoundExpr>,
        index: Box<BoundExpr>,
    },
    /// Evaluates `receiver` once into `local`; `when_not_null` runs only if
    /// that value is not null.
    ConditionalAccess {
        receiver: Box<BoundExpr>,
        local: LocalRef,
        when_not_null: Box<BoundExpr>,
    },
    /// Overload set awaiting an argument list. Never survives a finished bind.
    MethodGroup {
        receiver: Option<Box<BoundExpr>>,
        name: String,
        candidates: Vec<FunctionRef>,
    },
    FunctionValue {
        function: FunctionRef,
    },
    Call {
        function: FunctionRef,
        receiver: Option<Box<BoundExpr>>,
        args: Vec<BoundExpr>,
    },
    /// Invocation of a function-typed value.
    Invoke {
        callee: Box<BoundExpr>,
        args: Vec<BoundExpr>,
    },
    ObjectCreation {
        record: String,
        args: Vec<BoundExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<BoundExpr>,
        right: Box<BoundExpr>,
    },
    Lambda {
        params: Vec<LocalRef>,
        body: Arc<BoundExpr>,
    },
    Assignment {
        local: LocalRef,
        value: Box<BoundExpr>,
    },
    /// Declares `locals`, runs `side_effects` in order, then yields `value`.
    Sequence {
        locals: Vec<LocalRef>,
        side_effects: Vec<BoundExpr>,
        value: Box<BoundExpr>,
    },
    /// Copy of `receiver` with `updates` applied left to right.
    RecordUpdate {
        receiver: Box<BoundExpr>,
        updates: Vec<BoundUpdate>,
    },
    Error {
        children: Vec<BoundExpr>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum BoundUpdate {
    Field {
        name: String,
        index: usize,
        value: BoundExpr,
    },
    Element {
        index: BoundExpr,
        value: BoundExpr,
    },
}

impl BoundExpr {
    pub fn new(kind: BoundKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    pub fn error(span: Span, children: Vec<BoundExpr>) -> Self {
        Self::new(BoundKind::Error { children }, Type::Error, span)
    }

    pub fn local(local: &LocalRef, span: Span) -> Self {
        Self::new(
            BoundKind::Local {
                local: local.clone(),
            },
            local.ty.clone(),
            span,
        )
    }

    /// `local = value`, typed as the assigned value.
    pub fn assignment(local: &LocalRef, value: BoundExpr) -> Self {
        let span = value.span;
        Self::new(
            BoundKind::Assignment {
                local: local.clone(),
                value: Box::new(value),
            },
            local.ty.clone(),
            span,
        )
    }

    /// Sequence typed as its value.
    pub fn sequence(
        locals: Vec<LocalRef>,
        side_effects: Vec<BoundExpr>,
        value: BoundExpr,
        span: Span,
    ) -> Self {
        let ty = value.ty.clone();
        Self::new(
            BoundKind::Sequence {
                locals,
                side_effects,
                value: Box::new(value),
            },
            ty,
            span,
        )
    }

    pub fn is_error_typed(&self) -> bool {
        self.ty.is_error()
    }

    /// Whether an error node occurs anywhere in the tree.
    pub fn contains_error_node(&self) -> bool {
        let children: Vec<&BoundExpr> = match &self.kind {
            BoundKind::Error { .. } => return true,
            BoundKind::Literal { .. }
            | BoundKind::Local { .. }
            | BoundKind::FunctionValue { .. } => Vec::new(),
            BoundKind::List { items } => items.iter().collect(),
            BoundKind::FieldAccess { receiver, .. } => vec![receiver.as_ref()],
            BoundKind::ElementAccess { receiver, index } => {
                vec![receiver.as_ref(), index.as_ref()]
            }
            BoundKind::ConditionalAccess {
                receiver,
                when_not_null,
                ..
            } => vec![receiver.as_ref(), when_not_null.as_ref()],
            BoundKind::MethodGroup { receiver, .. } => {
                receiver.iter().map(|receiver| receiver.as_ref()).collect()
            }
            BoundKind::Call { receiver, args, .. } => receiver
                .iter()
                .map(|receiver| receiver.as_ref())
                .chain(args.iter())
                .collect(),
            BoundKind::Invoke { callee, args } => {
                std::iter::once(callee.as_ref()).chain(args.iter()).collect()
            }
            BoundKind::ObjectCreation { args, .. } => args.iter().collect(),
            BoundKind::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            BoundKind::Lambda { body, .. } => vec![body.as_ref()],
            BoundKind::Assignment { value, .. } => vec![value.as_ref()],
            BoundKind::Sequence {
                side_effects,
                value,
                ..
            } => side_effects
                .iter()
                .chain(std::iter::once(value.as_ref()))
                .collect(),
            BoundKind::RecordUpdate { receiver, updates } => {
                let mut out = vec![receiver.as_ref()];
                for update in updates {
                    match update {
                        BoundUpdate::Field { value, .. } => out.push(value),
                        BoundUpdate::Element { index, value } => {
                            out.push(index);
                            out.push(value);
                        }
                    }
                }
                out
            }
        };
        children.into_iter().any(BoundExpr::contains_error_node)
    }
}

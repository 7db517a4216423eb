use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Span;
use crate::types::Type;

/// Shared handle to an immutable syntax node.
pub type ExprRef = Arc<Expr>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ExprKind {
    Ident {
        name: String,
    },
    Literal {
        value: Literal,
    },
    /// `@`: the implicit receiver of the innermost enclosing pipe.
    Placeholder,
    /// Reference to the receiver temporary of the with-expression tagged `id`.
    /// Only the desugarer creates these.
    #[serde(skip_deserializing)]
    WithReceiver {
        id: u32,
    },
    List {
        items: Vec<ExprRef>,
    },
    MemberAccess {
        base: ExprRef,
        name: String,
    },
    ElementAccess {
        base: ExprRef,
        index: ExprRef,
    },
    /// `base?.when_not_null`; the chain continues inside `when_not_null`.
    ConditionalAccess {
        base: ExprRef,
        when_not_null: ExprRef,
    },
    /// `.name` at the head of a conditional-access branch.
    MemberBinding {
        name: String,
    },
    /// `[index]` at the head of a conditional-access branch.
    ElementBinding {
        index: ExprRef,
    },
    Invocation {
        callee: ExprRef,
        args: Vec<ExprRef>,
    },
    /// `new T` when `args` is `None`, `new T(...)` otherwise.
    ObjectCreation {
        type_name: String,
        #[serde(default)]
        args: Option<Vec<ExprRef>>,
    },
    Binary {
        op: BinaryOp,
        left: ExprRef,
        right: ExprRef,
    },
    Lambda {
        params: Vec<Param>,
        body: ExprRef,
    },
    With {
        receiver: ExprRef,
        clauses: im::Vector<WithClause>,
        /// Set by the desugarer when clauses read through a receiver temporary.
        #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
        receiver_id: Option<u32>,
    },
    /// `(var a = e1; var b = e2; value)`
    Statement {
        declarations: Vec<LocalDeclaration>,
        value: ExprRef,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "%")]
    Modulo,
    #[serde(rename = "<<")]
    LeftShift,
    #[serde(rename = ">>")]
    RightShift,
    #[serde(rename = "&")]
    BitwiseAnd,
    #[serde(rename = "|")]
    BitwiseOr,
    #[serde(rename = "^")]
    ExclusiveOr,
    #[serde(rename = "==")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "|>")]
    Pipe,
}

impl BinaryOp {
    pub fn token(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::ExclusiveOr => "^",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::Pipe => "|>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignOp {
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "<<=")]
    LeftShiftAssign,
    #[serde(rename = ">>=")]
    RightShiftAssign,
    #[serde(rename = "/=")]
    DivideAssign,
    #[serde(rename = "*=")]
    MultiplyAssign,
    #[serde(rename = "|=")]
    OrAssign,
    #[serde(rename = "&=")]
    AndAssign,
    #[serde(rename = "+=")]
    AddAssign,
    #[serde(rename = "-=")]
    SubtractAssign,
    #[serde(rename = "^=")]
    ExclusiveOrAssign,
    #[serde(rename = "%=")]
    ModuloAssign,
}

impl AssignOp {
    /// The binary operator a compound assignment applies; `None` for plain `=`.
    pub fn compound_operator(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::LeftShiftAssign => Some(BinaryOp::LeftShift),
            AssignOp::RightShiftAssign => Some(BinaryOp::RightShift),
            AssignOp::DivideAssign => Some(BinaryOp::Divide),
            AssignOp::MultiplyAssign => Some(BinaryOp::Multiply),
            AssignOp::OrAssign => Some(BinaryOp::BitwiseOr),
            AssignOp::AndAssign => Some(BinaryOp::BitwiseAnd),
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubtractAssign => Some(BinaryOp::Subtract),
            AssignOp::ExclusiveOrAssign => Some(BinaryOp::ExclusiveOr),
            AssignOp::ModuloAssign => Some(BinaryOp::Modulo),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PathSegment {
    Member {
        name: String,
        #[serde(default)]
        span: Span,
    },
    Element {
        index: ExprRef,
        #[serde(default)]
        span: Span,
    },
}

impl PathSegment {
    pub fn span(&self) -> Span {
        match self {
            PathSegment::Member { span, .. } | PathSegment::Element { span, .. } => *span,
        }
    }

    /// Whether both segments address the same member, or the same element
    /// index written the same way.
    pub fn same_target(&self, other: &PathSegment) -> bool {
        match (self, other) {
            (PathSegment::Member { name: a, .. }, PathSegment::Member { name: b, .. }) => a == b,
            (PathSegment::Element { index: a, .. }, PathSegment::Element { index: b, .. }) => {
                same_syntax(a, b)
            }
            _ => false,
        }
    }

    /// `base.name` or `base[index]`.
    pub fn access_on(&self, base: ExprRef) -> ExprRef {
        let span = self.span();
        match self {
            PathSegment::Member { name, .. } => Expr::new(
                ExprKind::MemberAccess {
                    base,
                    name: name.clone(),
                },
                span,
            ),
            PathSegment::Element { index, .. } => Expr::new(
                ExprKind::ElementAccess {
                    base,
                    index: index.clone(),
                },
                span,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("accessor path must have at least one segment")]
pub struct AccessorPathError;

/// Non-empty `.a.b[i]` chain; the first segment is the outermost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PathSegment>", into = "Vec<PathSegment>")]
pub struct AccessorPath {
    segments: im::Vector<PathSegment>,
}

impl AccessorPath {
    pub fn new(
        segments: impl IntoIterator<Item = PathSegment>,
    ) -> Result<Self, AccessorPathError> {
        let segments: im::Vector<PathSegment> = segments.into_iter().collect();
        if segments.is_empty() {
            return Err(AccessorPathError);
        }
        Ok(Self { segments })
    }

    pub fn single(segment: PathSegment) -> Self {
        Self {
            segments: im::vector![segment],
        }
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_single(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn head(&self) -> &PathSegment {
        &self.segments[0]
    }

    /// Splits off the head segment; the tail is `None` for single-segment paths.
    pub fn split_first(&self) -> (PathSegment, Option<AccessorPath>) {
        let mut tail = self.segments.clone();
        let head = tail.pop_front().expect("accessor paths are never empty");
        let tail = (!tail.is_empty()).then_some(AccessorPath { segments: tail });
        (head, tail)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments.iter()
    }

    /// Folds the path onto `receiver`: `.a[i].b` becomes `receiver.a[i].b`.
    pub fn materialize(&self, receiver: ExprRef) -> ExprRef {
        self.segments
            .iter()
            .fold(receiver, |base, segment| segment.access_on(base))
    }
}

impl TryFrom<Vec<PathSegment>> for AccessorPath {
    type Error = AccessorPathError;

    fn try_from(segments: Vec<PathSegment>) -> Result<Self, Self::Error> {
        AccessorPath::new(segments)
    }
}

impl From<AccessorPath> for Vec<PathSegment> {
    fn from(path: AccessorPath) -> Self {
        path.segments.into_iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithClause {
    pub path: AccessorPath,
    pub op: AssignOp,
    pub value: ExprRef,
    #[serde(default)]
    pub span: Span,
}

impl WithClause {
    pub fn with_op(&self, op: AssignOp) -> Self {
        Self {
            op,
            ..self.clone()
        }
    }

    pub fn with_value(&self, value: ExprRef) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    pub fn with_path(&self, path: AccessorPath) -> Self {
        Self {
            path,
            ..self.clone()
        }
    }

    /// Single-segment path and plain `=`.
    pub fn is_canonical(&self) -> bool {
        self.op == AssignOp::Assign && self.path.is_single()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDeclaration {
    pub name: String,
    #[serde(default)]
    pub ty: Option<Type>,
    pub init: ExprRef,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> ExprRef {
        Arc::new(Expr { kind, span })
    }

    pub fn is_pipe(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Binary {
                op: BinaryOp::Pipe,
                ..
            }
        )
    }

    pub fn children(&self) -> Vec<&ExprRef> {
        match &self.kind {
            ExprKind::Ident { .. }
            | ExprKind::Literal { .. }
            | ExprKind::Placeholder
            | ExprKind::WithReceiver { .. }
            | ExprKind::MemberBinding { .. }
            | ExprKind::ObjectCreation { args: None, .. } => Vec::new(),
            ExprKind::List { items } => items.iter().collect(),
            ExprKind::MemberAccess { base, .. } => vec![base],
            ExprKind::ElementAccess { base, index } => vec![base, index],
            ExprKind::ConditionalAccess {
                base,
                when_not_null,
            } => vec![base, when_not_null],
            ExprKind::ElementBinding { index } => vec![index],
            ExprKind::Invocation { callee, args } => {
                let mut out = vec![callee];
                out.extend(args.iter());
                out
            }
            ExprKind::ObjectCreation {
                args: Some(args), ..
            } => args.iter().collect(),
            ExprKind::Binary { left, right, .. } => vec![left, right],
            ExprKind::Lambda { body, .. } => vec![body],
            ExprKind::With {
                receiver, clauses, ..
            } => {
                let mut out = vec![receiver];
                for clause in clauses {
                    for segment in clause.path.iter() {
                        if let PathSegment::Element { index, .. } = segment {
                            out.push(index);
                        }
                    }
                    out.push(&clause.value);
                }
                out
            }
            ExprKind::Statement {
                declarations,
                value,
            } => {
                let mut out: Vec<&ExprRef> = declarations.iter().map(|decl| &decl.init).collect();
                out.push(value);
                out
            }
        }
    }
}

impl ExprKind {
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::Ident { .. } => "identifier",
            ExprKind::Literal { .. } => "literal",
            ExprKind::Placeholder => "placeholder",
            ExprKind::WithReceiver { .. } => "with-receiver",
            ExprKind::List { .. } => "list",
            ExprKind::MemberAccess { .. } => "member access",
            ExprKind::ElementAccess { .. } => "element access",
            ExprKind::ConditionalAccess { .. } => "conditional access",
            ExprKind::MemberBinding { .. } => "member binding",
            ExprKind::ElementBinding { .. } => "element binding",
            ExprKind::Invocation { .. } => "invocation",
            ExprKind::ObjectCreation { .. } => "object creation",
            ExprKind::Binary { .. } => "binary expression",
            ExprKind::Lambda { .. } => "lambda",
            ExprKind::With { .. } => "with-expression",
            ExprKind::Statement { .. } => "statement expression",
        }
    }
}

/// Rebuilds `node` with every direct child passed through `f`.
///
/// Returns `node` itself when `f` hands back every child unchanged, so
/// untouched subtrees stay shared with the original tree.
pub fn map_children(node: &ExprRef, mut f: impl FnMut(&ExprRef) -> ExprRef) -> ExprRef {
    let mut changed = false;
    let mut map = |child: &ExprRef| {
        let mapped = f(child);
        changed |= !Arc::ptr_eq(child, &mapped);
        mapped
    };
    let kind = match &node.kind {
        ExprKind::Ident { .. }
        | ExprKind::Literal { .. }
        | ExprKind::Placeholder
        | ExprKind::WithReceiver { .. }
        | ExprKind::MemberBinding { .. }
        | ExprKind::ObjectCreation { args: None, .. } => return node.clone(),
        ExprKind::List { items } => ExprKind::List {
            items: items.iter().map(&mut map).collect(),
        },
        ExprKind::MemberAccess { base, name } => ExprKind::MemberAccess {
            base: map(base),
            name: name.clone(),
        },
        ExprKind::ElementAccess { base, index } => ExprKind::ElementAccess {
            base: map(base),
            index: map(index),
        },
        ExprKind::ConditionalAccess {
            base,
            when_not_null,
        } => ExprKind::ConditionalAccess {
            base: map(base),
            when_not_null: map(when_not_null),
        },
        ExprKind::ElementBinding { index } => ExprKind::ElementBinding { index: map(index) },
        ExprKind::Invocation { callee, args } => ExprKind::Invocation {
            callee: map(callee),
            args: args.iter().map(&mut map).collect(),
        },
        ExprKind::ObjectCreation {
            type_name,
            args: Some(args),
        } => ExprKind::ObjectCreation {
            type_name: type_name.clone(),
            args: Some(args.iter().map(&mut map).collect()),
        },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op: *op,
            left: map(left),
            right: map(right),
        },
        ExprKind::Lambda { params, body } => ExprKind::Lambda {
            params: params.clone(),
            body: map(body),
        },
        ExprKind::With {
            receiver,
            clauses,
            receiver_id,
        } => ExprKind::With {
            receiver: map(receiver),
            clauses: clauses
                .iter()
                .map(|clause| map_clause(clause, &mut map))
                .collect(),
            receiver_id: *receiver_id,
        },
        ExprKind::Statement {
            declarations,
            value,
        } => ExprKind::Statement {
            declarations: declarations
                .iter()
                .map(|decl| LocalDeclaration {
                    name: decl.name.clone(),
                    ty: decl.ty.clone(),
                    init: map(&decl.init),
                    span: decl.span,
                })
                .collect(),
            value: map(value),
        },
    };
    if changed {
        Expr::new(kind, node.span)
    } else {
        node.clone()
    }
}

fn map_clause(clause: &WithClause, map: &mut impl FnMut(&ExprRef) -> ExprRef) -> WithClause {
    let has_element = clause
        .path
        .iter()
        .any(|segment| matches!(segment, PathSegment::Element { .. }));
    let path = if has_element {
        let segments: Vec<PathSegment> = clause
            .path
            .iter()
            .map(|segment| match segment {
                PathSegment::Member { .. } => segment.clone(),
                PathSegment::Element { index, span } => PathSegment::Element {
                    index: map(index),
                    span: *span,
                },
            })
            .collect();
        AccessorPath {
            segments: segments.into_iter().collect(),
        }
    } else {
        clause.path.clone()
    };
    WithClause {
        path,
        op: clause.op,
        value: map(&clause.value),
        span: clause.span,
    }
}

/// `ConditionalAccess` with its when-not-null branch replaced.
pub fn with_when_not_null(node: &ExprRef, when_not_null: ExprRef) -> ExprRef {
    let ExprKind::ConditionalAccess {
        base,
        when_not_null: current,
    } = &node.kind
    else {
        unreachable!("with_when_not_null on {}", node.kind.name());
    };
    if Arc::ptr_eq(current, &when_not_null) {
        return node.clone();
    }
    Expr::new(
        ExprKind::ConditionalAccess {
            base: base.clone(),
            when_not_null,
        },
        node.span,
    )
}

/// `ObjectCreation` with an explicit argument list.
pub fn with_arguments(node: &ExprRef, args: Vec<ExprRef>) -> ExprRef {
    let ExprKind::ObjectCreation { type_name, .. } = &node.kind else {
        unreachable!("with_arguments on {}", node.kind.name());
    };
    Expr::new(
        ExprKind::ObjectCreation {
            type_name: type_name.clone(),
            args: Some(args),
        },
        node.span,
    )
}

/// `Binary` with its operands replaced.
pub fn with_operands(node: &ExprRef, left: ExprRef, right: ExprRef) -> ExprRef {
    let ExprKind::Binary {
        op,
        left: current_left,
        right: current_right,
    } = &node.kind
    else {
        unreachable!("with_operands on {}", node.kind.name());
    };
    if Arc::ptr_eq(current_left, &left) && Arc::ptr_eq(current_right, &right) {
        return node.clone();
    }
    Expr::new(
        ExprKind::Binary {
            op: *op,
            left,
            right,
        },
        node.span,
    )
}

/// Structural equality ignoring node spans.
pub fn same_syntax(a: &ExprRef, b: &ExprRef) -> bool {
    Arc::ptr_eq(a, b) || without_spans(a) == without_spans(b)
}

fn without_spans(node: &ExprRef) -> ExprRef {
    let stripped = map_children(node, without_spans);
    Expr::new(stripped.kind.clone(), Span::default())
}

/// `With` with a new clause list and receiver tag.
pub fn with_clauses(
    node: &ExprRef,
    clauses: im::Vector<WithClause>,
    receiver_id: Option<u32>,
) -> ExprRef {
    let ExprKind::With {
        receiver,
        clauses: current,
        receiver_id: current_id,
    } = &node.kind
    else {
        unreachable!("with_clauses on {}", node.kind.name());
    };
    if *current == clauses && *current_id == receiver_id {
        return node.clone();
    }
    Expr::new(
        ExprKind::With {
            receiver: receiver.clone(),
            clauses,
            receiver_id,
        },
        node.span,
    )
}

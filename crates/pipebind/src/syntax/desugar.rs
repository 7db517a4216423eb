use std::sync::Arc;

use tracing::trace;

use crate::diagnostics::Span;
use crate::symbols::IdGen;

use super::factory::receiver_ref;
use super::{
    with_clauses, AccessorPath, AssignOp, Expr, ExprKind, ExprRef, PathSegment, WithClause,
};

/// Receiver tag of the with-expression being desugared, allocated on first use.
struct ReceiverSlot<'a> {
    id: Option<u32>,
    ids: &'a mut IdGen,
}

impl ReceiverSlot<'_> {
    fn reference(&mut self, span: Span) -> ExprRef {
        let id = *self.id.get_or_insert_with(|| self.ids.next_receiver());
        receiver_ref(id, span)
    }
}

/// Rewrites a with-expression into canonical form: every clause (and every
/// clause of every generated nested with-expression) has a single-segment
/// path and plain `=`.
///
/// Clauses that had to read the receiver reference it through a
/// `WithReceiver` marker whose id is recorded as the node's `receiver_id`.
/// Canonical input comes back as the same `Arc`.
pub fn desugar_with(node: &ExprRef, ids: &mut IdGen) -> ExprRef {
    let ExprKind::With { receiver_id, .. } = &node.kind else {
        unreachable!("desugar_with on {}", node.kind.name());
    };
    let mut receiver = ReceiverSlot {
        id: *receiver_id,
        ids,
    };
    let simplified = simplify_compound_assignments(node, &mut receiver);
    trace!(
        changed = !Arc::ptr_eq(node, &simplified),
        "with-expression: compound assignments"
    );
    let split = split_accessor_paths(&simplified, &mut receiver);
    trace!(
        changed = !Arc::ptr_eq(&simplified, &split),
        receiver = ?receiver.id,
        "with-expression: accessor paths"
    );
    split
}

pub fn is_canonical_with(node: &Expr) -> bool {
    match &node.kind {
        ExprKind::With { clauses, .. } => clauses.iter().all(WithClause::is_canonical),
        _ => false,
    }
}

fn clauses_of(node: &ExprRef) -> &im::Vector<WithClause> {
    match &node.kind {
        ExprKind::With { clauses, .. } => clauses,
        other => unreachable!("expected with-expression, found {}", other.name()),
    }
}

/// `.p op= v` becomes `.p = <receiver>.p op v`.
fn simplify_compound_assignments(node: &ExprRef, receiver: &mut ReceiverSlot<'_>) -> ExprRef {
    let clauses = clauses_of(node);
    if clauses.iter().all(|clause| clause.op == AssignOp::Assign) {
        return node.clone();
    }
    let rewritten = clauses
        .iter()
        .map(|clause| {
            let Some(op) = clause.op.compound_operator() else {
                return clause.clone();
            };
            let current = clause.path.materialize(receiver.reference(clause.span));
            let value = Expr::new(
                ExprKind::Binary {
                    op,
                    left: current,
                    right: clause.value.clone(),
                },
                clause.value.span,
            );
            clause.with_op(AssignOp::Assign).with_value(value)
        })
        .collect();
    with_clauses(node, rewritten, receiver.id)
}

/// Clauses written to one head segment: a plain clause, or the tails of
/// multi-segment clauses that become one nested with-expression.
struct ClauseGroup {
    head: PathSegment,
    clause: WithClause,
    tails: Vec<WithClause>,
}

/// `.a.b = v, .a.c = w` becomes `.a = (<receiver>.a) with { .b = v, .c = w }`;
/// the nested with-expression is desugared on the spot.
///
/// Multi-segment clauses join the latest group for their head unless a plain
/// write to that head comes in between.
fn split_accessor_paths(node: &ExprRef, receiver: &mut ReceiverSlot<'_>) -> ExprRef {
    let clauses = clauses_of(node);
    if clauses.iter().all(|clause| clause.path.is_single()) {
        return node.clone();
    }
    let mut groups: Vec<ClauseGroup> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let (head, tail) = clause.path.split_first();
        let Some(tail) = tail else {
            groups.push(ClauseGroup {
                head,
                clause: clause.clone(),
                tails: Vec::new(),
            });
            continue;
        };
        let open = groups
            .iter()
            .rposition(|group| group.head.same_target(&head))
            .filter(|&index| !groups[index].tails.is_empty());
        match open {
            Some(index) => groups[index].tails.push(clause.with_path(tail)),
            None => groups.push(ClauseGroup {
                head,
                clause: clause.clone(),
                tails: vec![clause.with_path(tail)],
            }),
        }
    }

    let rewritten = groups
        .into_iter()
        .map(|group| {
            if group.tails.is_empty() {
                return group.clause;
            }
            let current = group
                .head
                .access_on(receiver.reference(group.head.span()));
            let nested = Expr::new(
                ExprKind::With {
                    receiver: current,
                    clauses: group.tails.into_iter().collect(),
                    receiver_id: None,
                },
                group.clause.span,
            );
            let nested = desugar_with(&nested, receiver.ids);
            group
                .clause
                .with_path(AccessorPath::single(group.head))
                .with_value(nested)
        })
        .collect();
    with_clauses(node, rewritten, receiver.id)
}

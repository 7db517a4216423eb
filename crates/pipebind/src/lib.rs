pub mod binder;
pub mod bound;
mod diagnostics;
pub mod program;
pub mod runtime;
pub mod symbols;
pub mod syntax;
pub mod types;

pub use binder::{bind_function, bind_root, bind_root_with_ids, BindContext, Binder, BoundFunction};
pub use bound::{BoundExpr, BoundKind, BoundUpdate};
pub use diagnostics::{
    codes, diagnostics_have_errors, render_diagnostic, render_diagnostics, Diagnostic,
    DiagnosticBag, DiagnosticLabel, DiagnosticSeverity, Position, Span,
};
pub use program::{
    bind_program, load_program, parse_program, run_program, BoundProgram, FunctionDecl, Program,
    RecordDecl,
};
pub use runtime::{evaluate, RuntimeError, Value};
pub use symbols::{Environment, IdGen, LocalId, LocalKind, LocalRef, LocalSymbol};
pub use syntax::{Expr, ExprKind, ExprRef};
pub use types::Type;

#[derive(Debug, thiserror::Error)]
pub enum PipebindError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid program: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{} diagnostic(s) reported", .0.len())]
    Diagnostics(Vec<Diagnostic>),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

/// Binds `expr` at the root scope of `env`.
pub fn bind_expression(env: &Environment, expr: &ExprRef) -> (BoundExpr, Vec<Diagnostic>) {
    bind_root(env, expr)
}

/// Lowers pipes and with-expressions at the syntax level, then binds the
/// result with the same id sequence.
pub fn lower_and_bind(env: &Environment, expr: &ExprRef) -> (ExprRef, BoundExpr, Vec<Diagnostic>) {
    let mut ids = IdGen::new();
    let lowered = syntax::lower(expr, &mut ids);
    let (bound, diagnostics) = bind_root_with_ids(env, &lowered, ids);
    (lowered, bound, diagnostics)
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticLabel {
    pub message: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub span: Span,
    pub labels: Vec<DiagnosticLabel>,
}

impl Diagnostic {
    pub fn error(code: &str, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            span,
            labels: Vec::new(),
        }
    }

    pub fn warning(code: &str, span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            ..Self::error(code, span, message)
        }
    }

    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(DiagnosticLabel {
            message: message.into(),
            span,
        });
        self
    }
}

/// Binding diagnostic codes.
pub mod codes {
    pub const UNRESOLVED_NAME: &str = "E2001";
    pub const ARITY_MISMATCH: &str = "E2002";
    pub const TYPE_MISMATCH: &str = "E2003";
    pub const NOT_INVOCABLE: &str = "E2004";
    pub const UNKNOWN_MEMBER: &str = "E2005";
    pub const PLACEHOLDER_OUTSIDE_PIPE: &str = "E2006";
    pub const NOT_UPDATABLE: &str = "E2007";
    pub const OPERATOR_NOT_APPLICABLE: &str = "E2008";
    pub const UNKNOWN_TYPE: &str = "E2009";
    pub const NOT_INDEXABLE: &str = "E2010";
    pub const BINDING_OUTSIDE_CONDITIONAL: &str = "E2011";
    pub const DUPLICATE_LOCAL: &str = "E2012";
    pub const METHOD_GROUP_AS_VALUE: &str = "E2013";
    /// Warning: a with-clause replaces a field an earlier clause already set.
    pub const OVERWRITTEN_UPDATE: &str = "W2001";
}

/// Append-only diagnostics sink owned by a top-level bind call.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    items: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, code: &str, span: Span, message: impl Into<String>) {
        self.items.push(Diagnostic::error(code, span, message));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        diagnostics_have_errors(&self.items)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

pub fn diagnostics_have_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|diag| diag.severity == DiagnosticSeverity::Error)
}

pub fn render_diagnostics(path: &str, diagnostics: &[Diagnostic]) -> String {
    let mut output = String::new();
    for (index, diagnostic) in diagnostics.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        output.push_str(&render_diagnostic(path, diagnostic));
    }
    output
}

pub fn render_diagnostic(path: &str, diagnostic: &Diagnostic) -> String {
    let mut output = String::new();
    let start = &diagnostic.span.start;
    let severity = match diagnostic.severity {
        DiagnosticSeverity::Error => "error",
        DiagnosticSeverity::Warning => "warning",
    };
    output.push_str(&format!(
        "{severity}[{}] {}:{}:{} {}\n",
        diagnostic.code, path, start.line, start.column, diagnostic.message
    ));
    for label in &diagnostic.labels {
        let pos = &label.span.start;
        output.push_str(&format!(
            "  note: {} at {}:{}:{}\n",
            label.message, path, pos.line, pos.column
        ));
    }
    output.trim_end().to_string()
}

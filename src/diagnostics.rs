use crate::ast::Span;
use crate::types::Type;
use thiserror::Error;

#[derive(Debug, PartialEq, Clone, Error)]
pub enum SemanticError {
    #[error("Multiply declared identifier: {0}")]
    DuplicateDeclaration(String),

    #[error("Undeclared identifier: {0}")]
    UndeclaredIdentifier(String),

    #[error("No main method declared")]
    MissingEntryPoint,

    #[error("Missing return statement in int method: {0}")]
    MissingReturn(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Function call with wrong number of args: {name} expects {expected}, found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "Type of actual does not match type of formal: argument {position} of {name} expects {expected}, found {found}"
    )]
    ArgumentTypeMismatch {
        name: String,
        position: usize,
        expected: Type,
        found: Type,
    },

    #[error("Invalid case label: {0}")]
    InvalidCaseLabel(String),
}

#[derive(Debug, PartialEq, Clone, Error)]
#[error("{span}: {error}")]
pub struct Diagnostic {
    pub span: Span,
    pub error: SemanticError,
}

/// Collects the diagnostics of one compilation. Reporting never interrupts a pass.
#[derive(Debug, Default)]
pub struct Diagnostics {
    reported: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn report(&mut self, span: Span, error: SemanticError) {
        let diagnostic = Diagnostic { span, error };
        log::error!("{diagnostic}");
        self.reported.push(diagnostic);
    }

    /// Sticky: once anything has been reported, later passes must not assume a clean tree.
    pub fn failed(&self) -> bool {
        !self.reported.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.reported.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.reported
    }
}

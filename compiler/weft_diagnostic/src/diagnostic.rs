//! Diagnostic values.

use std::fmt;

use weft_ir::Span;

use crate::ErrorCode;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A labeled span with a message.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

impl Label {
    /// Create a primary label (the main location).
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
            is_primary: true,
        }
    }

    /// Create a secondary label (related context).
    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
            is_primary: false,
        }
    }
}

/// A diagnostic with enough context for a useful report.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    /// Stable code for searchability.
    pub code: ErrorCode,
    pub severity: Severity,
    /// Human-readable headline.
    pub message: String,
    pub labels: Vec<Label>,
}

impl Diagnostic {
    /// Create an error diagnostic with the code's default message.
    pub fn error(code: ErrorCode) -> Self {
        Diagnostic {
            code,
            severity: Severity::Error,
            message: code.message().to_owned(),
            labels: Vec::new(),
        }
    }

    /// Create a note diagnostic with the code's default message.
    pub fn note(code: ErrorCode) -> Self {
        Diagnostic {
            code,
            severity: Severity::Note,
            message: code.message().to_owned(),
            labels: Vec::new(),
        }
    }

    /// Replace the headline message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach a primary label.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(span, message));
        self
    }

    /// Attach a secondary label.
    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    /// The primary span, if any label was attached.
    pub fn primary_span(&self) -> Option<Span> {
        self.labels
            .iter()
            .find(|l| l.is_primary)
            .or_else(|| self.labels.first())
            .map(|l| l.span)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_chains() {
        let diag = Diagnostic::error(ErrorCode::W2002)
            .with_message("group stack underflow in `Row`")
            .with_label(Span::new(4, 9), "this exit closes more groups than are open")
            .with_secondary_label(Span::new(0, 2), "boundary opened here");
        assert!(diag.is_error());
        assert_eq!(diag.primary_span(), Some(Span::new(4, 9)));
        assert_eq!(diag.labels.len(), 2);
    }

    #[test]
    fn note_severity() {
        let diag = Diagnostic::note(ErrorCode::W1002);
        assert!(!diag.is_error());
        assert_eq!(diag.message, ErrorCode::W1002.message());
    }
}

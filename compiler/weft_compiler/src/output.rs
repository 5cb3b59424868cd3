//! Pipeline output types.

use weft_diagnostic::Diagnostic;
use weft_transform::{TransformError, TransformedFunction};

/// Result of transforming one module.
#[derive(Debug, Default)]
pub struct ModuleOutput {
    /// Successfully rewritten declarations, in module order.
    pub functions: Vec<TransformedFunction>,
    /// Declarations whose transform was aborted by a structural failure.
    /// A failure never takes down sibling declarations.
    pub failures: Vec<TransformError>,
    /// Recoverable diagnostics gathered across declarations.
    pub diagnostics: Vec<Diagnostic>,
    /// Human-readable per-declaration stability report, when requested.
    pub stability_report: Option<String>,
}

impl ModuleOutput {
    /// Whether every declaration transformed cleanly.
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of hard errors (structural failures plus error-severity
    /// diagnostics).
    pub fn error_count(&self) -> usize {
        self.failures.len()
            + self
                .diagnostics
                .iter()
                .filter(|diag| diag.is_error())
                .count()
    }

    /// Look up a rewritten declaration by name.
    pub fn function(&self, name: weft_ir::Name) -> Option<&TransformedFunction> {
        self.functions
            .iter()
            .find(|transformed| transformed.function.name == name)
    }
}

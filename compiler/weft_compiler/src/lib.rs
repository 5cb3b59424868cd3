//! Portable Weft transform driver.
//!
//! Provides an IO-free pipeline suitable for embedding in testing
//! harnesses and tooling: hand it a typed module and its type pool, get
//! back the rewritten declarations, per-declaration failures, and a
//! stability report.
//!
//! # Architecture
//!
//! ```text
//! weft_ir, weft_types, weft_stability, weft_transform
//!                      ↓
//!                weft_compiler  ← this crate
//! ```

mod output;
mod pipeline;

pub use output::ModuleOutput;
pub use pipeline::{transform_module, PipelineConfig};

pub use weft_transform::{TransformError, TransformOptions, TransformedFunction};

use weft_diagnostic::Diagnostic;

/// Render diagnostics to a string with source context.
///
/// Suitable for embedding in tooling output or test assertions.
pub fn render_diagnostics(source: &str, file_path: &str, diagnostics: &[Diagnostic]) -> String {
    weft_diagnostic::render(source, file_path, diagnostics)
}

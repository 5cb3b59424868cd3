//! The transform pipeline.
//!
//! Runs stability inference and the control-flow transform over a typed
//! module. The transform itself is a single-threaded pure tree rewrite,
//! once per declaration; the only shared state is the verdict cache
//! inside the context, which is populated lazily and idempotently.

use weft_ir::{ExprArena, Module, StringInterner};
use weft_stability::stability_report;
use weft_transform::{transform_function, TransformContext, TransformOptions};
use weft_types::Pool;

use crate::output::ModuleOutput;

/// Pipeline configuration.
#[derive(Copy, Clone, Debug, Default)]
pub struct PipelineConfig {
    pub options: TransformOptions,
    /// Produce the per-declaration stability report alongside the
    /// rewritten module.
    pub emit_stability_report: bool,
}

/// Transform every declaration in a module.
///
/// Declarations transform independently: a structural failure in one is
/// recorded and the rest proceed. Output order follows module order, so
/// the result is deterministic for a given input.
pub fn transform_module(
    module: &Module,
    arena: &ExprArena,
    pool: &Pool,
    interner: &StringInterner,
    config: &PipelineConfig,
) -> ModuleOutput {
    let ctx = TransformContext::new(pool, interner, config.options);
    let mut output = ModuleOutput::default();

    for func in &module.functions {
        match transform_function(module, arena, func, &ctx) {
            Ok(mut transformed) => {
                output.diagnostics.append(&mut transformed.diagnostics);
                output.functions.push(transformed);
            }
            Err(err) => {
                tracing::warn!(
                    decl = func.name.raw(),
                    code = %err.code,
                    "declaration transform aborted"
                );
                output.diagnostics.push(
                    weft_diagnostic::Diagnostic::error(err.code)
                        .with_message(err.message.clone())
                        .with_label(err.span, "while transforming this declaration"),
                );
                output.failures.push(err);
            }
        }
    }

    if config.emit_stability_report {
        output.stability_report = Some(stability_report(pool, interner, &ctx.stability));
    }

    output
}

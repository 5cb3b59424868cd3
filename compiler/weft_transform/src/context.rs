//! The transform context threaded through the recursion.
//!
//! One context per compilation run; unit tests instantiate isolated
//! contexts, so nothing here is a hidden singleton.

use weft_ir::StringInterner;
use weft_stability::StabilityInferencer;
use weft_types::Pool;

/// Knobs for the transform pipeline.
#[derive(Copy, Clone, Debug)]
pub struct TransformOptions {
    /// Emit skip guards on restartable boundaries. When off, bodies
    /// always execute (useful while debugging recomposition issues).
    pub skip_enabled: bool,
    /// Validate rewritten trees (stack balance on every control path).
    /// Always on in debug builds; this forces it in release too.
    pub validate: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            skip_enabled: true,
            validate: cfg!(debug_assertions),
        }
    }
}

/// Shared read-only state for one compilation run.
pub struct TransformContext<'a> {
    pub pool: &'a Pool,
    pub interner: &'a StringInterner,
    /// Verdict cache lives inside; computing the same verdict from two
    /// declarations just repeats a pure function.
    pub stability: StabilityInferencer<'a>,
    pub options: TransformOptions,
}

impl<'a> TransformContext<'a> {
    pub fn new(pool: &'a Pool, interner: &'a StringInterner, options: TransformOptions) -> Self {
        TransformContext {
            pool,
            interner,
            stability: StabilityInferencer::new(pool),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_enable_skipping() {
        let options = TransformOptions::default();
        assert!(options.skip_enabled);
    }

    #[test]
    fn context_owns_an_isolated_inferencer() {
        let pool = Pool::new();
        let interner = StringInterner::new();
        let ctx = TransformContext::new(&pool, &interner, TransformOptions::default());
        assert!(ctx
            .stability
            .stability_of(weft_ir::TypeId::INT)
            .known_stable());
    }
}

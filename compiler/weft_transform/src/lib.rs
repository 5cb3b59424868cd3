//! Control-flow group insertion.
//!
//! Rewrites each reactive function body into positional-memoization form:
//!
//! 1. **Analyze** — classify every control construct bottom-up: does it
//!    run a statically fixed number of eligible calls, does it need a
//!    group around the whole construct, or a group per branch?
//! 2. **Rewrite** — rebuild the tree top-down, inserting group start/end
//!    operations, skip guards, marker captures, and early-exit unwind
//!    sequences, preserving control and data flow exactly.
//!
//! The two states are strictly ordered per declaration
//! (Unvisited → Analyzing → Rewritten); classification is local to each
//! declaration's body, so no cross-declaration backtracking exists.
//!
//! Structural failures (unbalanced groups, an unwind to a marker that was
//! never captured, a keyed group with no key) are phase bugs: they abort
//! the declaration's transform with a [`TransformError`] rather than
//! emitting unverifiable code.

mod changed;
mod context;
mod control_flow;
mod keys;
mod necessity;
mod restart;
mod stack;
mod validate;


pub use changed::{
    CallMasks, ChangedEncoder, OutOfRangeArg, ParamSlot, ParamState, CHANGED_SLOTS_PER_WORD,
    DEFAULT_SLOTS_PER_WORD, FORCE_RECOMPOSE_BIT,
};
pub use context::{TransformContext, TransformOptions};
pub use control_flow::{transform_function, TransformedFunction};
pub use keys::{join_key_hashes, signature_shape, KeyAssigner};
pub use necessity::{analyze, Analysis, Necessity};
pub use stack::ensure_sufficient_stack;
pub use validate::{validate_input, validate_rewritten, ValidationError};

use std::fmt;

use weft_diagnostic::ErrorCode;
use weft_ir::{Name, Span};

/// Fatal per-declaration transform failure.
///
/// Indicates an upstream phase bug (malformed eligibility marking,
/// unbalanced markers), never a user error.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TransformError {
    /// The declaration whose transform was aborted.
    pub decl: Name,
    pub span: Span,
    pub code: ErrorCode,
    pub message: String,
}

impl TransformError {
    pub fn new(decl: Name, span: Span, code: ErrorCode, message: impl Into<String>) -> Self {
        TransformError {
            decl,
            span,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] transform of declaration {:?} failed at {}: {}",
            self.code, self.decl, self.span, self.message
        )
    }
}

impl std::error::Error for TransformError {}

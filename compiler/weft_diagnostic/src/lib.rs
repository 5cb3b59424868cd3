//! Diagnostics for the Weft compiler.
//!
//! Two flavors of problem flow through here:
//!
//! - **Recoverable inference notes** (stability could not be pinned down,
//!   cross-module resolution deferred): recorded at `Note`/`Warning`
//!   severity for tooling, never failing compilation.
//! - **Structural invariant violations** (unbalanced groups, an unwind to
//!   a marker that was never captured, a keyed group with no key): `Error`
//!   severity; these indicate an upstream phase bug and abort the
//!   affected declaration's transform.

mod diagnostic;
mod emitter;
mod error_code;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use emitter::render;
pub use error_code::ErrorCode;

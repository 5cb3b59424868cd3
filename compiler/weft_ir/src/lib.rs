//! Weft IR - Intermediate Representation Types
//!
//! This crate contains the core data structures for the Weft compiler:
//! - Spans for source locations
//! - Names for interned identifiers
//! - The typed input tree (`Expr`, `ExprKind`, `Function`, `Module`)
//! - Group bookkeeping operations as first-class tree nodes
//! - Arena allocation for expressions
//!
//! # Design Philosophy
//!
//! - **Intern Everything**: Strings → `Name(u32)`, Types → `TypeId(u32)`
//! - **Flatten Everything**: No `Box<Expr>`, use `ExprId(u32)` indices
//! - **Rewritten output is data**: the group-insertion transform emits
//!   `startRestartGroup`/`endToMarker`/... as ordinary `ExprKind` variants,
//!   so the emitted operation sequence can be walked, validated, and
//!   asserted on like any other tree.
//!
//! Input trees (before the transform) must not contain runtime-op nodes;
//! `ExprKind::is_runtime_op` distinguishes the two vocabularies.

/// Compile-time assertion that a type has a specific size.
///
/// Used to prevent accidental size regressions in frequently-allocated types.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

mod arena;
pub mod ast;
mod expr_id;
mod group;
mod interner;
mod name;
mod span;
mod type_id;

pub use arena::ExprArena;
pub use ast::{
    BinaryOp, CallArg, Expr, ExprKind, Function, FunctionFlags, Module, Param, SourceId, UnaryOp,
    WhenBranch,
};
pub use expr_id::{ArgRange, BranchRange, ExprId, ExprRange};
pub use group::{GroupKey, GroupKind, MarkerSlot};
pub use interner::{InternError, SharedInterner, StringInterner};
pub use name::Name;
pub use span::{Span, SpanError};
pub use type_id::TypeId;

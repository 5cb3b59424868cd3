//! Type graph for the Weft compiler.
//!
//! The transform consumes an already-typed tree; this crate is the query
//! surface over that tree's types. It answers, for stability inference and
//! the restart wrapper:
//!
//! - what kind of type a `TypeId` denotes ([`Tag`])
//! - a class's declared fields, their mutability, and whether a property
//!   has a backing field or is accessor-only
//! - whether a declaration originates in the current compilation unit or
//!   an external one ([`Origin`])
//! - the author's explicit stability annotation, if any
//!
//! Types are interned in a [`Pool`] and referenced by `weft_ir::TypeId`;
//! equal types share an index, so type equality is O(1).

mod decl;
mod pool;
mod tag;

pub use decl::{ClassDecl, ClassKind, FieldDecl, FieldFlags, ModuleId, Origin, StabilityAnnotation};
pub use pool::{DeclId, Pool};
pub use tag::Tag;

pub use weft_ir::TypeId;

//! Type kind tags.

use std::fmt;

/// The kind of type stored at a pool index.
///
/// Payloads (element types, declaration ids, argument lists) are queried
/// through `Pool` accessors; the tag alone is enough for dispatch.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Tag {
    // Primitives (pre-interned)
    Int,
    Float,
    Bool,
    Str,
    Char,
    Unit,

    /// Reserved pre-interned slot; never produced by construction.
    Reserved,

    /// Function/lambda type.
    Function,

    /// Generic type parameter of the enclosing declaration.
    Param,

    /// Known persistent (immutable) collection; stability follows the
    /// element type.
    PersistentList,

    /// Two-element product; stability follows both components.
    Pair,

    /// Deferred/lazy reference wrapper; stability follows the referent.
    Lazy,

    /// Concrete class declaration.
    Class,

    /// Interface or abstract declaration; concrete runtime type unknown.
    Interface,

    /// Generic instantiation of a declared type.
    Applied,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tag::Int => "int",
            Tag::Float => "float",
            Tag::Bool => "bool",
            Tag::Str => "str",
            Tag::Char => "char",
            Tag::Unit => "unit",
            Tag::Reserved => "reserved",
            Tag::Function => "function",
            Tag::Param => "param",
            Tag::PersistentList => "persistent-list",
            Tag::Pair => "pair",
            Tag::Lazy => "lazy",
            Tag::Class => "class",
            Tag::Interface => "interface",
            Tag::Applied => "applied",
        };
        write!(f, "{s}")
    }
}

impl Tag {
    /// Whether this tag denotes a pre-interned primitive.
    #[inline]
    pub const fn is_primitive(self) -> bool {
        matches!(
            self,
            Tag::Int | Tag::Float | Tag::Bool | Tag::Str | Tag::Char | Tag::Unit
        )
    }
}

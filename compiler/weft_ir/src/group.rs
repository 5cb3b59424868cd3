//! Group identities for positional memoization.
//!
//! A *group* is a dynamic-extent region in rewritten control flow. The
//! runtime identifies a group slot by its [`GroupKey`]; two groups at
//! different source positions never share a key, and the same call site
//! keeps its key across re-invocations.

use std::fmt;

/// The kind of a group region.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupKind {
    /// Content may structurally change shape across re-invocations.
    /// Used for single-branch conditionals, call-argument temporaries,
    /// and conditionally evaluated operands.
    Replaceable,
    /// Top of a restartable declaration; supports independent re-invocation
    /// and skipping.
    Restartable,
    /// Identity-keyed; can be relocated rather than rebuilt when its key
    /// persists across a reorder.
    Movable,
    /// Marker-only function boundary for declarations inlined into their
    /// caller. No physical group is emitted, only a lightweight marker
    /// for tooling.
    BoundaryMarker,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Replaceable => write!(f, "replaceable"),
            GroupKind::Restartable => write!(f, "restartable"),
            GroupKind::Movable => write!(f, "movable"),
            GroupKind::BoundaryMarker => write!(f, "boundary-marker"),
        }
    }
}

/// Positional group key.
///
/// Derived from (source file, span start, span end) plus the enclosing
/// declaration's signature shape; see the key assigner in `weft_transform`.
/// The raw value is the runtime slot identity, so it must be deterministic
/// for a given input tree.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct GroupKey(u32);

impl GroupKey {
    /// Create a key from its raw hash value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        GroupKey(raw)
    }

    /// Raw key value as emitted into the rewritten tree.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupKey({:#x})", self.0)
    }
}

/// Slot binding a captured group-stack marker.
///
/// A marker is an opaque runtime token referencing a point in the group
/// stack. `CaptureMarker { slot }` stores the current marker at an inline
/// boundary; `EndToMarker { slot }` unwinds every group opened since that
/// capture in one operation. Slots are numbered per declaration.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct MarkerSlot(u32);

impl MarkerSlot {
    #[inline]
    pub const fn new(index: u32) -> Self {
        MarkerSlot(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for MarkerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkerSlot({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_key_roundtrip() {
        let key = GroupKey::from_raw(0xDEAD_BEEF);
        assert_eq!(key.raw(), 0xDEAD_BEEF);
        assert_eq!(format!("{key:?}"), "GroupKey(0xdeadbeef)");
    }

    #[test]
    fn kind_display() {
        assert_eq!(GroupKind::Movable.to_string(), "movable");
        assert_eq!(GroupKind::BoundaryMarker.to_string(), "boundary-marker");
    }
}

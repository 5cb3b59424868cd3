//! Opaque handle into the type pool.
//!
//! `weft_types` owns the pool; the IR only carries 32-bit handles. The
//! primitive indices below are a fixed contract with the pool, which
//! pre-interns them in this order at creation.

use std::fmt;

/// A 32-bit index into the type pool.
///
/// Types are compared by index equality (O(1)), not structural comparison.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    // === Primitive Types (indices 0-5) ===
    // Pre-interned at pool creation for O(1) access.

    /// The `int` type (64-bit signed integer).
    pub const INT: Self = Self(0);
    /// The `float` type (64-bit floating point).
    pub const FLOAT: Self = Self(1);
    /// The `bool` type.
    pub const BOOL: Self = Self(2);
    /// The `str` type (immutable UTF-8 string).
    pub const STR: Self = Self(3);
    /// The `char` type.
    pub const CHAR: Self = Self(4);
    /// The unit type `()`.
    pub const UNIT: Self = Self(5);

    /// First index for dynamically allocated types.
    pub const FIRST_DYNAMIC: u32 = 16;

    /// Number of pre-interned primitive types.
    pub const PRIMITIVE_COUNT: u32 = 6;

    /// Sentinel value indicating no type / invalid index.
    pub const NONE: Self = Self(u32::MAX);

    /// Create an index from a raw u32 value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Check if this is a pre-interned primitive type.
    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::PRIMITIVE_COUNT
    }

    /// Check if this is a real type index (not the NONE sentinel).
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TypeId::INT => write!(f, "TypeId(int)"),
            TypeId::FLOAT => write!(f, "TypeId(float)"),
            TypeId::BOOL => write!(f, "TypeId(bool)"),
            TypeId::STR => write!(f, "TypeId(str)"),
            TypeId::CHAR => write!(f, "TypeId(char)"),
            TypeId::UNIT => write!(f, "TypeId(unit)"),
            TypeId::NONE => write!(f, "TypeId::NONE"),
            other => write!(f, "TypeId({})", other.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_primitive() {
        assert!(TypeId::INT.is_primitive());
        assert!(TypeId::UNIT.is_primitive());
        assert!(!TypeId::from_raw(TypeId::FIRST_DYNAMIC).is_primitive());
        assert!(!TypeId::NONE.is_primitive());
    }

    #[test]
    fn none_sentinel() {
        assert!(!TypeId::NONE.is_some());
        assert!(TypeId::INT.is_some());
    }
}

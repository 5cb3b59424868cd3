//! Class and field declarations.

use bitflags::bitflags;
use std::fmt;

use weft_ir::{Name, TypeId};

/// Identity of a compilation unit other than the current one.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ModuleId(pub u32);

/// Where a declaration was compiled.
///
/// Declarations from other units cannot have their stability inlined: the
/// current unit cannot assume another unit's ABI-visible stability mask,
/// so inference defers to a per-declaration runtime mask expression.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Origin {
    #[default]
    Current,
    External(ModuleId),
}

impl Origin {
    #[inline]
    pub const fn is_external(self) -> bool {
        matches!(self, Origin::External(_))
    }
}

/// Author-supplied stability override.
///
/// An explicit annotation always wins over field inference, and (by
/// deliberate policy) over cross-module deferral: the annotation is an
/// ABI promise, so the current unit may inline the verdict.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum StabilityAnnotation {
    #[default]
    None,
    Stable,
    Unstable,
}

/// Kind of a declared type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ClassKind {
    /// Concrete class.
    Class,
    /// Interface or abstract class; instances may be any subtype.
    Interface,
    /// Single-field value/inline wrapper.
    ValueClass,
}

bitflags! {
    /// Per-field properties consumed by stability inference.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FieldFlags: u8 {
        /// Read-write accessor. Reassignment happens outside the
        /// retained-state system, so a mutable field is disqualifying on
        /// its own, whatever its type.
        const MUTABLE = 1 << 0;
        /// The property has real storage. Accessor-only properties have
        /// no state the runtime could miss changes on.
        const BACKING_FIELD = 1 << 1;
        /// The property delegates to a holder object; judged by the
        /// delegate holder's type.
        const DELEGATED = 1 << 2;
    }
}

/// A declared property of a class.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FieldDecl {
    pub name: Name,
    pub ty: TypeId,
    pub flags: FieldFlags,
    /// Delegate holder type when `DELEGATED` is set; `TypeId::NONE`
    /// otherwise.
    pub delegate: TypeId,
}

impl FieldDecl {
    /// A constructor-stored immutable property.
    pub fn val(name: Name, ty: TypeId) -> Self {
        FieldDecl {
            name,
            ty,
            flags: FieldFlags::BACKING_FIELD,
            delegate: TypeId::NONE,
        }
    }

    /// A constructor-stored mutable property.
    pub fn var(name: Name, ty: TypeId) -> Self {
        FieldDecl {
            name,
            ty,
            flags: FieldFlags::BACKING_FIELD | FieldFlags::MUTABLE,
            delegate: TypeId::NONE,
        }
    }

    /// An accessor-only property (no storage).
    pub fn accessor(name: Name, ty: TypeId, mutable: bool) -> Self {
        let mut flags = FieldFlags::empty();
        if mutable {
            flags |= FieldFlags::MUTABLE;
        }
        FieldDecl {
            name,
            ty,
            flags,
            delegate: TypeId::NONE,
        }
    }

    /// A property delegating to a holder of type `delegate`.
    pub fn delegated(name: Name, ty: TypeId, delegate: TypeId, mutable: bool) -> Self {
        let mut flags = FieldFlags::BACKING_FIELD | FieldFlags::DELEGATED;
        if mutable {
            flags |= FieldFlags::MUTABLE;
        }
        FieldDecl {
            name,
            ty,
            flags,
            delegate,
        }
    }

    #[inline]
    pub fn is_mutable(&self) -> bool {
        self.flags.contains(FieldFlags::MUTABLE)
    }

    #[inline]
    pub fn has_backing_field(&self) -> bool {
        self.flags.contains(FieldFlags::BACKING_FIELD)
    }

    #[inline]
    pub fn is_delegated(&self) -> bool {
        self.flags.contains(FieldFlags::DELEGATED)
    }
}

/// A class/interface declaration.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ClassDecl {
    pub name: Name,
    pub kind: ClassKind,
    pub origin: Origin,
    pub annotation: StabilityAnnotation,
    /// Generic parameter names, in declaration order.
    pub type_params: Vec<Name>,
    pub fields: Vec<FieldDecl>,
}

impl ClassDecl {
    pub fn new(name: Name, kind: ClassKind) -> Self {
        ClassDecl {
            name,
            kind,
            origin: Origin::Current,
            annotation: StabilityAnnotation::None,
            type_params: Vec::new(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, annotation: StabilityAnnotation) -> Self {
        self.annotation = annotation;
        self
    }

    #[must_use]
    pub fn with_type_params(mut self, params: Vec<Name>) -> Self {
        self.type_params = params;
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Vec<FieldDecl>) -> Self {
        self.fields = fields;
        self
    }

    /// Index of a generic parameter by name.
    pub fn type_param_index(&self, name: Name) -> Option<usize> {
        self.type_params.iter().position(|&p| p == name)
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassKind::Class => write!(f, "class"),
            ClassKind::Interface => write!(f, "interface"),
            ClassKind::ValueClass => write!(f, "value class"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_constructors_set_flags() {
        let v = FieldDecl::val(Name::EMPTY, TypeId::INT);
        assert!(v.has_backing_field());
        assert!(!v.is_mutable());

        let m = FieldDecl::var(Name::EMPTY, TypeId::INT);
        assert!(m.is_mutable());

        let a = FieldDecl::accessor(Name::EMPTY, TypeId::INT, true);
        assert!(!a.has_backing_field());
        assert!(a.is_mutable());

        let d = FieldDecl::delegated(Name::EMPTY, TypeId::INT, TypeId::STR, false);
        assert!(d.is_delegated());
        assert_eq!(d.delegate, TypeId::STR);
    }

    #[test]
    fn origin_externality() {
        assert!(!Origin::Current.is_external());
        assert!(Origin::External(ModuleId(3)).is_external());
    }
}

//! Declaration items: functions, parameters, modules.

use bitflags::bitflags;
use std::fmt;

use crate::{ExprId, Name, Span, TypeId};

/// Identity of a source file, used with spans to form positional group
/// keys.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct SourceId(pub u32);

bitflags! {
    /// Per-function properties consumed by the transform.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FunctionFlags: u8 {
        /// May perform group bookkeeping or read retained state.
        /// Functions without this flag pass through untransformed.
        const REACTIVE = 1 << 0;
        /// Reactive, but must not get an independently re-invocable
        /// boundary; gets a plain replaceable boundary group instead.
        const NON_RESTARTABLE = 1 << 1;
        /// Reads retained state but never writes slots; gets a
        /// marker-only boundary.
        const READ_ONLY = 1 << 2;
        /// Body is spliced into callers; lambda arguments are walked by
        /// the caller's transform and the boundary is marker-only.
        const INLINE = 1 << 3;
    }
}

/// A declared parameter.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Param {
    pub name: Name,
    /// Resolved static type, from the type pool.
    pub ty: TypeId,
    /// Default value expression. `ExprId::INVALID` = required parameter.
    pub default: ExprId,
    pub span: Span,
}

impl Param {
    pub fn new(name: Name, ty: TypeId, span: Span) -> Self {
        Param {
            name,
            ty,
            default: ExprId::INVALID,
            span,
        }
    }

    pub fn with_default(name: Name, ty: TypeId, default: ExprId, span: Span) -> Self {
        Param {
            name,
            ty,
            default,
            span,
        }
    }

    /// Whether callers may omit this parameter.
    #[inline]
    pub fn has_default(&self) -> bool {
        self.default.is_valid()
    }
}

/// A function declaration with its body in the module's arena.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Function {
    pub name: Name,
    pub params: Vec<Param>,
    /// Declared return type. Only unit-returning boundaries support
    /// whole-body skipping.
    pub ret: TypeId,
    pub body: ExprId,
    pub flags: FunctionFlags,
    pub span: Span,
    pub source: SourceId,
}

impl Function {
    /// Whether this function participates in group insertion at all.
    #[inline]
    pub fn is_reactive(&self) -> bool {
        self.flags.contains(FunctionFlags::REACTIVE)
    }

    /// Whether the boundary supports independent re-invocation and
    /// skipping.
    #[inline]
    pub fn is_restartable(&self) -> bool {
        self.is_reactive()
            && !self.flags.intersects(
                FunctionFlags::NON_RESTARTABLE | FunctionFlags::READ_ONLY | FunctionFlags::INLINE,
            )
    }

    /// Whether the boundary is marker-only (no physical group).
    #[inline]
    pub fn is_marker_boundary(&self) -> bool {
        self.flags
            .intersects(FunctionFlags::READ_ONLY | FunctionFlags::INLINE)
    }

    /// Whether any parameter is defaultable.
    pub fn has_defaults(&self) -> bool {
        self.params.iter().any(Param::has_default)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fn {:?}/{} @ {}",
            self.name,
            self.params.len(),
            self.span
        )
    }
}

/// A compilation unit's worth of function declarations sharing one arena.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub source: SourceId,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(source: SourceId) -> Self {
        Module {
            source,
            functions: Vec::new(),
        }
    }

    /// Find a function by name.
    pub fn function(&self, name: Name) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(flags: FunctionFlags) -> Function {
        Function {
            name: Name::EMPTY,
            params: Vec::new(),
            ret: TypeId::UNIT,
            body: ExprId::INVALID,
            flags,
            span: Span::DUMMY,
            source: SourceId(0),
        }
    }

    #[test]
    fn plain_reactive_is_restartable() {
        assert!(func(FunctionFlags::REACTIVE).is_restartable());
    }

    #[test]
    fn non_restartable_keeps_reactive() {
        let f = func(FunctionFlags::REACTIVE | FunctionFlags::NON_RESTARTABLE);
        assert!(f.is_reactive());
        assert!(!f.is_restartable());
        assert!(!f.is_marker_boundary());
    }

    #[test]
    fn read_only_and_inline_are_marker_boundaries() {
        assert!(func(FunctionFlags::REACTIVE | FunctionFlags::READ_ONLY).is_marker_boundary());
        assert!(func(FunctionFlags::REACTIVE | FunctionFlags::INLINE).is_marker_boundary());
        assert!(!func(FunctionFlags::REACTIVE).is_marker_boundary());
    }

    #[test]
    fn non_reactive_is_inert() {
        let f = func(FunctionFlags::empty());
        assert!(!f.is_reactive());
        assert!(!f.is_restartable());
    }
}

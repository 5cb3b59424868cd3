//! Per-class stability masks.
//!
//! Each class gets a mask synthesized once when its declaration is
//! lowered and emitted as a static constant (or an expression combining
//! other classes' masks). Call sites constructing instances of the class
//! query it at load time, which is how cross-module verdicts get
//! resolved without inlining another unit's stability.
//!
//! Bit semantics:
//! - bit 0: the class has certain-unstable fields
//! - bit `1 + i`: stability depends on generic parameter `i`
//!
//! Masks combine across fields and inheritance with bitwise OR, so the
//! synthesis below mirrors `Stability::combine` exactly.

use weft_types::DeclId;

use crate::{Stability, StabilityInferencer};

/// Bit set when a class has certain-unstable fields.
pub const UNSTABLE_BIT: u32 = 1;

/// Bit position of generic parameter 0; parameter `i` uses
/// `PARAM_BIT_BASE + i`.
pub const PARAM_BIT_BASE: u32 = 1;

/// A compile-time or partially-compile-time mask expression.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum MaskExpr {
    /// Fully resolved constant.
    Const(u32),
    /// Depends on generic parameter `i`: the instantiation site ORs in
    /// the argument's resolved mask shifted to parameter position.
    ParamBit(u32),
    /// ORs in another compilation unit's generated mask at load time.
    ExternalMask(DeclId),
    /// Bitwise OR of sub-expressions.
    Or(Vec<MaskExpr>),
}

impl MaskExpr {
    /// The constant value, when no runtime part remains.
    pub fn as_const(&self) -> Option<u32> {
        match self {
            MaskExpr::Const(v) => Some(*v),
            MaskExpr::ParamBit(_) | MaskExpr::ExternalMask(_) => None,
            MaskExpr::Or(parts) => {
                let mut acc = 0;
                for part in parts {
                    acc |= part.as_const()?;
                }
                Some(acc)
            }
        }
    }

    /// Evaluate with resolved parameter and external masks.
    ///
    /// `param_masks[i]` is the resolved mask of generic argument `i`;
    /// `external` resolves a foreign declaration's emitted mask.
    pub fn eval(&self, param_masks: &[u32], external: &dyn Fn(DeclId) -> u32) -> u32 {
        match self {
            MaskExpr::Const(v) => *v,
            MaskExpr::ParamBit(i) => {
                // An unresolved argument is conservatively unstable.
                param_masks.get(*i as usize).copied().unwrap_or(UNSTABLE_BIT)
            }
            MaskExpr::ExternalMask(decl) => external(*decl),
            MaskExpr::Or(parts) => parts
                .iter()
                .fold(0, |acc, part| acc | part.eval(param_masks, external)),
        }
    }

    /// OR two mask expressions, constant-folding where possible.
    #[must_use]
    pub fn or(self, other: MaskExpr) -> MaskExpr {
        match (self, other) {
            (MaskExpr::Const(a), MaskExpr::Const(b)) => MaskExpr::Const(a | b),
            (MaskExpr::Const(0), rhs) => rhs,
            (lhs, MaskExpr::Const(0)) => lhs,
            (MaskExpr::Or(mut parts), rhs) => {
                parts.push(rhs);
                MaskExpr::Or(parts)
            }
            (lhs, rhs) => MaskExpr::Or(vec![lhs, rhs]),
        }
    }
}

/// Synthesize the stability mask for a class declaration.
///
/// Pure function of the declaration's field verdicts; the result is
/// cached by the caller alongside the lowered class.
pub fn class_mask(inferencer: &StabilityInferencer<'_>, decl_id: DeclId) -> MaskExpr {
    let verdict = inferencer.declared_stability(decl_id);
    let decl = inferencer.pool().class_decl(decl_id);
    verdict_mask(&verdict, &|name| {
        decl.type_param_index(name)
            .and_then(|i| u32::try_from(i).ok())
    })
}

fn verdict_mask(verdict: &Stability, param_index: &dyn Fn(weft_ir::Name) -> Option<u32>) -> MaskExpr {
    match verdict {
        Stability::Certain(true) => MaskExpr::Const(0),
        Stability::Certain(false) => MaskExpr::Const(UNSTABLE_BIT),
        // An uncertain concrete type cannot prove stability; the mask is
        // the conservative one.
        Stability::Uncertain(_) => MaskExpr::Const(UNSTABLE_BIT),
        Stability::Parameter(name) => match param_index(*name) {
            Some(i) => MaskExpr::ParamBit(i),
            None => MaskExpr::Const(UNSTABLE_BIT),
        },
        Stability::Runtime(decl) => MaskExpr::ExternalMask(*decl),
        Stability::Combined(parts) => parts
            .iter()
            .map(|part| verdict_mask(part, param_index))
            .fold(MaskExpr::Const(0), MaskExpr::or),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use weft_ir::{Name, TypeId};
    use weft_types::{ClassDecl, ClassKind, FieldDecl, ModuleId, Origin, Pool};

    use super::*;

    fn name(raw: u32) -> Name {
        Name::from_raw(raw)
    }

    #[test]
    fn stable_class_mask_is_zero() {
        let mut pool = Pool::new();
        let decl = ClassDecl::new(name(10), ClassKind::Class)
            .with_fields(vec![FieldDecl::val(name(11), TypeId::INT)]);
        let (decl_id, _) = pool.declare(decl);
        let inf = StabilityInferencer::new(&pool);
        assert_eq!(class_mask(&inf, decl_id).as_const(), Some(0));
    }

    #[test]
    fn unstable_class_mask_sets_bit_zero() {
        let mut pool = Pool::new();
        let decl = ClassDecl::new(name(10), ClassKind::Class)
            .with_fields(vec![FieldDecl::var(name(11), TypeId::INT)]);
        let (decl_id, _) = pool.declare(decl);
        let inf = StabilityInferencer::new(&pool);
        assert_eq!(class_mask(&inf, decl_id).as_const(), Some(UNSTABLE_BIT));
    }

    #[test]
    fn generic_class_mask_references_parameter() {
        let mut pool = Pool::new();
        let t = name(30);
        let t_ty = pool.type_param(0, t);
        let decl = ClassDecl::new(name(10), ClassKind::Class)
            .with_type_params(vec![t])
            .with_fields(vec![FieldDecl::val(name(11), t_ty)]);
        let (decl_id, _) = pool.declare(decl);
        let inf = StabilityInferencer::new(&pool);
        let mask = class_mask(&inf, decl_id);
        assert_eq!(mask, MaskExpr::ParamBit(0));
        assert_eq!(mask.as_const(), None);
        // Instantiated with a stable argument the mask resolves to 0.
        assert_eq!(mask.eval(&[0], &|_| 0), 0);
        // With an unstable argument it resolves to the unstable bit.
        assert_eq!(mask.eval(&[UNSTABLE_BIT], &|_| 0), UNSTABLE_BIT);
    }

    #[test]
    fn external_field_mask_defers_to_foreign_mask() {
        let mut pool = Pool::new();
        let (foreign_id, foreign_ty) = pool.declare(
            ClassDecl::new(name(20), ClassKind::Class).with_origin(Origin::External(ModuleId(1))),
        );
        let decl = ClassDecl::new(name(10), ClassKind::Class)
            .with_fields(vec![FieldDecl::val(name(11), foreign_ty)]);
        let (decl_id, _) = pool.declare(decl);
        let inf = StabilityInferencer::new(&pool);
        let mask = class_mask(&inf, decl_id);
        assert_eq!(mask, MaskExpr::ExternalMask(foreign_id));
        assert_eq!(mask.eval(&[], &|d| u32::from(d == foreign_id)), 1);
    }

    #[test]
    fn or_constant_folds() {
        let folded = MaskExpr::Const(0b10).or(MaskExpr::Const(0b01));
        assert_eq!(folded, MaskExpr::Const(0b11));
        let mixed = MaskExpr::ParamBit(0).or(MaskExpr::Const(UNSTABLE_BIT));
        assert_eq!(mixed.as_const(), None);
        assert_eq!(mixed.eval(&[0], &|_| 0), UNSTABLE_BIT);
    }

    #[test]
    fn missing_param_mask_is_conservative() {
        let mask = MaskExpr::ParamBit(2);
        assert_eq!(mask.eval(&[0], &|_| 0), UNSTABLE_BIT);
    }
}

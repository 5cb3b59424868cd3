//! Group key assignment.
//!
//! Every group gets a positional key derived from its call site's lexical
//! span, disambiguated by the enclosing declaration's signature shape
//! (two generated overloads of one source declaration must not collide)
//! and an ordinal for the rare same-span collision. Keys are the
//! runtime's slot identity: deterministic for a given input tree, unique
//! within a declaration.

use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};

use weft_ir::{Function, GroupKey, SourceId, Span};

/// Hash of a declaration's signature shape: name plus ordered parameter
/// type list. Disambiguates two call sites with identical span text that
/// landed in different generated overloads.
pub fn signature_shape(func: &Function) -> u32 {
    let mut hasher = FxHasher::default();
    func.name.raw().hash(&mut hasher);
    for param in &func.params {
        param.ty.raw().hash(&mut hasher);
        param.has_default().hash(&mut hasher);
    }
    fold_u64(hasher.finish())
}

#[inline]
fn fold_u64(v: u64) -> u32 {
    #[expect(clippy::cast_possible_truncation, reason = "intentional hash fold")]
    let folded = (v ^ (v >> 32)) as u32;
    folded
}

/// Per-declaration key assigner.
pub struct KeyAssigner {
    source: SourceId,
    shape: u32,
    /// Ordinals handed out per base key, for same-span collisions
    /// (multiple calls folded under one synthetic wrapper).
    used: FxHashMap<u32, u32>,
}

impl KeyAssigner {
    pub fn new(source: SourceId, func: &Function) -> Self {
        KeyAssigner {
            source,
            shape: signature_shape(func),
            used: FxHashMap::default(),
        }
    }

    /// Key for the group at `span`.
    ///
    /// The first request for a span gets the base key; subsequent
    /// requests for the same span append an ordinal.
    pub fn group_key(&mut self, span: Span) -> GroupKey {
        let base = self.position_key(span, 0);
        let ordinal = *self.used.get(&base).unwrap_or(&0);
        let key = if ordinal == 0 {
            base
        } else {
            self.position_key(span, ordinal)
        };
        *self.used.entry(base).or_insert(0) += 1;
        GroupKey::from_raw(key)
    }

    fn position_key(&self, span: Span, ordinal: u32) -> u32 {
        let mut hasher = FxHasher::default();
        self.source.0.hash(&mut hasher);
        self.shape.hash(&mut hasher);
        span.start.hash(&mut hasher);
        span.end.hash(&mut hasher);
        ordinal.hash(&mut hasher);
        fold_u64(hasher.finish())
    }
}

/// Order-sensitive, collision-resistant join of two runtime key hashes.
///
/// This is the compile-time analogue of the runtime's key-join operation
/// (the emitted `JoinKey` node): deterministic for the same logical key
/// values even when physical source text shifts.
pub fn join_key_hashes(left: u32, right: u32) -> u32 {
    let mut hasher = FxHasher::default();
    left.hash(&mut hasher);
    right.hash(&mut hasher);
    fold_u64(hasher.finish())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use weft_ir::{ExprId, FunctionFlags, Name, Param, TypeId};

    use super::*;

    fn test_fn(name: u32, params: &[TypeId]) -> Function {
        Function {
            name: Name::from_raw(name),
            params: params
                .iter()
                .enumerate()
                .map(|(i, &ty)| {
                    Param::new(Name::from_raw(100 + u32::try_from(i).unwrap_or(0)), ty, Span::DUMMY)
                })
                .collect(),
            ret: TypeId::UNIT,
            body: ExprId::INVALID,
            flags: FunctionFlags::REACTIVE,
            span: Span::DUMMY,
            source: SourceId(0),
        }
    }

    #[test]
    fn distinct_spans_get_distinct_keys() {
        let func = test_fn(1, &[]);
        let mut keys = KeyAssigner::new(SourceId(0), &func);
        let a = keys.group_key(Span::new(0, 10));
        let b = keys.group_key(Span::new(10, 20));
        assert_ne!(a, b);
    }

    #[test]
    fn same_span_disambiguates_by_ordinal() {
        let func = test_fn(1, &[]);
        let mut keys = KeyAssigner::new(SourceId(0), &func);
        let span = Span::new(5, 25);
        let first = keys.group_key(span);
        let second = keys.group_key(span);
        let third = keys.group_key(span);
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_ne!(first, third);
    }

    #[test]
    fn keys_are_deterministic_across_runs() {
        let func = test_fn(1, &[TypeId::INT]);
        let mut run1 = KeyAssigner::new(SourceId(3), &func);
        let mut run2 = KeyAssigner::new(SourceId(3), &func);
        let span = Span::new(7, 19);
        assert_eq!(run1.group_key(span), run2.group_key(span));
        assert_eq!(run1.group_key(span), run2.group_key(span));
    }

    #[test]
    fn signature_shape_distinguishes_overloads() {
        let unary = test_fn(1, &[TypeId::INT]);
        let binary = test_fn(1, &[TypeId::INT, TypeId::STR]);
        assert_ne!(signature_shape(&unary), signature_shape(&binary));

        let mut keys_a = KeyAssigner::new(SourceId(0), &unary);
        let mut keys_b = KeyAssigner::new(SourceId(0), &binary);
        let span = Span::new(0, 8);
        assert_ne!(keys_a.group_key(span), keys_b.group_key(span));
    }

    #[test]
    fn file_identity_participates() {
        let func = test_fn(1, &[]);
        let mut file_a = KeyAssigner::new(SourceId(1), &func);
        let mut file_b = KeyAssigner::new(SourceId(2), &func);
        let span = Span::new(0, 8);
        assert_ne!(file_a.group_key(span), file_b.group_key(span));
    }

    #[test]
    fn join_is_order_sensitive() {
        assert_ne!(join_key_hashes(1, 2), join_key_hashes(2, 1));
        assert_eq!(join_key_hashes(1, 2), join_key_hashes(1, 2));
    }
}

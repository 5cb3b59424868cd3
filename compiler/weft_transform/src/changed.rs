//! Changed-bitmask encoding.
//!
//! Each restart-eligible declaration grows synthetic trailing integer
//! parameters carrying, per declared parameter, a 2-bit "did this
//! argument change" state. The bit layout is part of the binary contract
//! between independently compiled modules, so it is fixed here and
//! nowhere else:
//!
//! - 15 parameter slots per 32-bit word, packed most-significant-first:
//!   slot `s` occupies bits `30 - 2s .. 32 - 2s`.
//! - Bit 0 of every changed word is the force-recompose flag; bit 1 is
//!   reserved.
//! - Parameters beyond 15 overflow into further trailing words.
//! - Defaulted parameters are tracked in separate trailing words, one bit
//!   per parameter, 31 slots per word: "the caller passed the same value"
//!   and "the caller passed nothing and the default must re-evaluate"
//!   are different facts.
//!
//! Slots are assigned by *declared* parameter order. Lexical argument
//! order at a call site may differ; `CallArg::param` carries the mapping.

use std::fmt;

use weft_ir::{CallArg, ExprArena, ExprId, ExprKind, Function, Span};

/// Parameter slots per 32-bit changed word.
pub const CHANGED_SLOTS_PER_WORD: usize = 15;

/// Parameter slots per 32-bit defaulted word.
pub const DEFAULT_SLOTS_PER_WORD: usize = 31;

/// Bit 0 of every changed word: set by the runtime's re-invocation
/// closure to force a full body execution.
pub const FORCE_RECOMPOSE_BIT: u32 = 1;

/// Per-parameter 2-bit change state.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ParamState {
    /// Nothing is known; a full runtime comparison is required.
    Unknown,
    /// The runtime compared and the value matched the previous one.
    Same,
    /// The runtime compared and the value differs.
    Different,
    /// Statically certain the value can never change (literal argument,
    /// or already guarded by an equivalent check upstream); the callee
    /// may skip even the runtime comparison.
    Static,
}

impl ParamState {
    /// The 2-bit encoding.
    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            ParamState::Unknown => 0b00,
            ParamState::Same => 0b01,
            ParamState::Different => 0b10,
            ParamState::Static => 0b11,
        }
    }

    /// Decode a 2-bit value.
    #[inline]
    pub const fn from_bits(bits: u32) -> ParamState {
        match bits & 0b11 {
            0b01 => ParamState::Same,
            0b10 => ParamState::Different,
            0b11 => ParamState::Static,
            _ => ParamState::Unknown,
        }
    }
}

/// Position of one parameter's 2-bit slot.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParamSlot {
    /// Which trailing changed word.
    pub word: u32,
    /// Left shift of the 2-bit state within the word.
    pub shift: u32,
}

impl ParamSlot {
    /// The 2-bit mask at this slot.
    #[inline]
    pub const fn mask(self) -> u32 {
        0b11 << self.shift
    }

    /// Encode a state into this slot's bits.
    #[inline]
    pub const fn encode(self, state: ParamState) -> u32 {
        state.bits() << self.shift
    }

    /// Decode this slot's state from its word.
    #[inline]
    pub const fn decode(self, word_value: u32) -> ParamState {
        ParamState::from_bits(word_value >> self.shift)
    }
}

/// A call argument binding a parameter outside the callee's declared
/// arity; indicates a marking-phase bug.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct OutOfRangeArg {
    pub param: u16,
    pub arity: usize,
    pub span: Span,
}

impl fmt::Display for OutOfRangeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "call argument binds parameter {} but callee arity is {} (at {})",
            self.param, self.arity, self.span
        )
    }
}

impl std::error::Error for OutOfRangeArg {}

/// Masks computed at one call site, in declared-parameter order.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct CallMasks {
    /// Trailing changed words (always at least one: it carries the force
    /// bit).
    pub changed: Vec<u32>,
    /// Trailing defaulted words; empty when the callee has no defaults.
    pub defaults: Vec<u32>,
}

/// Slot assignment and call-site mask computation for one declaration.
pub struct ChangedEncoder {
    param_count: usize,
    has_defaults: bool,
}

impl ChangedEncoder {
    pub fn new(func: &Function) -> Self {
        ChangedEncoder {
            param_count: func.params.len(),
            has_defaults: func.has_defaults(),
        }
    }

    /// Build directly from arity and defaultability (call-site view of an
    /// external callee).
    pub fn for_signature(param_count: usize, has_defaults: bool) -> Self {
        ChangedEncoder {
            param_count,
            has_defaults,
        }
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// The slot for a declared parameter index.
    pub fn slot(&self, index: usize) -> ParamSlot {
        debug_assert!(index < self.param_count.max(1));
        #[expect(
            clippy::cast_possible_truncation,
            reason = "parameter indices are bounded by u16 arity"
        )]
        let word = (index / CHANGED_SLOTS_PER_WORD) as u32;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "slot-in-word is bounded by CHANGED_SLOTS_PER_WORD"
        )]
        let within = (index % CHANGED_SLOTS_PER_WORD) as u32;
        ParamSlot {
            word,
            shift: 30 - 2 * within,
        }
    }

    /// Number of trailing changed words in the rewritten signature.
    pub fn changed_word_count(&self) -> usize {
        self.param_count.div_ceil(CHANGED_SLOTS_PER_WORD).max(1)
    }

    /// Number of trailing defaulted words in the rewritten signature.
    pub fn default_word_count(&self) -> usize {
        if self.has_defaults {
            self.param_count.div_ceil(DEFAULT_SLOTS_PER_WORD).max(1)
        } else {
            0
        }
    }

    /// Word index and bit for a parameter's defaulted flag.
    pub fn default_slot(&self, index: usize) -> (u32, u32) {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "parameter indices are bounded by u16 arity"
        )]
        let word = (index / DEFAULT_SLOTS_PER_WORD) as u32;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "slot-in-word is bounded by DEFAULT_SLOTS_PER_WORD"
        )]
        let bit = (index % DEFAULT_SLOTS_PER_WORD) as u32;
        (word, 1 << bit)
    }

    /// Compute the masks a call site passes to this callee.
    ///
    /// Static argument expressions get the cheap certainly-same pattern;
    /// everything else stays `Unknown`, which forces the callee's runtime
    /// comparison — unknown is never silently treated as same. Omitted
    /// parameters get their defaulted bit.
    pub fn encode_call(
        &self,
        arena: &ExprArena,
        args: &[CallArg],
        call_span: Span,
    ) -> Result<CallMasks, OutOfRangeArg> {
        let mut masks = CallMasks {
            changed: vec![0; self.changed_word_count()],
            defaults: vec![0; self.default_word_count()],
        };

        let mut provided = vec![false; self.param_count];
        for arg in args {
            let index = usize::from(arg.param);
            if index >= self.param_count {
                return Err(OutOfRangeArg {
                    param: arg.param,
                    arity: self.param_count,
                    span: call_span,
                });
            }
            provided[index] = true;
            if is_static_expr(arena, arg.value) {
                let slot = self.slot(index);
                masks.changed[slot.word as usize] |= slot.encode(ParamState::Static);
            }
            // Dynamic arguments stay Unknown (0b00): the callee compares.
        }

        if !masks.defaults.is_empty() {
            for (index, was_provided) in provided.iter().enumerate() {
                if !was_provided {
                    let (word, bit) = self.default_slot(index);
                    masks.defaults[word as usize] |= bit;
                }
            }
        }

        Ok(masks)
    }
}

/// Whether an argument expression is statically known never to change.
fn is_static_expr(arena: &ExprArena, id: ExprId) -> bool {
    match arena.kind(id) {
        ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Str(_) | ExprKind::Unit => true,
        ExprKind::Unary { operand, .. } => is_static_expr(arena, *operand),
        ExprKind::Binary { op, left, right } => {
            !op.is_short_circuit() && is_static_expr(arena, *left) && is_static_expr(arena, *right)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use weft_ir::{BinaryOp, Name};

    use super::*;

    fn encoder(param_count: usize, has_defaults: bool) -> ChangedEncoder {
        ChangedEncoder::for_signature(param_count, has_defaults)
    }

    // ── Slot math ───────────────────────────────────────────────────

    #[test]
    fn first_slot_is_most_significant() {
        let enc = encoder(3, false);
        let slot = enc.slot(0);
        assert_eq!(slot.word, 0);
        assert_eq!(slot.shift, 30);
        assert_eq!(slot.mask(), 0b11 << 30);
    }

    #[test]
    fn slots_descend_within_a_word() {
        let enc = encoder(15, false);
        assert_eq!(enc.slot(1).shift, 28);
        assert_eq!(enc.slot(14).shift, 2);
        // Bits 1..0 never hold a parameter: bit 0 is the force flag.
        assert_eq!(enc.slot(14).mask() & FORCE_RECOMPOSE_BIT, 0);
    }

    #[test]
    fn sixteenth_param_overflows_into_second_word() {
        let enc = encoder(16, false);
        assert_eq!(enc.slot(14).word, 0);
        let overflow = enc.slot(15);
        assert_eq!(overflow.word, 1);
        assert_eq!(overflow.shift, 30);
        assert_eq!(enc.changed_word_count(), 2);
    }

    #[test]
    fn zero_params_still_carry_one_word() {
        // The word still exists: it carries the force bit.
        assert_eq!(encoder(0, false).changed_word_count(), 1);
    }

    #[test]
    fn state_roundtrip_through_slot() {
        let enc = encoder(30, false);
        for index in [0, 7, 14, 15, 29] {
            let slot = enc.slot(index);
            for state in [
                ParamState::Unknown,
                ParamState::Same,
                ParamState::Different,
                ParamState::Static,
            ] {
                assert_eq!(slot.decode(slot.encode(state)), state);
            }
        }
    }

    #[test]
    fn encoding_is_bit_identical_across_encoders() {
        // The layout is a binary contract: two encoders built from the
        // same signature must agree bit for bit.
        let caller_view = encoder(20, true);
        let callee_view = encoder(20, true);
        for index in 0..20 {
            assert_eq!(caller_view.slot(index), callee_view.slot(index));
            assert_eq!(
                caller_view.default_slot(index),
                callee_view.default_slot(index)
            );
        }
    }

    // ── Default words ───────────────────────────────────────────────

    #[test]
    fn default_words_absent_without_defaults() {
        assert_eq!(encoder(5, false).default_word_count(), 0);
        assert_eq!(encoder(5, true).default_word_count(), 1);
    }

    #[test]
    fn default_slots_pack_31_per_word() {
        let enc = encoder(40, true);
        assert_eq!(enc.default_slot(30), (0, 1 << 30));
        assert_eq!(enc.default_slot(31), (1, 1));
        assert_eq!(enc.default_word_count(), 2);
    }

    // ── Call-site encoding ──────────────────────────────────────────

    #[test]
    fn literal_args_get_static_bits() {
        let mut arena = ExprArena::new();
        let lit = arena.alloc(ExprKind::Int(7), Span::DUMMY);
        let enc = encoder(1, false);
        let masks = enc
            .encode_call(&arena, &[CallArg { param: 0, value: lit }], Span::DUMMY)
            .unwrap_or_default();
        let slot = enc.slot(0);
        assert_eq!(slot.decode(masks.changed[0]), ParamState::Static);
    }

    #[test]
    fn dynamic_args_stay_unknown() {
        let mut arena = ExprArena::new();
        let dynamic = arena.alloc(ExprKind::Ident(Name::from_raw(5)), Span::DUMMY);
        let enc = encoder(1, false);
        let masks = enc
            .encode_call(
                &arena,
                &[CallArg {
                    param: 0,
                    value: dynamic,
                }],
                Span::DUMMY,
            )
            .unwrap_or_default();
        assert_eq!(enc.slot(0).decode(masks.changed[0]), ParamState::Unknown);
    }

    #[test]
    fn folded_literal_expressions_are_static() {
        let mut arena = ExprArena::new();
        let one = arena.alloc(ExprKind::Int(1), Span::DUMMY);
        let two = arena.alloc(ExprKind::Int(2), Span::DUMMY);
        let sum = arena.alloc(
            ExprKind::Binary {
                op: BinaryOp::Add,
                left: one,
                right: two,
            },
            Span::DUMMY,
        );
        let enc = encoder(1, false);
        let masks = enc
            .encode_call(&arena, &[CallArg { param: 0, value: sum }], Span::DUMMY)
            .unwrap_or_default();
        assert_eq!(enc.slot(0).decode(masks.changed[0]), ParamState::Static);
    }

    #[test]
    fn omitted_params_get_defaulted_bits() {
        let mut arena = ExprArena::new();
        let lit = arena.alloc(ExprKind::Int(7), Span::DUMMY);
        let enc = encoder(3, true);
        // Parameter 1 is omitted.
        let masks = enc
            .encode_call(
                &arena,
                &[
                    CallArg { param: 0, value: lit },
                    CallArg { param: 2, value: lit },
                ],
                Span::DUMMY,
            )
            .unwrap_or_default();
        assert_eq!(masks.defaults, vec![0b010]);
        // The omitted parameter's changed state is Unknown, not Same: the
        // default expression must re-evaluate.
        assert_eq!(enc.slot(1).decode(masks.changed[0]), ParamState::Unknown);
    }

    #[test]
    fn lexically_reordered_args_bind_declared_slots() {
        let mut arena = ExprArena::new();
        let lit = arena.alloc(ExprKind::Int(7), Span::DUMMY);
        let dynamic = arena.alloc(ExprKind::Ident(Name::from_raw(5)), Span::DUMMY);
        let enc = encoder(2, false);
        // Lexical order: param 1 first, param 0 second.
        let masks = enc
            .encode_call(
                &arena,
                &[
                    CallArg {
                        param: 1,
                        value: lit,
                    },
                    CallArg {
                        param: 0,
                        value: dynamic,
                    },
                ],
                Span::DUMMY,
            )
            .unwrap_or_default();
        assert_eq!(enc.slot(0).decode(masks.changed[0]), ParamState::Unknown);
        assert_eq!(enc.slot(1).decode(masks.changed[0]), ParamState::Static);
    }

    #[test]
    fn out_of_range_param_is_rejected() {
        let mut arena = ExprArena::new();
        let lit = arena.alloc(ExprKind::Int(7), Span::DUMMY);
        let enc = encoder(1, false);
        let result = enc.encode_call(
            &arena,
            &[CallArg { param: 3, value: lit }],
            Span::new(1, 2),
        );
        let Err(err) = result else {
            panic!("expected out-of-range error");
        };
        assert_eq!(err.param, 3);
        assert_eq!(err.arity, 1);
    }
}

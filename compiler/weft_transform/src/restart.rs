//! Restart/skip boundary planning.
//!
//! Every reactive declaration gets an outer boundary. Which kind depends
//! on the declaration:
//!
//! - **Restart group** — the default: independently re-invocable, and
//!   when every parameter's changed-state says "same", the whole body is
//!   skipped and the prior invocation's group structure replayed.
//! - **Replaceable group** — declarations that must not restart on their
//!   own (explicitly non-restartable, or value-returning: the caller
//!   consumes the result, so only the caller can meaningfully re-run).
//! - **Marker only** — read-only and inline declarations: no physical
//!   group, just lightweight markers for tooling.

use weft_ir::{ExprArena, ExprId, ExprKind, Function, Span, TypeId};
use weft_ir::BinaryOp;

use crate::changed::{ChangedEncoder, ParamState, FORCE_RECOMPOSE_BIT};
use crate::context::TransformContext;

/// Kind of function boundary to emit.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum BoundaryKind {
    Restart,
    Replaceable,
    Marker,
}

/// The boundary decision for one declaration.
#[derive(Copy, Clone, Debug)]
pub(crate) struct BoundaryPlan {
    pub kind: BoundaryKind,
    /// Emit the skip guard. Requires a restart boundary, a unit return,
    /// skipping enabled, and no parameter whose type is certainly
    /// unstable (an unstable value can change without notice, so a skip
    /// decision based on "same reference" would miss updates).
    pub skippable: bool,
}

pub(crate) fn plan_boundary(func: &Function, ctx: &TransformContext<'_>) -> BoundaryPlan {
    if func.is_marker_boundary() {
        return BoundaryPlan {
            kind: BoundaryKind::Marker,
            skippable: false,
        };
    }
    if !func.is_restartable() || func.ret != TypeId::UNIT {
        return BoundaryPlan {
            kind: BoundaryKind::Replaceable,
            skippable: false,
        };
    }
    let comparable = func
        .params
        .iter()
        .all(|param| !ctx.stability.stability_of(param.ty).known_unstable());
    BoundaryPlan {
        kind: BoundaryKind::Restart,
        skippable: ctx.options.skip_enabled && comparable,
    }
}

/// Emit the per-parameter dirty computation.
///
/// For each parameter whose caller-supplied state is `Unknown`, run the
/// runtime comparison and record `Same`/`Different` into the dirty word:
///
/// ```text
/// dirty[w] = changed[w]
/// if changed[w] & mask(i) == Unknown { dirty[w] |= changed(p_i) ? Different : Same }
/// ```
pub(crate) fn emit_dirty_computation(
    out: &mut ExprArena,
    encoder: &ChangedEncoder,
    func: &Function,
    span: Span,
) -> Vec<ExprId> {
    let mut stmts = Vec::new();

    #[expect(
        clippy::cast_possible_truncation,
        reason = "changed word counts are tiny"
    )]
    for word in 0..encoder.changed_word_count() as u8 {
        let initial = out.alloc(ExprKind::ChangedWord { word }, span);
        stmts.push(out.alloc(
            ExprKind::SetDirtyWord {
                word,
                value: initial,
            },
            span,
        ));
    }

    for (index, param) in func.params.iter().enumerate() {
        let slot = encoder.slot(index);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "slot words are bounded by changed_word_count"
        )]
        let word = slot.word as u8;

        // changed[w] & mask == Unknown
        let changed_word = out.alloc(ExprKind::ChangedWord { word }, span);
        let mask = out.alloc(ExprKind::Int(i64::from(slot.mask())), span);
        let masked = out.alloc(
            ExprKind::Binary {
                op: BinaryOp::BitAnd,
                left: changed_word,
                right: mask,
            },
            span,
        );
        let zero = out.alloc(ExprKind::Int(0), span);
        let is_unknown = out.alloc(
            ExprKind::Binary {
                op: BinaryOp::Eq,
                left: masked,
                right: zero,
            },
            span,
        );

        // dirty[w] | (changed(p) ? Different : Same)
        let param_ref = out.alloc(ExprKind::Ident(param.name), span);
        let compare = out.alloc(ExprKind::Changed { value: param_ref }, span);
        let different = out.alloc(
            ExprKind::Int(i64::from(slot.encode(ParamState::Different))),
            span,
        );
        let same = out.alloc(
            ExprKind::Int(i64::from(slot.encode(ParamState::Same))),
            span,
        );
        let picked = out.alloc(
            ExprKind::If {
                cond: compare,
                then_branch: different,
                else_branch: same,
            },
            span,
        );
        let dirty_word = out.alloc(ExprKind::DirtyWord { word }, span);
        let or = out.alloc(
            ExprKind::Binary {
                op: BinaryOp::BitOr,
                left: dirty_word,
                right: picked,
            },
            span,
        );
        let update = out.alloc(ExprKind::SetDirtyWord { word, value: or }, span);

        stmts.push(out.alloc(
            ExprKind::If {
                cond: is_unknown,
                then_branch: update,
                else_branch: ExprId::INVALID,
            },
            span,
        ));
    }

    stmts
}

/// Build the execute condition for the skip guard:
///
/// ```text
/// (dirty[0] & (different-bits | force)) != 0
///     || ... per word ...
///     || !skipping
/// ```
///
/// When it is false, every parameter compared same (or was statically
/// certain) and the scope is skip-eligible, so the body is bypassed via
/// `skipToGroupEnd`.
pub(crate) fn emit_execute_condition(
    out: &mut ExprArena,
    encoder: &ChangedEncoder,
    span: Span,
) -> ExprId {
    let mut cond = ExprId::INVALID;

    #[expect(
        clippy::cast_possible_truncation,
        reason = "changed word counts are tiny"
    )]
    for word in 0..encoder.changed_word_count() as u8 {
        let mut test_mask = FORCE_RECOMPOSE_BIT;
        for index in 0..encoder.param_count() {
            let slot = encoder.slot(index);
            if slot.word == u32::from(word) {
                test_mask |= slot.encode(ParamState::Different);
            }
        }

        let dirty = out.alloc(ExprKind::DirtyWord { word }, span);
        let mask = out.alloc(ExprKind::Int(i64::from(test_mask)), span);
        let masked = out.alloc(
            ExprKind::Binary {
                op: BinaryOp::BitAnd,
                left: dirty,
                right: mask,
            },
            span,
        );
        let zero = out.alloc(ExprKind::Int(0), span);
        let word_dirty = out.alloc(
            ExprKind::Binary {
                op: BinaryOp::Ne,
                left: masked,
                right: zero,
            },
            span,
        );

        cond = if cond.is_valid() {
            out.alloc(
                ExprKind::Binary {
                    op: BinaryOp::Or,
                    left: cond,
                    right: word_dirty,
                },
                span,
            )
        } else {
            word_dirty
        };
    }

    let skipping = out.alloc(ExprKind::Skipping, span);
    let not_skipping = out.alloc(
        ExprKind::Unary {
            op: weft_ir::UnaryOp::Not,
            operand: skipping,
        },
        span,
    );

    if cond.is_valid() {
        out.alloc(
            ExprKind::Binary {
                op: BinaryOp::Or,
                left: cond,
                right: not_skipping,
            },
            span,
        )
    } else {
        not_skipping
    }
}

/// Append the synthetic trailing parameters to a rewritten signature.
pub(crate) fn append_synthetic_params(
    func: &mut Function,
    encoder: &ChangedEncoder,
    ctx: &TransformContext<'_>,
) {
    let span = func.span;
    for word in 0..encoder.changed_word_count() {
        let name = if word == 0 {
            ctx.interner.intern("$changed")
        } else {
            ctx.interner.intern(&format!("$changed{word}"))
        };
        func.params
            .push(weft_ir::Param::new(name, TypeId::INT, span));
    }
    for word in 0..encoder.default_word_count() {
        let name = if word == 0 {
            ctx.interner.intern("$default")
        } else {
            ctx.interner.intern(&format!("$default{word}"))
        };
        func.params
            .push(weft_ir::Param::new(name, TypeId::INT, span));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use weft_ir::{FunctionFlags, Name, Param, SourceId, StringInterner};
    use weft_types::{ClassDecl, ClassKind, FieldDecl, Pool};

    use crate::context::TransformOptions;

    use super::*;

    fn func_with(params: Vec<Param>, ret: TypeId, flags: FunctionFlags) -> Function {
        Function {
            name: Name::from_raw(1),
            params,
            ret,
            body: ExprId::INVALID,
            flags,
            span: Span::DUMMY,
            source: SourceId(0),
        }
    }

    #[test]
    fn plain_reactive_unit_function_is_skippable_restart() {
        let pool = Pool::new();
        let interner = StringInterner::new();
        let ctx = TransformContext::new(&pool, &interner, TransformOptions::default());
        let func = func_with(
            vec![Param::new(Name::from_raw(2), TypeId::INT, Span::DUMMY)],
            TypeId::UNIT,
            FunctionFlags::REACTIVE,
        );
        let plan = plan_boundary(&func, &ctx);
        assert_eq!(plan.kind, BoundaryKind::Restart);
        assert!(plan.skippable);
    }

    #[test]
    fn unstable_param_blocks_skipping_but_not_restart() {
        let mut pool = Pool::new();
        let (_, unstable_ty) = pool.declare(
            ClassDecl::new(Name::from_raw(9), ClassKind::Class)
                .with_fields(vec![FieldDecl::var(Name::from_raw(10), TypeId::INT)]),
        );
        let interner = StringInterner::new();
        let ctx = TransformContext::new(&pool, &interner, TransformOptions::default());
        let func = func_with(
            vec![Param::new(Name::from_raw(2), unstable_ty, Span::DUMMY)],
            TypeId::UNIT,
            FunctionFlags::REACTIVE,
        );
        let plan = plan_boundary(&func, &ctx);
        assert_eq!(plan.kind, BoundaryKind::Restart);
        assert!(!plan.skippable);
    }

    #[test]
    fn value_returning_function_gets_replaceable_boundary() {
        let pool = Pool::new();
        let interner = StringInterner::new();
        let ctx = TransformContext::new(&pool, &interner, TransformOptions::default());
        let func = func_with(Vec::new(), TypeId::INT, FunctionFlags::REACTIVE);
        assert_eq!(plan_boundary(&func, &ctx).kind, BoundaryKind::Replaceable);
    }

    #[test]
    fn read_only_function_gets_marker_boundary() {
        let pool = Pool::new();
        let interner = StringInterner::new();
        let ctx = TransformContext::new(&pool, &interner, TransformOptions::default());
        let func = func_with(
            Vec::new(),
            TypeId::UNIT,
            FunctionFlags::REACTIVE | FunctionFlags::READ_ONLY,
        );
        assert_eq!(plan_boundary(&func, &ctx).kind, BoundaryKind::Marker);
    }

    #[test]
    fn skip_disabled_by_options() {
        let pool = Pool::new();
        let interner = StringInterner::new();
        let options = TransformOptions {
            skip_enabled: false,
            ..TransformOptions::default()
        };
        let ctx = TransformContext::new(&pool, &interner, options);
        let func = func_with(Vec::new(), TypeId::UNIT, FunctionFlags::REACTIVE);
        assert!(!plan_boundary(&func, &ctx).skippable);
    }

    #[test]
    fn synthetic_params_follow_declared_ones() {
        let pool = Pool::new();
        let interner = StringInterner::new();
        let ctx = TransformContext::new(&pool, &interner, TransformOptions::default());
        let mut func = func_with(
            vec![Param::with_default(
                Name::from_raw(2),
                TypeId::INT,
                ExprId::new(0),
                Span::DUMMY,
            )],
            TypeId::UNIT,
            FunctionFlags::REACTIVE,
        );
        let encoder = ChangedEncoder::new(&func);
        append_synthetic_params(&mut func, &encoder, &ctx);
        assert_eq!(func.params.len(), 3);
        assert_eq!(interner.resolve(func.params[1].name), "$changed");
        assert_eq!(interner.resolve(func.params[2].name), "$default");
    }

    #[test]
    fn dirty_computation_covers_every_param() {
        let mut out = ExprArena::new();
        let func = func_with(
            vec![
                Param::new(Name::from_raw(2), TypeId::INT, Span::DUMMY),
                Param::new(Name::from_raw(3), TypeId::STR, Span::DUMMY),
            ],
            TypeId::UNIT,
            FunctionFlags::REACTIVE,
        );
        let encoder = ChangedEncoder::new(&func);
        let stmts = emit_dirty_computation(&mut out, &encoder, &func, Span::DUMMY);
        // One init per word plus one guarded update per parameter.
        assert_eq!(stmts.len(), 1 + 2);
    }

    #[test]
    fn execute_condition_without_params_tests_only_skipping() {
        let mut out = ExprArena::new();
        let func = func_with(Vec::new(), TypeId::UNIT, FunctionFlags::REACTIVE);
        let encoder = ChangedEncoder::new(&func);
        let cond = emit_execute_condition(&mut out, &encoder, Span::DUMMY);
        // One changed word still exists (force bit), so the condition is
        // `word-dirty || !skipping`.
        let ExprKind::Binary { op, .. } = out.kind(cond) else {
            panic!("expected an or-condition");
        };
        assert_eq!(*op, BinaryOp::Or);
    }
}

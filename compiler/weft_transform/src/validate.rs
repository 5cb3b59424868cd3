//! Rewritten-tree validation.
//!
//! Enumerates every control path through a rewritten body and projects
//! the group operations along it onto a stack: no close may underflow or
//! mismatch the open group's kind, `endToMarker` may only unwind to a
//! captured marker, and the stack must be empty at every terminal point
//! (function end and every function-level return).
//!
//! Loops are checked at zero and one iterations: each iteration must be
//! internally balanced, so one unrolling covers all of them. Branches
//! multiply paths; identical intermediate states are merged to keep the
//! enumeration tractable.
//!
//! Also guards the transform's precondition: input trees contain no
//! runtime operations.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use weft_diagnostic::ErrorCode;
use weft_ir::{ExprArena, ExprId, ExprKind, Function, GroupKind, Name};

/// A structural invariant violation found by validation.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
}

impl ValidationError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ValidationError {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Reject input trees that already contain runtime operations.
///
/// Input arenas are shared across a module's declarations and must be
/// free of runtime ops everywhere, so the whole arena is scanned.
pub fn validate_input(arena: &ExprArena, func: &Function) -> Result<(), ValidationError> {
    let _ = func;
    for id in arena.ids() {
        if arena.kind(id).is_runtime_op() {
            return Err(ValidationError::new(
                ErrorCode::W2005,
                format!(
                    "input node {id:?} is a runtime operation: {:?}",
                    arena.kind(id)
                ),
            ));
        }
    }
    Ok(())
}

/// Check the stack-balance invariant over every control path.
pub fn validate_rewritten(arena: &ExprArena, func: &Function) -> Result<(), ValidationError> {
    if !func.body.is_valid() {
        return Ok(());
    }
    let outcomes = walk(arena, func.body, PathState::default())?;
    for (state, flow) in outcomes {
        match flow {
            Flow::Next | Flow::ReturnFn => {
                if !state.stack.is_empty() {
                    return Err(ValidationError::new(
                        ErrorCode::W2002,
                        format!(
                            "control path terminates with {} group(s) still open",
                            state.stack.len()
                        ),
                    ));
                }
            }
            Flow::ReturnLabel(label) => {
                return Err(ValidationError::new(
                    ErrorCode::W2004,
                    format!("labeled return {label:?} escapes the declaration"),
                ));
            }
            Flow::Break | Flow::Continue => {
                return Err(ValidationError::new(
                    ErrorCode::W2004,
                    "break/continue escapes the declaration",
                ));
            }
        }
    }
    Ok(())
}

/// Stack state along one control path.
///
/// Real group stacks stay shallow, so the projection lives inline.
#[derive(Clone, Eq, PartialEq, Default)]
struct PathState {
    stack: SmallVec<[GroupKind; 8]>,
    /// Captured marker slots → stack depth at capture.
    markers: FxHashMap<u32, usize>,
}

/// How a path leaves a node.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Flow {
    Next,
    ReturnFn,
    ReturnLabel(Name),
    Break,
    Continue,
}

type Outcomes = Vec<(PathState, Flow)>;

fn ok_next(state: PathState) -> Result<Outcomes, ValidationError> {
    Ok(vec![(state, Flow::Next)])
}

/// Merge duplicate states so sequential branching stays tractable.
fn dedup(outcomes: Outcomes) -> Outcomes {
    let mut seen: FxHashSet<(Vec<u8>, Vec<(u32, usize)>, u8, u32)> = FxHashSet::default();
    let mut result = Vec::with_capacity(outcomes.len());
    for (state, flow) in outcomes {
        let stack_tags: Vec<u8> = state.stack.iter().map(|kind| kind_tag(*kind)).collect();
        let mut marker_tags: Vec<(u32, usize)> =
            state.markers.iter().map(|(&k, &v)| (k, v)).collect();
        marker_tags.sort_unstable();
        let (flow_tag, flow_name) = match flow {
            Flow::Next => (0u8, 0u32),
            Flow::ReturnFn => (1, 0),
            Flow::ReturnLabel(name) => (2, name.raw()),
            Flow::Break => (3, 0),
            Flow::Continue => (4, 0),
        };
        if seen.insert((stack_tags, marker_tags, flow_tag, flow_name)) {
            result.push((state, flow));
        }
    }
    result
}

fn kind_tag(kind: GroupKind) -> u8 {
    match kind {
        GroupKind::Replaceable => 0,
        GroupKind::Restartable => 1,
        GroupKind::Movable => 2,
        GroupKind::BoundaryMarker => 3,
    }
}

/// Walk statements in sequence, threading every live state.
fn seq(
    arena: &ExprArena,
    ids: &[ExprId],
    start: Outcomes,
) -> Result<Outcomes, ValidationError> {
    let mut states = start;
    for &id in ids {
        let mut next = Vec::new();
        for (state, flow) in states {
            if flow == Flow::Next {
                next.extend(walk(arena, id, state)?);
            } else {
                next.push((state, flow));
            }
        }
        states = dedup(next);
    }
    Ok(states)
}

/// Continue only `Next` states through `f`; pass others through.
fn branch_each(
    states: Outcomes,
    mut f: impl FnMut(PathState) -> Result<Outcomes, ValidationError>,
) -> Result<Outcomes, ValidationError> {
    let mut result = Vec::new();
    for (state, flow) in states {
        if flow == Flow::Next {
            result.extend(f(state)?);
        } else {
            result.push((state, flow));
        }
    }
    Ok(dedup(result))
}

fn pop_expect(
    mut state: PathState,
    expected: GroupKind,
    op: &str,
) -> Result<PathState, ValidationError> {
    match state.stack.pop() {
        Some(kind) if kind == expected => Ok(state),
        Some(kind) => Err(ValidationError::new(
            ErrorCode::W2002,
            format!("{op} closes a {kind} group"),
        )),
        None => Err(ValidationError::new(
            ErrorCode::W2002,
            format!("{op} underflows the group stack"),
        )),
    }
}

fn walk(arena: &ExprArena, id: ExprId, state: PathState) -> Result<Outcomes, ValidationError> {
    crate::stack::ensure_sufficient_stack(|| walk_inner(arena, id, state))
}

fn walk_inner(
    arena: &ExprArena,
    id: ExprId,
    mut state: PathState,
) -> Result<Outcomes, ValidationError> {
    match *arena.kind(id) {
        // Leaves with no stack effect.
        ExprKind::Int(_)
        | ExprKind::Bool(_)
        | ExprKind::Str(_)
        | ExprKind::Unit
        | ExprKind::Ident(_)
        | ExprKind::Skipping
        | ExprKind::ChangedWord { .. }
        | ExprKind::DefaultWord { .. }
        | ExprKind::DirtyWord { .. }
        | ExprKind::SkipToGroupEnd
        | ExprKind::SourceMarkerStart { .. }
        | ExprKind::SourceMarkerEnd => ok_next(state),

        // Group openings.
        ExprKind::StartRestartGroup { .. } => {
            state.stack.push(GroupKind::Restartable);
            ok_next(state)
        }
        ExprKind::StartReplaceableGroup { .. } => {
            state.stack.push(GroupKind::Replaceable);
            ok_next(state)
        }
        ExprKind::StartMovableGroup { identity, .. } => {
            let states = walk(arena, identity, state)?;
            branch_each(states, |mut s| {
                s.stack.push(GroupKind::Movable);
                ok_next(s)
            })
        }

        // Group closings.
        ExprKind::EndRestartGroup { .. } => {
            let state = pop_expect(state, GroupKind::Restartable, "endRestartGroup")?;
            ok_next(state)
        }
        ExprKind::EndReplaceableGroup => {
            let state = pop_expect(state, GroupKind::Replaceable, "endReplaceableGroup")?;
            ok_next(state)
        }
        ExprKind::EndMovableGroup => {
            let state = pop_expect(state, GroupKind::Movable, "endMovableGroup")?;
            ok_next(state)
        }

        // Markers.
        ExprKind::CaptureMarker { slot } => {
            state.markers.insert(slot.raw(), state.stack.len());
            ok_next(state)
        }
        ExprKind::EndToMarker { slot } => {
            let Some(&depth) = state.markers.get(&slot.raw()) else {
                return Err(ValidationError::new(
                    ErrorCode::W2003,
                    format!("endToMarker targets uncaptured {slot:?}"),
                ));
            };
            if depth > state.stack.len() {
                return Err(ValidationError::new(
                    ErrorCode::W2002,
                    format!("endToMarker unwinds below the current stack ({slot:?})"),
                ));
            }
            state.stack.truncate(depth);
            ok_next(state)
        }

        // Plain value plumbing.
        ExprKind::Let { init, .. } => walk(arena, init, state),
        ExprKind::Assign { value, .. } => walk(arena, value, state),
        ExprKind::Unary { operand, .. } => walk(arena, operand, state),
        ExprKind::Changed { value } => walk(arena, value, state),
        ExprKind::SetDirtyWord { value, .. } => walk(arena, value, state),
        ExprKind::JoinKey { left, right } => {
            let states = walk(arena, left, state)?;
            branch_each(states, |s| walk(arena, right, s))
        }

        ExprKind::Block { stmts, result } => {
            let ids = arena.list(stmts).to_vec();
            let states = seq(arena, &ids, vec![(state, Flow::Next)])?;
            if result.is_valid() {
                branch_each(states, |s| walk(arena, result, s))
            } else {
                Ok(states)
            }
        }

        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond_states = walk(arena, cond, state)?;
            branch_each(cond_states, |s| {
                let mut outcomes = walk(arena, then_branch, s.clone())?;
                if else_branch.is_valid() {
                    outcomes.extend(walk(arena, else_branch, s)?);
                } else {
                    outcomes.push((s, Flow::Next));
                }
                Ok(outcomes)
            })
        }

        ExprKind::When { subject, branches } => {
            let states = if subject.is_valid() {
                walk(arena, subject, state)?
            } else {
                vec![(state, Flow::Next)]
            };
            let branch_list = arena.when_branches(branches).to_vec();
            branch_each(states, |s| walk_when_branches(arena, &branch_list, s))
        }

        ExprKind::For { iter, body, .. } => {
            let states = walk(arena, iter, state)?;
            branch_each(states, |s| {
                let mut outcomes = vec![(s.clone(), Flow::Next)]; // zero iterations
                outcomes.extend(loop_once(arena, body, s)?);
                Ok(outcomes)
            })
        }

        ExprKind::While { cond, body } => {
            let states = walk(arena, cond, state)?;
            branch_each(states, |s| {
                let mut outcomes = vec![(s.clone(), Flow::Next)]; // condition false
                outcomes.extend(loop_once(arena, body, s)?);
                Ok(outcomes)
            })
        }

        ExprKind::Binary { op, left, right } => {
            let left_states = walk(arena, left, state)?;
            branch_each(left_states, |s| {
                let mut outcomes = walk(arena, right, s.clone())?;
                if op.is_short_circuit() {
                    outcomes.push((s, Flow::Next)); // right skipped
                }
                Ok(outcomes)
            })
        }

        ExprKind::SafeCall { receiver, args, .. } => {
            let arg_ids: Vec<ExprId> = arena.call_args(args).iter().map(|a| a.value).collect();
            let states = walk(arena, receiver, state)?;
            branch_each(states, |s| {
                let mut outcomes = seq(arena, &arg_ids, vec![(s.clone(), Flow::Next)])?;
                outcomes.push((s, Flow::Next)); // null receiver: call skipped
                Ok(outcomes)
            })
        }

        ExprKind::Elvis { primary, fallback } => {
            let states = walk(arena, primary, state)?;
            branch_each(states, |s| {
                let mut outcomes = walk(arena, fallback, s.clone())?;
                outcomes.push((s, Flow::Next)); // primary non-null
                Ok(outcomes)
            })
        }

        ExprKind::Call { args, .. } => {
            let arg_ids: Vec<ExprId> = arena.call_args(args).iter().map(|a| a.value).collect();
            seq(arena, &arg_ids, vec![(state, Flow::Next)])
        }

        // Deferred lambdas run elsewhere, under their own boundary.
        ExprKind::Lambda { .. } => ok_next(state),

        ExprKind::InlineLambda { label, body } => {
            // The callee may invoke the lambda zero or more times; one
            // invocation plus the skip path covers stack balance.
            let mut outcomes = vec![(state.clone(), Flow::Next)];
            for (s, flow) in walk(arena, body, state)? {
                let flow = match flow {
                    Flow::ReturnLabel(l) if l == label => Flow::Next,
                    other => other,
                };
                outcomes.push((s, flow));
            }
            Ok(dedup(outcomes))
        }

        ExprKind::KeyedBlock { keys, body } => {
            let key_ids = arena.list(keys).to_vec();
            let states = seq(arena, &key_ids, vec![(state, Flow::Next)])?;
            branch_each(states, |s| walk(arena, body, s))
        }

        ExprKind::Return { value, label } => {
            let states = if value.is_valid() {
                walk(arena, value, state)?
            } else {
                vec![(state, Flow::Next)]
            };
            Ok(states
                .into_iter()
                .map(|(s, _)| {
                    let flow = if label.is_empty() {
                        Flow::ReturnFn
                    } else {
                        Flow::ReturnLabel(label)
                    };
                    (s, flow)
                })
                .collect())
        }

        ExprKind::Break => Ok(vec![(state, Flow::Break)]),
        ExprKind::Continue => Ok(vec![(state, Flow::Continue)]),
    }
}

/// One loop-body execution: break/continue resolve at the loop edge.
fn loop_once(
    arena: &ExprArena,
    body: ExprId,
    state: PathState,
) -> Result<Outcomes, ValidationError> {
    let outcomes = walk(arena, body, state)?;
    Ok(outcomes
        .into_iter()
        .map(|(s, flow)| {
            let flow = match flow {
                Flow::Break | Flow::Continue | Flow::Next => Flow::Next,
                other => other,
            };
            (s, flow)
        })
        .collect())
}

/// Branch conditions evaluate in order; each may short-circuit into its
/// body or fall through to the next condition.
fn walk_when_branches(
    arena: &ExprArena,
    branches: &[weft_ir::WhenBranch],
    state: PathState,
) -> Result<Outcomes, ValidationError> {
    let Some((first, rest)) = branches.split_first() else {
        // No branch matched.
        return ok_next(state);
    };

    if first.condition.is_valid() {
        let cond_states = walk(arena, first.condition, state)?;
        branch_each(cond_states, |s| {
            let mut outcomes = walk(arena, first.body, s.clone())?;
            outcomes.extend(walk_when_branches(arena, rest, s)?);
            Ok(outcomes)
        })
    } else {
        // `else` branch always matches.
        walk(arena, first.body, state)
    }
}

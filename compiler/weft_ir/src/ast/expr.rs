//! Expression nodes.
//!
//! One `ExprKind` covers both vocabularies the transform deals in:
//!
//! - **Source constructs** — what the front end hands us: literals,
//!   bindings, control flow, calls (with the per-call eligibility mark),
//!   inline lambdas, keyed blocks, early exits.
//! - **Runtime operations** — what the transform emits: group start/end
//!   calls, marker capture/unwind, skip guards, and the
//!   equality-memoization primitive.
//!
//! Input trees must not contain runtime operations; the transform's
//! validator rejects them. Keeping both in one enum lets the rewriter
//! produce "the same tree with group operations inserted" without a
//! parallel node hierarchy.

use std::fmt;
use std::hash::{Hash, Hasher};

use super::operators::{BinaryOp, UnaryOp};
use crate::{ArgRange, BranchRange, ExprId, ExprRange, GroupKey, MarkerSlot, Name, Span};

/// Expression node.
#[derive(Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.span.hash(state);
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {:?}", self.kind, self.span)
    }
}

/// A single call argument.
///
/// `param` is the index of the parameter this argument binds in the
/// callee's *declared* order. Arguments may appear in a different lexical
/// order at the call site (named-argument reordering); the changed-mask
/// encoder assigns bits by declared order, so the mapping is kept per
/// argument rather than assumed positional. A parameter with no argument
/// entry at all was defaulted by the caller.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct CallArg {
    /// Declared parameter index in the callee signature.
    pub param: u16,
    /// The argument expression.
    pub value: ExprId,
}

/// One branch of a `when` construct.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct WhenBranch {
    /// Branch condition. `ExprId::INVALID` marks the `else` branch.
    pub condition: ExprId,
    /// Branch body.
    pub body: ExprId,
}

impl WhenBranch {
    /// Whether this is the unconditional `else` branch.
    #[inline]
    pub fn is_else(&self) -> bool {
        !self.condition.is_valid()
    }
}

/// Expression variants.
///
/// All children are indices, not boxes.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    // ── Source constructs ───────────────────────────────────────────
    /// Integer literal: 42
    Int(i64),

    /// Boolean literal: true, false
    Bool(bool),

    /// String literal (interned)
    Str(Name),

    /// Unit: ()
    Unit,

    /// Variable reference
    Ident(Name),

    /// Local binding: let name = init
    Let { name: Name, init: ExprId },

    /// Reassignment of a local: name = value
    Assign { target: Name, value: ExprId },

    /// Block: { stmts; result }
    Block {
        stmts: ExprRange,
        /// `ExprId::INVALID` = no result (unit block).
        result: ExprId,
    },

    /// Conditional: if cond then t else e
    If {
        cond: ExprId,
        then_branch: ExprId,
        /// `ExprId::INVALID` = no else branch.
        else_branch: ExprId,
    },

    /// Multi-branch conditional: when (subject) { branches }
    When {
        /// `ExprId::INVALID` = subject-less form.
        subject: ExprId,
        branches: BranchRange,
    },

    /// For loop: for binding in iter { body }
    For {
        binding: Name,
        iter: ExprId,
        body: ExprId,
    },

    /// While loop: while cond { body }
    While { cond: ExprId, body: ExprId },

    /// Binary operation: left op right
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },

    /// Unary operation: op operand
    Unary { op: UnaryOp, operand: ExprId },

    /// Null-safe method call: receiver?.method(args).
    /// The call evaluates only when the receiver is non-null.
    SafeCall {
        receiver: ExprId,
        method: Name,
        args: ArgRange,
    },

    /// Null-coalescing fallback: primary ?: fallback.
    /// The fallback evaluates only when the primary is null.
    Elvis { primary: ExprId, fallback: ExprId },

    /// Function call. `reactive` is the eligibility mark supplied by the
    /// front end: the callee may itself perform group bookkeeping or read
    /// retained state.
    Call {
        target: Name,
        args: ArgRange,
        reactive: bool,
    },

    /// Deferred lambda value. Opaque to group insertion: the body runs
    /// whenever the value is invoked, under its own boundary.
    Lambda { body: ExprId },

    /// Lambda argument to an inline callee. The body is spliced into the
    /// caller at invocation sites, so group insertion walks into it, and
    /// labeled early exits can cross it (non-local return).
    InlineLambda { label: Name, body: ExprId },

    /// Explicitly keyed block: key(k0, k1, ...) { body }.
    /// Always emits a movable group whose runtime identity joins the keys.
    KeyedBlock { keys: ExprRange, body: ExprId },

    /// Early return. `label` targets an inline lambda (`Name::EMPTY` =
    /// the enclosing function).
    Return {
        /// `ExprId::INVALID` = unit return.
        value: ExprId,
        label: Name,
    },

    /// Break out of the innermost loop.
    Break,

    /// Continue the innermost loop.
    Continue,

    // ── Runtime operations (emitted by the transform) ───────────────
    /// Open the restart group at a restartable function boundary.
    StartRestartGroup { key: GroupKey },

    /// Close the restart group. `restart` registers a re-invocation
    /// closure for this declaration with the runtime.
    EndRestartGroup { restart: bool },

    /// Open a replaceable group.
    StartReplaceableGroup { key: GroupKey },

    /// Close a replaceable group.
    EndReplaceableGroup,

    /// Open a movable group. `identity` is the runtime key value used by
    /// relocation.
    StartMovableGroup { key: GroupKey, identity: ExprId },

    /// Close a movable group.
    EndMovableGroup,

    /// Marker-only boundary start for declarations inlined into their
    /// caller. No physical group.
    SourceMarkerStart { key: GroupKey },

    /// Marker-only boundary end.
    SourceMarkerEnd,

    /// Capture the current group-stack marker into a slot.
    CaptureMarker { slot: MarkerSlot },

    /// Unwind every group opened since the slot's capture, in one
    /// operation.
    EndToMarker { slot: MarkerSlot },

    /// Fast-forward to the enclosing group's end, replaying the prior
    /// invocation's group structure.
    SkipToGroupEnd,

    /// Runtime equality-memoization primitive: true iff `value` differs
    /// from the value recorded in this slot last invocation.
    Changed { value: ExprId },

    /// Whether the current scope is in skip-eligible state.
    Skipping,

    /// Order-sensitive combination of two runtime key values.
    JoinKey { left: ExprId, right: ExprId },

    /// Read of a synthetic trailing changed-bits parameter word.
    ChangedWord { word: u8 },

    /// Read of a synthetic trailing defaulted-bits parameter word.
    DefaultWord { word: u8 },

    /// Read of a per-invocation dirty-bits local word.
    DirtyWord { word: u8 },

    /// Write of a per-invocation dirty-bits local word.
    SetDirtyWord { word: u8, value: ExprId },
}

impl ExprKind {
    /// Whether this node is a runtime operation emitted by the transform.
    ///
    /// Input trees must never contain these.
    pub const fn is_runtime_op(&self) -> bool {
        matches!(
            self,
            ExprKind::StartRestartGroup { .. }
                | ExprKind::EndRestartGroup { .. }
                | ExprKind::StartReplaceableGroup { .. }
                | ExprKind::EndReplaceableGroup
                | ExprKind::StartMovableGroup { .. }
                | ExprKind::EndMovableGroup
                | ExprKind::SourceMarkerStart { .. }
                | ExprKind::SourceMarkerEnd
                | ExprKind::CaptureMarker { .. }
                | ExprKind::EndToMarker { .. }
                | ExprKind::SkipToGroupEnd
                | ExprKind::Changed { .. }
                | ExprKind::Skipping
                | ExprKind::JoinKey { .. }
                | ExprKind::ChangedWord { .. }
                | ExprKind::DefaultWord { .. }
                | ExprKind::DirtyWord { .. }
                | ExprKind::SetDirtyWord { .. }
        )
    }

    /// Whether this node opens a group on the runtime stack.
    pub const fn opens_group(&self) -> bool {
        matches!(
            self,
            ExprKind::StartRestartGroup { .. }
                | ExprKind::StartReplaceableGroup { .. }
                | ExprKind::StartMovableGroup { .. }
        )
    }

    /// Whether this node closes a group on the runtime stack.
    pub const fn closes_group(&self) -> bool {
        matches!(
            self,
            ExprKind::EndRestartGroup { .. }
                | ExprKind::EndReplaceableGroup
                | ExprKind::EndMovableGroup
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_op_classification() {
        assert!(ExprKind::SkipToGroupEnd.is_runtime_op());
        assert!(ExprKind::EndReplaceableGroup.is_runtime_op());
        assert!(!ExprKind::Unit.is_runtime_op());
        assert!(!ExprKind::Break.is_runtime_op());
    }

    #[test]
    fn group_stack_classification() {
        let start = ExprKind::StartReplaceableGroup {
            key: GroupKey::from_raw(1),
        };
        assert!(start.opens_group());
        assert!(!start.closes_group());
        assert!(ExprKind::EndMovableGroup.closes_group());
        // Marker boundaries are not physical groups.
        assert!(!ExprKind::SourceMarkerEnd.closes_group());
    }

    #[test]
    fn when_branch_else_detection() {
        let arm = WhenBranch {
            condition: ExprId::INVALID,
            body: ExprId::new(0),
        };
        assert!(arm.is_else());
    }
}

//! Flat expression arena.
//!
//! Nodes live in one contiguous vector; child lists, call arguments, and
//! `when` branches live in flattened side tables referenced by ranges.
//! The transform reads one arena and builds another of the same shape.

use crate::ast::{CallArg, Expr, ExprKind, WhenBranch};
use crate::{ArgRange, BranchRange, ExprId, ExprRange, Span};

/// Arena of expressions plus flattened child storage.
///
/// Equality is structural over all storage; the determinism guarantee
/// ("same input, byte-identical output") is asserted through it.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ExprArena {
    exprs: Vec<Expr>,
    expr_lists: Vec<ExprId>,
    args: Vec<CallArg>,
    branches: Vec<WhenBranch>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of expression nodes.
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Allocate a node.
    ///
    /// # Panics
    /// Panics if the arena exceeds `u32::MAX` nodes.
    pub fn alloc(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let index = u32::try_from(self.exprs.len()).unwrap_or_else(|_| {
            panic!("expression arena exceeded u32::MAX nodes");
        });
        self.exprs.push(Expr::new(kind, span));
        ExprId::new(index)
    }

    /// Flatten a child list into the side table.
    ///
    /// # Panics
    /// Panics if the list exceeds `u16::MAX` entries or the side table
    /// exceeds `u32::MAX`.
    pub fn alloc_list(&mut self, ids: &[ExprId]) -> ExprRange {
        if ids.is_empty() {
            return ExprRange::EMPTY;
        }
        let start = u32::try_from(self.expr_lists.len()).unwrap_or_else(|_| {
            panic!("expression list table exceeded u32::MAX entries");
        });
        let len = u16::try_from(ids.len()).unwrap_or_else(|_| {
            panic!("expression list exceeded u16::MAX entries");
        });
        self.expr_lists.extend_from_slice(ids);
        ExprRange::new(start, len)
    }

    /// Flatten a call-argument list into the side table.
    pub fn alloc_args(&mut self, args: &[CallArg]) -> ArgRange {
        if args.is_empty() {
            return ArgRange::EMPTY;
        }
        let start = u32::try_from(self.args.len()).unwrap_or_else(|_| {
            panic!("argument table exceeded u32::MAX entries");
        });
        let len = u16::try_from(args.len()).unwrap_or_else(|_| {
            panic!("argument list exceeded u16::MAX entries");
        });
        self.args.extend_from_slice(args);
        ArgRange::new(start, len)
    }

    /// Flatten a `when` branch list into the side table.
    pub fn alloc_branches(&mut self, branches: &[WhenBranch]) -> BranchRange {
        if branches.is_empty() {
            return BranchRange::EMPTY;
        }
        let start = u32::try_from(self.branches.len()).unwrap_or_else(|_| {
            panic!("branch table exceeded u32::MAX entries");
        });
        let len = u16::try_from(branches.len()).unwrap_or_else(|_| {
            panic!("branch list exceeded u16::MAX entries");
        });
        self.branches.extend_from_slice(branches);
        BranchRange::new(start, len)
    }

    /// Get a node.
    ///
    /// # Panics
    /// Panics on an out-of-bounds or INVALID id; ids are only produced by
    /// `alloc` on this arena.
    #[inline]
    pub fn get(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    /// Get a node's kind.
    #[inline]
    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.exprs[id.index()].kind
    }

    /// Get a node's span.
    #[inline]
    pub fn span(&self, id: ExprId) -> Span {
        self.exprs[id.index()].span
    }

    /// Resolve an expression list range.
    #[inline]
    pub fn list(&self, range: ExprRange) -> &[ExprId] {
        &self.expr_lists[range.start as usize..range.start as usize + range.len()]
    }

    /// Resolve an argument range.
    #[inline]
    pub fn call_args(&self, range: ArgRange) -> &[CallArg] {
        &self.args[range.start as usize..range.start as usize + range.len()]
    }

    /// Resolve a branch range.
    #[inline]
    pub fn when_branches(&self, range: BranchRange) -> &[WhenBranch] {
        &self.branches[range.start as usize..range.start as usize + range.len()]
    }

    /// Iterate over all node ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = ExprId> {
        // Arena indices always fit u32 by alloc's guard.
        let len = u32::try_from(self.exprs.len()).unwrap_or(u32::MAX);
        (0..len).map(ExprId::new)
    }
}

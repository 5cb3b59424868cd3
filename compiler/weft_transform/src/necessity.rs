//! Group-necessity classification.
//!
//! Bottom-up pass over one declaration's body deciding, per control
//! construct, which of three cases applies:
//!
//! - *no group needed*: the number of eligible sub-invocations is
//!   statically fixed (exactly 0 or exactly 1 on every path), or each
//!   call's own per-call bookkeeping already accounts for it;
//! - *group around the construct as a whole*: the construct's outer call
//!   count is fixed but execution inside it varies (single call-bearing
//!   branch, loops, conditionally evaluated operands);
//! - *group per branch*: two or more branches carry eligible calls, so
//!   wrapping each branch keeps every path's group shape fixed without a
//!   coarser dynamic group.
//!
//! The classification is recomputed per construct; nothing is inherited
//! from the parent. Whether an "around" group is physically realized is
//! the rewriter's decision (a construct in tail position of its enclosing
//! group needs no realization — the enclosing group suffices).

use rustc_hash::{FxHashMap, FxHashSet};

use weft_ir::{ExprArena, ExprId, ExprKind, Function, Name};

/// Group requirement for one construct.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Necessity {
    /// One group around the construct as a whole. Elidable in tail
    /// position of the enclosing realized group.
    pub around: bool,
    /// One group around each branch body (including call-free branches,
    /// which get an empty group to keep the slot shape fixed).
    pub per_branch: bool,
}

/// Classification results for one declaration body.
#[derive(Debug, Default)]
pub struct Analysis {
    /// Nodes whose subtree contains eligible content (an eligible call or
    /// a keyed block), not crossing deferred-lambda boundaries.
    has_calls: FxHashSet<ExprId>,
    /// Per-construct group requirements.
    necessity: FxHashMap<ExprId, Necessity>,
    /// Conditionally evaluated chain conditions that need their own
    /// replaceable group (second and later conditions of an if/when
    /// chain containing eligible calls).
    cond_groups: FxHashSet<ExprId>,
    /// Call arguments that need their own replaceable group (two or more
    /// sibling arguments of one call carry eligible calls).
    arg_groups: FxHashSet<ExprId>,
    /// Inline lambdas that are the target of a non-local exit from a
    /// deeper inline level; their boundary must capture a marker.
    marker_lambdas: FxHashSet<ExprId>,
    /// A non-local exit targets the function boundary from inside an
    /// inline lambda; the boundary must capture a marker.
    function_needs_marker: bool,
}

impl Analysis {
    #[inline]
    pub fn has_calls(&self, id: ExprId) -> bool {
        self.has_calls.contains(&id)
    }

    #[inline]
    pub fn necessity(&self, id: ExprId) -> Necessity {
        self.necessity.get(&id).copied().unwrap_or_default()
    }

    #[inline]
    pub fn needs_cond_group(&self, id: ExprId) -> bool {
        self.cond_groups.contains(&id)
    }

    #[inline]
    pub fn needs_arg_group(&self, id: ExprId) -> bool {
        self.arg_groups.contains(&id)
    }

    #[inline]
    pub fn lambda_needs_marker(&self, id: ExprId) -> bool {
        self.marker_lambdas.contains(&id)
    }

    #[inline]
    pub fn function_needs_marker(&self) -> bool {
        self.function_needs_marker
    }
}

/// Classify every construct in a function body.
pub fn analyze(arena: &ExprArena, func: &Function) -> Analysis {
    let mut analysis = Analysis::default();
    if func.body.is_valid() {
        let mut walker = Walker {
            arena,
            analysis: &mut analysis,
            lambda_stack: Vec::new(),
        };
        walker.walk(func.body);
    }
    analysis
}

struct Walker<'a> {
    arena: &'a ExprArena,
    analysis: &'a mut Analysis,
    /// Inline-lambda labels currently open, innermost last.
    lambda_stack: Vec<(Name, ExprId)>,
}

impl Walker<'_> {
    /// Walk a node; returns whether its subtree contains eligible
    /// content.
    fn walk(&mut self, id: ExprId) -> bool {
        let has = crate::stack::ensure_sufficient_stack(|| self.walk_inner(id));
        if has {
            self.analysis.has_calls.insert(id);
        }
        has
    }

    fn walk_inner(&mut self, id: ExprId) -> bool {
        match *self.arena.kind(id) {
            ExprKind::Int(_)
            | ExprKind::Bool(_)
            | ExprKind::Str(_)
            | ExprKind::Unit
            | ExprKind::Ident(_)
            | ExprKind::Break
            | ExprKind::Continue => false,

            ExprKind::Let { init, .. } | ExprKind::Assign { value: init, .. } => {
                self.walk(init)
            }

            ExprKind::Block { stmts, result } => {
                let mut has = false;
                for &stmt in self.arena.list(stmts) {
                    has |= self.walk(stmt);
                }
                if result.is_valid() {
                    has |= self.walk(result);
                }
                has
            }

            ExprKind::If { .. } => self.walk_if_chain(id),

            ExprKind::When { subject, branches } => {
                let mut has = false;
                if subject.is_valid() {
                    // The subject is evaluated unconditionally before any
                    // branch; its calls need no group of their own.
                    has |= self.walk(subject);
                }
                let mut chain_dynamic = false;
                let mut call_conds = Vec::new();
                let mut call_branches = 0usize;
                for (index, branch) in self.arena.when_branches(branches).iter().enumerate() {
                    if branch.condition.is_valid() {
                        let cond_has = self.walk(branch.condition);
                        has |= cond_has;
                        if cond_has {
                            call_conds.push(branch.condition);
                            // Only the first condition is evaluated
                            // unconditionally; any later one makes the
                            // chain dynamic.
                            if index > 0 {
                                chain_dynamic = true;
                            }
                        }
                    }
                    let body_has = self.walk(branch.body);
                    has |= body_has;
                    if body_has {
                        call_branches += 1;
                    }
                }
                // Once the chain is dynamic, every call-bearing
                // condition needs its own group to keep slot identity,
                // the first included.
                if chain_dynamic {
                    self.analysis.cond_groups.extend(call_conds);
                }
                self.classify_branches(id, chain_dynamic, call_branches);
                has
            }

            ExprKind::For { iter, body, .. } => {
                // The iterable is evaluated exactly once; only the body
                // repeats.
                let iter_has = self.walk(iter);
                let body_has = self.walk(body);
                if body_has {
                    self.analysis.necessity.insert(
                        id,
                        Necessity {
                            around: true,
                            per_branch: false,
                        },
                    );
                }
                iter_has || body_has
            }

            ExprKind::While { cond, body } => {
                // The condition re-runs per iteration, so calls in it are
                // just as dynamic as calls in the body.
                let cond_has = self.walk(cond);
                let body_has = self.walk(body);
                if cond_has || body_has {
                    self.analysis.necessity.insert(
                        id,
                        Necessity {
                            around: true,
                            per_branch: false,
                        },
                    );
                }
                cond_has || body_has
            }

            ExprKind::Binary { op, left, right } => {
                let left_has = self.walk(left);
                let right_has = self.walk(right);
                // The right operand of a short-circuit operator is
                // conditionally evaluated.
                if op.is_short_circuit() && right_has {
                    self.analysis.necessity.insert(
                        id,
                        Necessity {
                            around: true,
                            per_branch: false,
                        },
                    );
                }
                left_has || right_has
            }

            ExprKind::Unary { operand, .. } => self.walk(operand),

            ExprKind::SafeCall {
                receiver,
                args,
                ..
            } => {
                // The receiver always evaluates; the call itself is
                // conditional on it being non-null.
                let receiver_has = self.walk(receiver);
                let mut conditional_has = false;
                for arg in self.arena.call_args(args) {
                    conditional_has |= self.walk(arg.value);
                }
                if conditional_has {
                    self.analysis.necessity.insert(
                        id,
                        Necessity {
                            around: true,
                            per_branch: false,
                        },
                    );
                }
                receiver_has || conditional_has
            }

            ExprKind::Elvis { primary, fallback } => {
                let primary_has = self.walk(primary);
                let fallback_has = self.walk(fallback);
                if fallback_has {
                    self.analysis.necessity.insert(
                        id,
                        Necessity {
                            around: true,
                            per_branch: false,
                        },
                    );
                }
                primary_has || fallback_has
            }

            ExprKind::Call { args, reactive, .. } => {
                let arg_ids: Vec<ExprId> =
                    self.arena.call_args(args).iter().map(|a| a.value).collect();
                let mut call_args = Vec::new();
                for arg in arg_ids {
                    if self.walk(arg) {
                        call_args.push(arg);
                    }
                }
                // Two or more call-bearing sibling arguments each get
                // their own group, keeping per-argument memoization keys
                // independent of sibling branching.
                if call_args.len() >= 2 {
                    self.analysis.arg_groups.extend(call_args.iter().copied());
                }
                reactive || !call_args.is_empty()
            }

            // Deferred lambdas run under their own boundary whenever the
            // value is invoked; nothing here executes at this call site.
            ExprKind::Lambda { .. } => false,

            ExprKind::InlineLambda { label, body } => {
                self.lambda_stack.push((label, id));
                let has = self.walk(body);
                self.lambda_stack.pop();
                has
            }

            ExprKind::KeyedBlock { keys, body } => {
                for &key in self.arena.list(keys) {
                    self.walk(key);
                }
                self.walk(body);
                // A keyed block always emits a movable group, whatever
                // its call count.
                true
            }

            ExprKind::Return { value, label } => {
                if value.is_valid() {
                    self.walk(value);
                }
                self.record_exit_target(label);
                false
            }

            // Runtime ops never appear in input trees; the validator
            // rejects them before analysis. Treat defensively as inert.
            _ => false,
        }
    }

    /// Walk an if/else-if chain from its head. Nested else-if links are
    /// consumed here, so `walk` only ever sees chain heads.
    fn walk_if_chain(&mut self, head: ExprId) -> bool {
        let mut has = false;
        let mut chain_dynamic = false;
        let mut call_conds = Vec::new();
        let mut call_branches = 0usize;
        let mut link = head;
        let mut first = true;

        loop {
            let ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } = *self.arena.kind(link)
            else {
                break;
            };

            let cond_has = self.walk(cond);
            has |= cond_has;
            if cond_has {
                call_conds.push(cond);
                // The first condition runs unconditionally; any later
                // one only when every earlier condition was false.
                if !first {
                    chain_dynamic = true;
                }
            }
            first = false;

            let then_has = self.walk(then_branch);
            has |= then_has;
            if then_has {
                call_branches += 1;
            }

            if !else_branch.is_valid() {
                break;
            }
            if matches!(self.arena.kind(else_branch), ExprKind::If { .. }) {
                // Chain continues; record the nested if as a member so
                // its own entry is never consulted.
                link = else_branch;
                continue;
            }
            let else_has = self.walk(else_branch);
            has |= else_has;
            if else_has {
                call_branches += 1;
            }
            break;
        }

        // Once dynamic, every call-bearing condition gets a group, the
        // first included; classification lands on the chain head only.
        if chain_dynamic {
            self.analysis.cond_groups.extend(call_conds);
        }
        self.classify_branches(head, chain_dynamic, call_branches);
        has
    }

    fn classify_branches(&mut self, id: ExprId, chain_dynamic: bool, call_branches: usize) {
        let necessity = Necessity {
            // A dynamic condition chain makes the group count before any
            // branch non-fixed; a single call-bearing branch bounds the
            // count at 0-or-1. Either way one outer group restores a
            // fixed shape.
            around: chain_dynamic || (call_branches == 1),
            per_branch: call_branches >= 2,
        };
        if necessity.around || necessity.per_branch {
            self.analysis.necessity.insert(id, necessity);
        }
    }

    fn record_exit_target(&mut self, label: Name) {
        if label.is_empty() {
            // Return to the function boundary; crossing any inline
            // boundary requires a marker unwind.
            if !self.lambda_stack.is_empty() {
                self.analysis.function_needs_marker = true;
            }
            return;
        }
        // A labeled return to the innermost lambda closes a statically
        // known set of groups; deeper targets must unwind by marker
        // because the intervening set is only known by marker position.
        let target = self
            .lambda_stack
            .iter()
            .rposition(|&(l, _)| l == label);
        if let Some(index) = target {
            if index + 1 != self.lambda_stack.len() {
                let (_, lambda_id) = self.lambda_stack[index];
                self.analysis.marker_lambdas.insert(lambda_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use weft_ir::{
        BinaryOp, CallArg, ExprKind, FunctionFlags, Span, TypeId,
    };

    use super::*;

    struct Builder {
        arena: ExprArena,
        next_span: u32,
    }

    impl Builder {
        fn new() -> Self {
            Builder {
                arena: ExprArena::new(),
                next_span: 0,
            }
        }

        fn span(&mut self) -> Span {
            let start = self.next_span;
            self.next_span += 10;
            Span::new(start, start + 8)
        }

        fn push(&mut self, kind: ExprKind) -> ExprId {
            let span = self.span();
            self.arena.alloc(kind, span)
        }

        fn call(&mut self, reactive: bool) -> ExprId {
            self.push(ExprKind::Call {
                target: Name::from_raw(50),
                args: weft_ir::ArgRange::EMPTY,
                reactive,
            })
        }

        fn block(&mut self, stmts: &[ExprId]) -> ExprId {
            let range = self.arena.alloc_list(stmts);
            self.push(ExprKind::Block {
                stmts: range,
                result: ExprId::INVALID,
            })
        }

        fn func(&self, body: ExprId) -> Function {
            Function {
                name: Name::from_raw(1),
                params: Vec::new(),
                ret: TypeId::UNIT,
                body,
                flags: FunctionFlags::REACTIVE,
                span: Span::DUMMY,
                source: weft_ir::SourceId(0),
            }
        }
    }

    #[test]
    fn call_free_if_needs_nothing() {
        let mut b = Builder::new();
        let cond = b.push(ExprKind::Bool(true));
        let then_branch = b.push(ExprKind::Unit);
        let body = b.push(ExprKind::If {
            cond,
            then_branch,
            else_branch: ExprId::INVALID,
        });
        let func = b.func(body);
        let analysis = analyze(&b.arena, &func);
        assert_eq!(analysis.necessity(body), Necessity::default());
        assert!(!analysis.has_calls(body));
    }

    #[test]
    fn single_call_branch_wraps_whole_if() {
        let mut b = Builder::new();
        let cond = b.push(ExprKind::Bool(true));
        let call = b.call(true);
        let then_branch = b.block(&[call]);
        let body = b.push(ExprKind::If {
            cond,
            then_branch,
            else_branch: ExprId::INVALID,
        });
        let func = b.func(body);
        let analysis = analyze(&b.arena, &func);
        let necessity = analysis.necessity(body);
        assert!(necessity.around);
        assert!(!necessity.per_branch);
    }

    #[test]
    fn both_branches_with_calls_get_branch_groups_not_a_wrapper() {
        let mut b = Builder::new();
        let cond = b.push(ExprKind::Bool(true));
        let a = b.call(true);
        let then_branch = b.block(&[a]);
        let c = b.call(true);
        let else_branch = b.block(&[c]);
        let body = b.push(ExprKind::If {
            cond,
            then_branch,
            else_branch,
        });
        let func = b.func(body);
        let analysis = analyze(&b.arena, &func);
        let necessity = analysis.necessity(body);
        assert!(necessity.per_branch);
        assert!(!necessity.around);
    }

    #[test]
    fn call_in_first_condition_alone_needs_no_group() {
        // The first condition runs exactly once on every path.
        let mut b = Builder::new();
        let cond = b.call(true);
        let then_branch = b.push(ExprKind::Unit);
        let else_branch = b.push(ExprKind::Unit);
        let body = b.push(ExprKind::If {
            cond,
            then_branch,
            else_branch,
        });
        let func = b.func(body);
        let analysis = analyze(&b.arena, &func);
        assert_eq!(analysis.necessity(body), Necessity::default());
        assert!(!analysis.needs_cond_group(cond));
        assert!(analysis.has_calls(body));
    }

    #[test]
    fn call_in_else_if_condition_forces_chain_wrapper() {
        let mut b = Builder::new();
        let cond1 = b.push(ExprKind::Bool(true));
        let then1 = b.push(ExprKind::Unit);
        let cond2 = b.call(true);
        let then2 = b.push(ExprKind::Unit);
        let inner = b.push(ExprKind::If {
            cond: cond2,
            then_branch: then2,
            else_branch: ExprId::INVALID,
        });
        let head = b.push(ExprKind::If {
            cond: cond1,
            then_branch: then1,
            else_branch: inner,
        });
        let func = b.func(head);
        let analysis = analyze(&b.arena, &func);
        assert!(analysis.necessity(head).around);
        assert!(analysis.needs_cond_group(cond2));
        // The nested link carries no classification of its own.
        assert_eq!(analysis.necessity(inner), Necessity::default());
    }

    #[test]
    fn dynamic_chain_gives_every_call_bearing_condition_a_group() {
        let mut b = Builder::new();
        let cond1 = b.call(true);
        let then1 = b.push(ExprKind::Unit);
        let cond2 = b.call(true);
        let then2 = b.push(ExprKind::Unit);
        let else3 = b.push(ExprKind::Unit);
        let inner = b.push(ExprKind::If {
            cond: cond2,
            then_branch: then2,
            else_branch: else3,
        });
        let head = b.push(ExprKind::If {
            cond: cond1,
            then_branch: then1,
            else_branch: inner,
        });
        let func = b.func(head);
        let analysis = analyze(&b.arena, &func);
        assert!(analysis.necessity(head).around);
        assert!(analysis.needs_cond_group(cond1));
        assert!(analysis.needs_cond_group(cond2));
    }

    #[test]
    fn loop_body_call_forces_loop_wrapper() {
        let mut b = Builder::new();
        let cond = b.push(ExprKind::Bool(true));
        let call = b.call(true);
        let body = b.block(&[call]);
        let while_loop = b.push(ExprKind::While { cond, body });
        let func = b.func(while_loop);
        let analysis = analyze(&b.arena, &func);
        assert!(analysis.necessity(while_loop).around);
    }

    #[test]
    fn while_condition_call_also_forces_wrapper() {
        let mut b = Builder::new();
        let cond = b.call(true);
        let body = b.push(ExprKind::Unit);
        let while_loop = b.push(ExprKind::While { cond, body });
        let func = b.func(while_loop);
        let analysis = analyze(&b.arena, &func);
        assert!(analysis.necessity(while_loop).around);
    }

    #[test]
    fn for_iterable_call_does_not_force_wrapper() {
        // The iterable is evaluated exactly once.
        let mut b = Builder::new();
        let iter = b.call(true);
        let body = b.push(ExprKind::Unit);
        let for_loop = b.push(ExprKind::For {
            binding: Name::from_raw(7),
            iter,
            body,
        });
        let func = b.func(for_loop);
        let analysis = analyze(&b.arena, &func);
        assert_eq!(analysis.necessity(for_loop), Necessity::default());
        assert!(analysis.has_calls(for_loop));
    }

    #[test]
    fn short_circuit_right_operand_call_wraps_expression() {
        let mut b = Builder::new();
        let left = b.call(true);
        let right = b.call(true);
        let and = b.push(ExprKind::Binary {
            op: BinaryOp::And,
            left,
            right,
        });
        let func = b.func(and);
        let analysis = analyze(&b.arena, &func);
        assert!(analysis.necessity(and).around);
    }

    #[test]
    fn short_circuit_left_only_needs_nothing() {
        let mut b = Builder::new();
        let left = b.call(true);
        let right = b.push(ExprKind::Bool(false));
        let and = b.push(ExprKind::Binary {
            op: BinaryOp::Or,
            left,
            right,
        });
        let func = b.func(and);
        let analysis = analyze(&b.arena, &func);
        assert_eq!(analysis.necessity(and), Necessity::default());
    }

    #[test]
    fn elvis_fallback_call_wraps_expression() {
        let mut b = Builder::new();
        let primary = b.push(ExprKind::Ident(Name::from_raw(3)));
        let fallback = b.call(true);
        let elvis = b.push(ExprKind::Elvis { primary, fallback });
        let func = b.func(elvis);
        let analysis = analyze(&b.arena, &func);
        assert!(analysis.necessity(elvis).around);
    }

    #[test]
    fn multiple_call_bearing_arguments_each_get_groups() {
        let mut b = Builder::new();
        let arg_a = b.call(true);
        let arg_b = b.call(true);
        let arg_c = b.push(ExprKind::Int(3));
        let args = b.arena.alloc_args(&[
            CallArg { param: 0, value: arg_a },
            CallArg { param: 1, value: arg_b },
            CallArg { param: 2, value: arg_c },
        ]);
        let call = b.push(ExprKind::Call {
            target: Name::from_raw(60),
            args,
            reactive: true,
        });
        let func = b.func(call);
        let analysis = analyze(&b.arena, &func);
        assert!(analysis.needs_arg_group(arg_a));
        assert!(analysis.needs_arg_group(arg_b));
        assert!(!analysis.needs_arg_group(arg_c));
    }

    #[test]
    fn single_call_bearing_argument_needs_no_group() {
        let mut b = Builder::new();
        let arg_a = b.call(true);
        let arg_b = b.push(ExprKind::Int(3));
        let args = b.arena.alloc_args(&[
            CallArg { param: 0, value: arg_a },
            CallArg { param: 1, value: arg_b },
        ]);
        let call = b.push(ExprKind::Call {
            target: Name::from_raw(60),
            args,
            reactive: true,
        });
        let func = b.func(call);
        let analysis = analyze(&b.arena, &func);
        assert!(!analysis.needs_arg_group(arg_a));
    }

    #[test]
    fn keyed_block_counts_as_eligible_content() {
        let mut b = Builder::new();
        let key = b.push(ExprKind::Ident(Name::from_raw(3)));
        let inner = b.push(ExprKind::Unit);
        let keys = b.arena.alloc_list(&[key]);
        let keyed = b.push(ExprKind::KeyedBlock { keys, body: inner });
        let cond = b.push(ExprKind::Bool(true));
        let loop_body = b.block(&[keyed]);
        let while_loop = b.push(ExprKind::While { cond, body: loop_body });
        let func = b.func(while_loop);
        let analysis = analyze(&b.arena, &func);
        assert!(analysis.has_calls(keyed));
        assert!(analysis.necessity(while_loop).around);
    }

    #[test]
    fn deferred_lambda_is_opaque() {
        let mut b = Builder::new();
        let call = b.call(true);
        let lambda = b.push(ExprKind::Lambda { body: call });
        let func = b.func(lambda);
        let analysis = analyze(&b.arena, &func);
        assert!(!analysis.has_calls(lambda));
    }

    #[test]
    fn nonlocal_return_to_function_marks_boundary() {
        let mut b = Builder::new();
        let ret = b.push(ExprKind::Return {
            value: ExprId::INVALID,
            label: Name::EMPTY,
        });
        let lambda_body = b.block(&[ret]);
        let lambda = b.push(ExprKind::InlineLambda {
            label: Name::from_raw(8),
            body: lambda_body,
        });
        let args = b.arena.alloc_args(&[CallArg { param: 0, value: lambda }]);
        let call = b.push(ExprKind::Call {
            target: Name::from_raw(60),
            args,
            reactive: true,
        });
        let func = b.func(call);
        let analysis = analyze(&b.arena, &func);
        assert!(analysis.function_needs_marker());
    }

    #[test]
    fn labeled_return_two_levels_out_marks_target_lambda() {
        let mut b = Builder::new();
        let outer_label = Name::from_raw(8);
        let inner_label = Name::from_raw(9);
        let ret = b.push(ExprKind::Return {
            value: ExprId::INVALID,
            label: outer_label,
        });
        let inner_body = b.block(&[ret]);
        let inner = b.push(ExprKind::InlineLambda {
            label: inner_label,
            body: inner_body,
        });
        let inner_args = b.arena.alloc_args(&[CallArg { param: 0, value: inner }]);
        let inner_call = b.push(ExprKind::Call {
            target: Name::from_raw(61),
            args: inner_args,
            reactive: true,
        });
        let outer_body = b.block(&[inner_call]);
        let outer = b.push(ExprKind::InlineLambda {
            label: outer_label,
            body: outer_body,
        });
        let outer_args = b.arena.alloc_args(&[CallArg { param: 0, value: outer }]);
        let outer_call = b.push(ExprKind::Call {
            target: Name::from_raw(62),
            args: outer_args,
            reactive: true,
        });
        let func = b.func(outer_call);
        let analysis = analyze(&b.arena, &func);
        assert!(analysis.lambda_needs_marker(outer));
        assert!(!analysis.lambda_needs_marker(inner));
        assert!(!analysis.function_needs_marker());
    }

    #[test]
    fn labeled_return_to_innermost_lambda_needs_no_marker() {
        let mut b = Builder::new();
        let label = Name::from_raw(8);
        let ret = b.push(ExprKind::Return {
            value: ExprId::INVALID,
            label,
        });
        let body = b.block(&[ret]);
        let lambda = b.push(ExprKind::InlineLambda { label, body });
        let args = b.arena.alloc_args(&[CallArg { param: 0, value: lambda }]);
        let call = b.push(ExprKind::Call {
            target: Name::from_raw(60),
            args,
            reactive: true,
        });
        let func = b.func(call);
        let analysis = analyze(&b.arena, &func);
        assert!(!analysis.lambda_needs_marker(lambda));
    }
}

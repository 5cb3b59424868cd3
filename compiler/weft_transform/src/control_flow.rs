//! The group-insertion rewriter.
//!
//! Consumes one declaration's analyzed body and rebuilds it in a fresh
//! arena with group bookkeeping inserted. Control and data flow are
//! preserved exactly: wrapped value expressions compute into a temporary
//! inside the group, early exits close every open group in reverse order
//! of opening before transferring control, and a value-bearing early
//! return evaluates its value before any group-closing operation runs.
//!
//! Group placement follows the per-construct classification from
//! [`crate::necessity`], with one placement refinement owned here: an
//! "around" group is physically realized only when eligible content
//! follows the construct inside the nearest enclosing realized group.
//! When nothing follows, that enclosing group already bounds the dynamic
//! region (the boundary group suffices).

use weft_diagnostic::{Diagnostic, ErrorCode};
use weft_ir::{
    CallArg, ExprArena, ExprId, ExprKind, Function, GroupKind, MarkerSlot, Module, Name, Span,
};

use crate::changed::ChangedEncoder;
use crate::context::TransformContext;
use crate::keys::KeyAssigner;
use crate::necessity::{analyze, Analysis};
use crate::restart::{
    append_synthetic_params, emit_dirty_computation, emit_execute_condition, plan_boundary,
    BoundaryKind, BoundaryPlan,
};
use crate::stack::ensure_sufficient_stack;
use crate::validate::{validate_input, validate_rewritten};
use crate::TransformError;

/// One rewritten declaration: the new function (synthetic parameters
/// appended, body pointing into `arena`) plus recoverable diagnostics.
#[derive(Debug)]
pub struct TransformedFunction {
    pub function: Function,
    pub arena: ExprArena,
    pub diagnostics: Vec<Diagnostic>,
}

/// Transform one declaration.
///
/// Non-reactive declarations pass through with their body copied
/// verbatim. Structural failures abort this declaration only.
pub fn transform_function(
    module: &Module,
    src: &ExprArena,
    func: &Function,
    ctx: &TransformContext<'_>,
) -> Result<TransformedFunction, TransformError> {
    if let Err(err) = validate_input(src, func) {
        return Err(TransformError::new(func.name, func.span, err.code, err.message));
    }

    let mut out = ExprArena::new();

    if !func.is_reactive() || !func.body.is_valid() {
        let mut function = func.clone();
        if func.body.is_valid() {
            function.body = copy_subtree(src, func.body, &mut out);
        }
        for param in &mut function.params {
            if param.default.is_valid() {
                param.default = copy_subtree(src, param.default, &mut out);
            }
        }
        return Ok(TransformedFunction {
            function,
            arena: out,
            diagnostics: Vec::new(),
        });
    }

    let analysis = analyze(src, func);
    let plan = plan_boundary(func, ctx);
    let encoder = ChangedEncoder::new(func);

    tracing::debug!(
        name = func.name.raw(),
        kind = ?plan.kind,
        skippable = plan.skippable,
        "rewriting declaration"
    );

    let mut rewriter = Rewriter {
        module,
        src,
        func,
        ctx,
        analysis: &analysis,
        out,
        keys: KeyAssigner::new(func.source, func),
        scopes: Vec::new(),
        next_marker: 0,
        next_tmp: 0,
        diagnostics: Vec::new(),
    };

    let body = rewriter.build_boundary(plan, &encoder)?;
    let Rewriter {
        mut out,
        diagnostics,
        ..
    } = rewriter;

    let mut function = func.clone();
    function.body = body;
    // Default expressions move with the declaration: the rewritten
    // function must be self-contained in its own arena.
    for param in &mut function.params {
        if param.default.is_valid() {
            param.default = copy_subtree(src, param.default, &mut out);
        }
    }
    append_synthetic_params(&mut function, &encoder, ctx);

    if ctx.options.validate || cfg!(debug_assertions) {
        if let Err(err) = validate_rewritten(&out, &function) {
            return Err(TransformError::new(
                func.name,
                func.span,
                err.code,
                err.message,
            ));
        }
    }

    Ok(TransformedFunction {
        function,
        arena: out,
        diagnostics,
    })
}

/// Open scopes between the boundary and the current rewrite position.
enum ScopeEntry {
    /// The function boundary; always at index 0.
    Boundary {
        kind: BoundaryKind,
        marker: Option<MarkerSlot>,
    },
    /// A physically realized group.
    Group(GroupKind),
    /// An inline-lambda boundary; owns one open replaceable group.
    Inline {
        label: Name,
        marker: Option<MarkerSlot>,
    },
    /// A loop body; break/continue unwind to here.
    Loop,
}

struct Rewriter<'a> {
    module: &'a Module,
    src: &'a ExprArena,
    func: &'a Function,
    ctx: &'a TransformContext<'a>,
    analysis: &'a Analysis,
    out: ExprArena,
    keys: KeyAssigner,
    scopes: Vec<ScopeEntry>,
    next_marker: u32,
    next_tmp: u32,
    diagnostics: Vec<Diagnostic>,
}

impl Rewriter<'_> {
    // ── Boundary assembly ───────────────────────────────────────────

    fn build_boundary(
        &mut self,
        plan: BoundaryPlan,
        encoder: &ChangedEncoder,
    ) -> Result<ExprId, TransformError> {
        let span = self.func.span;
        let key = self.keys.group_key(span);
        let marker = self
            .analysis
            .function_needs_marker()
            .then(|| self.fresh_marker());

        self.scopes.push(ScopeEntry::Boundary {
            kind: plan.kind,
            marker,
        });

        let mut stmts = Vec::new();
        let start = match plan.kind {
            BoundaryKind::Restart => self.out.alloc(ExprKind::StartRestartGroup { key }, span),
            BoundaryKind::Replaceable => self
                .out
                .alloc(ExprKind::StartReplaceableGroup { key }, span),
            BoundaryKind::Marker => self.out.alloc(ExprKind::SourceMarkerStart { key }, span),
        };
        stmts.push(start);
        if let Some(slot) = marker {
            stmts.push(self.out.alloc(ExprKind::CaptureMarker { slot }, span));
        }

        // Re-evaluate defaults the caller omitted. "Same value as last
        // time" and "no value passed at all" are different facts, which
        // is why the defaulted bits live in their own words.
        for (index, param) in self.func.params.iter().enumerate() {
            if !param.default.is_valid() {
                continue;
            }
            let (word, bit) = encoder.default_slot(index);
            #[expect(
                clippy::cast_possible_truncation,
                reason = "default word counts are tiny"
            )]
            let word = word as u8;
            let word_read = self.out.alloc(ExprKind::DefaultWord { word }, span);
            let bit_lit = self.out.alloc(ExprKind::Int(i64::from(bit)), span);
            let masked = self.out.alloc(
                ExprKind::Binary {
                    op: weft_ir::BinaryOp::BitAnd,
                    left: word_read,
                    right: bit_lit,
                },
                span,
            );
            let zero = self.out.alloc(ExprKind::Int(0), span);
            let was_defaulted = self.out.alloc(
                ExprKind::Binary {
                    op: weft_ir::BinaryOp::Ne,
                    left: masked,
                    right: zero,
                },
                span,
            );
            let default_value = copy_subtree(self.src, param.default, &mut self.out);
            let assign = self.out.alloc(
                ExprKind::Assign {
                    target: param.name,
                    value: default_value,
                },
                span,
            );
            stmts.push(self.out.alloc(
                ExprKind::If {
                    cond: was_defaulted,
                    then_branch: assign,
                    else_branch: ExprId::INVALID,
                },
                span,
            ));
        }

        if plan.skippable {
            let mut dirty = emit_dirty_computation(&mut self.out, encoder, self.func, span);
            stmts.append(&mut dirty);
            let execute = emit_execute_condition(&mut self.out, encoder, span);
            let body = self.rewrite(self.func.body, true, false)?;
            let skip = self.out.alloc(ExprKind::SkipToGroupEnd, span);
            stmts.push(self.out.alloc(
                ExprKind::If {
                    cond: execute,
                    then_branch: body,
                    else_branch: skip,
                },
                span,
            ));
        } else if self.func.ret == weft_ir::TypeId::UNIT {
            let body = self.rewrite(self.func.body, true, false)?;
            stmts.push(body);
        } else {
            // The body's trailing value must survive the boundary close:
            // compute it into a temporary first.
            let body = self.rewrite(self.func.body, true, true)?;
            let tmp = self.fresh_tmp("return");
            stmts.push(self.out.alloc(ExprKind::Let { name: tmp, init: body }, span));
            let end = self.boundary_end(plan.kind, span);
            stmts.push(end);
            self.scopes.pop();
            let result = self.out.alloc(ExprKind::Ident(tmp), span);
            let range = self.out.alloc_list(&stmts);
            return Ok(self.out.alloc(
                ExprKind::Block {
                    stmts: range,
                    result,
                },
                span,
            ));
        }

        let end = self.boundary_end(plan.kind, span);
        stmts.push(end);
        self.scopes.pop();

        let range = self.out.alloc_list(&stmts);
        Ok(self.out.alloc(
            ExprKind::Block {
                stmts: range,
                result: ExprId::INVALID,
            },
            span,
        ))
    }

    fn boundary_end(&mut self, kind: BoundaryKind, span: Span) -> ExprId {
        match kind {
            BoundaryKind::Restart => self
                .out
                .alloc(ExprKind::EndRestartGroup { restart: true }, span),
            BoundaryKind::Replaceable => self.out.alloc(ExprKind::EndReplaceableGroup, span),
            BoundaryKind::Marker => self.out.alloc(ExprKind::SourceMarkerEnd, span),
        }
    }

    // ── Small helpers ───────────────────────────────────────────────

    fn fresh_marker(&mut self) -> MarkerSlot {
        let slot = MarkerSlot::new(self.next_marker);
        self.next_marker += 1;
        slot
    }

    fn fresh_tmp(&mut self, suffix: &str) -> Name {
        let name = self
            .ctx
            .interner
            .intern(&format!("$tmp{}_{suffix}", self.next_tmp));
        self.next_tmp += 1;
        name
    }

    fn error(&self, span: Span, code: ErrorCode, message: impl Into<String>) -> TransformError {
        TransformError::new(self.func.name, span, code, message)
    }

    /// Close operations for one scope entry, appended to `stmts`.
    fn push_close_ops(&mut self, entry_index: usize, span: Span, stmts: &mut Vec<ExprId>) {
        match self.scopes[entry_index] {
            ScopeEntry::Boundary { kind, .. } => {
                let op = match kind {
                    BoundaryKind::Restart => ExprKind::EndRestartGroup { restart: true },
                    BoundaryKind::Replaceable => ExprKind::EndReplaceableGroup,
                    BoundaryKind::Marker => ExprKind::SourceMarkerEnd,
                };
                stmts.push(self.out.alloc(op, span));
            }
            ScopeEntry::Group(kind) => {
                let op = match kind {
                    GroupKind::Movable => ExprKind::EndMovableGroup,
                    _ => ExprKind::EndReplaceableGroup,
                };
                stmts.push(self.out.alloc(op, span));
            }
            ScopeEntry::Inline { .. } => {
                stmts.push(self.out.alloc(ExprKind::EndReplaceableGroup, span));
            }
            ScopeEntry::Loop => {}
        }
    }

    // ── Group wrapping ──────────────────────────────────────────────

    /// Open a replaceable group and push its scope entry. Movable
    /// groups are opened by the keyed-block path, which supplies the
    /// runtime identity itself.
    fn begin_group(&mut self, span: Span) -> ExprId {
        let key = self.keys.group_key(span);
        let start = self.out.alloc(ExprKind::StartReplaceableGroup { key }, span);
        self.scopes.push(ScopeEntry::Group(GroupKind::Replaceable));
        start
    }

    /// Close the group opened by `begin_group`.
    fn end_group(&mut self, span: Span) -> ExprId {
        let entry = self.scopes.pop();
        debug_assert!(matches!(entry, Some(ScopeEntry::Group(_))));
        self.out.alloc(ExprKind::EndReplaceableGroup, span)
    }

    /// `{ start; inner; end }` — statement form.
    fn group_stmt(&mut self, start: ExprId, inner: ExprId, end: ExprId, span: Span) -> ExprId {
        let range = self.out.alloc_list(&[start, inner, end]);
        self.out.alloc(
            ExprKind::Block {
                stmts: range,
                result: ExprId::INVALID,
            },
            span,
        )
    }

    /// `{ start; let tmp = inner; end; tmp }` — value form. The value is
    /// computed before the group closes so closing never reorders
    /// relative to user expression evaluation.
    fn group_value(&mut self, start: ExprId, inner: ExprId, end: ExprId, span: Span) -> ExprId {
        let tmp = self.fresh_tmp("group");
        let binding = self.out.alloc(ExprKind::Let { name: tmp, init: inner }, span);
        let range = self.out.alloc_list(&[start, binding, end]);
        let result = self.out.alloc(ExprKind::Ident(tmp), span);
        self.out.alloc(
            ExprKind::Block {
                stmts: range,
                result,
            },
            span,
        )
    }

    // ── The rewrite walk ────────────────────────────────────────────

    /// Rewrite one node.
    ///
    /// `tail` — no eligible content follows this node inside the nearest
    /// enclosing realized group, so an "around" group may be elided.
    /// `used` — the node's value is consumed, so wrapped forms must
    /// produce one.
    fn rewrite(&mut self, id: ExprId, tail: bool, used: bool) -> Result<ExprId, TransformError> {
        ensure_sufficient_stack(|| self.rewrite_inner(id, tail, used))
    }

    fn rewrite_inner(
        &mut self,
        id: ExprId,
        tail: bool,
        used: bool,
    ) -> Result<ExprId, TransformError> {
        let span = self.src.span(id);
        match *self.src.kind(id) {
            ExprKind::Int(_)
            | ExprKind::Bool(_)
            | ExprKind::Str(_)
            | ExprKind::Unit
            | ExprKind::Ident(_) => {
                let kind = *self.src.kind(id);
                Ok(self.out.alloc(kind, span))
            }

            ExprKind::Let { name, init } => {
                let init = self.rewrite(init, tail, true)?;
                Ok(self.out.alloc(ExprKind::Let { name, init }, span))
            }

            ExprKind::Assign { target, value } => {
                let value = self.rewrite(value, tail, true)?;
                Ok(self.out.alloc(ExprKind::Assign { target, value }, span))
            }

            ExprKind::Block { stmts, result } => {
                let stmt_ids = self.src.list(stmts).to_vec();
                let result_has = result.is_valid() && self.analysis.has_calls(result);
                let mut new_stmts = Vec::with_capacity(stmt_ids.len());
                for (index, &stmt) in stmt_ids.iter().enumerate() {
                    let followed = result_has
                        || stmt_ids[index + 1..]
                            .iter()
                            .any(|&later| self.analysis.has_calls(later));
                    let stmt_tail = tail && !followed;
                    new_stmts.push(self.rewrite(stmt, stmt_tail, false)?);
                }
                let new_result = if result.is_valid() {
                    self.rewrite(result, tail, used)?
                } else {
                    ExprId::INVALID
                };
                let range = self.out.alloc_list(&new_stmts);
                Ok(self.out.alloc(
                    ExprKind::Block {
                        stmts: range,
                        result: new_result,
                    },
                    span,
                ))
            }

            ExprKind::If { .. } => self.rewrite_if_chain(id, tail, used),

            ExprKind::When { .. } => self.rewrite_when(id, tail, used),

            ExprKind::For { .. } | ExprKind::While { .. } => self.rewrite_loop(id, tail),

            ExprKind::Binary { op, left, right } => {
                let necessity = self.analysis.necessity(id);
                let realize = necessity.around && !tail;
                if realize {
                    let start = self.begin_group(span);
                    let left = self.rewrite(left, false, true)?;
                    let right = self.rewrite(right, false, true)?;
                    let inner = self.out.alloc(ExprKind::Binary { op, left, right }, span);
                    let end = self.end_group(span);
                    Ok(if used {
                        self.group_value(start, inner, end, span)
                    } else {
                        self.group_stmt(start, inner, end, span)
                    })
                } else {
                    let left = self.rewrite(left, false, true)?;
                    let right = self.rewrite(right, false, true)?;
                    Ok(self.out.alloc(ExprKind::Binary { op, left, right }, span))
                }
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.rewrite(operand, false, true)?;
                Ok(self.out.alloc(ExprKind::Unary { op, operand }, span))
            }

            ExprKind::SafeCall {
                receiver,
                method,
                args,
            } => {
                let necessity = self.analysis.necessity(id);
                let realize = necessity.around && !tail;
                let start = realize.then(|| self.begin_group(span));
                let receiver = self.rewrite(receiver, false, true)?;
                let src_args = self.src.call_args(args).to_vec();
                let mut new_args = Vec::with_capacity(src_args.len());
                for arg in &src_args {
                    let value = self.rewrite(arg.value, false, true)?;
                    new_args.push(CallArg {
                        param: arg.param,
                        value,
                    });
                }
                let range = self.out.alloc_args(&new_args);
                let inner = self.out.alloc(
                    ExprKind::SafeCall {
                        receiver,
                        method,
                        args: range,
                    },
                    span,
                );
                match start {
                    Some(start) => {
                        let end = self.end_group(span);
                        Ok(if used {
                            self.group_value(start, inner, end, span)
                        } else {
                            self.group_stmt(start, inner, end, span)
                        })
                    }
                    None => Ok(inner),
                }
            }

            ExprKind::Elvis { primary, fallback } => {
                let necessity = self.analysis.necessity(id);
                let realize = necessity.around && !tail;
                let start = realize.then(|| self.begin_group(span));
                let primary = self.rewrite(primary, false, true)?;
                let fallback = self.rewrite(fallback, false, true)?;
                let inner = self.out.alloc(ExprKind::Elvis { primary, fallback }, span);
                match start {
                    Some(start) => {
                        let end = self.end_group(span);
                        Ok(if used {
                            self.group_value(start, inner, end, span)
                        } else {
                            self.group_stmt(start, inner, end, span)
                        })
                    }
                    None => Ok(inner),
                }
            }

            ExprKind::Call {
                target,
                args,
                reactive,
            } => self.rewrite_call(target, args, reactive, span),

            // Deferred lambdas are opaque values here; their bodies get
            // their own boundary when the runtime invokes them.
            ExprKind::Lambda { body } => {
                let body = copy_subtree(self.src, body, &mut self.out);
                Ok(self.out.alloc(ExprKind::Lambda { body }, span))
            }

            ExprKind::InlineLambda { label, body } => {
                let key = self.keys.group_key(span);
                let start = self.out.alloc(ExprKind::StartReplaceableGroup { key }, span);
                let marker = self
                    .analysis
                    .lambda_needs_marker(id)
                    .then(|| self.fresh_marker());
                self.scopes.push(ScopeEntry::Inline { label, marker });
                let mut stmts = vec![start];
                if let Some(slot) = marker {
                    stmts.push(self.out.alloc(ExprKind::CaptureMarker { slot }, span));
                }
                let new_body = self.rewrite(body, true, false)?;
                stmts.push(new_body);
                self.scopes.pop();
                stmts.push(self.out.alloc(ExprKind::EndReplaceableGroup, span));
                let range = self.out.alloc_list(&stmts);
                let block = self.out.alloc(
                    ExprKind::Block {
                        stmts: range,
                        result: ExprId::INVALID,
                    },
                    span,
                );
                Ok(self
                    .out
                    .alloc(ExprKind::InlineLambda { label, body: block }, span))
            }

            ExprKind::KeyedBlock { keys, body } => {
                self.rewrite_keyed_block(keys, body, used, span)
            }

            ExprKind::Return { value, label } => self.rewrite_return(value, label, span),

            ExprKind::Break => self.rewrite_loop_exit(true, span),
            ExprKind::Continue => self.rewrite_loop_exit(false, span),

            // Runtime ops were rejected by input validation.
            ref op => Err(self.error(
                span,
                ErrorCode::W2005,
                format!("runtime operation {op:?} in input tree"),
            )),
        }
    }

    // ── Conditionals ────────────────────────────────────────────────

    fn rewrite_if_chain(
        &mut self,
        head: ExprId,
        tail: bool,
        used: bool,
    ) -> Result<ExprId, TransformError> {
        let span = self.src.span(head);
        let necessity = self.analysis.necessity(head);
        let realize = necessity.around && !tail;

        let start = realize.then(|| self.begin_group(span));
        let inner_tail = realize || tail;
        let chain = self.rewrite_chain_link(head, inner_tail, used, necessity.per_branch)?;

        match start {
            Some(start) => {
                let end = self.end_group(span);
                Ok(if used {
                    self.group_value(start, chain, end, span)
                } else {
                    self.group_stmt(start, chain, end, span)
                })
            }
            None => Ok(chain),
        }
    }

    fn rewrite_chain_link(
        &mut self,
        link: ExprId,
        tail: bool,
        used: bool,
        per_branch: bool,
    ) -> Result<ExprId, TransformError> {
        let span = self.src.span(link);
        let ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } = *self.src.kind(link)
        else {
            return Err(self.error(span, ErrorCode::W2002, "if chain link is not an if"));
        };

        let new_cond = if self.analysis.needs_cond_group(cond) {
            // Conditionally evaluated condition: its own value group,
            // never elided (it sits mid-construct).
            let cond_span = self.src.span(cond);
            let start = self.begin_group(cond_span);
            let inner = self.rewrite(cond, false, true)?;
            let end = self.end_group(cond_span);
            self.group_value(start, inner, end, cond_span)
        } else {
            self.rewrite(cond, false, true)?
        };

        let new_then = if per_branch {
            self.branch_group(then_branch, used)?
        } else {
            self.rewrite(then_branch, tail, used)?
        };

        let new_else = if else_branch.is_valid() {
            if matches!(self.src.kind(else_branch), ExprKind::If { .. }) {
                self.rewrite_chain_link(else_branch, tail, used, per_branch)?
            } else if per_branch {
                self.branch_group(else_branch, used)?
            } else {
                self.rewrite(else_branch, tail, used)?
            }
        } else if per_branch {
            // Keep the slot shape fixed on the no-branch path.
            self.empty_branch_group(span)
        } else {
            ExprId::INVALID
        };

        Ok(self.out.alloc(
            ExprKind::If {
                cond: new_cond,
                then_branch: new_then,
                else_branch: new_else,
            },
            span,
        ))
    }

    fn rewrite_when(
        &mut self,
        id: ExprId,
        tail: bool,
        used: bool,
    ) -> Result<ExprId, TransformError> {
        let span = self.src.span(id);
        let ExprKind::When { subject, branches } = *self.src.kind(id) else {
            return Err(self.error(span, ErrorCode::W2002, "expected a when construct"));
        };
        let necessity = self.analysis.necessity(id);
        let realize = necessity.around && !tail;
        let start = realize.then(|| self.begin_group(span));
        let inner_tail = realize || tail;

        let new_subject = if subject.is_valid() {
            self.rewrite(subject, false, true)?
        } else {
            ExprId::INVALID
        };

        let src_branches = self.src.when_branches(branches).to_vec();
        let mut new_branches = Vec::with_capacity(src_branches.len() + 1);
        let mut has_else = false;
        for branch in &src_branches {
            let new_cond = if branch.condition.is_valid() {
                if self.analysis.needs_cond_group(branch.condition) {
                    let cond_span = self.src.span(branch.condition);
                    let group_start = self.begin_group(cond_span);
                    let inner = self.rewrite(branch.condition, false, true)?;
                    let end = self.end_group(cond_span);
                    self.group_value(group_start, inner, end, cond_span)
                } else {
                    self.rewrite(branch.condition, false, true)?
                }
            } else {
                has_else = true;
                ExprId::INVALID
            };
            let new_body = if necessity.per_branch {
                self.branch_group(branch.body, used)?
            } else {
                self.rewrite(branch.body, inner_tail, used)?
            };
            new_branches.push(weft_ir::WhenBranch {
                condition: new_cond,
                body: new_body,
            });
        }
        if necessity.per_branch && !has_else {
            let body = self.empty_branch_group(span);
            new_branches.push(weft_ir::WhenBranch {
                condition: ExprId::INVALID,
                body,
            });
        }

        let range = self.out.alloc_branches(&new_branches);
        let inner = self.out.alloc(
            ExprKind::When {
                subject: new_subject,
                branches: range,
            },
            span,
        );

        match start {
            Some(start) => {
                let end = self.end_group(span);
                Ok(if used {
                    self.group_value(start, inner, end, span)
                } else {
                    self.group_stmt(start, inner, end, span)
                })
            }
            None => Ok(inner),
        }
    }

    /// A realized replaceable group around one branch body.
    fn branch_group(&mut self, body: ExprId, used: bool) -> Result<ExprId, TransformError> {
        let span = self.src.span(body);
        let start = self.begin_group(span);
        let inner = self.rewrite(body, true, used)?;
        let end = self.end_group(span);
        Ok(if used {
            self.group_value(start, inner, end, span)
        } else {
            self.group_stmt(start, inner, end, span)
        })
    }

    /// An empty group keeping branch slot shape fixed where no branch
    /// body exists.
    fn empty_branch_group(&mut self, span: Span) -> ExprId {
        let point = Span::point(span.end);
        let start = self.begin_group(point);
        let end = self.end_group(point);
        let range = self.out.alloc_list(&[start, end]);
        self.out.alloc(
            ExprKind::Block {
                stmts: range,
                result: ExprId::INVALID,
            },
            point,
        )
    }

    // ── Loops ───────────────────────────────────────────────────────

    fn rewrite_loop(&mut self, id: ExprId, tail: bool) -> Result<ExprId, TransformError> {
        let span = self.src.span(id);
        let necessity = self.analysis.necessity(id);
        let realize = necessity.around && !tail;
        let start = realize.then(|| self.begin_group(span));

        let inner = match *self.src.kind(id) {
            ExprKind::For {
                binding,
                iter,
                body,
            } => {
                // The iterable evaluates once, before the loop scope.
                let iter = self.rewrite(iter, false, true)?;
                self.scopes.push(ScopeEntry::Loop);
                let body = self.rewrite(body, false, false)?;
                self.scopes.pop();
                self.out.alloc(
                    ExprKind::For {
                        binding,
                        iter,
                        body,
                    },
                    span,
                )
            }
            ExprKind::While { cond, body } => {
                self.scopes.push(ScopeEntry::Loop);
                let cond = self.rewrite(cond, false, true)?;
                let body = self.rewrite(body, false, false)?;
                self.scopes.pop();
                self.out.alloc(ExprKind::While { cond, body }, span)
            }
            _ => {
                return Err(self.error(span, ErrorCode::W2002, "expected a loop construct"));
            }
        };

        match start {
            Some(start) => {
                let end = self.end_group(span);
                Ok(self.group_stmt(start, inner, end, span))
            }
            None => Ok(inner),
        }
    }

    // ── Calls ───────────────────────────────────────────────────────

    fn rewrite_call(
        &mut self,
        target: Name,
        args: weft_ir::ArgRange,
        reactive: bool,
        span: Span,
    ) -> Result<ExprId, TransformError> {
        let src_args = self.src.call_args(args).to_vec();
        let mut new_args = Vec::with_capacity(src_args.len() + 2);

        // Arguments rewrite in lexical order so per-argument group keys
        // stay independent of sibling internals.
        for arg in &src_args {
            let value = if self.analysis.needs_arg_group(arg.value) {
                let arg_span = self.src.span(arg.value);
                let start = self.begin_group(arg_span);
                let inner = self.rewrite(arg.value, true, true)?;
                let end = self.end_group(arg_span);
                self.group_value(start, inner, end, arg_span)
            } else {
                self.rewrite(arg.value, false, true)?
            };
            new_args.push(CallArg {
                param: arg.param,
                value,
            });
        }

        if reactive {
            let encoder = match self.module.function(target) {
                Some(callee) => ChangedEncoder::new(callee),
                None => {
                    // External callee: arity is whatever the call binds.
                    let arity = src_args
                        .iter()
                        .map(|arg| usize::from(arg.param) + 1)
                        .max()
                        .unwrap_or(0);
                    ChangedEncoder::for_signature(arity, false)
                }
            };
            let masks = encoder
                .encode_call(self.src, &src_args, span)
                .map_err(|err| self.error(span, ErrorCode::W3001, err.to_string()))?;

            // The synthetic trailing words, in the callee's rewritten
            // signature order: changed words then default words.
            let base = encoder.param_count();
            for (word, value) in masks.changed.iter().enumerate() {
                let literal = self.out.alloc(ExprKind::Int(i64::from(*value)), span);
                new_args.push(CallArg {
                    param: synthetic_param_index(base + word, span, self.func.name)?,
                    value: literal,
                });
            }
            let default_base = base + masks.changed.len();
            for (word, value) in masks.defaults.iter().enumerate() {
                let literal = self.out.alloc(ExprKind::Int(i64::from(*value)), span);
                new_args.push(CallArg {
                    param: synthetic_param_index(default_base + word, span, self.func.name)?,
                    value: literal,
                });
            }
        }

        let range = self.out.alloc_args(&new_args);
        Ok(self.out.alloc(
            ExprKind::Call {
                target,
                args: range,
                reactive,
            },
            span,
        ))
    }

    // ── Keyed blocks ────────────────────────────────────────────────

    fn rewrite_keyed_block(
        &mut self,
        keys: weft_ir::ExprRange,
        body: ExprId,
        used: bool,
        span: Span,
    ) -> Result<ExprId, TransformError> {
        let key_ids = self.src.list(keys).to_vec();
        if key_ids.is_empty() {
            // Identity collisions are a correctness hazard for movable
            // groups; a missing key is a hard diagnostic, not a runtime
            // fallback.
            self.diagnostics.push(
                Diagnostic::error(ErrorCode::W2001)
                    .with_label(span, "this keyed block has no key expression"),
            );
            return Err(self.error(span, ErrorCode::W2001, "keyed block without key expression"));
        }

        // Join multiple key values pairwise, order-sensitively.
        let mut identity = self.rewrite(key_ids[0], false, true)?;
        for &key_expr in &key_ids[1..] {
            let right = self.rewrite(key_expr, false, true)?;
            identity = self.out.alloc(
                ExprKind::JoinKey {
                    left: identity,
                    right,
                },
                span,
            );
        }

        let key = self.keys.group_key(span);
        let start = self
            .out
            .alloc(ExprKind::StartMovableGroup { key, identity }, span);
        self.scopes.push(ScopeEntry::Group(GroupKind::Movable));
        let inner = self.rewrite(body, true, used)?;
        self.scopes.pop();
        let end = self.out.alloc(ExprKind::EndMovableGroup, span);

        Ok(if used {
            let tmp = self.fresh_tmp("group");
            let binding = self.out.alloc(ExprKind::Let { name: tmp, init: inner }, span);
            let range = self.out.alloc_list(&[start, binding, end]);
            let result = self.out.alloc(ExprKind::Ident(tmp), span);
            self.out.alloc(
                ExprKind::Block {
                    stmts: range,
                    result,
                },
                span,
            )
        } else {
            let range = self.out.alloc_list(&[start, inner, end]);
            self.out.alloc(
                ExprKind::Block {
                    stmts: range,
                    result: ExprId::INVALID,
                },
                span,
            )
        })
    }

    // ── Early exits ─────────────────────────────────────────────────

    fn rewrite_return(
        &mut self,
        value: ExprId,
        label: Name,
        span: Span,
    ) -> Result<ExprId, TransformError> {
        let target = if label.is_empty() {
            self.scopes
                .iter()
                .position(|entry| matches!(entry, ScopeEntry::Boundary { .. }))
                .ok_or_else(|| {
                    self.error(span, ErrorCode::W2004, "return outside any boundary")
                })?
        } else {
            self.scopes
                .iter()
                .rposition(
                    |entry| matches!(entry, ScopeEntry::Inline { label: l, .. } if *l == label),
                )
                .ok_or_else(|| {
                    self.error(
                        span,
                        ErrorCode::W2004,
                        "labeled return targets no enclosing inline lambda",
                    )
                })?
        };

        let mut stmts = Vec::new();

        // A value computes into a temporary before any group closes.
        let return_value = if value.is_valid() {
            let rewritten = self.rewrite(value, false, true)?;
            let tmp = self.fresh_tmp("return");
            stmts.push(self.out.alloc(
                ExprKind::Let {
                    name: tmp,
                    init: rewritten,
                },
                span,
            ));
            self.out.alloc(ExprKind::Ident(tmp), span)
        } else {
            ExprId::INVALID
        };

        let crossing = self.scopes[target + 1..]
            .iter()
            .any(|entry| matches!(entry, ScopeEntry::Inline { .. }));

        if crossing {
            // The set of intervening groups is only known by marker
            // position: inline bodies are spliced into the caller.
            let marker = match self.scopes[target] {
                ScopeEntry::Boundary { marker, .. } | ScopeEntry::Inline { marker, .. } => marker,
                _ => None,
            };
            let Some(slot) = marker else {
                return Err(self.error(
                    span,
                    ErrorCode::W2003,
                    "non-local exit crosses an inline boundary with no captured marker",
                ));
            };
            stmts.push(self.out.alloc(ExprKind::EndToMarker { slot }, span));
            self.push_close_ops(target, span, &mut stmts);
        } else {
            // Close every group opened since the target, newest first,
            // then the target itself.
            for index in (target..self.scopes.len()).rev() {
                self.push_close_ops(index, span, &mut stmts);
            }
        }

        stmts.push(self.out.alloc(
            ExprKind::Return {
                value: return_value,
                label,
            },
            span,
        ));
        let range = self.out.alloc_list(&stmts);
        Ok(self.out.alloc(
            ExprKind::Block {
                stmts: range,
                result: ExprId::INVALID,
            },
            span,
        ))
    }

    fn rewrite_loop_exit(&mut self, is_break: bool, span: Span) -> Result<ExprId, TransformError> {
        let target = self
            .scopes
            .iter()
            .rposition(|entry| matches!(entry, ScopeEntry::Loop))
            .ok_or_else(|| {
                self.error(span, ErrorCode::W2004, "break/continue outside any loop")
            })?;

        let mut stmts = Vec::new();
        // Close groups opened inside the loop body, newest first. The
        // loop's own wrapping group (if any) stays open: control stays
        // within the loop construct.
        for index in (target + 1..self.scopes.len()).rev() {
            self.push_close_ops(index, span, &mut stmts);
        }
        stmts.push(self.out.alloc(
            if is_break {
                ExprKind::Break
            } else {
                ExprKind::Continue
            },
            span,
        ));
        let range = self.out.alloc_list(&stmts);
        Ok(self.out.alloc(
            ExprKind::Block {
                stmts: range,
                result: ExprId::INVALID,
            },
            span,
        ))
    }
}

/// Synthetic trailing parameter index, guarded against u16 overflow.
fn synthetic_param_index(index: usize, span: Span, decl: Name) -> Result<u16, TransformError> {
    u16::try_from(index).map_err(|_| {
        TransformError::new(
            decl,
            span,
            ErrorCode::W3001,
            "synthetic parameter index exceeds u16",
        )
    })
}

/// Deep-copy a subtree between arenas, preserving kinds and spans.
pub(crate) fn copy_subtree(src: &ExprArena, id: ExprId, out: &mut ExprArena) -> ExprId {
    ensure_sufficient_stack(|| copy_inner(src, id, out))
}

fn copy_inner(src: &ExprArena, id: ExprId, out: &mut ExprArena) -> ExprId {
    let span = src.span(id);
    let copy_opt = |src: &ExprArena, child: ExprId, out: &mut ExprArena| {
        if child.is_valid() {
            copy_subtree(src, child, out)
        } else {
            ExprId::INVALID
        }
    };

    match *src.kind(id) {
        ExprKind::Let { name, init } => {
            let init = copy_subtree(src, init, out);
            out.alloc(ExprKind::Let { name, init }, span)
        }
        ExprKind::Assign { target, value } => {
            let value = copy_subtree(src, value, out);
            out.alloc(ExprKind::Assign { target, value }, span)
        }
        ExprKind::Block { stmts, result } => {
            let ids: Vec<ExprId> = src
                .list(stmts)
                .to_vec()
                .into_iter()
                .map(|stmt| copy_subtree(src, stmt, out))
                .collect();
            let result = copy_opt(src, result, out);
            let range = out.alloc_list(&ids);
            out.alloc(
                ExprKind::Block {
                    stmts: range,
                    result,
                },
                span,
            )
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond = copy_subtree(src, cond, out);
            let then_branch = copy_subtree(src, then_branch, out);
            let else_branch = copy_opt(src, else_branch, out);
            out.alloc(
                ExprKind::If {
                    cond,
                    then_branch,
                    else_branch,
                },
                span,
            )
        }
        ExprKind::When { subject, branches } => {
            let subject = copy_opt(src, subject, out);
            let new_branches: Vec<weft_ir::WhenBranch> = src
                .when_branches(branches)
                .to_vec()
                .into_iter()
                .map(|branch| weft_ir::WhenBranch {
                    condition: copy_opt(src, branch.condition, out),
                    body: copy_subtree(src, branch.body, out),
                })
                .collect();
            let range = out.alloc_branches(&new_branches);
            out.alloc(
                ExprKind::When {
                    subject,
                    branches: range,
                },
                span,
            )
        }
        ExprKind::For {
            binding,
            iter,
            body,
        } => {
            let iter = copy_subtree(src, iter, out);
            let body = copy_subtree(src, body, out);
            out.alloc(
                ExprKind::For {
                    binding,
                    iter,
                    body,
                },
                span,
            )
        }
        ExprKind::While { cond, body } => {
            let cond = copy_subtree(src, cond, out);
            let body = copy_subtree(src, body, out);
            out.alloc(ExprKind::While { cond, body }, span)
        }
        ExprKind::Binary { op, left, right } => {
            let left = copy_subtree(src, left, out);
            let right = copy_subtree(src, right, out);
            out.alloc(ExprKind::Binary { op, left, right }, span)
        }
        ExprKind::Unary { op, operand } => {
            let operand = copy_subtree(src, operand, out);
            out.alloc(ExprKind::Unary { op, operand }, span)
        }
        ExprKind::SafeCall {
            receiver,
            method,
            args,
        } => {
            let receiver = copy_subtree(src, receiver, out);
            let new_args: Vec<CallArg> = src
                .call_args(args)
                .to_vec()
                .into_iter()
                .map(|arg| CallArg {
                    param: arg.param,
                    value: copy_subtree(src, arg.value, out),
                })
                .collect();
            let range = out.alloc_args(&new_args);
            out.alloc(
                ExprKind::SafeCall {
                    receiver,
                    method,
                    args: range,
                },
                span,
            )
        }
        ExprKind::Elvis { primary, fallback } => {
            let primary = copy_subtree(src, primary, out);
            let fallback = copy_subtree(src, fallback, out);
            out.alloc(ExprKind::Elvis { primary, fallback }, span)
        }
        ExprKind::Call {
            target,
            args,
            reactive,
        } => {
            let new_args: Vec<CallArg> = src
                .call_args(args)
                .to_vec()
                .into_iter()
                .map(|arg| CallArg {
                    param: arg.param,
                    value: copy_subtree(src, arg.value, out),
                })
                .collect();
            let range = out.alloc_args(&new_args);
            out.alloc(
                ExprKind::Call {
                    target,
                    args: range,
                    reactive,
                },
                span,
            )
        }
        ExprKind::Lambda { body } => {
            let body = copy_subtree(src, body, out);
            out.alloc(ExprKind::Lambda { body }, span)
        }
        ExprKind::InlineLambda { label, body } => {
            let body = copy_subtree(src, body, out);
            out.alloc(ExprKind::InlineLambda { label, body }, span)
        }
        ExprKind::KeyedBlock { keys, body } => {
            let ids: Vec<ExprId> = src
                .list(keys)
                .to_vec()
                .into_iter()
                .map(|key| copy_subtree(src, key, out))
                .collect();
            let range = out.alloc_list(&ids);
            let body = copy_subtree(src, body, out);
            out.alloc(ExprKind::KeyedBlock { keys: range, body }, span)
        }
        ExprKind::Return { value, label } => {
            let value = copy_opt(src, value, out);
            out.alloc(ExprKind::Return { value, label }, span)
        }
        ExprKind::StartMovableGroup { key, identity } => {
            let identity = copy_subtree(src, identity, out);
            out.alloc(ExprKind::StartMovableGroup { key, identity }, span)
        }
        ExprKind::Changed { value } => {
            let value = copy_subtree(src, value, out);
            out.alloc(ExprKind::Changed { value }, span)
        }
        ExprKind::JoinKey { left, right } => {
            let left = copy_subtree(src, left, out);
            let right = copy_subtree(src, right, out);
            out.alloc(ExprKind::JoinKey { left, right }, span)
        }
        ExprKind::SetDirtyWord { word, value } => {
            let value = copy_subtree(src, value, out);
            out.alloc(ExprKind::SetDirtyWord { word, value }, span)
        }
        // Leaves (literals, identifiers, nullary runtime ops).
        kind => out.alloc(kind, span),
    }
}

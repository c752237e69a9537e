//! The per-function decision procedure of spec §4.3 steps 1-6: seed a token at every allocation
//! site, propagate it through assignments, consume it at releases/returns, and flag the pointers
//! that never held a token as borrows.

use rustc_hash::FxHashMap;
use transpiler_analysis::{BlockId, Cfg, FunctionAnalysis, PointsToTarget, Terminator};
use transpiler_hir::{
    AllocSiteId, ArrayLen, Expr, ExprKind, Function, Ident, OwnershipRole, Refinement, StmtKind,
};
use transpiler_session::{diagnostics::DiagnosticsHandler, AllocatorCatalog};

use crate::plan::OwnershipPlan;

/// Which role a callee's parameter plays, as seen from a caller deciding whether a call consumes
/// its argument's token (spec §4.3 step 7 "call sites unify caller-side tokens with summaries").
pub type CalleeSummaries = FxHashMap<Ident, FunctionSummary>;

#[derive(Debug, Clone, Default)]
pub struct FunctionSummary {
    pub param_roles: FxHashMap<Ident, OwnershipRole>,
    pub return_role: Option<OwnershipRole>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct OwnerState {
    /// The single ident currently holding each token, if ownership of it is still unambiguous.
    holder: FxHashMap<AllocSiteId, Ident>,
}

impl OwnerState {
    fn find_token(&self, ident: &Ident) -> Option<AllocSiteId> {
        self.holder.iter().find_map(|(site, holder)| (holder == ident).then_some(*site))
    }
}

fn join_owner_state(a: &OwnerState, b: &OwnerState) -> OwnerState {
    let mut merged = OwnerState::default();
    let tokens: std::collections::HashSet<_> = a.holder.keys().chain(b.holder.keys()).collect();
    for token in tokens {
        match (a.holder.get(token), b.holder.get(token)) {
            (Some(x), Some(y)) if x == y => {
                merged.holder.insert(*token, x.clone());
            }
            // Disagreement between branches: conservatively treat the token as unheld rather than
            // risk two variables both believing they own it (spec §4.3 step 2's join rule).
            _ => {}
        }
    }
    merged
}

fn callee_name(callee: &Expr) -> Option<&Ident> {
    match &callee.kind {
        ExprKind::Name(ident) => Some(ident),
        _ => None,
    }
}

fn pointer_name(expr: &Expr) -> Option<&Ident> {
    match &expr.kind {
        ExprKind::Name(ident) => Some(ident),
        ExprKind::Cast { expr, .. } | ExprKind::Promotion { expr, .. } => pointer_name(expr),
        _ => None,
    }
}

/// Walks every sub-expression of `expr` looking for `Index` nodes based on `ident`, to decide
/// whether its allocation should be classified `OwningArray` rather than `Owning` (spec §4.3
/// step 6).
fn references_via_index(expr: &Expr, ident: &Ident) -> bool {
    match &expr.kind {
        ExprKind::Index { base, index } => {
            pointer_name(base) == Some(ident) || references_via_index(base, ident) || references_via_index(index, ident)
        }
        ExprKind::Member { base, .. } => references_via_index(base, ident),
        ExprKind::Unary { operand, .. } => references_via_index(operand, ident),
        ExprKind::Binary { lhs, rhs, .. } => {
            references_via_index(lhs, ident) || references_via_index(rhs, ident)
        }
        ExprKind::Ternary { cond, then_branch, else_branch } => {
            references_via_index(cond, ident)
                || references_via_index(then_branch, ident)
                || references_via_index(else_branch, ident)
        }
        ExprKind::Cast { expr, .. } | ExprKind::Promotion { expr, .. } => {
            references_via_index(expr, ident)
        }
        ExprKind::AddrOf(inner) | ExprKind::Deref(inner) => references_via_index(inner, ident),
        ExprKind::Call { callee, args } => {
            references_via_index(callee, ident) || args.iter().any(|a| references_via_index(a, ident))
        }
        ExprKind::CompoundLiteral { fields, .. } => {
            fields.iter().any(|(_, v)| references_via_index(v, ident))
        }
        ExprKind::Sequence(exprs) => exprs.iter().any(|e| references_via_index(e, ident)),
        ExprKind::Assign { lhs, rhs, .. } => {
            references_via_index(lhs, ident) || references_via_index(rhs, ident)
        }
        ExprKind::Literal(_) | ExprKind::Name(_) | ExprKind::Unsupported(_) => false,
    }
}

fn writes_through(expr: &Expr, ident: &Ident) -> bool {
    match &expr.kind {
        ExprKind::Assign { lhs, rhs, .. } => {
            let direct = match &lhs.kind {
                ExprKind::Deref(inner) => pointer_name(inner) == Some(ident),
                ExprKind::Member { base, via_pointer: true, .. } => pointer_name(base) == Some(ident),
                ExprKind::Index { base, .. } => pointer_name(base) == Some(ident),
                _ => false,
            };
            direct || writes_through(rhs, ident)
        }
        ExprKind::Call { callee, args } => {
            writes_through(callee, ident) || args.iter().any(|a| writes_through(a, ident))
        }
        ExprKind::Sequence(exprs) => exprs.iter().any(|e| writes_through(e, ident)),
        _ => false,
    }
}

fn walk_all_exprs<'a>(cfg: &'a Cfg, mut visit: impl FnMut(&'a Expr)) {
    for (_, block) in cfg.blocks() {
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::Expr(expr) => visit(expr),
                StmtKind::Decl(decl) => {
                    if let Some(init) = &decl.init {
                        visit(init);
                    }
                }
                _ => {}
            }
        }
        if let Terminator::Return(Some(value)) = &block.terminator {
            visit(value);
        }
    }
}

/// Runs the local decision procedure for one function, given the already-inferred summaries of
/// every other function in the unit (possibly incomplete on the first interprocedural pass).
pub fn infer_function(
    function: &Function,
    analysis: &FunctionAnalysis,
    catalog: &AllocatorCatalog,
    callees: &CalleeSummaries,
    diagnostics: &mut DiagnosticsHandler,
) -> OwnershipPlan {
    let mut plan = OwnershipPlan::default();
    let cfg = &analysis.cfg;
    let points_to = &analysis.points_to;

    let block_ids: Vec<BlockId> = cfg.blocks().map(|(id, _)| id).collect();
    let mut out_sets: FxHashMap<BlockId, OwnerState> =
        block_ids.iter().map(|&b| (b, OwnerState::default())).collect();
    let mut worklist = block_ids.clone();
    // Idents returned by value that never held a token at the return point: a borrow is the only
    // other classification a returned pointer can carry, so these are resolved once step 5 (borrow
    // classification) has run.
    let mut pending_return_idents: Vec<Ident> = Vec::new();

    while let Some(block) = worklist.pop() {
        let mut state = OwnerState::default();
        let mut first = true;
        for pred in cfg.predecessors(block) {
            if let Some(pred_out) = out_sets.get(&pred) {
                state = if first { pred_out.clone() } else { join_owner_state(&state, pred_out) };
                first = false;
            }
        }

        let bb = cfg.block(block);
        for stmt in &bb.stmts {
            match &stmt.kind {
                StmtKind::Decl(decl) if decl.ty.is_pointer() => {
                    if let Some(init) = &decl.init {
                        apply_assignment(&decl.name, init, &mut state, &mut plan, points_to, catalog, callees, diagnostics);
                    }
                }
                StmtKind::Expr(expr) => {
                    handle_expr_statement(expr, &mut state, &mut plan, points_to, catalog, callees, diagnostics)
                }
                _ => {}
            }
        }
        if let Terminator::Return(Some(value)) = &bb.terminator {
            if value.ty.is_pointer() {
                if let Some(ident) = pointer_name(value) {
                    match state.holder.remove(ident) {
                        Some(token) => {
                            plan.return_role = Some(OwnershipRole::ReturnsOwning);
                            plan.return_marker = Some(plan.refinement_for_site(token, alloc_kind_of(points_to, token)));
                        }
                        None => pending_return_idents.push(ident.clone()),
                    }
                }
            }
        }

        let changed = out_sets.get(&block).map(|existing| existing != &state).unwrap_or(true);
        if changed {
            out_sets.insert(block, state);
            for succ in cfg.successors(block) {
                worklist.push(succ);
            }
        }
    }

    // Borrow classification (spec §4.3 step 5): any pointer-typed parameter or local never seen
    // holding a token above is a borrow over the region it was declared in.
    for param in &function.params {
        if !param.ty.is_pointer() {
            continue;
        }
        if !plan.markers.contains_key(&param.name) {
            let mutable = is_written_through(&param.name, cfg);
            let region = analysis.regions.declaring_region(&param.name).unwrap_or(analysis.regions.root);
            plan.set_marker(param.name.clone(), Refinement::Borrow { mutable, region });
            let role =
                if mutable { OwnershipRole::BorrowsMutable } else { OwnershipRole::BorrowsImmutable };
            plan.param_roles.insert(param.name.clone(), role);
        }
    }

    // Array vs single (spec §4.3 step 6): promote any `Owning` token to `OwningArray` if its
    // holder is ever indexed.
    let owner_of_site: FxHashMap<AllocSiteId, Ident> = plan
        .markers
        .iter()
        .filter_map(|(ident, refinement)| refinement.alloc_site().map(|site| (site, ident.clone())))
        .collect();
    for (site, owner) in &owner_of_site {
        let mut indexed = false;
        walk_all_exprs(cfg, |expr| {
            if references_via_index(expr, owner) {
                indexed = true;
            }
        });
        if indexed {
            plan.array_sites.insert(*site, ArrayLen::Dynamic);
            plan.set_marker(owner.clone(), Refinement::OwningArray(*site, ArrayLen::Dynamic));
        }
    }

    // Resolve pending returns (a pointer returned by value that never held a token): whatever
    // classification its ident settled into above — borrow, or a raw escape from a duplicate-
    // ownership demotion — is also what the return slot itself carries.
    for ident in &pending_return_idents {
        if plan.return_marker.is_none() {
            if let Some(marker) = plan.marker_for(ident) {
                plan.return_marker = Some(marker.clone());
            }
        }
    }
    // An owning return whose site was promoted to an array after the eager assignment above needs
    // its return marker refreshed to match.
    if let Some(Refinement::Owning(site)) = &plan.return_marker {
        if let Some(len) = plan.array_sites.get(site) {
            plan.return_marker = Some(Refinement::OwningArray(*site, *len));
        }
    }

    plan
}

fn is_written_through(ident: &Ident, cfg: &Cfg) -> bool {
    let mut found = false;
    walk_all_exprs(cfg, |expr| {
        if writes_through(expr, ident) {
            found = true;
        }
    });
    found
}

#[allow(clippy::too_many_arguments)]
fn handle_expr_statement(
    expr: &Expr,
    state: &mut OwnerState,
    plan: &mut OwnershipPlan,
    points_to: &transpiler_analysis::PointsToSummary,
    catalog: &AllocatorCatalog,
    callees: &CalleeSummaries,
    diagnostics: &mut DiagnosticsHandler,
) {
    match &expr.kind {
        ExprKind::Assign { lhs, rhs, .. } => {
            if let Some(ident) = pointer_name(lhs) {
                if lhs.ty.is_pointer() {
                    apply_assignment(ident, rhs, state, plan, points_to, catalog, callees, diagnostics);
                    return;
                }
            }
            consume_sinks(rhs, state, plan, catalog, callees, diagnostics);
        }
        ExprKind::Call { .. } => consume_sinks(expr, state, plan, catalog, callees, diagnostics),
        _ => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_assignment(
    ident: &Ident,
    source: &Expr,
    state: &mut OwnerState,
    plan: &mut OwnershipPlan,
    points_to: &transpiler_analysis::PointsToSummary,
    catalog: &AllocatorCatalog,
    callees: &CalleeSummaries,
    diagnostics: &mut DiagnosticsHandler,
) {
    consume_sinks(source, state, plan, catalog, callees, diagnostics);

    match points_to.target_at(source.span) {
        PointsToTarget::Sites(sites) if sites.len() == 1 => {
            let token = *sites.iter().next().unwrap();
            if let Some(prior) = state.holder.get(&token).cloned() {
                if &prior != ident {
                    diagnostics.warning(
                        "W-OWNERSHIP-0001",
                        format!(
                            "allocation is held by both `{prior}` and `{ident}`; demoting both to a raw pointer"
                        ),
                    );
                    plan.demote(&prior, "duplicate ownership of the same allocation");
                    plan.demote(ident, "duplicate ownership of the same allocation");
                    state.holder.remove(&token);
                    return;
                }
            }
            state.holder.insert(token, ident.clone());
            plan.set_marker(ident.clone(), plan.refinement_for_site(token, alloc_kind_of(points_to, token)));
        }
        PointsToTarget::Sites(_) | PointsToTarget::Top => {
            // More than one feasible target, or an unrecognized source: no single token to seed,
            // so this assignment does not make `ident` an owner on its own.
            if let Some(name) = pointer_name(source) {
                if let Some(token) = state.holder.remove(name) {
                    state.holder.insert(token, ident.clone());
                }
            }
        }
        PointsToTarget::Empty => {
            if let Some(name) = pointer_name(source) {
                if let Some(token) = state.holder.remove(name) {
                    state.holder.insert(token, ident.clone());
                }
            }
        }
    }
}

fn alloc_kind_of(points_to: &transpiler_analysis::PointsToSummary, site: AllocSiteId) -> transpiler_hir::AllocKind {
    points_to.alloc_sites.get(site).map(|s| s.kind).unwrap_or(transpiler_hir::AllocKind::One)
}

/// Handles calls that consume a token: recognized releasers, recognized reallocators (which
/// consume the old token as a side effect even though they also produce a new one as an
/// allocation site), and calls into callees whose summary says a given parameter consumes.
fn consume_sinks(
    expr: &Expr,
    state: &mut OwnerState,
    plan: &mut OwnershipPlan,
    catalog: &AllocatorCatalog,
    callees: &CalleeSummaries,
    diagnostics: &mut DiagnosticsHandler,
) {
    let ExprKind::Call { callee, args } = &expr.kind else {
        return;
    };
    let Some(name) = callee_name(callee) else {
        return;
    };

    if catalog.is_releaser(name.as_str()) || catalog.is_reallocator(name.as_str()) {
        if let Some(arg_ident) = args.first().and_then(pointer_name) {
            match state.find_token(arg_ident) {
                Some(token) => {
                    state.holder.remove(&token);
                }
                None => diagnostics.note(
                    "N-OWNERSHIP-0002",
                    format!("release of `{arg_ident}`, which this analysis did not see acquire a token"),
                ),
            }
        }
        return;
    }

    if let Some(summary) = callees.get(name) {
        let consumes_an_arg = summary.param_roles.values().any(|role| *role == OwnershipRole::Consumes);
        if consumes_an_arg {
            if let Some(arg_ident) = args.iter().find_map(pointer_name) {
                if let Some(token) = state.find_token(arg_ident) {
                    state.holder.remove(&token);
                }
            }
        }
    }
}

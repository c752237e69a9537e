//! Points-to summary (spec §4.2): for every pointer-valued expression, an over-approximation of
//! the allocation sites it may refer to.
//!
//! The propagation is flow-sensitive (tracked per program point) and field-insensitive (a member
//! access through a pointer is treated as referring to the same allocation as its base, rather
//! than tracking individual fields) — soundness requires over-approximation, never omission of a
//! feasible target, so every join is a set union and every unrecognized source of a pointer value
//! (an opaque function call, the address of a local) widens straight to [`PointsToTarget::Top`].

use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;
use transpiler_hir::{
    AllocKind, AllocSite, AllocSiteId, BlockId, Expr, ExprKind, Function, Ident, StmtKind,
};
use transpiler_session::{AllocatorCatalog, AllocatorRole, Span};

use crate::{
    cfg::Cfg,
    lattice::{ChangeResult, Lattice},
};

/// Where a pointer value may point, per spec §4.2's soundness contract: `Top` stands for "may
/// point anywhere", the least precise but always-safe answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PointsToTarget {
    #[default]
    Empty,
    Sites(std::collections::BTreeSet<AllocSiteId>),
    Top,
}

impl PointsToTarget {
    fn single(site: AllocSiteId) -> Self {
        let mut set = std::collections::BTreeSet::new();
        set.insert(site);
        PointsToTarget::Sites(set)
    }

    fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (PointsToTarget::Top, _) | (_, PointsToTarget::Top) => PointsToTarget::Top,
            (PointsToTarget::Empty, other) => other.clone(),
            (this, PointsToTarget::Empty) => this.clone(),
            (PointsToTarget::Sites(a), PointsToTarget::Sites(b)) => {
                PointsToTarget::Sites(a.union(b).copied().collect())
            }
        }
    }

    pub fn sites(&self) -> Option<&std::collections::BTreeSet<AllocSiteId>> {
        match self {
            PointsToTarget::Sites(set) => Some(set),
            _ => None,
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(self, PointsToTarget::Top)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct PointsToState(FxHashMap<Ident, PointsToTarget>);

impl Lattice for PointsToState {
    fn bottom() -> Self {
        Self::default()
    }

    fn join(&mut self, other: &Self) -> ChangeResult {
        let mut changed = false;
        for (ident, target) in &other.0 {
            let merged = match self.0.get(ident) {
                Some(existing) => existing.union(target),
                None => target.clone(),
            };
            if self.0.get(ident) != Some(&merged) {
                changed = true;
                self.0.insert(ident.clone(), merged);
            }
        }
        ChangeResult::from(changed)
    }
}

/// The points-to summary for one function: per block entry state, and a resolved target for
/// every pointer-producing expression encountered (keyed by its span).
#[derive(Debug, Default)]
pub struct PointsToSummary {
    pub alloc_sites: PrimaryMap<AllocSiteId, AllocSite>,
    targets: FxHashMap<Span, PointsToTarget>,
}

impl PointsToSummary {
    pub fn target_at(&self, span: Span) -> PointsToTarget {
        self.targets.get(&span).cloned().unwrap_or_default()
    }
}

fn alloc_kind_for(role: AllocatorRole) -> Option<AllocKind> {
    match role {
        AllocatorRole::AllocatesOne => Some(AllocKind::One),
        AllocatorRole::AllocatesArray => Some(AllocKind::Array),
        AllocatorRole::Reallocates => Some(AllocKind::Reallocation),
        AllocatorRole::Releases => None,
    }
}

/// Walks every call expression reachable in `cfg` and assigns a fresh [`AllocSiteId`] to each one
/// recognized by `catalog` as an allocating or reallocating call (spec §4.3's allocator catalog).
pub fn collect_alloc_sites(
    cfg: &Cfg,
    function: &Function,
    catalog: &AllocatorCatalog,
) -> (PrimaryMap<AllocSiteId, AllocSite>, FxHashMap<Span, AllocSiteId>) {
    let mut sites = PrimaryMap::new();
    let mut by_span = FxHashMap::default();

    fn walk(
        expr: &Expr,
        function: &Function,
        catalog: &AllocatorCatalog,
        sites: &mut PrimaryMap<AllocSiteId, AllocSite>,
        by_span: &mut FxHashMap<Span, AllocSiteId>,
    ) {
        if let ExprKind::Call { callee, args } = &expr.kind {
            if let ExprKind::Name(name) = &callee.kind {
                if let Some(role) = catalog.role(name.as_str()) {
                    if let Some(kind) = alloc_kind_for(role) {
                        let id = sites.push(AllocSite {
                            function: function.name.clone(),
                            callee: name.clone(),
                            kind,
                            span: expr.span,
                        });
                        by_span.insert(expr.span, id);
                    }
                }
            }
            walk(callee, function, catalog, sites, by_span);
            for arg in args {
                walk(arg, function, catalog, sites, by_span);
            }
        } else {
            for child in expr_children(expr) {
                walk(child, function, catalog, sites, by_span);
            }
        }
    }

    for (_, block) in cfg.blocks() {
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::Expr(expr) => walk(expr, function, catalog, &mut sites, &mut by_span),
                StmtKind::Decl(decl) => {
                    if let Some(init) = &decl.init {
                        walk(init, function, catalog, &mut sites, &mut by_span);
                    }
                }
                _ => {}
            }
        }
        if let crate::cfg::Terminator::Return(Some(value)) = &block.terminator {
            walk(value, function, catalog, &mut sites, &mut by_span);
        }
    }

    (sites, by_span)
}

fn expr_children(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::Member { base, .. } => vec![base],
        ExprKind::Index { base, index } => vec![base, index],
        ExprKind::Unary { operand, .. } => vec![operand],
        ExprKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
        ExprKind::Ternary { cond, then_branch, else_branch } => {
            vec![cond, then_branch, else_branch]
        }
        ExprKind::Cast { expr, .. } | ExprKind::Promotion { expr, .. } => vec![expr],
        ExprKind::AddrOf(inner) | ExprKind::Deref(inner) => vec![inner],
        ExprKind::CompoundLiteral { fields, .. } => fields.iter().map(|(_, v)| v).collect(),
        ExprKind::Sequence(exprs) => exprs.iter().collect(),
        ExprKind::Assign { lhs, rhs, .. } => vec![lhs, rhs],
        ExprKind::Literal(_) | ExprKind::Name(_) | ExprKind::Call { .. } | ExprKind::Unsupported(_) => {
            Vec::new()
        }
    }
}

/// Resolves the points-to target of `expr` given the current flow state, recording it under the
/// expression's own span and recursing into subexpressions so every pointer-producing node along
/// the way gets an entry too.
fn resolve(
    expr: &Expr,
    state: &FxHashMap<Ident, PointsToTarget>,
    by_span: &FxHashMap<Span, AllocSiteId>,
    out: &mut FxHashMap<Span, PointsToTarget>,
) -> PointsToTarget {
    let target = match &expr.kind {
        ExprKind::Literal(transpiler_hir::Literal::Null) => PointsToTarget::Empty,
        ExprKind::Literal(_) => PointsToTarget::Empty,
        ExprKind::Name(ident) => state.get(ident).cloned().unwrap_or_default(),
        ExprKind::Call { .. } => {
            if let Some(site) = by_span.get(&expr.span) {
                PointsToTarget::single(*site)
            } else {
                // An unrecognized call returning a pointer could hand back anything: widen.
                PointsToTarget::Top
            }
        }
        ExprKind::Cast { expr: inner, .. } | ExprKind::Promotion { expr: inner, .. } => {
            resolve(inner, state, by_span, out)
        }
        ExprKind::Binary { op: transpiler_hir::BinOp::Add, lhs, .. }
        | ExprKind::Binary { op: transpiler_hir::BinOp::Sub, lhs, .. } => {
            // Pointer arithmetic yields a view into the same object(s) the base pointer targets.
            resolve(lhs, state, by_span, out)
        }
        ExprKind::Ternary { then_branch, else_branch, .. } => {
            let then_target = resolve(then_branch, state, by_span, out);
            let else_target = resolve(else_branch, state, by_span, out);
            then_target.union(&else_target)
        }
        ExprKind::Member { base, via_pointer: true, .. } => resolve(base, state, by_span, out),
        ExprKind::Deref(inner) => resolve(inner, state, by_span, out),
        ExprKind::Assign { rhs, .. } => resolve(rhs, state, by_span, out),
        // Address-of, non-pointer-dereferencing member access, indexing, and anything else that
        // might yield a pointer without a tracked origin: sound but imprecise.
        ExprKind::AddrOf(_) | ExprKind::Index { .. } | ExprKind::Member { via_pointer: false, .. } => {
            PointsToTarget::Top
        }
        ExprKind::Unary { .. } | ExprKind::Sequence(_) | ExprKind::CompoundLiteral { .. }
        | ExprKind::Unsupported(_) => PointsToTarget::Empty,
    };
    out.insert(expr.span, target.clone());
    target
}

/// Computes the points-to summary for `function` over `cfg`, widening at loop headers so the
/// fixpoint is reached in a bounded number of passes even though the lattice (subsets of a
/// per-function alloc-site set, plus `Top`) already has finite height.
pub fn compute(cfg: &Cfg, function: &Function, catalog: &AllocatorCatalog) -> PointsToSummary {
    let (alloc_sites, by_span) = collect_alloc_sites(cfg, function, catalog);

    let block_ids: Vec<BlockId> = cfg.blocks().map(|(id, _)| id).collect();
    let loop_headers: std::collections::HashSet<BlockId> = block_ids
        .iter()
        .copied()
        .filter(|&b| cfg.predecessors(b).any(|p| cfg.is_back_edge(p, b)))
        .collect();

    let mut out_sets: FxHashMap<BlockId, PointsToState> =
        block_ids.iter().map(|&b| (b, PointsToState::bottom())).collect();
    let mut visit_count: FxHashMap<BlockId, u32> = block_ids.iter().map(|&b| (b, 0)).collect();
    let mut targets = FxHashMap::default();

    let mut worklist: Vec<BlockId> = block_ids.clone();
    while let Some(block) = worklist.pop() {
        let mut in_state = PointsToState::bottom();
        for pred in cfg.predecessors(block) {
            if let Some(pred_out) = out_sets.get(&pred) {
                in_state.join(pred_out);
            }
        }

        if loop_headers.contains(&block) {
            let count = visit_count.entry(block).or_insert(0);
            *count += 1;
            if *count > 1 {
                // Widening: once a loop header has been revisited, any variable whose target set
                // is still growing is promoted straight to `Top` rather than iterated further.
                if let Some(previous) = out_sets.get(&block) {
                    for (ident, prev_target) in &previous.0 {
                        if let Some(new_target) = in_state.0.get(ident) {
                            if new_target != prev_target && !new_target.is_top() {
                                in_state.0.insert(ident.clone(), PointsToTarget::Top);
                            }
                        }
                    }
                }
            }
        }

        let bb = cfg.block(block);
        let mut state = in_state.0.clone();
        for stmt in &bb.stmts {
            match &stmt.kind {
                StmtKind::Decl(decl) => {
                    if let Some(init) = &decl.init {
                        let target = resolve(init, &state, &by_span, &mut targets);
                        if decl.ty.is_pointer() {
                            state.insert(decl.name.clone(), target);
                        }
                    }
                }
                StmtKind::Expr(expr) => {
                    if let ExprKind::Assign { lhs, rhs, .. } = &expr.kind {
                        let target = resolve(rhs, &state, &by_span, &mut targets);
                        if let ExprKind::Name(ident) = &lhs.kind {
                            state.insert(ident.clone(), target);
                        }
                    } else {
                        resolve(expr, &state, &by_span, &mut targets);
                    }
                }
                _ => {}
            }
        }
        if let crate::cfg::Terminator::Return(Some(value)) = &bb.terminator {
            resolve(value, &state, &by_span, &mut targets);
        }

        let new_out = PointsToState(state);
        let changed = out_sets.get(&block).map(|existing| existing != &new_out).unwrap_or(true);
        if changed {
            out_sets.insert(block, new_out);
            for succ in cfg.successors(block) {
                worklist.push(succ);
            }
        }
    }

    PointsToSummary { alloc_sites, targets }
}

#[cfg(test)]
mod tests {
    use transpiler_hir::{IntWidth, Literal, Param, Qualifiers, Ty, ValueCategory};
    use transpiler_session::Span;

    use super::*;
    use crate::cfg::build_cfg;

    fn call_malloc(span: Span) -> Expr {
        let callee = Expr::new(
            ExprKind::Name(Ident::new("malloc")),
            Ty::Function(Vec::new(), Box::new(Ty::Void), false),
            ValueCategory::RValue,
            span,
        );
        Expr::new(
            ExprKind::Call { callee: Box::new(callee), args: Vec::new() },
            Ty::pointer_to(Ty::Void, Qualifiers::default(), false),
            ValueCategory::RValue,
            span,
        )
    }

    #[test]
    fn pointer_initialized_from_recognized_allocator_points_to_one_site() {
        let call_span = Span::new(transpiler_session::SourceId(0), 10, 20, 1, 10);
        let p = Ident::new("p");
        let body = transpiler_hir::Stmt::block(
            vec![
                transpiler_hir::Stmt::new(
                    StmtKind::Decl(transpiler_hir::LocalDecl {
                        name: p.clone(),
                        ty: Ty::pointer_to(Ty::Int { signed: true, width: IntWidth::W32 }, Qualifiers::default(), false),
                        init: Some(call_malloc(call_span)),
                    }),
                    Span::UNKNOWN,
                ),
                transpiler_hir::Stmt::new(StmtKind::Return(None), Span::UNKNOWN),
            ],
            Span::UNKNOWN,
        );
        let function = Function::new(Ident::new("f"), Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN);
        let cfg = build_cfg(&function).expect("structured body lowers");
        let catalog = AllocatorCatalog::default();
        let summary = compute(&cfg, &function, &catalog);

        assert_eq!(summary.alloc_sites.len(), 1);
        let target = summary.target_at(call_span);
        assert!(matches!(target, PointsToTarget::Sites(_)));
        assert!(!target.is_top());
    }

    #[test]
    fn unrecognized_call_widens_to_top() {
        let call_span = Span::new(transpiler_session::SourceId(0), 10, 20, 1, 10);
        let callee = Expr::new(
            ExprKind::Name(Ident::new("opaque_factory")),
            Ty::Function(Vec::new(), Box::new(Ty::Void), false),
            ValueCategory::RValue,
            call_span,
        );
        let call = Expr::new(
            ExprKind::Call { callee: Box::new(callee), args: Vec::new() },
            Ty::pointer_to(Ty::Void, Qualifiers::default(), false),
            ValueCategory::RValue,
            call_span,
        );
        let p = Ident::new("p");
        let body = transpiler_hir::Stmt::block(
            vec![
                transpiler_hir::Stmt::new(
                    StmtKind::Decl(transpiler_hir::LocalDecl {
                        name: p.clone(),
                        ty: Ty::pointer_to(Ty::Void, Qualifiers::default(), false),
                        init: Some(call),
                    }),
                    Span::UNKNOWN,
                ),
                transpiler_hir::Stmt::new(StmtKind::Return(None), Span::UNKNOWN),
            ],
            Span::UNKNOWN,
        );
        let function = Function::new(Ident::new("f"), Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN);
        let cfg = build_cfg(&function).expect("structured body lowers");
        let catalog = AllocatorCatalog::default();
        let summary = compute(&cfg, &function, &catalog);

        assert_eq!(summary.alloc_sites.len(), 0);
        assert!(summary.target_at(call_span).is_top());
        let _ = Literal::Null;
    }
}

//! Ownership inference (spec §4.3): decides, for every pointer in a translation unit, whether it
//! uniquely owns an allocation, borrows one, or must fall back to a raw escape hatch.
//!
//! The crate is split the same way the analyzer is: [`classify::infer_function`] computes a
//! [`plan::OwnershipPlan`] per function from already-built analyses, and [`apply`] is the only
//! place that mutates the HIR's [`transpiler_hir::Refinement`] markers in place.

pub mod classify;
pub mod plan;

use petgraph::{algo::tarjan_scc, graphmap::DiGraphMap};
use rustc_hash::FxHashMap;
use transpiler_analysis::AnalysisResults;
use transpiler_hir::{Expr, ExprKind, Function, Ident, OwnershipRole, Stmt, StmtKind, TranslationUnit};
use transpiler_session::{diagnostics::DiagnosticsHandler, AllocatorCatalog};

pub use classify::{CalleeSummaries, FunctionSummary};
pub use plan::OwnershipPlan;

/// Ownership inference is locally exact but interprocedurally bounded: rather than iterating a
/// per-SCC fixed point to a proven stop, this runs the whole unit's per-function procedure a fixed
/// number of passes, feeding each pass's summaries to the next. Within each pass, every strongly
/// connected component of the call graph (spec §4.3 step 8) gets a single merged `return_role`
/// summary rather than letting its members' individually-computed return roles disagree — direct
/// and mutual recursion are otherwise indistinguishable from two unrelated functions that happen
/// to converge over several passes.
const INTERPROCEDURAL_PASSES: usize = 3;

pub type OwnershipResults = FxHashMap<Ident, OwnershipPlan>;

fn collect_calls(stmt: &Stmt, calls: &mut Vec<Ident>) {
    match &stmt.kind {
        StmtKind::Block(stmts) => stmts.iter().for_each(|s| collect_calls(s, calls)),
        StmtKind::Decl(local) => {
            if let Some(e) = &local.init {
                collect_call_exprs(e, calls);
            }
        }
        StmtKind::Expr(e) => collect_call_exprs(e, calls),
        StmtKind::If { cond, then_branch, else_branch } => {
            collect_call_exprs(cond, calls);
            collect_calls(then_branch, calls);
            if let Some(s) = else_branch {
                collect_calls(s, calls);
            }
        }
        StmtKind::While { cond, body } => {
            collect_call_exprs(cond, calls);
            collect_calls(body, calls);
        }
        StmtKind::For { init, cond, step, body } => {
            if let Some(s) = init {
                collect_calls(s, calls);
            }
            if let Some(e) = cond {
                collect_call_exprs(e, calls);
            }
            if let Some(e) = step {
                collect_call_exprs(e, calls);
            }
            collect_calls(body, calls);
        }
        StmtKind::DoWhile { body, cond } => {
            collect_calls(body, calls);
            collect_call_exprs(cond, calls);
        }
        StmtKind::Switch { scrutinee, cases, default } => {
            collect_call_exprs(scrutinee, calls);
            for case in cases {
                case.body.iter().for_each(|s| collect_calls(s, calls));
            }
            if let Some(stmts) = default {
                stmts.iter().for_each(|s| collect_calls(s, calls));
            }
        }
        StmtKind::Return(e) => {
            if let Some(e) = e {
                collect_call_exprs(e, calls);
            }
        }
        StmtKind::Labeled(_, inner) => collect_calls(inner, calls),
        StmtKind::Break | StmtKind::Continue | StmtKind::Goto(_) | StmtKind::Unsupported(_) => {}
    }
}

fn collect_call_exprs(expr: &Expr, calls: &mut Vec<Ident>) {
    match &expr.kind {
        ExprKind::Call { callee, args } => {
            if let ExprKind::Name(ident) = &callee.kind {
                calls.push(ident.clone());
            }
            collect_call_exprs(callee, calls);
            args.iter().for_each(|a| collect_call_exprs(a, calls));
        }
        ExprKind::Literal(_) | ExprKind::Name(_) | ExprKind::Unsupported(_) => {}
        ExprKind::Member { base, .. } => collect_call_exprs(base, calls),
        ExprKind::Index { base, index } => {
            collect_call_exprs(base, calls);
            collect_call_exprs(index, calls);
        }
        ExprKind::Unary { operand, .. } => collect_call_exprs(operand, calls),
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_call_exprs(lhs, calls);
            collect_call_exprs(rhs, calls);
        }
        ExprKind::Ternary { cond, then_branch, else_branch } => {
            collect_call_exprs(cond, calls);
            collect_call_exprs(then_branch, calls);
            collect_call_exprs(else_branch, calls);
        }
        ExprKind::Cast { expr: inner, .. }
        | ExprKind::Promotion { expr: inner, .. }
        | ExprKind::Deref(inner)
        | ExprKind::AddrOf(inner) => collect_call_exprs(inner, calls),
        ExprKind::CompoundLiteral { fields, .. } => fields.iter().for_each(|(_, e)| collect_call_exprs(e, calls)),
        ExprKind::Sequence(exprs) => exprs.iter().for_each(|e| collect_call_exprs(e, calls)),
        ExprKind::Assign { lhs, rhs, .. } => {
            collect_call_exprs(lhs, calls);
            collect_call_exprs(rhs, calls);
        }
    }
}

/// The unit's call graph restricted to direct calls between functions analyzed in this pass,
/// partitioned into strongly connected components via Tarjan's algorithm. Singleton groups with
/// no self-edge are omitted since they carry nothing to merge.
fn call_graph_sccs(functions: &[&Function]) -> Vec<Vec<Ident>> {
    let index_of: FxHashMap<Ident, usize> = functions.iter().enumerate().map(|(i, f)| (f.name.clone(), i)).collect();
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for i in 0..functions.len() {
        graph.add_node(i);
    }
    for (i, function) in functions.iter().enumerate() {
        let mut calls = Vec::new();
        collect_calls(&function.body, &mut calls);
        for callee in calls {
            if let Some(&j) = index_of.get(&callee) {
                graph.add_edge(i, j, ());
            }
        }
    }
    tarjan_scc(&graph)
        .into_iter()
        .filter(|group| group.len() > 1 || graph.contains_edge(group[0], group[0]))
        .map(|group| group.into_iter().map(|idx| functions[idx].name.clone()).collect())
        .collect()
}

/// Gives every member of an SCC the same `return_role`: unanimous if every member's
/// just-computed return role already agrees, or unresolved (`None`) otherwise, so a recursive
/// cycle that hasn't converged demotes at [`apply`] rather than letting one member's guess win
/// arbitrarily over another's.
fn merge_scc_summaries(sccs: &[Vec<Ident>], callees: &mut CalleeSummaries) {
    for group in sccs {
        let mut merged: Option<Option<OwnershipRole>> = None;
        let mut unanimous = true;
        for name in group {
            let Some(summary) = callees.get(name) else { continue };
            match &merged {
                None => merged = Some(summary.return_role),
                Some(first) if *first != summary.return_role => unanimous = false,
                Some(_) => {}
            }
        }
        let resolved = if unanimous { merged.flatten() } else { None };
        for name in group {
            if let Some(summary) = callees.get_mut(name) {
                summary.return_role = resolved;
            }
        }
    }
}

/// Runs ownership inference over every analyzed function in `unit`.
pub fn infer(
    unit: &TranslationUnit,
    analysis: &AnalysisResults,
    catalog: &AllocatorCatalog,
    diagnostics: &mut DiagnosticsHandler,
) -> OwnershipResults {
    let functions: Vec<_> = unit.functions().filter(|f| analysis.get(&f.name).is_some()).collect();
    let sccs = call_graph_sccs(&functions);

    let mut callees: CalleeSummaries = FxHashMap::default();
    let mut plans: OwnershipResults = FxHashMap::default();

    for pass in 0..INTERPROCEDURAL_PASSES {
        let mut next_plans = FxHashMap::default();
        let mut next_callees = FxHashMap::default();
        for function in &functions {
            let func_analysis = analysis.get(&function.name).expect("filtered above");
            let plan = classify::infer_function(function, func_analysis, catalog, &callees, diagnostics);
            next_callees.insert(
                function.name.clone(),
                FunctionSummary {
                    param_roles: plan.param_roles.clone(),
                    return_role: plan.return_role,
                },
            );
            next_plans.insert(function.name.clone(), plan);
        }
        merge_scc_summaries(&sccs, &mut next_callees);
        let stable = pass > 0 && next_callees == callees;
        callees = next_callees;
        plans = next_plans;
        if stable {
            break;
        }
    }

    plans
}

/// Writes every plan's decisions back into the HIR: each pointer-typed [`transpiler_hir::Param`],
/// [`transpiler_hir::Function::return_ty`], and local declaration gets the marker and role the
/// plan assigned, and is demoted to [`transpiler_hir::Refinement::RawEscape`] if inference never
/// reached a decision for it (spec §4.3's closing invariant: "every pointer leaves this stage
/// classified").
pub fn apply(unit: &mut TranslationUnit, plans: &OwnershipResults) {
    let names: Vec<Ident> = unit.functions().map(|f| f.name.clone()).collect();
    for name in names {
        let Some(plan) = plans.get(&name) else { continue };
        let Some(decl) = unit.get_mut(&name) else { continue };
        let Some(function) = decl.as_function_mut() else { continue };

        for param in &mut function.params {
            if !param.ty.is_pointer() {
                continue;
            }
            param.role = plan.param_roles.get(&param.name).copied();
            apply_marker(&mut param.ty, plan, &param.name);
        }

        if function.return_ty.is_pointer() {
            function.return_role = plan.return_role;
            let Some(marker) = function.return_ty.as_pointer_mut() else { continue };
            match &plan.return_marker {
                Some(refinement) => marker.refinement = refinement.clone(),
                None => marker.demote("ownership inference never reached a decision for this return value"),
            }
        }

        apply_to_stmt(&mut function.body, plan);
    }
}

fn apply_marker(ty: &mut transpiler_hir::Ty, plan: &OwnershipPlan, ident: &Ident) {
    let Some(marker) = ty.as_pointer_mut() else { return };
    match plan.marker_for(ident) {
        Some(refinement) => marker.refinement = refinement.clone(),
        // Inference never classified this pointer (e.g. it was never assigned, never reached a
        // sink, never indexed): it is still a pointer nobody proved memory-safe, so the verifier
        // (spec §4.5) would reject it as `Unclassified` anyway. Demote it here, with a trace.
        None => marker.demote("ownership inference never reached a decision for this pointer"),
    }
}

fn apply_to_stmt(stmt: &mut transpiler_hir::Stmt, plan: &OwnershipPlan) {
    match &mut stmt.kind {
        StmtKind::Block(stmts) => {
            for s in stmts {
                apply_to_stmt(s, plan);
            }
        }
        StmtKind::Decl(decl) => {
            if decl.ty.is_pointer() {
                let name = decl.name.clone();
                apply_marker(&mut decl.ty, plan, &name);
            }
        }
        StmtKind::If { then_branch, else_branch, .. } => {
            apply_to_stmt(then_branch, plan);
            if let Some(else_branch) = else_branch {
                apply_to_stmt(else_branch, plan);
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => apply_to_stmt(body, plan),
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                apply_to_stmt(init, plan);
            }
            apply_to_stmt(body, plan);
        }
        StmtKind::Switch { cases, default, .. } => {
            for case in cases {
                for s in &mut case.body {
                    apply_to_stmt(s, plan);
                }
            }
            if let Some(default) = default {
                for s in default {
                    apply_to_stmt(s, plan);
                }
            }
        }
        StmtKind::Labeled(_, inner) => apply_to_stmt(inner, plan),
        StmtKind::Expr(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Return(_)
        | StmtKind::Goto(_)
        | StmtKind::Unsupported(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use transpiler_hir::{
        adapter::TranslationUnitBuilder, AllocKind, Decl, Function, Param, Qualifiers, Refinement,
        Stmt, StmtKind, Ty, ValueCategory,
    };
    use transpiler_session::{AllocatorRole, Span};

    use super::*;

    fn malloc_catalog() -> AllocatorCatalog {
        let mut catalog = AllocatorCatalog::default();
        catalog.register("malloc", AllocatorRole::AllocatesOne);
        catalog.register("free", AllocatorRole::Releases);
        catalog
    }

    #[test]
    fn owned_pointer_round_trips_through_infer_and_apply() {
        let mut builder = TranslationUnitBuilder::new("t");
        builder.declare("make", |name| {
            let ptr_ty = Ty::pointer_to(Ty::Void, Qualifiers::default(), false);
            let call = transpiler_hir::Expr::new(
                transpiler_hir::ExprKind::Call {
                    callee: Box::new(transpiler_hir::Expr::new(
                        transpiler_hir::ExprKind::Name(Ident::new("malloc")),
                        Ty::Function(vec![], Box::new(ptr_ty.clone()), false),
                        transpiler_hir::ValueCategory::RValue,
                        Span::UNKNOWN,
                    )),
                    args: vec![],
                },
                ptr_ty.clone(),
                transpiler_hir::ValueCategory::RValue,
                Span::UNKNOWN,
            );
            let decl = transpiler_hir::LocalDecl { name: Ident::new("p"), ty: ptr_ty, init: Some(call) };
            let body = Stmt::block(
                vec![
                    Stmt::new(StmtKind::Decl(decl), Span::UNKNOWN),
                    Stmt::new(StmtKind::Return(None), Span::UNKNOWN),
                ],
                Span::UNKNOWN,
            );
            Decl::Function(Function::new(name, Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN))
        });
        let mut unit = builder.finish();

        let catalog = malloc_catalog();
        let mut diagnostics = DiagnosticsHandler::default();
        let analysis = transpiler_analysis::analyze(&unit, &catalog, &mut diagnostics);
        let plans = infer(&unit, &analysis, &catalog, &mut diagnostics);
        apply(&mut unit, &plans);

        let make = unit.get(&Ident::new("make")).unwrap().as_function().unwrap();
        let StmtKind::Block(stmts) = &make.body.kind else { panic!("expected block body") };
        let StmtKind::Decl(decl) = &stmts[0].kind else { panic!("expected decl") };
        let (_, _, marker) = decl.ty.as_pointer().unwrap();
        assert!(matches!(marker.refinement, Refinement::Owning(_)));
        let _ = AllocKind::One;
    }

    #[test]
    fn unread_pointer_parameter_is_classified_as_an_immutable_borrow() {
        let mut builder = TranslationUnitBuilder::new("t");
        builder.declare("read_only", |name| {
            let ptr_ty = Ty::pointer_to(Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 }, Qualifiers::default(), false);
            let body = Stmt::block(vec![Stmt::new(StmtKind::Return(None), Span::UNKNOWN)], Span::UNKNOWN);
            Decl::Function(Function::new(
                name,
                vec![Param::new(Ident::new("p"), ptr_ty)],
                Ty::Void,
                body,
                Span::UNKNOWN,
            ))
        });
        let mut unit = builder.finish();

        let catalog = AllocatorCatalog::default();
        let mut diagnostics = DiagnosticsHandler::default();
        let analysis = transpiler_analysis::analyze(&unit, &catalog, &mut diagnostics);
        let plans = infer(&unit, &analysis, &catalog, &mut diagnostics);
        apply(&mut unit, &plans);

        let function = unit.get(&Ident::new("read_only")).unwrap().as_function().unwrap();
        let param = function.param("p").unwrap();
        assert_eq!(param.role, Some(OwnershipRole::BorrowsImmutable));
        let (_, _, marker) = param.ty.as_pointer().unwrap();
        assert!(matches!(marker.refinement, Refinement::Borrow { mutable: false, .. }));
    }

    fn call_stmt(callee: Ident) -> Stmt {
        Stmt::new(
            StmtKind::Expr(Expr {
                kind: ExprKind::Call {
                    callee: Box::new(Expr {
                        kind: ExprKind::Name(callee),
                        ty: Ty::Function(vec![], Box::new(Ty::Void), false),
                        category: ValueCategory::RValue,
                        region: None,
                        span: Span::UNKNOWN,
                    }),
                    args: vec![],
                },
                ty: Ty::Void,
                category: ValueCategory::RValue,
                region: None,
                span: Span::UNKNOWN,
            }),
            Span::UNKNOWN,
        )
    }

    #[test]
    fn mutually_recursive_functions_form_one_scc() {
        let mut builder = TranslationUnitBuilder::new("t");
        builder.declare("f", |name| {
            let body = Stmt::block(
                vec![call_stmt(Ident::new("g")), Stmt::new(StmtKind::Return(None), Span::UNKNOWN)],
                Span::UNKNOWN,
            );
            Decl::Function(Function::new(name, Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN))
        });
        builder.declare("g", |name| {
            let body = Stmt::block(
                vec![call_stmt(Ident::new("f")), Stmt::new(StmtKind::Return(None), Span::UNKNOWN)],
                Span::UNKNOWN,
            );
            Decl::Function(Function::new(name, Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN))
        });
        builder.declare("h", |name| {
            Decl::Function(Function::new(
                name,
                Vec::<Param>::new(),
                Ty::Void,
                Stmt::new(StmtKind::Return(None), Span::UNKNOWN),
                Span::UNKNOWN,
            ))
        });
        let unit = builder.finish();

        let functions: Vec<_> = unit.functions().collect();
        let sccs = call_graph_sccs(&functions);

        assert_eq!(sccs.len(), 1, "only f/g form a nontrivial SCC, h calls nothing: {sccs:?}");
        let mut names: Vec<&str> = sccs[0].iter().map(|i| i.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["f", "g"]);
    }

    #[test]
    fn directly_self_recursive_function_is_its_own_scc() {
        let mut builder = TranslationUnitBuilder::new("t");
        builder.declare("fact", |name| {
            let body = Stmt::block(
                vec![call_stmt(Ident::new("fact")), Stmt::new(StmtKind::Return(None), Span::UNKNOWN)],
                Span::UNKNOWN,
            );
            Decl::Function(Function::new(name, Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN))
        });
        let unit = builder.finish();

        let functions: Vec<_> = unit.functions().collect();
        let sccs = call_graph_sccs(&functions);

        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].len(), 1);
        assert_eq!(sccs[0][0].as_str(), "fact");
    }
}

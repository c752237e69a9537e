//! Lifetime inference (spec §4.4): assigns a region to every `Borrow` marker ownership inference
//! produced and checks the outlives constraints between them.
//!
//! The region tree built by `transpiler_analysis::region` is already a faithful model of C's
//! lexical scoping, so unlike a general constraint solver over free region variables, every
//! constraint here is checked directly against that fixed tree rather than solved by unifying
//! region variables: a borrow's region never moves, only its classification does (demoted to
//! `RawEscape` when a constraint fails). This is a deliberate narrowing of spec §4.4 step 4's
//! general "solve by lattice join, unify cycles" procedure to the case that a pre-built lexical
//! region tree makes decidable in one pass.

use rustc_hash::FxHashMap;
use transpiler_analysis::{AnalysisResults, FunctionAnalysis};
use transpiler_hir::{Expr, ExprKind, Function, Ident, RegionId, Refinement, Stmt, StmtKind, TranslationUnit};
use transpiler_ownership::OwnershipResults;
use transpiler_session::diagnostics::DiagnosticsHandler;

/// The region parameters and outlives constraints inference settled on for one function (spec
/// §4.4 "Output").
#[derive(Debug, Default, Clone)]
pub struct FunctionLifetime {
    /// Regions bound to a pointer-typed parameter's `Borrow` marker, in parameter order.
    pub region_params: Vec<RegionId>,
    /// `(a, b)`: region `a` is constrained to outlive region `b`, already verified against the
    /// lexical region tree.
    pub constraints: Vec<(RegionId, RegionId)>,
}

pub type LifetimeResults = FxHashMap<Ident, FunctionLifetime>;

fn region_of(plan: &transpiler_ownership::OwnershipPlan, ident: &Ident) -> Option<RegionId> {
    match plan.marker_for(ident) {
        Some(Refinement::Borrow { region, .. }) => Some(*region),
        _ => None,
    }
}

fn ident_of(expr: &Expr) -> Option<&Ident> {
    match &expr.kind {
        ExprKind::Name(ident) => Some(ident),
        ExprKind::Cast { expr, .. } | ExprKind::Promotion { expr, .. } => ident_of(expr),
        _ => None,
    }
}

/// A borrow-to-borrow store found in the body: `dst`'s declaration or assignment is initialized
/// from `src`, and both currently carry a `Borrow` marker (spec §4.4 step 3's "stored into a
/// location of region B").
struct BorrowStore {
    src: Ident,
    src_region: RegionId,
    dst: Ident,
    dst_region: RegionId,
}

fn collect_borrow_stores(
    stmt: &Stmt,
    plan: &transpiler_ownership::OwnershipPlan,
    out: &mut Vec<BorrowStore>,
) {
    match &stmt.kind {
        StmtKind::Block(stmts) => {
            for s in stmts {
                collect_borrow_stores(s, plan, out);
            }
        }
        StmtKind::Decl(decl) => {
            if let Some(init) = &decl.init {
                record_if_borrow_store(&decl.name, init, plan, out);
            }
        }
        StmtKind::Expr(expr) => {
            if let ExprKind::Assign { lhs, rhs, .. } = &expr.kind {
                if let Some(dst) = ident_of(lhs) {
                    record_if_borrow_store(dst, rhs, plan, out);
                }
            }
        }
        StmtKind::If { then_branch, else_branch, .. } => {
            collect_borrow_stores(then_branch, plan, out);
            if let Some(else_branch) = else_branch {
                collect_borrow_stores(else_branch, plan, out);
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
            collect_borrow_stores(body, plan, out)
        }
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                collect_borrow_stores(init, plan, out);
            }
            collect_borrow_stores(body, plan, out);
        }
        StmtKind::Switch { cases, default, .. } => {
            for case in cases {
                for s in &case.body {
                    collect_borrow_stores(s, plan, out);
                }
            }
            if let Some(default) = default {
                for s in default {
                    collect_borrow_stores(s, plan, out);
                }
            }
        }
        StmtKind::Labeled(_, inner) => collect_borrow_stores(inner, plan, out),
        StmtKind::Expr(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Return(_)
        | StmtKind::Goto(_)
        | StmtKind::Unsupported(_) => {}
    }
}

fn record_if_borrow_store(
    dst: &Ident,
    source: &Expr,
    plan: &transpiler_ownership::OwnershipPlan,
    out: &mut Vec<BorrowStore>,
) {
    let Some(dst_region) = region_of(plan, dst) else { return };
    let Some(src) = ident_of(source) else { return };
    let Some(src_region) = region_of(plan, src) else { return };
    out.push(BorrowStore { src: src.clone(), src_region, dst: dst.clone(), dst_region });
}

/// Runs lifetime inference for one function, narrowing `plan`'s `Borrow` markers' classification
/// in place (by demotion) wherever a constraint cannot be satisfied.
pub fn infer_function(
    function: &Function,
    analysis: &FunctionAnalysis,
    plan: &mut transpiler_ownership::OwnershipPlan,
    diagnostics: &mut DiagnosticsHandler,
) -> FunctionLifetime {
    let tree = &analysis.regions;

    let region_params: Vec<RegionId> =
        function.params.iter().filter_map(|p| region_of(plan, &p.name)).collect();

    let mut stores = Vec::new();
    collect_borrow_stores(&function.body, plan, &mut stores);

    let mut constraints = Vec::new();
    for store in stores {
        if tree.outlives(store.src_region, store.dst_region) {
            constraints.push((store.src_region, store.dst_region));
        } else {
            diagnostics.warning(
                "W-LIFETIME-0001",
                format!(
                    "`{}` would outlive the region `{}` borrows; demoting `{}` to a raw pointer",
                    store.dst, store.src, store.dst
                ),
            );
            plan.demote(&store.dst, "assignment would let the destination outlive the borrowed region");
        }
    }

    if function.return_ty.is_pointer() {
        if let Some(Refinement::Borrow { region, .. }) = plan.return_marker {
            if region == tree.root {
                constraints.push((region, tree.root));
            } else {
                diagnostics.warning(
                    "W-LIFETIME-0002",
                    format!(
                        "function `{}` returns a borrow of a region that does not outlive its \
                         body; demoting the return to a raw pointer",
                        function.name
                    ),
                );
                plan.return_marker = Some(Refinement::RawEscape {
                    reason: "returned borrow's region does not outlive the function body".into(),
                });
            }
        }
    }

    FunctionLifetime { region_params, constraints }
}

/// Runs lifetime inference over every analyzed function, mutating each function's
/// [`transpiler_ownership::OwnershipPlan`] in place.
pub fn infer(
    unit: &TranslationUnit,
    analysis: &AnalysisResults,
    plans: &mut OwnershipResults,
    diagnostics: &mut DiagnosticsHandler,
) -> LifetimeResults {
    let mut results = LifetimeResults::default();
    for function in unit.functions() {
        let Some(func_analysis) = analysis.get(&function.name) else { continue };
        let Some(plan) = plans.get_mut(&function.name) else { continue };
        let lifetime = infer_function(function, func_analysis, plan, diagnostics);
        results.insert(function.name.clone(), lifetime);
    }
    results
}

#[cfg(test)]
mod tests {
    use transpiler_hir::{
        adapter::TranslationUnitBuilder, Decl, ExprKind, Literal, OwnershipRole, Param, Qualifiers,
        Stmt, StmtKind, Ty, ValueCategory,
    };
    use transpiler_ownership::OwnershipPlan;
    use transpiler_session::{AllocatorCatalog, Span};

    use super::*;

    fn name_expr(ident: Ident, ty: Ty) -> Expr {
        Expr::new(ExprKind::Name(ident), ty, ValueCategory::LValue, Span::UNKNOWN)
    }

    #[test]
    fn returning_a_borrowed_parameter_is_accepted() {
        let ptr_ty = Ty::pointer_to(Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 }, Qualifiers::default(), false);
        let mut builder = TranslationUnitBuilder::new("t");
        builder.declare("identity", |name| {
            let p = Ident::new("p");
            let body = Stmt::block(
                vec![Stmt::new(StmtKind::Return(Some(name_expr(p.clone(), ptr_ty.clone()))), Span::UNKNOWN)],
                Span::UNKNOWN,
            );
            Decl::Function(Function::new(
                name,
                vec![Param::new(p, ptr_ty.clone())],
                ptr_ty.clone(),
                body,
                Span::UNKNOWN,
            ))
        });
        let unit = builder.finish();
        let function = unit.functions().next().unwrap();

        let catalog = AllocatorCatalog::default();
        let mut diagnostics = DiagnosticsHandler::default();
        let analysis = transpiler_analysis::analyze(&unit, &catalog, &mut diagnostics);
        let func_analysis = analysis.get(&function.name).unwrap();

        let mut plan = OwnershipPlan::default();
        let region = func_analysis.regions.root;
        plan.set_marker(Ident::new("p"), Refinement::Borrow { mutable: false, region });
        plan.param_roles.insert(Ident::new("p"), OwnershipRole::BorrowsImmutable);
        plan.return_marker = Some(Refinement::Borrow { mutable: false, region });

        infer_function(function, func_analysis, &mut plan, &mut diagnostics);

        assert!(matches!(plan.return_marker, Some(Refinement::Borrow { .. })));
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn returning_a_borrow_of_a_nested_local_is_demoted() {
        let ptr_ty = Ty::pointer_to(Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 }, Qualifiers::default(), false);
        let mut builder = TranslationUnitBuilder::new("t");
        builder.declare("dangling", |name| {
            let inner = Stmt::new(
                StmtKind::Decl(transpiler_hir::LocalDecl {
                    name: Ident::new("y"),
                    ty: Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 },
                    init: Some(Expr::new(
                        ExprKind::Literal(Literal::Int(0)),
                        Ty::Int { signed: true, width: transpiler_hir::IntWidth::W32 },
                        ValueCategory::RValue,
                        Span::UNKNOWN,
                    )),
                }),
                Span::UNKNOWN,
            );
            let body = Stmt::block(
                vec![
                    Stmt::new(StmtKind::Block(vec![inner]), Span::UNKNOWN),
                    Stmt::new(StmtKind::Return(Some(name_expr(Ident::new("y"), ptr_ty.clone()))), Span::UNKNOWN),
                ],
                Span::UNKNOWN,
            );
            Decl::Function(Function::new(name, Vec::<Param>::new(), ptr_ty.clone(), body, Span::UNKNOWN))
        });
        let unit = builder.finish();
        let function = unit.functions().next().unwrap();

        let catalog = AllocatorCatalog::default();
        let mut diagnostics = DiagnosticsHandler::default();
        let analysis = transpiler_analysis::analyze(&unit, &catalog, &mut diagnostics);
        let func_analysis = analysis.get(&function.name).unwrap();

        let mut plan = OwnershipPlan::default();
        let nested = func_analysis
            .regions
            .declaring_region(&Ident::new("y"))
            .unwrap_or(func_analysis.regions.root);
        plan.return_marker = Some(Refinement::Borrow { mutable: false, region: nested });

        infer_function(function, func_analysis, &mut plan, &mut diagnostics);

        assert!(matches!(plan.return_marker, Some(Refinement::RawEscape { .. })));
    }
}

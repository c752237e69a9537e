//! Control-flow, data-flow, and region analyses that feed ownership and lifetime inference
//! (spec §4.2 "Analyzer").
//!
//! Every analysis here is built on the same shape: a [`lattice::Lattice`], a monotone transfer
//! function, and a worklist solver over a [`cfg::Cfg`] — the same contract spec §4.2 requires of
//! every iterative analysis in the pipeline.

pub mod cfg;
pub mod def_use;
pub mod dominance;
pub mod lattice;
pub mod points_to;
pub mod region;

use rustc_hash::FxHashMap;
use transpiler_hir::{Function, Ident};
use transpiler_session::{diagnostics::DiagnosticsHandler, AllocatorCatalog};

pub use self::{
    cfg::{build_cfg, BasicBlock, Cfg, EdgeKind, Terminator},
    def_use::{DefSite, DefUseChains},
    dominance::DominanceInfo,
    lattice::{ChangeResult, Lattice},
    points_to::{PointsToSummary, PointsToTarget},
    region::RegionTree,
};

/// Every analyzer output for one function (spec §4.2 "Outputs (per function)").
pub struct FunctionAnalysis {
    pub cfg: Cfg,
    pub dominance: DominanceInfo,
    pub def_use: DefUseChains,
    pub points_to: PointsToSummary,
    pub regions: RegionTree,
}

/// All per-function analyses for a translation unit, keyed by function name.
#[derive(Default)]
pub struct AnalysisResults {
    functions: FxHashMap<Ident, FunctionAnalysis>,
    /// Functions whose body could not be flattened into a CFG (spec §4.2 "Failure semantics");
    /// these are reported once and excluded from every later stage.
    pub untranslatable: Vec<Ident>,
}

impl AnalysisResults {
    pub fn get(&self, function: &Ident) -> Option<&FunctionAnalysis> {
        self.functions.get(function)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&Ident, &FunctionAnalysis)> {
        self.functions.iter()
    }
}

/// Runs every analysis in this crate over each function of `unit`, reporting (and excluding)
/// functions whose CFG cannot be built.
pub fn analyze(
    unit: &transpiler_hir::TranslationUnit,
    catalog: &AllocatorCatalog,
    diagnostics: &mut DiagnosticsHandler,
) -> AnalysisResults {
    let mut results = AnalysisResults::default();
    for function in unit.functions() {
        match analyze_function(function, catalog) {
            Some(analysis) => {
                results.functions.insert(function.name.clone(), analysis);
            }
            None => {
                diagnostics.error(
                    "E-CFG-0001",
                    format!(
                        "function `{}` contains a control-flow construct the analyzer cannot \
                         structurally lower and is marked untranslatable",
                        function.name
                    ),
                );
                results.untranslatable.push(function.name.clone());
            }
        }
    }
    results
}

fn analyze_function(function: &Function, catalog: &AllocatorCatalog) -> Option<FunctionAnalysis> {
    let cfg = build_cfg(function)?;
    let dominance = DominanceInfo::compute(&cfg);
    let def_use = def_use::compute(&cfg, function);
    let points_to = points_to::compute(&cfg, function, catalog);
    let regions = region::compute(function);
    Some(FunctionAnalysis { cfg, dominance, def_use, points_to, regions })
}

#[cfg(test)]
mod tests {
    use transpiler_hir::{adapter::TranslationUnitBuilder, Decl, Param, Stmt, StmtKind, Ty};
    use transpiler_session::Span;

    use super::*;

    #[test]
    fn analyze_reports_untranslatable_functions_without_aborting_the_unit() {
        let mut builder = TranslationUnitBuilder::new("t");
        builder.declare("ok", |name| {
            let body =
                Stmt::block(vec![Stmt::new(StmtKind::Return(None), Span::UNKNOWN)], Span::UNKNOWN);
            Decl::Function(Function::new(name, Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN))
        });
        // A function whose body is not itself a `Block` cannot be structurally lowered by
        // `build_cfg` (it only accepts `StmtKind::Block` bodies), exercising the untranslatable path.
        builder.declare("bad", |name| {
            let body = Stmt::new(StmtKind::Return(None), Span::UNKNOWN);
            Decl::Function(Function::new(name, Vec::<Param>::new(), Ty::Void, body, Span::UNKNOWN))
        });
        let unit = builder.finish();

        let catalog = AllocatorCatalog::default();
        let mut diagnostics = DiagnosticsHandler::default();
        let results = analyze(&unit, &catalog, &mut diagnostics);

        assert!(results.get(&Ident::new("ok")).is_some());
        assert!(results.get(&Ident::new("bad")).is_none());
        assert_eq!(results.untranslatable, vec![Ident::new("bad")]);
        assert!(diagnostics.has_errors());
    }
}

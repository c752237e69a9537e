//! The five fixed stages (spec §4, §5) chained together: analyze, infer ownership, infer
//! lifetimes, verify (with its bounded retry already folded into `transpiler_verify::verify`),
//! then render source text. Each stage's `Input`/`Output` is the growing tuple of results earlier
//! stages produced, so the final stage receives everything the pipeline has accumulated.

use transpiler_analysis::AnalysisResults;
use transpiler_hir::TranslationUnit;
use transpiler_lifetime::LifetimeResults;
use transpiler_ownership::OwnershipResults;
use transpiler_session::Session;
use transpiler_verify::VerificationResults;

use crate::stage::{Stage, StageResult};

struct AnalyzeStage;

impl Stage for AnalyzeStage {
    type Input = TranslationUnit;
    type Output = (TranslationUnit, AnalysisResults);

    fn run(&mut self, unit: Self::Input, session: &mut Session) -> StageResult<Self::Output> {
        let analysis = transpiler_analysis::analyze(&unit, &session.catalog, &mut session.diagnostics);
        Ok((unit, analysis))
    }
}

struct OwnershipStage;

impl Stage for OwnershipStage {
    type Input = (TranslationUnit, AnalysisResults);
    type Output = (TranslationUnit, AnalysisResults, OwnershipResults);

    fn run(&mut self, (mut unit, analysis): Self::Input, session: &mut Session) -> StageResult<Self::Output> {
        let plans = transpiler_ownership::infer(&unit, &analysis, &session.catalog, &mut session.diagnostics);
        transpiler_ownership::apply(&mut unit, &plans);
        Ok((unit, analysis, plans))
    }
}

struct LifetimeStage;

impl Stage for LifetimeStage {
    type Input = (TranslationUnit, AnalysisResults, OwnershipResults);
    type Output = (TranslationUnit, AnalysisResults, OwnershipResults, LifetimeResults);

    fn run(&mut self, (unit, analysis, mut plans): Self::Input, session: &mut Session) -> StageResult<Self::Output> {
        let lifetimes = transpiler_lifetime::infer(&unit, &analysis, &mut plans, &mut session.diagnostics);
        Ok((unit, analysis, plans, lifetimes))
    }
}

struct VerifyStage;

impl Stage for VerifyStage {
    type Input = (TranslationUnit, AnalysisResults, OwnershipResults, LifetimeResults);
    type Output = (
        TranslationUnit,
        AnalysisResults,
        OwnershipResults,
        LifetimeResults,
        VerificationResults,
    );

    fn run(
        &mut self,
        (unit, analysis, mut plans, lifetimes): Self::Input,
        session: &mut Session,
    ) -> StageResult<Self::Output> {
        let verification = transpiler_verify::verify(&unit, &analysis, &mut plans, &lifetimes, &mut session.diagnostics);
        Ok((unit, analysis, plans, lifetimes, verification))
    }
}

struct CodegenStage;

impl Stage for CodegenStage {
    type Input = (
        TranslationUnit,
        AnalysisResults,
        OwnershipResults,
        LifetimeResults,
        VerificationResults,
    );
    type Output = Translation;

    fn run(&mut self, (unit, _analysis, _plans, _lifetimes, verification): Self::Input, session: &mut Session) -> StageResult<Self::Output> {
        let source = transpiler_codegen::emit_unit(
            &unit,
            &session.hints,
            &session.catalog,
            &session.sync_catalog,
            &mut session.diagnostics,
        );
        Ok(Translation {
            unit,
            source,
            verification,
        })
    }
}

/// What `translate_unit` hands back: the (possibly verifier-demoted) HIR, the rendered source,
/// and the verification record the caller can inspect for rejected regions.
pub struct Translation {
    pub unit: TranslationUnit,
    pub source: String,
    pub verification: VerificationResults,
}

/// Runs one translation unit through the whole pipeline. Diagnostics accumulate on
/// `session.diagnostics`; this function only returns `Err` for the kind of fatal, not-this-unit's-
/// fault failure none of the current stages actually produce, kept for symmetry with the rest of
/// the pipeline's `StageResult` plumbing and so a future stage (e.g. a real parser adapter) has
/// somewhere to report one.
pub fn translate_unit(unit: TranslationUnit, session: &mut Session) -> StageResult<Translation> {
    let mut pipeline = AnalyzeStage
        .next(OwnershipStage)
        .next(LifetimeStage)
        .next(VerifyStage)
        .next(CodegenStage);
    pipeline.run(unit, session)
}

//! Per-run configuration, scoped to the handful of knobs the core pipeline itself consults. CLI
//! parsing lives in the `transpiler-cli` crate; this struct is what it builds.

use std::path::PathBuf;

/// How aggressively the verifier's bounded retry (spec §4.5) is allowed to re-plan.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    /// Number of re-plan attempts permitted per rejected region. Spec §4.5/§5 fix this at 1;
    /// exposed as a field rather than a constant so tests can exercise the bound at 0.
    pub max_retries_per_region: u8,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_retries_per_region: 1,
        }
    }
}

/// Options threaded through every pipeline stage.
#[derive(Debug, Clone)]
pub struct Options {
    /// Where emitted target-language source (and any supplementary manifests) are written.
    pub out_dir: PathBuf,
    /// Emit a `.regions.json` debugging manifest alongside each translated unit.
    pub emit_regions_manifest: bool,
    /// Keep translating remaining declarations in a unit after a non-fatal diagnostic, rather
    /// than stopping at the first one. Always true in practice (spec §7's recoverable kinds are
    /// local), kept as a flag so tests can force worst-case behavior.
    pub keep_going: bool,
    pub retry_budget: RetryBudget,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            emit_regions_manifest: false,
            keep_going: true,
            retry_budget: RetryBudget::default(),
        }
    }
}

use std::fmt;
use std::sync::Arc;

use crate::{
    catalog::{AllocatorCatalog, SyncCatalog},
    diagnostics::DiagnosticsHandler,
    hints::TaggedUnionHints,
    options::Options,
};

/// Bundles everything a single translation unit's pipeline run needs that isn't the HIR itself:
/// configuration, the allocator/concurrency catalogs, tagged-union hints, and where diagnostics
/// accumulate.
///
/// One instance is built once per process (or per batch worker) and threaded by reference
/// through every stage.
pub struct Session {
    pub name: String,
    pub options: Options,
    pub catalog: Arc<AllocatorCatalog>,
    pub sync_catalog: Arc<SyncCatalog>,
    pub hints: Arc<TaggedUnionHints>,
    pub diagnostics: DiagnosticsHandler,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("diagnostic_count", &self.diagnostics.records().len())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(name: impl Into<String>, options: Options) -> Self {
        Self {
            name: name.into(),
            options,
            catalog: Arc::new(AllocatorCatalog::default()),
            sync_catalog: Arc::new(SyncCatalog::default()),
            hints: Arc::new(TaggedUnionHints::default()),
            diagnostics: DiagnosticsHandler::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: AllocatorCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_sync_catalog(mut self, sync_catalog: SyncCatalog) -> Self {
        self.sync_catalog = Arc::new(sync_catalog);
        self
    }

    pub fn with_hints(mut self, hints: TaggedUnionHints) -> Self {
        self.hints = Arc::new(hints);
        self
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new("unnamed", Options::default())
    }
}

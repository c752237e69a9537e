//! Batch translation (spec §5): units are embarrassingly parallel, so `compile_many` fans a
//! `Vec<TranslationUnit>` out across a bounded set of OS threads rather than reaching for a work-
//! stealing runtime this workspace doesn't otherwise depend on. The catalog and tagged-union hints
//! are published once, before any worker starts, and shared read-only via `Arc` for the run's
//! duration; each unit gets its own `Session` (and so its own diagnostics stream), named after the
//! unit, so one worker's diagnostics never interleave with another's.

use std::thread;

use transpiler_hir::TranslationUnit;
use transpiler_session::{AllocatorCatalog, Session, TaggedUnionHints};

use crate::pipeline::{translate_unit, Translation};

/// One unit's outcome: its own session (diagnostics included) alongside the translation, so a
/// caller can report per-unit errors without losing which unit they came from.
pub struct BatchItem {
    pub name: String,
    pub session: Session,
    pub translation: Translation,
}

/// Translates every unit in `units`, sharing `catalog`/`hints` read-only across up to
/// `max_workers` OS threads. Results are returned in the same order as `units`, regardless of
/// which thread finished first.
pub fn compile_many(
    units: Vec<(String, TranslationUnit)>,
    catalog: AllocatorCatalog,
    hints: TaggedUnionHints,
    max_workers: usize,
) -> Vec<BatchItem> {
    let catalog = std::sync::Arc::new(catalog);
    let hints = std::sync::Arc::new(hints);
    let max_workers = max_workers.max(1);

    let mut results: Vec<Option<BatchItem>> = (0..units.len()).map(|_| None).collect();
    let chunk_size = units.len().div_ceil(max_workers).max(1);

    thread::scope(|scope| {
        let mut handles = Vec::new();
        for (chunk_index, chunk) in units.chunks(chunk_size).enumerate() {
            let catalog = std::sync::Arc::clone(&catalog);
            let hints = std::sync::Arc::clone(&hints);
            let base = chunk_index * chunk_size;
            handles.push(scope.spawn(move || {
                chunk
                    .iter()
                    .enumerate()
                    .map(|(offset, (name, unit))| {
                        let mut session = Session::new(name.clone(), Default::default())
                            .with_catalog((*catalog).clone())
                            .with_hints((*hints).clone());
                        let translation = translate_unit(unit.clone(), &mut session)
                            .expect("pipeline stages do not currently produce fatal errors");
                        (
                            base + offset,
                            BatchItem {
                                name: name.clone(),
                                session,
                                translation,
                            },
                        )
                    })
                    .collect::<Vec<_>>()
            }));
        }
        for handle in handles {
            for (index, item) in handle.join().expect("worker thread panicked") {
                results[index] = Some(item);
            }
        }
    });

    results.into_iter().map(|item| item.expect("every index is filled by exactly one worker")).collect()
}

//! Session management, configuration, and diagnostics for the transpiler core.
//!
//! This crate carries the pipeline's ambient concerns — everything `spec.md` treats as a fixed
//! external contract (allocator catalog, tagged-union hints, the diagnostics stream) plus the
//! configuration a single run needs — so that `transpiler-hir` and the inference/verification/
//! codegen crates can stay focused on analysis.

pub mod catalog;
pub mod diagnostics;
mod hints;
mod options;
mod session;
pub mod span;

pub use self::{
    catalog::{AllocatorCatalog, AllocatorRole, SyncCatalog, SyncRole},
    hints::TaggedUnionHints,
    options::{Options, RetryBudget},
    session::Session,
    span::{SourceId, Span},
};

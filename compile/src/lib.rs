//! Orchestrates the whole pipeline (spec §4's module chain, §5's batch semantics) on top of the
//! `hir`/`analysis`/`ownership`/`lifetime`/`verify`/`codegen` crates.

mod batch;
pub mod fixtures;
mod pipeline;
mod stage;

pub use batch::{compile_many, BatchItem};
pub use pipeline::{translate_unit, Translation};
pub use stage::{Stage, StageResult};

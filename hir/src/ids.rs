//! Entity identifiers used throughout the HIR and downstream passes.
//!
//! Following `cranelift_entity`'s convention, each id is a newtype over `u32` so that the
//! analyzer and inference stages can key `PrimaryMap`/`SecondaryMap`s by them without paying for a
//! pointer-sized handle, and so that `Debug` output stays stable across runs.

use cranelift_entity::entity_impl;

/// Identifies one allocation site: a specific call expression that produces a new owned heap
/// object (spec §3 "Allocation site").
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocSiteId(u32);
entity_impl!(AllocSiteId, "alloc");

/// Identifies one lexical or synthetic region in the region tree (spec §4.2) and, once narrowed,
/// one lifetime parameter (spec §4.4). The analyzer and lifetime inference share this id space:
/// every lifetime region is a region-tree node, though not every region-tree node ends up bound to
/// a borrow.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(u32);
entity_impl!(RegionId, "region");

/// Identifies one basic block within a function's control-flow graph.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);
entity_impl!(BlockId, "bb");

/// Identifies one record (struct) declaration.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u32);
entity_impl!(RecordId, "record");

/// Identifies one union declaration.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnionId(u32);
entity_impl!(UnionId, "union");

/// Identifies one enumeration declaration.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(u32);
entity_impl!(EnumId, "enum");

/// Identifies one type alias declaration.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AliasId(u32);
entity_impl!(AliasId, "alias");

use std::fmt;

use crate::ids::{AllocSiteId, RegionId};

/// The length discipline of an `OwningArray`: either a statically-known extent or a dynamically
/// tracked one (paired with a separate length variable at runtime), per spec §3.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArrayLen {
    Static(u64),
    Dynamic,
}

/// The classification attached to a pointer-typed value, mutated in place by ownership and
/// lifetime inference (spec §3 "Refinement marker").
///
/// `Unclassified` is the only state a pointer may carry before inference runs; every other variant
/// is a terminal classification inference assigns. Codegen (spec §4.6) panics on
/// `Unclassified` reaching it, since the verifier (spec §4.5) is required to reject any plan that
/// still contains one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refinement {
    /// No classification has been assigned yet.
    Unclassified,
    /// Uniquely owns a heap allocation; release is this holder's responsibility.
    Owning(AllocSiteId),
    /// Uniquely owns a contiguous run of values.
    OwningArray(AllocSiteId, ArrayLen),
    /// A non-owning view valid over `region`, optionally permitting writes through it.
    Borrow { mutable: bool, region: RegionId },
    /// No safe classification could be proven; an escape hatch is required at emission.
    RawEscape { reason: Box<str> },
}

impl Refinement {
    pub fn is_unclassified(&self) -> bool {
        matches!(self, Refinement::Unclassified)
    }

    pub fn is_owning(&self) -> bool {
        matches!(self, Refinement::Owning(_) | Refinement::OwningArray(_, _))
    }

    pub fn is_borrow(&self) -> bool {
        matches!(self, Refinement::Borrow { .. })
    }

    pub fn is_raw_escape(&self) -> bool {
        matches!(self, Refinement::RawEscape { .. })
    }

    pub fn alloc_site(&self) -> Option<AllocSiteId> {
        match self {
            Refinement::Owning(id) | Refinement::OwningArray(id, _) => Some(*id),
            _ => None,
        }
    }

    /// Demotes this refinement to `RawEscape`, recording why. Per spec §4.3/§4.5, every demotion
    /// must be traceable, so callers are required to supply a reason rather than silently losing
    /// the prior classification.
    pub fn demote(&mut self, reason: impl Into<Box<str>>) {
        *self = Refinement::RawEscape { reason: reason.into() };
    }
}

impl fmt::Display for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refinement::Unclassified => f.write_str("<unclassified>"),
            Refinement::Owning(id) => write!(f, "owning({id})"),
            Refinement::OwningArray(id, ArrayLen::Static(n)) => {
                write!(f, "owning_array({id}, {n})")
            }
            Refinement::OwningArray(id, ArrayLen::Dynamic) => {
                write!(f, "owning_array({id}, dyn)")
            }
            Refinement::Borrow { mutable: true, region } => write!(f, "&mut '{region}"),
            Refinement::Borrow { mutable: false, region } => write!(f, "&'{region}"),
            Refinement::RawEscape { reason } => write!(f, "raw_escape({reason})"),
        }
    }
}

/// A pointer's full marker: its [`Refinement`] plus whether it may be absent (spec §3's "Null when
/// a pointer may be absent; composes with the above as an optional wrapper").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerMarker {
    pub refinement: Refinement,
    pub nullable: bool,
}

impl PointerMarker {
    pub fn unclassified(nullable: bool) -> Self {
        Self {
            refinement: Refinement::Unclassified,
            nullable,
        }
    }

    pub fn demote(&mut self, reason: impl Into<Box<str>>) {
        self.refinement.demote(reason);
    }
}

impl fmt::Display for PointerMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "Option<{}>", self.refinement)
        } else {
            write!(f, "{}", self.refinement)
        }
    }
}

//! The result of ownership inference for one function (spec §4.3), kept separate from the HIR it
//! describes until [`crate::apply`] mutates the refinement markers in place — the same
//! analysis-then-rewrite split the CFG builder and points-to summary already use.

use rustc_hash::FxHashMap;
use transpiler_hir::{AllocKind, AllocSiteId, ArrayLen, Ident, OwnershipRole, Refinement};

#[derive(Debug, Default)]
pub struct OwnershipPlan {
    /// Refinement assigned to every pointer-typed parameter and local, keyed by its `Ident`.
    pub markers: FxHashMap<Ident, Refinement>,
    /// The role each pointer-typed parameter plays for callers (spec §4.3 step 7).
    pub param_roles: FxHashMap<Ident, OwnershipRole>,
    /// The role the function's return value plays, if it is a pointer.
    pub return_role: Option<OwnershipRole>,
    /// Whether each allocation site turned out to be a single object or an array (spec §4.3 step
    /// 6), overriding the catalog's physical `AllocKind` when usage says otherwise.
    pub array_sites: FxHashMap<AllocSiteId, ArrayLen>,
    /// The refinement carried by the function's own return type, if it is a pointer. Kept separate
    /// from `markers` because the return slot has no `Ident` of its own to key by.
    pub return_marker: Option<Refinement>,
}

impl OwnershipPlan {
    pub fn marker_for(&self, ident: &Ident) -> Option<&Refinement> {
        self.markers.get(ident)
    }

    pub fn set_marker(&mut self, ident: Ident, refinement: Refinement) {
        self.markers.insert(ident, refinement);
    }

    pub fn demote(&mut self, ident: &Ident, reason: impl Into<Box<str>>) {
        let reason = reason.into();
        match self.markers.get_mut(ident) {
            Some(marker) => marker.demote(reason),
            None => {
                self.markers.insert(ident.clone(), Refinement::RawEscape { reason });
            }
        }
    }

    pub fn refinement_for_site(&self, site: AllocSiteId, kind: AllocKind) -> Refinement {
        match self.array_sites.get(&site) {
            Some(len) => Refinement::OwningArray(site, *len),
            None if kind == AllocKind::Array => Refinement::OwningArray(site, ArrayLen::Dynamic),
            None => Refinement::Owning(site),
        }
    }
}

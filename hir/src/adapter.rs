//! The contract this crate expects from the external C front end (spec §6, §1 "Deliberately out
//! of scope").
//!
//! The front end is not implemented here: it is delegated to an external C parser library that
//! has already run preprocessing. This module only fixes the shape of what it must hand back, and
//! provides [`TranslationUnitBuilder`], a direct-construction API that stands in for "the adapter
//! already lowered this AST node into HIR" — used by this crate's own tests and by any adapter
//! implementation to assemble a [`TranslationUnit`] without re-deriving scoping by hand.

use transpiler_session::Span;

use crate::{
    decl::{Alias, Decl},
    ident::{Ident, ScopeTree},
    ids::{AliasId, EnumId, RecordId, UnionId},
    record::{Enum, Field, Record, Union},
    translation_unit::TranslationUnit,
    ty::Ty,
};

/// One node of the normalized C AST the front end hands to this crate (spec §6 "C AST input").
///
/// The core does not re-tokenize C and does not traverse headers independently; by the time a
/// `CAstNode` reaches here, preprocessing has already happened and every type reference is
/// resolved.
pub trait CAstNode {
    /// A stable identifier for the kind of C construct this node represents (e.g. `"IfStmt"`,
    /// `"CallExpr"`), used only for diagnostics about unsupported constructs.
    fn node_kind(&self) -> &str;
    fn span(&self) -> Span;
}

/// Implemented by the external C front end: consumes a normalized AST and produces a
/// [`TranslationUnit`], reporting unsupported constructs as it goes rather than aborting the whole
/// unit (spec §4.1 "Failure semantics").
pub trait CAst {
    type Node: CAstNode;
    type Error: core::fmt::Display;

    fn lower(self, root: Self::Node) -> Result<TranslationUnit, Self::Error>;
}

/// A direct-construction API for assembling a [`TranslationUnit`], used where "the adapter already
/// produced this HIR" is simpler to state than a literal AST (this crate's tests, and the
/// scenario fixtures in the workspace's `tests/` directory).
pub struct TranslationUnitBuilder {
    unit: TranslationUnit,
    scopes: ScopeTree,
}

impl TranslationUnitBuilder {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self {
            unit: TranslationUnit::new(name),
            scopes: ScopeTree::new(),
        }
    }

    /// Binds `name` at file scope, uniquifying it against any prior top-level binding of the same
    /// name, then inserts `decl` under the resulting identifier.
    pub fn declare(&mut self, name: &str, make_decl: impl FnOnce(Ident) -> Decl) -> Ident {
        let ident = self.scopes.bind(name);
        let decl = make_decl(ident.clone());
        self.unit.insert(ident.clone(), decl);
        ident
    }

    /// Mints a fresh [`RecordId`], registers it against `name`, and inserts the `Record` decl
    /// under that name, returning the id so callers can build `Ty::Record(id)` references to it.
    pub fn declare_record(&mut self, name: &str, fields: Vec<Field>) -> RecordId {
        let ident = self.scopes.bind(name);
        let id = self.unit.types.register_record(ident.clone());
        self.unit.insert(ident.clone(), Decl::Record(Record { name: ident, fields }));
        id
    }

    pub fn declare_union(&mut self, name: &str, fields: Vec<Field>) -> UnionId {
        let ident = self.scopes.bind(name);
        let id = self.unit.types.register_union(ident.clone());
        self.unit.insert(ident.clone(), Decl::Union(Union { name: ident, fields }));
        id
    }

    pub fn declare_enum(&mut self, name: &str, variants: Vec<(Ident, i64)>) -> EnumId {
        let ident = self.scopes.bind(name);
        let id = self.unit.types.register_enum(ident.clone());
        self.unit.insert(ident.clone(), Decl::Enum(Enum { name: ident, variants }));
        id
    }

    pub fn declare_alias(&mut self, name: &str, ty: Ty) -> AliasId {
        let ident = self.scopes.bind(name);
        let id = self.unit.types.register_alias(ident.clone());
        self.unit.insert(ident.clone(), Decl::Alias(Alias { name: ident, ty }));
        id
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeTree {
        &mut self.scopes
    }

    pub fn finish(self) -> TranslationUnit {
        self.unit
    }
}

use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;

use crate::{
    decl::Decl,
    ident::Ident,
    ids::{AliasId, EnumId, RecordId, UnionId},
};

/// Maps the numeric ids a [`crate::ty::Ty::Record`]/`Union`/`Enum`/`Alias` carries back to the
/// declaration's name, so later passes (codegen, in particular) can resolve a type reference to
/// its fields without threading a second lookup table alongside every `Ty`. Entries are minted by
/// [`crate::adapter::TranslationUnitBuilder`]'s `declare_record`/`declare_union`/`declare_enum`/
/// `declare_alias`, which hand back the id at the same time the declaration itself is inserted.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    records: PrimaryMap<RecordId, Ident>,
    unions: PrimaryMap<UnionId, Ident>,
    enums: PrimaryMap<EnumId, Ident>,
    aliases: PrimaryMap<AliasId, Ident>,
}

impl TypeRegistry {
    pub fn register_record(&mut self, name: Ident) -> RecordId {
        self.records.push(name)
    }

    pub fn register_union(&mut self, name: Ident) -> UnionId {
        self.unions.push(name)
    }

    pub fn register_enum(&mut self, name: Ident) -> EnumId {
        self.enums.push(name)
    }

    pub fn register_alias(&mut self, name: Ident) -> AliasId {
        self.aliases.push(name)
    }

    pub fn record_name(&self, id: RecordId) -> &Ident {
        &self.records[id]
    }

    pub fn union_name(&self, id: UnionId) -> &Ident {
        &self.unions[id]
    }

    pub fn enum_name(&self, id: EnumId) -> &Ident {
        &self.enums[id]
    }

    pub fn alias_name(&self, id: AliasId) -> &Ident {
        &self.aliases[id]
    }
}

/// One C source file, after preprocessing, as consumed by the pipeline (spec §3, §6, GLOSSARY).
///
/// Lookup is by identifier, but `order` preserves lexical declaration order so that codegen's
/// determinism requirement (spec §4.6: "declarations emit in source order") can be satisfied
/// without re-sorting anything.
#[derive(Debug, Default, Clone)]
pub struct TranslationUnit {
    pub name: Box<str>,
    pub types: TypeRegistry,
    order: Vec<Ident>,
    decls: FxHashMap<Ident, Decl>,
}

impl TranslationUnit {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self {
            name: name.into(),
            types: TypeRegistry::default(),
            order: Vec::new(),
            decls: FxHashMap::default(),
        }
    }

    /// Inserts a declaration, preserving the order in which declarations are inserted.
    ///
    /// Panics if `ident` is already present: the name resolver (spec §4.1) is responsible for
    /// uniquifying identifiers before they reach the translation unit, so a collision here is an
    /// internal-invariant violation, not a recoverable condition.
    pub fn insert(&mut self, ident: Ident, decl: Decl) {
        if self.decls.insert(ident.clone(), decl).is_some() {
            panic!("declaration '{ident:?}' inserted twice into the same translation unit");
        }
        self.order.push(ident);
    }

    pub fn get(&self, ident: &Ident) -> Option<&Decl> {
        self.decls.get(ident)
    }

    pub fn get_mut(&mut self, ident: &Ident) -> Option<&mut Decl> {
        self.decls.get_mut(ident)
    }

    /// Iterates declarations in lexical (insertion) order.
    pub fn decls_in_order(&self) -> impl Iterator<Item = (&Ident, &Decl)> {
        self.order.iter().map(move |ident| (ident, &self.decls[ident]))
    }

    pub fn functions(&self) -> impl Iterator<Item = &crate::function::Function> {
        self.decls_in_order().filter_map(|(_, decl)| decl.as_function())
    }

    pub fn record(&self, id: RecordId) -> Option<&crate::record::Record> {
        self.get(self.types.record_name(id)).and_then(Decl::as_record)
    }

    pub fn union(&self, id: UnionId) -> Option<&crate::record::Union> {
        self.get(self.types.union_name(id)).and_then(Decl::as_union)
    }

    pub fn enum_(&self, id: EnumId) -> Option<&crate::record::Enum> {
        self.get(self.types.enum_name(id)).and_then(Decl::as_enum)
    }

    pub fn alias(&self, id: AliasId) -> Option<&crate::decl::Alias> {
        self.get(self.types.alias_name(id)).and_then(Decl::as_alias)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use transpiler_session::Span;

    use super::*;
    use crate::{function::Function, stmt::{Stmt, StmtKind}, ty::Ty};

    fn dummy_function(name: &str) -> Decl {
        Decl::Function(Function::new(
            Ident::new(name),
            Vec::new(),
            Ty::Void,
            Stmt::new(StmtKind::Block(Vec::new()), Span::UNKNOWN),
            Span::UNKNOWN,
        ))
    }

    #[test]
    fn preserves_insertion_order() {
        let mut tu = TranslationUnit::new("unit.c");
        tu.insert(Ident::new("b"), dummy_function("b"));
        tu.insert(Ident::new("a"), dummy_function("a"));
        let names: Vec<_> = tu.decls_in_order().map(|(ident, _)| ident.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    #[should_panic]
    fn rejects_duplicate_insertion() {
        let mut tu = TranslationUnit::new("unit.c");
        tu.insert(Ident::new("a"), dummy_function("a"));
        tu.insert(Ident::new("a"), dummy_function("a"));
    }
}

//! Tagged-union hints (spec §6): an optional side-channel from union type name to discriminant
//! field name, typically a sibling enum field in an enclosing record. Codegen consults this to
//! emit a sum type instead of an escape hatch.

use rustc_hash::FxHashMap;

#[derive(Debug, Default, Clone)]
pub struct TaggedUnionHints {
    discriminants: FxHashMap<Box<str>, Box<str>>,
}

impl TaggedUnionHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hint(&mut self, union_name: impl Into<Box<str>>, discriminant_field: impl Into<Box<str>>) {
        self.discriminants.insert(union_name.into(), discriminant_field.into());
    }

    pub fn discriminant_for(&self, union_name: &str) -> Option<&str> {
        self.discriminants.get(union_name).map(|s| s.as_ref())
    }
}

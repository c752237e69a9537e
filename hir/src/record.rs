use crate::{ident::Ident, ty::Ty};

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Ident,
    pub ty: Ty,
    /// Bit-field width, if the C declaration specified one (e.g. `unsigned flag : 1;`).
    pub bit_width: Option<u8>,
}

/// An ordered-field record (`struct`), spec §3.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: Ident,
    pub fields: Vec<Field>,
}

/// A union. The discriminant is unknown at the C level; codegen only emits a checked sum type
/// when the allocator-catalog-adjacent tagged-union hint (spec §6/§9) names a discriminant field
/// in some enclosing record — otherwise it becomes an escape hatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub name: Ident,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    pub name: Ident,
    pub variants: Vec<(Ident, i64)>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.as_str() == name)
    }
}

impl Union {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.as_str() == name)
    }
}

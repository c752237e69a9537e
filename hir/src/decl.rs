use transpiler_session::Span;

use crate::{expr::Expr, function::Function, ident::Ident, record::{Enum, Record, Union}, ty::Ty};

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: Ident,
    pub ty: Ty,
    pub init: Option<Expr>,
    /// A C `static` local is lowered into a synthetic top-level `Global` whose name is qualified
    /// by its owning function, per spec §9 "Static local variables".
    pub function_scoped: Option<Ident>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub name: Ident,
    pub ty: Ty,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: Ident,
    pub ty: Ty,
}

/// One top-level declaration. Construction from the AST is total for the supported subset (spec
/// §4.1): every supported construct produces one of the named variants, and anything else becomes
/// [`Decl::Unsupported`] rather than being silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Function(Function),
    Record(Record),
    Union(Union),
    Enum(Enum),
    Alias(Alias),
    Global(Global),
    Constant(Constant),
    Unsupported { name: Ident, reason: Box<str>, span: Span },
}

impl Decl {
    pub fn name(&self) -> &Ident {
        match self {
            Decl::Function(f) => &f.name,
            Decl::Record(r) => &r.name,
            Decl::Union(u) => &u.name,
            Decl::Enum(e) => &e.name,
            Decl::Alias(a) => &a.name,
            Decl::Global(g) => &g.name,
            Decl::Constant(c) => &c.name,
            Decl::Unsupported { name, .. } => name,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Decl::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut Function> {
        match self {
            Decl::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Decl::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&Union> {
        match self {
            Decl::Union(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Enum> {
        match self {
            Decl::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_alias(&self) -> Option<&Alias> {
        match self {
            Decl::Alias(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Decl::Unsupported { .. })
    }
}

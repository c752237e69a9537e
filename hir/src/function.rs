use transpiler_session::Span;

use crate::{ident::Ident, stmt::Stmt, ty::Ty};

/// The interprocedural role ownership inference (spec §4.3 step 7) assigns to one parameter or to
/// a function's return value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OwnershipRole {
    /// The callee takes ownership; the caller must not use the value afterward.
    Consumes,
    /// The callee only reads through the pointer; ownership stays with the caller.
    BorrowsImmutable,
    /// The callee writes through the pointer; ownership stays with the caller.
    BorrowsMutable,
    /// The function hands a fresh (or pass-through) ownership token to its caller.
    ReturnsOwning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Ty,
    /// Unset until ownership inference runs; see spec §3 "initially-unset ownership role".
    pub role: Option<OwnershipRole>,
}

impl Param {
    pub fn new(name: Ident, ty: Ty) -> Self {
        Self { name, ty, role: None }
    }
}

/// The side effects a function performs, used by ownership inference (global-owned pointers,
/// spec §4.3 step 3). Left at its default (all empty) by every stage currently in this pipeline;
/// codegen's own global-mutation detection walks function bodies directly instead of consulting
/// it (see `DESIGN.md`).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Effects {
    pub reads_globals: Vec<Ident>,
    pub writes_globals: Vec<Ident>,
    pub allocates: Vec<crate::ids::AllocSiteId>,
    pub releases: Vec<crate::ids::AllocSiteId>,
    pub performs_io: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_ty: Ty,
    pub return_role: Option<OwnershipRole>,
    pub body: Stmt,
    pub effects: Effects,
    /// Whether the C declaration ended in a `...` trailer (spec §9 "Variadic functions").
    pub is_variadic: bool,
    pub span: Span,
}

impl Function {
    pub fn new(name: Ident, params: Vec<Param>, return_ty: Ty, body: Stmt, span: Span) -> Self {
        Self {
            name,
            params,
            return_ty,
            return_role: None,
            body,
            effects: Effects::default(),
            is_variadic: false,
            span,
        }
    }

    /// Marks this function as variadic; used by the adapter when lowering a C declaration whose
    /// parameter list ends in `...`.
    pub fn variadic(mut self) -> Self {
        self.is_variadic = true;
        self
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name.as_str() == name)
    }

    pub fn returns_pointer(&self) -> bool {
        self.return_ty.is_pointer()
    }
}

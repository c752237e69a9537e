use transpiler_session::Span;

use crate::ident::Ident;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocKind {
    /// Produces a single owned object (e.g. `malloc(sizeof(T))`).
    One,
    /// Produces a contiguous run of owned objects (e.g. `calloc(n, sizeof(T))`).
    Array,
    /// Consumes one token and produces another, e.g. `realloc`.
    Reallocation,
}

/// Every call that allocates memory is annotated with one of these (spec §3 "Allocation site").
#[derive(Debug, Clone, PartialEq)]
pub struct AllocSite {
    pub function: Ident,
    pub callee: Ident,
    pub kind: AllocKind,
    pub span: Span,
}

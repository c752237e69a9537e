//! Typed, structured intermediate representation oriented toward the target language.
//!
//! This crate owns the data model of the transpiler core: [`TranslationUnit`], [`Ty`], [`Expr`],
//! [`Stmt`], [`Function`], and the [`Refinement`] marker that ownership and lifetime inference
//! mutate in place. Nothing in this crate performs analysis; it exists so that every later stage
//! (`transpiler-analysis`, `transpiler-ownership`, `transpiler-lifetime`, `transpiler-verify`,
//! `transpiler-codegen`) shares one representation.

pub mod adapter;
pub mod alloc_site;
pub mod decl;
pub mod expr;
pub mod function;
pub mod ident;
pub mod ids;
pub mod record;
pub mod refinement;
pub mod stmt;
pub mod translation_unit;
pub mod ty;

pub use transpiler_session::diagnostics;

pub use self::{
    alloc_site::{AllocKind, AllocSite},
    decl::{Alias, Constant, Decl, Global},
    expr::{BinOp, Expr, ExprKind, Literal, PromotionKind, UnOp, ValueCategory},
    function::{Effects, Function, OwnershipRole, Param},
    ident::{Ident, ScopeTree},
    ids::{AliasId, AllocSiteId, BlockId, EnumId, RecordId, RegionId, UnionId},
    record::{Enum, Field, Record, Union},
    refinement::{ArrayLen, PointerMarker, Refinement},
    stmt::{Label, LocalDecl, Stmt, StmtKind, SwitchCase},
    translation_unit::TranslationUnit,
    ty::{Extent, FloatWidth, IntWidth, Qualifiers, Ty},
};

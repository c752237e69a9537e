use transpiler_session::Span;

use crate::{expr::Expr, ident::Ident, ty::Ty};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(pub Ident);

#[derive(Debug, Clone, PartialEq)]
pub struct LocalDecl {
    pub name: Ident,
    pub ty: Ty,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: i128,
    pub body: Vec<Stmt>,
    /// Whether control falls through into the next case rather than breaking, reified here so
    /// codegen can decide between a normal `match` arm and the explicit fallthrough construct of
    /// spec §4.6's mapping table.
    pub fallthrough: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    Decl(LocalDecl),
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    Switch {
        scrutinee: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Stmt>>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    /// Accepted only when the label's target dominates no declaration the source does not also
    /// dominate (spec §4.1); anything else becomes [`StmtKind::Unsupported`] at construction time.
    Goto(Label),
    Labeled(Label, Box<Stmt>),
    Unsupported(Box<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn block(stmts: Vec<Stmt>, span: Span) -> Self {
        Self::new(StmtKind::Block(stmts), span)
    }
}

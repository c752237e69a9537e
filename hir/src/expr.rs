use transpiler_session::Span;

use crate::{ident::Ident, ty::Ty};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i128),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(String),
    Null,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
    /// Pointer difference: `p - q` where both operands are pointers into the same array object.
    /// Lowered at codegen time into index subtraction (spec §9).
    PointerDiff,
}

/// An implicit C conversion, reified as an explicit node so downstream passes never need to
/// re-derive the usual arithmetic conversions (spec §4.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PromotionKind {
    IntegerPromotion,
    UsualArithmeticConversion,
    ArrayToPointerDecay,
    FunctionToPointerDecay,
    BoolToInt,
    NullPointerConstant,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueCategory {
    LValue,
    RValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Name(Ident),
    Member {
        base: Box<Expr>,
        field: Ident,
        /// `true` for `base->field`, `false` for `base.field`; kept distinct because the former
        /// implies a dereference the ownership pass must account for.
        via_pointer: bool,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        to: Ty,
    },
    Promotion {
        expr: Box<Expr>,
        kind: PromotionKind,
    },
    AddrOf(Box<Expr>),
    Deref(Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    CompoundLiteral {
        ty: Ty,
        fields: Vec<(Ident, Expr)>,
    },
    Sequence(Vec<Expr>),
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        /// `Some(op)` for compound assignment (`+=` and friends), desugared here rather than left
        /// as statement-level sugar, so expression-level passes see one shape.
        compound: Option<BinOp>,
    },
    Unsupported(Box<str>),
}

/// A typed HIR expression (spec §3 "HIR expression").
///
/// Every expression carries its type (never absent, per spec §3's invariant), a value category,
/// and — once the analyzer has run — the lexical region it was evaluated in.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Ty,
    pub category: ValueCategory,
    pub region: Option<crate::ids::RegionId>,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Ty, category: ValueCategory, span: Span) -> Self {
        Self {
            kind,
            ty,
            category,
            region: None,
            span,
        }
    }

    pub fn is_lvalue(&self) -> bool {
        matches!(self.category, ValueCategory::LValue)
    }
}

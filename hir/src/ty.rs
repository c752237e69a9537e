use std::fmt;

use crate::{
    ids::{AliasId, EnumId, RecordId, UnionId},
    refinement::PointerMarker,
};

/// Explicit bit width for an integral type. C's `int`/`short`/`long` family is normalized to one
/// of these at HIR construction time using the target's data model, so no later pass needs to
/// consult platform-specific type sizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FloatWidth {
    F32,
    F64,
}

/// Qualifiers carried by a pointer's pointee, independent of its ownership refinement (spec §3
/// "pointer(inner, pointee-qualifiers)").
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
}

/// Extent of an array type: statically known, or unknown (e.g. an incomplete array type or a
/// parameter written `T[]`, which C treats as `T*`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Extent {
    Known(u64),
    Unknown,
}

/// The HIR type language (spec §3 "HIR type").
///
/// `Pointer`'s second field is the marker inference mutates in place; every other variant is
/// immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Int { signed: bool, width: IntWidth },
    Float(FloatWidth),
    Bool,
    Char,
    Void,
    Record(RecordId),
    Union(UnionId),
    Enum(EnumId),
    Alias(AliasId),
    Pointer(Box<Ty>, Qualifiers, PointerMarker),
    Array(Box<Ty>, Extent),
    /// Fixed parameter types, return type, and whether a C `...` trailer follows the fixed
    /// parameters (spec §9 "Variadic functions").
    Function(Vec<Ty>, Box<Ty>, bool),
    /// A construct the adapter could not lower; carries why, so diagnostics can cite the original
    /// node kind without the rest of the pipeline needing to know about AST shapes.
    Unsupported(Box<str>),
}

impl Ty {
    pub fn pointer_to(inner: Ty, qualifiers: Qualifiers, nullable: bool) -> Ty {
        Ty::Pointer(Box::new(inner), qualifiers, PointerMarker::unclassified(nullable))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Ty::Pointer(..))
    }

    pub fn as_pointer(&self) -> Option<(&Ty, &Qualifiers, &PointerMarker)> {
        match self {
            Ty::Pointer(inner, quals, marker) => Some((inner, quals, marker)),
            _ => None,
        }
    }

    pub fn as_pointer_mut(&mut self) -> Option<&mut PointerMarker> {
        match self {
            Ty::Pointer(_, _, marker) => Some(marker),
            _ => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Ty::Unsupported(_))
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int { signed: true, width } => write!(f, "i{}", width.bits()),
            Ty::Int { signed: false, width } => write!(f, "u{}", width.bits()),
            Ty::Float(FloatWidth::F32) => f.write_str("f32"),
            Ty::Float(FloatWidth::F64) => f.write_str("f64"),
            Ty::Bool => f.write_str("bool"),
            Ty::Char => f.write_str("char"),
            Ty::Void => f.write_str("void"),
            Ty::Record(id) => write!(f, "{id}"),
            Ty::Union(id) => write!(f, "{id}"),
            Ty::Enum(id) => write!(f, "{id}"),
            Ty::Alias(id) => write!(f, "{id}"),
            Ty::Pointer(inner, _, marker) => write!(f, "*{inner} [{marker}]"),
            Ty::Array(inner, Extent::Known(n)) => write!(f, "[{inner}; {n}]"),
            Ty::Array(inner, Extent::Unknown) => write!(f, "[{inner}]"),
            Ty::Function(params, ret, variadic) => {
                write!(f, "fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                if *variadic {
                    write!(f, ", ...")?;
                }
                write!(f, ") -> {ret}")
            }
            Ty::Unsupported(reason) => write!(f, "<unsupported: {reason}>"),
        }
    }
}

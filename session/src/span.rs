use core::fmt;

/// Identifies one translation unit's source text, stable for the duration of a compilation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub u32);

/// A byte-offset range into a single source file, with the line/column of its start recorded for
/// human-readable diagnostics.
///
/// Spans are produced by the external C front end and carried through the pipeline unchanged;
/// nothing downstream of the parser adapter ever recomputes line/column information from scratch.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub source: SourceId,
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub const UNKNOWN: Span = Span {
        source: SourceId(u32::MAX),
        start: 0,
        end: 0,
        line: 0,
        column: 0,
    };

    pub fn new(source: SourceId, start: u32, end: u32, line: u32, column: u32) -> Self {
        Self {
            source,
            start,
            end,
            line,
            column,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.source == Span::UNKNOWN.source
    }

    /// Returns the smallest span that contains both `self` and `other`.
    ///
    /// Both spans must originate from the same source; mixing sources collapses to `self`, since
    /// there is no meaningful union across files.
    pub fn merge(&self, other: &Span) -> Span {
        if self.source != other.source {
            return *self;
        }
        Span {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line.min(other.line),
            column: if self.start <= other.start {
                self.column
            } else {
                other.column
            },
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}:{}", self.source.0, self.line, self.column)
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Span::UNKNOWN
    }
}

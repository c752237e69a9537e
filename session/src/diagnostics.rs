//! The diagnostics stream described in spec §6: an ordered list of records, each carrying a
//! severity, a source location, a stable code, and a message, consumed by the driver for display.


use core::fmt;



use crate::span::Span;

/// Severity of a single diagnostic record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note => f.write_str("note"),
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// One record in the diagnostics stream.
///
/// `code` is a stable identifier (e.g. `E-DEMOTE-0001`) so tooling consuming the stream can filter
/// or deduplicate by kind without parsing `message`.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Span,
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            span: Span::UNKNOWN,
            code,
            message: message.into(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn note(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Note, code, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.span.is_unknown() {
            write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
        } else {
            write!(f, "{}[{}] at {:?}: {}", self.severity, self.code, self.span, self.message)
        }
    }
}

/// Accumulates diagnostics in emission order for a single translation unit, and exposes summary
/// counters used to decide whether a unit's translation should be considered successful.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticsHandler {
    records: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Note => {}
        }
        log::log!(severity_to_log_level(diagnostic.severity), "{diagnostic}");
        self.records.push(diagnostic);
    }

    pub fn error(&mut self, code: &'static str, message: impl Into<String>) {
        self.emit(Diagnostic::error(code, message));
    }

    pub fn warning(&mut self, code: &'static str, message: impl Into<String>) {
        self.emit(Diagnostic::warning(code, message));
    }

    pub fn note(&mut self, code: &'static str, message: impl Into<String>) {
        self.emit(Diagnostic::note(code, message));
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Diagnostic> {
        self.records
    }
}

fn severity_to_log_level(severity: Severity) -> log::Level {
    match severity {
        Severity::Error => log::Level::Error,
        Severity::Warning => log::Level::Warn,
        Severity::Note => log::Level::Debug,
    }
}

/// A fatal, unit-abandoning failure (spec §7's `Parse-level` and `Internal-invariant` kinds).
///
/// Unlike [`Diagnostic`], which degrades emission quality but still produces output, this type
/// aborts translation of the current unit; the batch driver moves on to the next unit regardless.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{message}")]
pub struct FatalError {
    pub message: String,
    #[source_code]
    pub src: String,
    #[label("here")]
    pub at: Option<miette::SourceSpan>,
}

impl FatalError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            src: String::new(),
            at: None,
        }
    }
}

pub type Report = miette::Report;

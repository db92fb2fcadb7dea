//! Diagnostic stream for the evaluation core.
//!
//! Every error is reported exactly once at its point of detection and
//! never aborts the run by itself; the producing operation returns a
//! null result and callers propagate the nullness silently. The fatal
//! decision is deferred to the session boundary, which inspects the
//! error count after emission.

use std::fmt;

use crate::srcpos::SrcPos;

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational message
    Info,
    /// Warning; the construct is accepted
    Warning,
    /// Error; the producing operation yields a null result
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// One emitted diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Message severity
    pub severity: Severity,
    /// Source position the message is tagged with
    pub pos: SrcPos,
    /// Rendered message text
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} {}", self.severity, self.pos, self.message)
    }
}

/// Collecting sink for diagnostics.
///
/// Messages are written to standard error as they arrive and retained
/// in emission order so callers (and tests) can inspect them afterward.
#[derive(Debug, Default)]
pub struct Diagnostics {
    emitted: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
}

impl Diagnostics {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Reports a message at the given severity.
    pub fn report(&mut self, severity: Severity, pos: &SrcPos, message: impl fmt::Display) {
        let diag = Diagnostic {
            severity,
            pos: pos.clone(),
            message: message.to_string(),
        };
        eprintln!("{}", diag);
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => {}
        }
        self.emitted.push(diag);
    }

    /// Reports an informational message.
    pub fn info(&mut self, pos: &SrcPos, message: impl fmt::Display) {
        self.report(Severity::Info, pos, message);
    }

    /// Reports a warning.
    pub fn warn(&mut self, pos: &SrcPos, message: impl fmt::Display) {
        self.report(Severity::Warning, pos, message);
    }

    /// Reports an error.
    pub fn error(&mut self, pos: &SrcPos, message: impl fmt::Display) {
        self.report(Severity::Error, pos, message);
    }

    /// Number of error-severity messages emitted so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Number of warning-severity messages emitted so far.
    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    /// All diagnostics in emission order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.emitted.iter()
    }

    /// True if any message text contains the given fragment.
    pub fn any_contains(&self, fragment: &str) -> bool {
        self.emitted.iter().any(|d| d.message.contains(fragment))
    }
}

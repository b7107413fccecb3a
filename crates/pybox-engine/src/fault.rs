//! Fault taxonomy and normalization.
//!
//! Every abnormal outcome of an invocation is represented as a [`Fault`]
//! value, never as an error escaping the gateway. Normalization turns the
//! worker's stderr into a single human-readable diagnostic line; it cannot
//! itself fail, since missing or unusable stderr degrades to a generic
//! message per kind.

use serde::Serialize;
use std::fmt;

/// Classification of an invocation fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The source text could not be parsed into an executable program.
    Parse,
    /// Parsing succeeded but execution raised an unhandled error.
    Runtime,
    /// Execution exceeded an enforced bound (time, memory, or CPU).
    Resource,
    /// Catch-all: the engine itself failed while running or normalizing.
    Internal,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "parse fault"),
            Self::Runtime => write!(f, "runtime fault"),
            Self::Resource => write!(f, "resource fault"),
            Self::Internal => write!(f, "internal fault"),
        }
    }
}

/// A normalized fault: kind plus one diagnostic line.
///
/// The diagnostic is appended to captured output, never substituted for it.
#[derive(Debug, Clone, Serialize)]
pub struct Fault {
    /// Fault classification.
    pub kind: FaultKind,
    /// Human-readable description (e.g. `ZeroDivisionError: division by zero`).
    pub message: String,
}

impl Fault {
    /// Create a fault with an already-normalized message.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Normalize a worker's stderr into a fault of the given kind.
///
/// The diagnostic is the last non-empty stderr line: the driver writes the
/// formatted exception there as its final act, after any stderr noise the
/// program produced itself. An empty stderr degrades to a generic message.
pub(crate) fn normalize(kind: FaultKind, stderr: &str) -> Fault {
    normalize_or(kind, stderr, fallback_message(kind))
}

/// Like [`normalize`], but with a caller-supplied fallback message for when
/// stderr carries nothing usable.
pub(crate) fn normalize_or(kind: FaultKind, stderr: &str, fallback: impl Into<String>) -> Fault {
    let message = last_nonempty_line(stderr)
        .map(str::to_owned)
        .unwrap_or_else(|| fallback.into());
    Fault::new(kind, message)
}

fn last_nonempty_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

fn fallback_message(kind: FaultKind) -> &'static str {
    match kind {
        FaultKind::Parse => "source could not be parsed",
        FaultKind::Runtime => "execution raised an unhandled error",
        FaultKind::Resource => "resource limit exceeded",
        FaultKind::Internal => "execution failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uses_last_nonempty_line() {
        let stderr = "warning: something\n\nZeroDivisionError: division by zero\n";
        let fault = normalize(FaultKind::Runtime, stderr);
        assert_eq!(fault.kind, FaultKind::Runtime);
        assert_eq!(fault.message, "ZeroDivisionError: division by zero");
    }

    #[test]
    fn test_normalize_empty_stderr_degrades() {
        let fault = normalize(FaultKind::Parse, "");
        assert_eq!(fault.message, "source could not be parsed");

        let fault = normalize(FaultKind::Internal, "\n  \n");
        assert_eq!(fault.message, "execution failed");
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        let fault = normalize(FaultKind::Parse, "  SyntaxError: unterminated string literal  \n");
        assert_eq!(fault.message, "SyntaxError: unterminated string literal");
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::new(FaultKind::Resource, "time limit exceeded");
        assert_eq!(format!("{}", fault), "resource fault: time limit exceeded");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(format!("{}", FaultKind::Parse), "parse fault");
        assert_eq!(format!("{}", FaultKind::Runtime), "runtime fault");
        assert_eq!(format!("{}", FaultKind::Resource), "resource fault");
        assert_eq!(format!("{}", FaultKind::Internal), "internal fault");
    }
}

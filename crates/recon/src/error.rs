use std::fmt;

use serde::Serialize;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad AI code, inverted expiry thresholds, etc.).
    ConfigValidation(String),
    /// No header row could be located in the named input.
    HeaderNotFound { source: String },
    /// Input had no rows at all.
    EmptyInput { source: String },
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::HeaderNotFound { source } => write!(
                f,
                "{source}: no header row found (looked for Material, Matnr, Part, Batch+Serial, etc.)"
            ),
            Self::EmptyInput { source } => write!(f, "{source}: no rows"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

// ---------------------------------------------------------------------------
// Scan-level issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A problem with a single scan row. Collected alongside the results; never
/// aborts a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanIssue {
    /// 1-based row number in the scan sheet.
    pub row: usize,
    pub message: String,
    pub severity: Severity,
}

impl ScanIssue {
    pub fn error(row: usize, message: impl Into<String>) -> Self {
        Self { row, message: message.into(), severity: Severity::Error }
    }

    pub fn warning(row: usize, message: impl Into<String>) -> Self {
        Self { row, message: message.into(), severity: Severity::Warning }
    }
}

impl fmt::Display for ScanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} [{}]: {}", self.row, self.severity, self.message)
    }
}

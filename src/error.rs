//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for the docmill application.
///
/// - 0: Success (every discovered file reached a terminal state without failures)
/// - 1: General error (invalid configuration or unexpected failure)
/// - 3: Partial success (run completed but some files failed or timed out)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the run completed and every file succeeded, deduplicated, or skipped.
    Success = 0,
    /// General error: an unexpected or fatal configuration error occurred.
    GeneralError = 1,
    /// Partial success: the run completed but some files failed.
    PartialSuccess = 3,
    /// Interrupted: the run was interrupted by the user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DM000",
            Self::GeneralError => "DM001",
            Self::PartialSuccess => "DM003",
            Self::Interrupted => "DM130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DM001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

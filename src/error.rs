//! Structured error handling and exit codes.

use serde::Serialize;

use crate::config::ConfigError;
use crate::pipeline::PipelineError;

/// Process exit codes.
///
/// - 0: Success
/// - 1: General error (unexpected failure)
/// - 2: Configuration error (bad root, pattern, config file or template)
/// - 3: Completed, but some files were skipped
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// The run completed normally.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// The configuration or command-line input was rejected.
    ConfigError = 2,
    /// The run completed but some files could not be processed.
    PartialSuccess = 3,
    /// The run was interrupted by user (Ctrl+C).
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
            Self::Success => "GR000",
            Self::GeneralError => "GR001",
            Self::ConfigError => "GR002",
            Self::PartialSuccess => "GR003",
            Self::Interrupted => "GR130",
        }
    }

    /// Classify an error returned from [`crate::run_app`].
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<PipelineError>() {
            return match e {
                PipelineError::Interrupted => Self::Interrupted,
                e if e.is_config_error() => Self::ConfigError,
                _ => Self::GeneralError,
            };
        }
        if err.downcast_ref::<ConfigError>().is_some() {
            return Self::ConfigError;
        }
        Self::GeneralError
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "GR001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
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
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

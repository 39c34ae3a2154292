//! Error types for the diagnostics core.
//!
//! Only `DeviceNotFound` and `InvalidInput` abort a diagnostic pass.
//! Everything else degrades into an annotated partial report.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagnosticError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{source_name} unavailable: {reason}")]
    CollaboratorUnavailable { source_name: String, reason: String },

    #[error("Algorithm {0} exceeded its deadline")]
    AlgorithmTimeout(String),

    #[error("Algorithm {name} failed: {reason}")]
    AlgorithmFailure { name: String, reason: String },
}

impl DiagnosticError {
    /// Fatal errors stop the pipeline; the rest fold into
    /// `partial_failures`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiagnosticError::DeviceNotFound(_) | DiagnosticError::InvalidInput(_)
        )
    }

    /// Convenience constructor for collaborator failures.
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        DiagnosticError::CollaboratorUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

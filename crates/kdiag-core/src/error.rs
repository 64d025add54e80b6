//! Error types for kdiag-core
//!
//! `Orchestrator::diagnose` never returns these to its caller. Collaborator
//! failures (command execution, text generation) are absorbed where they
//! happen; what remains is folded into a terminal `DiagnosisResult`.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Unknown hypothesis category name
    #[error("unknown hypothesis category: {0}")]
    UnknownCategory(String),

    /// Unexpected failure inside the reasoning loop
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn invalid_config(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

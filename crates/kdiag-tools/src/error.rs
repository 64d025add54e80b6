//! Error types for kdiag-tools

use thiserror::Error;

/// Command execution error type
#[derive(Debug, Error)]
pub enum Error {
    /// Command could not be started or awaited
    #[error("execution failed: {0}")]
    Execution(String),

    /// Command rejected by the allow list
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Empty or malformed command string
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

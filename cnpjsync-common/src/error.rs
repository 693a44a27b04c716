//! Common error types for cnpjsync

use thiserror::Error;

/// Common result type for cnpjsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the synchronization pipelines
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger or configuration file is missing, corrupt, or inconsistent.
    /// Fatal for the refresh cycle: an ambiguous version state must never
    /// be silently defaulted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network failure after the bounded retry budget was spent
    #[error("Network error: {0}")]
    Network(String),

    /// Malformed source record or file
    #[error("Parse error: {0}")]
    Parse(String),

    /// Post-ingest verification failed (implausible row count); the new
    /// version must not be committed and artifacts must be preserved
    #[error("Verification error: {0}")]
    Verification(String),

    /// Rejected identifier; returned to the caller, never a crash
    #[error("Invalid CNPJ: {0}")]
    Validation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

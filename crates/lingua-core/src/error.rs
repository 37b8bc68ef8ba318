//! Error types for lingua-core

use thiserror::Error;

/// Result type alias using lingua-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lingua-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Pending result not found
    #[error("Pending result not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Remote store error
    #[error(transparent)]
    Remote(#[from] crate::remote::RemoteError),

    /// The queue task has stopped and no longer accepts commands
    #[error("Result queue is closed")]
    QueueClosed,
}

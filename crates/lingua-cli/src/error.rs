use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] lingua_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Result ID cannot be empty")]
    EmptyResultId,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Credential storage error: {0}")]
    Credentials(String),
    #[error(
        "Sync is not configured. Run `lingua config init --api-base-url <URL> --user-id <ID>`, or set LINGUA_API_BASE_URL and LINGUA_USER_ID."
    )]
    SyncNotConfigured,
}

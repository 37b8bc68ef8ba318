//! Remote store clients for quiz results and activity markers.

mod http;
mod memory;

use std::future::Future;

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::{DailyActivityMarker, QuizResultRecord, UserId};

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote store configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote store HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote store rejected the write: {message} ({status})")]
    Rejected { status: u16, message: String },
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// Whether retrying the same request can never succeed
    ///
    /// Client errors are permanent except request timeouts and rate limits.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::InvalidConfiguration(_) => true,
            Self::Rejected { status, .. } => {
                (400..500).contains(status)
                    && *status != StatusCode::REQUEST_TIMEOUT.as_u16()
                    && *status != StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            Self::Http(_) | Self::Unavailable(_) => false,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Outcome of writing a daily activity marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerWrite {
    /// No marker existed for the user and date
    Created,
    /// A marker for the user and date was already stored
    AlreadyPresent,
}

/// Remote document store holding uploaded results and activity markers.
///
/// Both writes are keyed: quiz results by `client_id`, markers by
/// `(user_id, date)`. Repeating a write never creates a second document.
pub trait RemoteStore: Send + Sync {
    /// Upload one quiz result.
    fn put_quiz_result(
        &self,
        record: &QuizResultRecord,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Ensure a marker exists for the marker's user and date.
    fn put_activity_marker(
        &self,
        marker: &DailyActivityMarker,
    ) -> impl Future<Output = RemoteResult<MarkerWrite>> + Send;

    /// Every activity date stored for the user (`yyyy-MM-dd`), unordered.
    fn activity_dates(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = RemoteResult<Vec<String>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_client_errors_are_permanent() {
        let rejected = |status| RemoteError::Rejected {
            status,
            message: "nope".to_string(),
        };
        assert!(rejected(400).is_permanent());
        assert!(rejected(422).is_permanent());
        assert!(!rejected(408).is_permanent());
        assert!(!rejected(429).is_permanent());
        assert!(!rejected(503).is_permanent());
        assert!(!RemoteError::Unavailable("offline".to_string()).is_permanent());
    }
}

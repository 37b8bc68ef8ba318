//! Pending quiz result model

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

static LANGUAGE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[a-z0-9]{2,8})*$").expect("Invalid regex")
});

/// A unique identifier for a pending result, using UUID v7 (time-sortable)
///
/// The same id is sent to the remote store as the idempotency key, so a
/// re-uploaded record never produces a second remote document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PendingResultId(Uuid);

impl PendingResultId {
    /// Create a new unique id using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for PendingResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PendingResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PendingResultId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier of the authenticated learner
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Build a user id, rejecting blank values
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("user id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of quiz that produced a result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// Vocabulary quiz
    #[default]
    Words,
    /// Phrase quiz
    Phrases,
}

impl TestType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Words => "words",
            Self::Phrases => "phrases",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "words" | "word" | "vocabulary" => Ok(Self::Words),
            "phrases" | "phrase" => Ok(Self::Phrases),
            other => Err(Error::InvalidInput(format!("unknown test type: {other}"))),
        }
    }
}

/// Normalize a language tag (`ES` -> `es`, `pt-BR` -> `pt-br`).
///
/// Tags must look like `xx`, `xxx` or `xx-yyyy` after lowercasing.
pub fn normalize_language_tag(raw: &str) -> Result<String> {
    let tag = raw.trim().to_ascii_lowercase().replace('_', "-");
    if LANGUAGE_TAG.is_match(&tag) {
        Ok(tag)
    } else {
        Err(Error::InvalidInput(format!("invalid language tag: {raw:?}")))
    }
}

/// A quiz outcome staged locally until the remote store acknowledges it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingResult {
    /// Unique identifier, also the remote idempotency key
    pub id: PendingResultId,
    /// Language practiced (normalized tag)
    pub subject_language: String,
    /// Quiz kind
    pub test_type: TestType,
    /// Number of correct answers
    pub correct_count: u32,
    /// Number of questions asked
    pub total_count: u32,
    /// When the quiz finished (Unix ms)
    pub recorded_at: i64,
    /// Set during a flush pass once the upload is acknowledged; never persisted
    #[serde(skip)]
    pub synced: bool,
    /// Failed upload attempts so far
    pub attempts: u32,
    /// Earliest time of the next upload attempt (Unix ms)
    pub next_attempt_at: Option<i64>,
    /// Message of the last failed attempt
    pub last_error: Option<String>,
    /// Retries exhausted; kept locally until requeued
    pub dead_lettered: bool,
}

impl PendingResult {
    /// Create a pending result, validating counts and the language tag
    pub fn new(
        language: &str,
        test_type: TestType,
        correct_count: u32,
        total_count: u32,
        recorded_at: i64,
    ) -> Result<Self> {
        if total_count == 0 {
            return Err(Error::InvalidInput(
                "a quiz must have at least one question".into(),
            ));
        }
        if correct_count > total_count {
            return Err(Error::InvalidInput(format!(
                "correct answers ({correct_count}) exceed total questions ({total_count})"
            )));
        }

        Ok(Self {
            id: PendingResultId::new(),
            subject_language: normalize_language_tag(language)?,
            test_type,
            correct_count,
            total_count,
            recorded_at,
            synced: false,
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
            dead_lettered: false,
        })
    }

    /// Create a pending result stamped with the current time
    pub fn now(
        language: &str,
        test_type: TestType,
        correct_count: u32,
        total_count: u32,
    ) -> Result<Self> {
        Self::new(
            language,
            test_type,
            correct_count,
            total_count,
            chrono::Utc::now().timestamp_millis(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_result_id_unique() {
        let id1 = PendingResultId::new();
        let id2 = PendingResultId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_pending_result_id_parse() {
        let id = PendingResultId::new();
        let parsed: PendingResultId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_new_normalizes_language() {
        let result = PendingResult::new(" ES ", TestType::Words, 5, 10, 1_000).unwrap();
        assert_eq!(result.subject_language, "es");
        assert!(!result.synced);
        assert!(!result.dead_lettered);
        assert_eq!(result.attempts, 0);
    }

    #[test]
    fn test_new_rejects_more_correct_than_total() {
        let error = PendingResult::new("es", TestType::Words, 11, 10, 1_000).unwrap_err();
        assert!(error.to_string().contains("exceed"));
    }

    #[test]
    fn test_new_rejects_empty_quiz() {
        assert!(PendingResult::new("es", TestType::Words, 0, 0, 1_000).is_err());
    }

    #[test]
    fn test_language_tags() {
        assert_eq!(normalize_language_tag("pt_BR").unwrap(), "pt-br");
        assert_eq!(normalize_language_tag("yue").unwrap(), "yue");
        assert!(normalize_language_tag("").is_err());
        assert!(normalize_language_tag("spanish!").is_err());
    }

    #[test]
    fn test_test_type_parse() {
        assert_eq!("Phrases".parse::<TestType>().unwrap(), TestType::Phrases);
        assert_eq!("word".parse::<TestType>().unwrap(), TestType::Words);
        assert!("grammar".parse::<TestType>().is_err());
    }

    #[test]
    fn test_user_id_rejects_blank() {
        assert!(UserId::new("  ").is_err());
        assert_eq!(UserId::new(" learner-1 ").unwrap().as_str(), "learner-1");
    }
}

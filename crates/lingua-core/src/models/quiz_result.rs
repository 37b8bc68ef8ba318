//! Remote quiz result record

use serde::{Deserialize, Serialize};

use super::{PendingResult, TestType, UserId};

/// Where an uploaded result came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Uploaded right after the quiz finished
    Live,
    /// Uploaded later by a reconnect or manual flush
    #[default]
    OfflineSync,
}

/// Quiz result document as written to the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResultRecord {
    /// Idempotency key (the local pending id)
    pub client_id: String,
    pub user_id: UserId,
    pub test_type: TestType,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub language: String,
    /// Quiz completion time (Unix ms)
    pub timestamp: i64,
    pub source: ResultSource,
}

impl QuizResultRecord {
    /// Build the remote document for a pending result
    pub fn from_pending(user_id: &UserId, pending: &PendingResult, source: ResultSource) -> Self {
        Self {
            client_id: pending.id.to_string(),
            user_id: user_id.clone(),
            test_type: pending.test_type,
            correct_answers: pending.correct_count,
            total_questions: pending.total_count,
            language: pending.subject_language.clone(),
            timestamp: pending.recorded_at,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_pending_copies_counts() {
        let user = UserId::new("learner").unwrap();
        let pending = PendingResult::new("es", TestType::Words, 5, 10, 42).unwrap();
        let record = QuizResultRecord::from_pending(&user, &pending, ResultSource::Live);

        assert_eq!(record.client_id, pending.id.to_string());
        assert_eq!(record.correct_answers, 5);
        assert_eq!(record.total_questions, 10);
        assert_eq!(record.language, "es");
        assert_eq!(record.timestamp, 42);
    }

    #[test]
    fn test_serializes_camel_case() {
        let user = UserId::new("learner").unwrap();
        let pending = PendingResult::new("de", TestType::Phrases, 1, 2, 7).unwrap();
        let record = QuizResultRecord::from_pending(&user, &pending, ResultSource::OfflineSync);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["userId"], "learner");
        assert_eq!(json["testType"], "phrases");
        assert_eq!(json["correctAnswers"], 1);
        assert_eq!(json["totalQuestions"], 2);
        assert_eq!(json["source"], "offline_sync");
    }
}

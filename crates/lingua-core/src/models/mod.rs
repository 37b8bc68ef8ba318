//! Data models for Lingua

mod activity;
mod pending_result;
mod quiz_result;

pub use activity::{activity_date, DailyActivityMarker, ACTIVITY_DATE_FORMAT};
pub use pending_result::{
    normalize_language_tag, PendingResult, PendingResultId, TestType, UserId,
};
pub use quiz_result::{QuizResultRecord, ResultSource};

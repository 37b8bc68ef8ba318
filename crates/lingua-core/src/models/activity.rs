//! Daily activity marker model

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::error::{Error, Result};

/// Calendar date format used for activity markers
pub const ACTIVITY_DATE_FORMAT: &str = "%Y-%m-%d";

/// "This user practiced on this calendar date"
///
/// Remotely keyed by `(user_id, date)`, so writing the same marker twice is
/// an upsert rather than a second document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivityMarker {
    pub user_id: UserId,
    /// `yyyy-MM-dd`
    pub date: String,
    /// When the marker was written (Unix ms)
    pub timestamp: i64,
}

impl DailyActivityMarker {
    pub fn new(user_id: UserId, date: impl Into<String>) -> Self {
        Self {
            user_id,
            date: date.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Calendar date (`yyyy-MM-dd`) of a Unix-ms timestamp in the given UTC offset
pub fn activity_date(recorded_at: i64, utc_offset_minutes: i32) -> Result<String> {
    let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).ok_or_else(|| {
        Error::InvalidInput(format!("invalid UTC offset: {utc_offset_minutes} minutes"))
    })?;
    let instant = DateTime::from_timestamp_millis(recorded_at)
        .ok_or_else(|| Error::InvalidInput(format!("timestamp out of range: {recorded_at}")))?;

    Ok(instant
        .with_timezone(&offset)
        .format(ACTIVITY_DATE_FORMAT)
        .to_string())
}

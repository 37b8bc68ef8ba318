//! Daily activity markers written after successful uploads.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::models::{activity_date, DailyActivityMarker, PendingResult, UserId};
use crate::remote::{MarkerWrite, RemoteResult, RemoteStore};

/// Counts of marker writes for one flush pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerSummary {
    pub created: usize,
    pub already_present: usize,
    pub failed: usize,
}

/// Ensures a "practiced on this date" marker exists for uploaded results.
pub struct ActivityMarkerWriter<R> {
    remote: Arc<R>,
    utc_offset_minutes: i32,
}

impl<R: RemoteStore> ActivityMarkerWriter<R> {
    pub const fn new(remote: Arc<R>, utc_offset_minutes: i32) -> Self {
        Self {
            remote,
            utc_offset_minutes,
        }
    }

    /// Ensure the marker for `(user, date)` exists.
    pub async fn ensure(&self, user: &UserId, date: &str) -> RemoteResult<MarkerWrite> {
        let marker = DailyActivityMarker::new(user.clone(), date);
        self.remote.put_activity_marker(&marker).await
    }

    /// Ensure one marker per distinct calendar date among `results`.
    ///
    /// Failures are logged and counted; they never affect the results
    /// themselves, which are already stored remotely.
    pub async fn ensure_for_results(&self, user: &UserId, results: &[PendingResult]) -> MarkerSummary {
        let mut dates = BTreeSet::new();
        for result in results {
            match activity_date(result.recorded_at, self.utc_offset_minutes) {
                Ok(date) => {
                    dates.insert(date);
                }
                Err(error) => {
                    tracing::warn!("Skipping activity marker for {}: {error}", result.id);
                }
            }
        }

        let mut summary = MarkerSummary::default();
        for date in dates {
            match self.ensure(user, &date).await {
                Ok(MarkerWrite::Created) => {
                    tracing::debug!("Recorded practice day {date} for {user}");
                    summary.created += 1;
                }
                Ok(MarkerWrite::AlreadyPresent) => summary.already_present += 1,
                Err(error) => {
                    tracing::warn!("Failed to record practice day {date} for {user}: {error}");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestType;
    use crate::remote::MemoryRemoteStore;
    use crate::stats::days_practiced;

    // 2024-03-09T10:00:00Z and 2024-03-10T10:00:00Z
    const DAY_ONE: i64 = 1_709_978_400_000;
    const DAY_TWO: i64 = DAY_ONE + 86_400_000;

    fn result_at(recorded_at: i64) -> PendingResult {
        PendingResult::new("es", TestType::Words, 1, 1, recorded_at).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_marker_per_distinct_date() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let writer = ActivityMarkerWriter::new(Arc::clone(&remote), 0);
        let user = UserId::new("learner").unwrap();

        let summary = writer
            .ensure_for_results(
                &user,
                &[result_at(DAY_ONE), result_at(DAY_ONE + 1_000), result_at(DAY_TWO)],
            )
            .await;

        assert_eq!(summary.created, 2);
        assert_eq!(remote.marker_writes(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn writing_same_marker_twice_keeps_days_practiced() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let writer = ActivityMarkerWriter::new(Arc::clone(&remote), 0);
        let user = UserId::new("learner").unwrap();

        writer.ensure(&user, "2024-03-09").await.unwrap();
        let once = days_practiced(remote.activity_dates(&user).await.unwrap());

        let second = writer.ensure(&user, "2024-03-09").await.unwrap();
        let twice = days_practiced(remote.activity_dates(&user).await.unwrap());

        assert_eq!(second, MarkerWrite::AlreadyPresent);
        assert_eq!(once, twice);
        assert_eq!(twice, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failures_are_counted_not_raised() {
        let remote = Arc::new(MemoryRemoteStore::new());
        remote.fail_markers(true).await;
        let writer = ActivityMarkerWriter::new(Arc::clone(&remote), 0);
        let user = UserId::new("learner").unwrap();

        let summary = writer.ensure_for_results(&user, &[result_at(DAY_ONE)]).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 0);
    }
}

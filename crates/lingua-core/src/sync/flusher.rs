//! One flush pass over the local pending store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::marker::{ActivityMarkerWriter, MarkerSummary};
use super::retry::RetryPolicy;
use crate::config::QueueConfig;
use crate::connectivity::Reachability;
use crate::db::{AttemptOutcome, Database, LibSqlPendingRepository, PendingRepository};
use crate::error::Result;
use crate::identity::IdentityProvider;
use crate::models::{PendingResult, PendingResultId, QuizResultRecord, ResultSource};
use crate::remote::{RemoteError, RemoteStore};
use crate::util::unix_millis_now;

/// Counts for a completed flush pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records an upload was attempted for
    pub attempted: usize,
    /// Records acknowledged and removed from the local store
    pub uploaded: usize,
    /// Records that failed and remain queued
    pub failed: usize,
    /// Failed records that exhausted their retries in this pass
    pub dead_lettered: usize,
    pub markers: MarkerSummary,
    /// Records left in the local store after the pass, dead letters included
    pub remaining: usize,
}

impl FlushReport {
    /// Nothing is left locally after this pass
    pub const fn drained(&self) -> bool {
        self.remaining == 0
    }
}

/// Result of a flush request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// No authenticated user; nothing was read or uploaded
    Unauthenticated,
    /// The remote store is not reachable; nothing was uploaded
    Offline,
    Completed(FlushReport),
}

impl FlushOutcome {
    pub const fn report(&self) -> Option<&FlushReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Unauthenticated | Self::Offline => None,
        }
    }
}

/// Uploads due pending results and applies the outcomes atomically.
pub struct Flusher<R, I, N> {
    remote: Arc<R>,
    identity: Arc<I>,
    reachability: Arc<N>,
    markers: ActivityMarkerWriter<R>,
    policy: RetryPolicy,
    max_concurrency: usize,
}

impl<R, I, N> Flusher<R, I, N>
where
    R: RemoteStore + 'static,
    I: IdentityProvider,
    N: Reachability,
{
    pub fn new(remote: Arc<R>, identity: Arc<I>, reachability: Arc<N>, config: &QueueConfig) -> Self {
        Self {
            markers: ActivityMarkerWriter::new(Arc::clone(&remote), config.utc_offset_minutes),
            remote,
            identity,
            reachability,
            policy: config.retry,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Run one flush pass at the current time.
    ///
    /// `live` marks the record whose quiz just finished; it is uploaded with
    /// [`ResultSource::Live`], everything else as an offline sync.
    pub async fn flush(&self, db: &Database, live: Option<PendingResultId>) -> Result<FlushOutcome> {
        self.flush_at(db, live, unix_millis_now()).await
    }

    /// Run one flush pass as if the current time were `now_ms`.
    pub async fn flush_at(
        &self,
        db: &Database,
        live: Option<PendingResultId>,
        now_ms: i64,
    ) -> Result<FlushOutcome> {
        let Some(user) = self.identity.current_user() else {
            tracing::debug!("Skipping flush: no authenticated user");
            return Ok(FlushOutcome::Unauthenticated);
        };

        if !self.reachability.is_reachable().await {
            tracing::debug!("Skipping flush: remote store unreachable");
            return Ok(FlushOutcome::Offline);
        }

        let repo = LibSqlPendingRepository::new(db.connection());
        let due = repo.due(now_ms).await?;
        if due.is_empty() {
            let remaining = repo.stats(now_ms).await?.total();
            return Ok(FlushOutcome::Completed(FlushReport {
                remaining,
                ..FlushReport::default()
            }));
        }

        let attempted = due.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut in_flight = HashMap::with_capacity(attempted);
        let mut uploads = JoinSet::new();
        for pending in due {
            let source = if live == Some(pending.id) {
                ResultSource::Live
            } else {
                ResultSource::OfflineSync
            };
            let record = QuizResultRecord::from_pending(&user, &pending, source);
            let remote = Arc::clone(&self.remote);
            let semaphore = Arc::clone(&semaphore);
            let id = pending.id;
            in_flight.insert(id, pending);
            uploads.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = remote.put_quiz_result(&record).await;
                (id, result)
            });
        }

        let mut outcomes = Vec::with_capacity(attempted);
        let mut uploaded = Vec::new();
        let mut report = FlushReport {
            attempted,
            ..FlushReport::default()
        };

        while let Some(joined) = uploads.join_next().await {
            let (id, result) = match joined {
                Ok(finished) => finished,
                Err(error) => {
                    // Its record stays in `in_flight` and is failed below
                    tracing::error!("Upload task failed: {error}");
                    continue;
                }
            };
            let Some(mut pending) = in_flight.remove(&id) else {
                continue;
            };

            match result {
                Ok(()) => {
                    pending.synced = true;
                    outcomes.push(AttemptOutcome::Uploaded(pending.id));
                    uploaded.push(pending);
                }
                Err(error) => {
                    outcomes.push(self.record_failure(&mut report, &pending, &error, now_ms));
                }
            }
        }

        for pending in in_flight.into_values() {
            let error = RemoteError::Unavailable("upload task ended abnormally".to_string());
            outcomes.push(self.record_failure(&mut report, &pending, &error, now_ms));
        }

        repo.apply_outcomes(&outcomes).await?;
        report.uploaded = uploaded.len();

        if !uploaded.is_empty() {
            report.markers = self.markers.ensure_for_results(&user, &uploaded).await;
        }

        report.remaining = repo.stats(now_ms).await?.total();
        tracing::info!(
            "Flushed {}/{} pending results ({} failed, {} remaining)",
            report.uploaded,
            report.attempted,
            report.failed,
            report.remaining
        );
        Ok(FlushOutcome::Completed(report))
    }

    fn record_failure(
        &self,
        report: &mut FlushReport,
        pending: &PendingResult,
        error: &RemoteError,
        now_ms: i64,
    ) -> AttemptOutcome {
        let outcome = self.failure_outcome(pending, error, now_ms);
        if matches!(outcome, AttemptOutcome::Failed { dead_lettered: true, .. }) {
            report.dead_lettered += 1;
        }
        report.failed += 1;
        outcome
    }

    fn failure_outcome(
        &self,
        pending: &PendingResult,
        error: &RemoteError,
        now_ms: i64,
    ) -> AttemptOutcome {
        let decision = self.policy.on_failure(pending.attempts, now_ms);
        if decision.dead_lettered {
            tracing::error!(
                "Giving up on pending result {} after {} attempts: {error}",
                pending.id,
                decision.attempts
            );
        } else if error.is_permanent() {
            tracing::warn!(
                "Pending result {} rejected (attempt {}): {error}",
                pending.id,
                decision.attempts
            );
        } else {
            tracing::debug!(
                "Pending result {} not uploaded (attempt {}): {error}",
                pending.id,
                decision.attempts
            );
        }

        AttemptOutcome::Failed {
            id: pending.id,
            attempts: decision.attempts,
            next_attempt_at: decision.next_attempt_at,
            dead_lettered: decision.dead_lettered,
            error: error.to_string(),
        }
    }
}

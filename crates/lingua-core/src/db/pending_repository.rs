//! Pending result repository implementation

use libsql::{Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{PendingResult, PendingResultId};

const SELECT_COLUMNS: &str = "SELECT id, subject_language, test_type, correct_count, total_count,
        recorded_at, attempts, next_attempt_at, last_error, dead_lettered
     FROM pending_results";

/// Result of one upload attempt, applied to the store at the end of a flush pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The remote store acknowledged the record; remove it
    Uploaded(PendingResultId),
    /// The upload failed; keep the record with updated retry bookkeeping
    Failed {
        id: PendingResultId,
        attempts: u32,
        next_attempt_at: Option<i64>,
        dead_lettered: bool,
        error: String,
    },
}

/// Counts of stored records by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStats {
    /// Records eligible for upload now
    pub due: usize,
    /// Records waiting for their backoff deadline
    pub backing_off: usize,
    /// Records whose retries are exhausted
    pub dead_lettered: usize,
}

impl PendingStats {
    pub const fn total(&self) -> usize {
        self.due + self.backing_off + self.dead_lettered
    }
}

/// Trait for pending result storage operations (async)
#[allow(async_fn_in_trait)]
pub trait PendingRepository {
    /// Add a record at the end of the list. No deduplication.
    async fn append(&self, result: &PendingResult) -> Result<()>;

    /// Get a record by id
    async fn get(&self, id: &PendingResultId) -> Result<Option<PendingResult>>;

    /// Every stored record in insertion order, dead letters included
    async fn read_all(&self) -> Result<Vec<PendingResult>>;

    /// Overwrite the stored list in one transaction
    async fn replace(&self, results: &[PendingResult]) -> Result<()>;

    /// Records that are not dead-lettered and whose backoff has elapsed
    async fn due(&self, now_ms: i64) -> Result<Vec<PendingResult>>;

    /// Apply a flush pass's outcomes in one transaction
    async fn apply_outcomes(&self, outcomes: &[AttemptOutcome]) -> Result<()>;

    /// Records whose retries are exhausted
    async fn dead_letters(&self) -> Result<Vec<PendingResult>>;

    /// Reset a record's retry state so the next flush uploads it
    async fn requeue(&self, id: &PendingResultId) -> Result<()>;

    /// Reset every dead-lettered record; returns how many were reset
    async fn requeue_all(&self) -> Result<u64>;

    /// Ids starting with `prefix`, oldest first
    async fn ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<PendingResultId>>;

    /// Counts of stored records by state at `now_ms`
    async fn stats(&self, now_ms: i64) -> Result<PendingStats>;
}

/// libSQL implementation of `PendingRepository`
pub struct LibSqlPendingRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPendingRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn query_results(&self, sql: &str, params: Vec<Value>) -> Result<Vec<PendingResult>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::parse_result(&row)?);
        }
        Ok(results)
    }

    async fn insert(&self, result: &PendingResult) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO pending_results (
                    id, subject_language, test_type, correct_count, total_count,
                    recorded_at, attempts, next_attempt_at, last_error, dead_lettered
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                vec![
                    Value::Text(result.id.as_str()),
                    Value::Text(result.subject_language.clone()),
                    Value::Text(result.test_type.as_str().to_string()),
                    Value::Integer(i64::from(result.correct_count)),
                    Value::Integer(i64::from(result.total_count)),
                    Value::Integer(result.recorded_at),
                    Value::Integer(i64::from(result.attempts)),
                    result.next_attempt_at.map_or(Value::Null, Value::Integer),
                    result.last_error.clone().map_or(Value::Null, Value::Text),
                    Value::Integer(i64::from(result.dead_lettered)),
                ],
            )
            .await?;
        Ok(())
    }

    async fn apply_outcome(&self, outcome: &AttemptOutcome) -> Result<()> {
        match outcome {
            AttemptOutcome::Uploaded(id) => {
                self.conn
                    .execute(
                        "DELETE FROM pending_results WHERE id = ?",
                        libsql::params![id.as_str()],
                    )
                    .await?;
            }
            AttemptOutcome::Failed {
                id,
                attempts,
                next_attempt_at,
                dead_lettered,
                error,
            } => {
                self.conn
                    .execute(
                        "UPDATE pending_results
                         SET attempts = ?, next_attempt_at = ?, last_error = ?, dead_lettered = ?
                         WHERE id = ?",
                        vec![
                            Value::Integer(i64::from(*attempts)),
                            next_attempt_at.map_or(Value::Null, Value::Integer),
                            Value::Text(error.clone()),
                            Value::Integer(i64::from(*dead_lettered)),
                            Value::Text(id.as_str()),
                        ],
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Run `body` inside BEGIN/COMMIT, rolling back on the first error
    async fn in_transaction<F, Fut>(&self, body: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        if let Err(e) = body().await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }

    /// Parse a pending result from a database row
    fn parse_result(row: &Row) -> Result<PendingResult> {
        let id: String = row.get(0)?;
        let test_type: String = row.get(2)?;
        Ok(PendingResult {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid pending result id: {id}")))?,
            subject_language: row.get(1)?,
            test_type: test_type.parse()?,
            correct_count: column_u32(row, 3)?,
            total_count: column_u32(row, 4)?,
            recorded_at: row.get(5)?,
            synced: false,
            attempts: column_u32(row, 6)?,
            next_attempt_at: row.get(7)?,
            last_error: row.get(8)?,
            dead_lettered: row.get::<i64>(9)? != 0,
        })
    }
}

fn column_u32(row: &Row, idx: i32) -> Result<u32> {
    let value: i64 = row.get(idx)?;
    u32::try_from(value)
        .map_err(|_| Error::Database(format!("column {idx} out of range: {value}")))
}

fn usize_param(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl PendingRepository for LibSqlPendingRepository<'_> {
    async fn append(&self, result: &PendingResult) -> Result<()> {
        self.insert(result).await?;
        tracing::debug!(
            "Queued pending result {} ({} {}/{})",
            result.id,
            result.subject_language,
            result.correct_count,
            result.total_count
        );
        Ok(())
    }

    async fn get(&self, id: &PendingResultId) -> Result<Option<PendingResult>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let mut results = self
            .query_results(&sql, vec![Value::Text(id.as_str())])
            .await?;
        Ok(results.pop())
    }

    async fn read_all(&self) -> Result<Vec<PendingResult>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY seq ASC");
        self.query_results(&sql, Vec::new()).await
    }

    async fn replace(&self, results: &[PendingResult]) -> Result<()> {
        self.in_transaction(|| async {
            self.conn.execute("DELETE FROM pending_results", ()).await?;
            for result in results {
                self.insert(result).await?;
            }
            Ok(())
        })
        .await
    }

    async fn due(&self, now_ms: i64) -> Result<Vec<PendingResult>> {
        let sql = format!(
            "{SELECT_COLUMNS}
             WHERE dead_lettered = 0 AND (next_attempt_at IS NULL OR next_attempt_at <= ?)
             ORDER BY seq ASC"
        );
        self.query_results(&sql, vec![Value::Integer(now_ms)]).await
    }

    async fn apply_outcomes(&self, outcomes: &[AttemptOutcome]) -> Result<()> {
        if outcomes.is_empty() {
            return Ok(());
        }

        self.in_transaction(|| async {
            for outcome in outcomes {
                self.apply_outcome(outcome).await?;
            }
            Ok(())
        })
        .await
    }

    async fn dead_letters(&self) -> Result<Vec<PendingResult>> {
        let sql = format!("{SELECT_COLUMNS} WHERE dead_lettered = 1 ORDER BY seq ASC");
        self.query_results(&sql, Vec::new()).await
    }

    async fn requeue(&self, id: &PendingResultId) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE pending_results
                 SET attempts = 0, next_attempt_at = NULL, dead_lettered = 0
                 WHERE id = ?",
                libsql::params![id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn requeue_all(&self) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "UPDATE pending_results
                 SET attempts = 0, next_attempt_at = NULL, dead_lettered = 0
                 WHERE dead_lettered = 1",
                (),
            )
            .await?;
        Ok(rows)
    }

    async fn ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<PendingResultId>> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows = self
            .conn
            .query(
                "SELECT id FROM pending_results
                 WHERE substr(id, 1, length(?1)) = ?1
                 ORDER BY seq ASC LIMIT ?2",
                vec![Value::Text(prefix), Value::Integer(usize_param(limit))],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            if let Ok(id) = id.parse() {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn stats(&self, now_ms: i64) -> Result<PendingStats> {
        let mut rows = self
            .conn
            .query(
                "SELECT
                    COALESCE(SUM(CASE WHEN dead_lettered = 0
                        AND (next_attempt_at IS NULL OR next_attempt_at <= ?1) THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN dead_lettered = 0
                        AND next_attempt_at > ?1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN dead_lettered = 1 THEN 1 ELSE 0 END), 0)
                 FROM pending_results",
                libsql::params![now_ms],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(PendingStats::default());
        };

        let count = |idx: i32| -> Result<usize> {
            let value: i64 = row.get(idx)?;
            usize::try_from(value).map_err(|_| Error::Database(format!("negative count: {value}")))
        };

        Ok(PendingStats {
            due: count(0)?,
            backing_off: count(1)?,
            dead_lettered: count(2)?,
        })
    }
}

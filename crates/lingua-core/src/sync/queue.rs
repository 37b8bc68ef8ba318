//! Single-writer task owning the local pending store.
//!
//! Every append, flush, and requeue goes through one channel to one task, so
//! the store is never rewritten by two concurrent flushes.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::flusher::{FlushOutcome, Flusher};
use crate::connectivity::Reachability;
use crate::db::{Database, LibSqlPendingRepository, PendingRepository, PendingStats};
use crate::error::{Error, Result};
use crate::identity::IdentityProvider;
use crate::models::{PendingResult, PendingResultId};
use crate::remote::RemoteStore;
use crate::util::unix_millis_now;

/// Which stored records to reset for another round of retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueTarget {
    One(PendingResultId),
    AllDeadLetters,
}

enum Command {
    Record {
        result: PendingResult,
        reply: oneshot::Sender<Result<PendingResultId>>,
    },
    Flush {
        reply: Option<oneshot::Sender<Result<FlushOutcome>>>,
    },
    ReadAll {
        reply: oneshot::Sender<Result<Vec<PendingResult>>>,
    },
    DeadLetters {
        reply: oneshot::Sender<Result<Vec<PendingResult>>>,
    },
    ResolvePrefix {
        prefix: String,
        reply: oneshot::Sender<Result<Vec<PendingResultId>>>,
    },
    Requeue {
        target: RequeueTarget,
        reply: oneshot::Sender<Result<u64>>,
    },
    Stats {
        reply: oneshot::Sender<Result<PendingStats>>,
    },
    Shutdown,
}

/// The queue task: owns the database and the flusher.
pub struct ResultQueue<R, I, N> {
    db: Database,
    flusher: Flusher<R, I, N>,
    commands: mpsc::Receiver<Command>,
}

/// Cloneable handle for sending commands to the queue task.
#[derive(Clone)]
pub struct ResultQueueHandle {
    commands: mpsc::Sender<Command>,
}

impl<R, I, N> ResultQueue<R, I, N>
where
    R: RemoteStore + 'static,
    I: IdentityProvider + 'static,
    N: Reachability + 'static,
{
    /// Spawn the queue task on the current runtime.
    ///
    /// The task stops after [`ResultQueueHandle::shutdown`] or once every
    /// handle is dropped.
    pub fn spawn(
        db: Database,
        flusher: Flusher<R, I, N>,
        capacity: usize,
    ) -> (ResultQueueHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            db,
            flusher,
            commands: receiver,
        };
        let task = tokio::spawn(queue.run());
        (ResultQueueHandle { commands: sender }, task)
    }

    async fn run(mut self) {
        tracing::debug!("Result queue started");
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Record { result, reply } => {
                    let id = result.id;
                    let appended = self.repo().append(&result).await.map(|()| id);
                    let stored = appended.is_ok();
                    let _ = reply.send(appended);
                    if stored {
                        // Best effort: failures stay queued for the next trigger
                        self.flush_logged(Some(id)).await;
                    }
                }
                Command::Flush { reply: Some(reply) } => {
                    let _ = reply.send(self.flusher.flush(&self.db, None).await);
                }
                Command::Flush { reply: None } => self.flush_logged(None).await,
                Command::ReadAll { reply } => {
                    let _ = reply.send(self.repo().read_all().await);
                }
                Command::DeadLetters { reply } => {
                    let _ = reply.send(self.repo().dead_letters().await);
                }
                Command::ResolvePrefix { prefix, reply } => {
                    let _ = reply.send(self.repo().ids_by_prefix(&prefix, 3).await);
                }
                Command::Requeue { target, reply } => {
                    let _ = reply.send(self.requeue(target).await);
                }
                Command::Stats { reply } => {
                    let _ = reply.send(self.repo().stats(unix_millis_now()).await);
                }
                Command::Shutdown => break,
            }
        }
        tracing::debug!("Result queue stopped");
    }

    fn repo(&self) -> LibSqlPendingRepository<'_> {
        LibSqlPendingRepository::new(self.db.connection())
    }

    async fn flush_logged(&self, live: Option<PendingResultId>) {
        if let Err(error) = self.flusher.flush(&self.db, live).await {
            tracing::warn!("Flush failed: {error}");
        }
    }

    async fn requeue(&self, target: RequeueTarget) -> Result<u64> {
        let repo = self.repo();
        match target {
            RequeueTarget::One(id) => repo.requeue(&id).await.map(|()| 1),
            RequeueTarget::AllDeadLetters => repo.requeue_all().await,
        }
    }
}

impl ResultQueueHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| Error::QueueClosed)?;
        response.await.map_err(|_| Error::QueueClosed)?
    }

    /// Store a finished quiz result and try to upload it right away.
    ///
    /// Returns once the result is stored locally; the upload attempt runs
    /// afterwards on the queue task.
    pub async fn record(&self, result: PendingResult) -> Result<PendingResultId> {
        self.request(|reply| Command::Record { result, reply }).await
    }

    /// Run a flush pass and wait for its outcome.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        self.request(|reply| Command::Flush { reply: Some(reply) })
            .await
    }

    /// Queue a flush pass without waiting for it.
    pub async fn request_flush(&self) -> Result<()> {
        self.commands
            .send(Command::Flush { reply: None })
            .await
            .map_err(|_| Error::QueueClosed)
    }

    /// Every stored record, dead letters included.
    pub async fn read_all(&self) -> Result<Vec<PendingResult>> {
        self.request(|reply| Command::ReadAll { reply }).await
    }

    pub async fn dead_letters(&self) -> Result<Vec<PendingResult>> {
        self.request(|reply| Command::DeadLetters { reply }).await
    }

    /// Resolve an id or unique id prefix to a stored record id.
    pub async fn resolve_id(&self, query: &str) -> Result<PendingResultId> {
        let query = query.trim();
        if let Ok(id) = query.parse::<PendingResultId>() {
            return Ok(id);
        }

        let prefix = query.to_string();
        let matches = self
            .request(|reply| Command::ResolvePrefix { prefix, reply })
            .await?;
        match matches.as_slice() {
            [] => Err(Error::NotFound(query.to_string())),
            [id] => Ok(*id),
            _ => Err(Error::InvalidInput(format!(
                "ID prefix '{query}' is ambiguous"
            ))),
        }
    }

    /// Reset retry state; returns how many records were reset.
    pub async fn requeue(&self, target: RequeueTarget) -> Result<u64> {
        self.request(|reply| Command::Requeue { target, reply }).await
    }

    pub async fn stats(&self) -> Result<PendingStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Stop the queue task after the commands already sent.
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| Error::QueueClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::connectivity::{ConnectivityWatcher, SharedReachability};
    use crate::identity::StaticIdentity;
    use crate::models::{ResultSource, TestType, UserId};
    use crate::remote::MemoryRemoteStore;
    use crate::sync::RetryPolicy;
    use std::sync::Arc;
    use std::time::Duration;

    struct Setup {
        handle: ResultQueueHandle,
        task: JoinHandle<()>,
        remote: Arc<MemoryRemoteStore>,
        reachability: Arc<SharedReachability>,
    }

    async fn setup(online: bool, retry: RetryPolicy) -> Setup {
        let db = Database::open_in_memory().await.unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let identity = Arc::new(StaticIdentity::signed_in(UserId::new("learner").unwrap()));
        let reachability = Arc::new(SharedReachability::new(online));
        let config = QueueConfig {
            retry,
            ..QueueConfig::default()
        };
        let flusher = Flusher::new(
            Arc::clone(&remote),
            identity,
            Arc::clone(&reachability),
            &config,
        );
        let (handle, task) = ResultQueue::spawn(db, flusher, 16);
        Setup {
            handle,
            task,
            remote,
            reachability,
        }
    }

    fn quiz(correct: u32) -> PendingResult {
        PendingResult::now("es", TestType::Words, correct, 10).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_online_uploads_immediately_as_live() {
        let s = setup(true, RetryPolicy::default()).await;

        let id = s.handle.record(quiz(7)).await.unwrap();
        // Commands run in order, so the immediate flush is done by now
        let stats = s.handle.stats().await.unwrap();

        assert_eq!(stats.total(), 0);
        let results = s.remote.results().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].client_id, id.to_string());
        assert_eq!(results[0].source, ResultSource::Live);

        s.handle.shutdown().await.unwrap();
        s.task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_offline_then_flush_on_reconnect() {
        let s = setup(false, RetryPolicy::default()).await;

        s.handle.record(quiz(5)).await.unwrap();
        s.handle.record(quiz(8)).await.unwrap();
        assert_eq!(s.handle.read_all().await.unwrap().len(), 2);
        assert_eq!(s.remote.result_writes(), 0);

        s.reachability.set_online(true);
        let outcome = s.handle.flush().await.unwrap();

        assert_eq!(outcome.report().unwrap().uploaded, 2);
        assert!(s.handle.read_all().await.unwrap().is_empty());
        let mut counts: Vec<_> = s
            .remote
            .results()
            .await
            .iter()
            .map(|r| r.correct_answers)
            .collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![5, 8]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_triggers_do_not_duplicate_or_resurrect() {
        let s = setup(false, RetryPolicy::default()).await;
        for correct in 0..6 {
            s.handle.record(quiz(correct)).await.unwrap();
        }
        s.reachability.set_online(true);

        let first = s.handle.clone();
        let second = s.handle.clone();
        let (a, b) = tokio::join!(first.flush(), second.flush());

        let uploaded = a.unwrap().report().unwrap().uploaded + b.unwrap().report().unwrap().uploaded;
        assert_eq!(uploaded, 6);
        assert_eq!(s.remote.result_writes(), 6);
        assert!(s.handle.read_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn requeue_dead_letter_by_prefix() {
        let retry = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let s = setup(true, retry).await;
        s.remote.reject_language("xx").await;

        let poison = PendingResult::now("xx", TestType::Words, 1, 1).unwrap();
        let id = s.handle.record(poison).await.unwrap();
        assert_eq!(s.handle.dead_letters().await.unwrap().len(), 1);

        let prefix: String = id.to_string().chars().take(13).collect();
        let resolved = s.handle.resolve_id(&prefix).await.unwrap();
        assert_eq!(resolved, id);

        assert_eq!(s.handle.requeue(RequeueTarget::One(resolved)).await.unwrap(), 1);
        assert!(s.handle.dead_letters().await.unwrap().is_empty());
        assert_eq!(s.handle.stats().await.unwrap().due, 1);
    }

    /// Runs a watcher whose callback awaits a flush and reports its outcome.
    fn spawn_watcher(
        s: &Setup,
    ) -> (
        mpsc::Sender<()>,
        mpsc::UnboundedReceiver<FlushOutcome>,
        JoinHandle<()>,
    ) {
        let (notify, notifications) = mpsc::channel(4);
        let (done, outcomes) = mpsc::unbounded_channel();
        let watcher = ConnectivityWatcher::new(Arc::clone(&s.reachability));
        let handle = s.handle.clone();
        let task = tokio::spawn(watcher.run(notifications, move || {
            let handle = handle.clone();
            let done = done.clone();
            async move {
                if let Ok(outcome) = handle.flush().await {
                    let _ = done.send(outcome);
                }
            }
        }));
        (notify, outcomes, task)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn watcher_retries_failed_record_while_staying_online() {
        let s = setup(true, RetryPolicy::immediate()).await;
        s.remote.set_unavailable(true);
        s.handle.record(quiz(6)).await.unwrap();
        assert_eq!(s.handle.read_all().await.unwrap().len(), 1);

        let (notify, mut outcomes, task) = spawn_watcher(&s);
        notify.send(()).await.unwrap();
        let first = outcomes.recv().await.unwrap();
        assert_eq!(first.report().unwrap().failed, 1);

        // Server recovers; the network never went down
        s.remote.set_unavailable(false);
        notify.send(()).await.unwrap();
        let second = outcomes.recv().await.unwrap();
        assert_eq!(second.report().unwrap().uploaded, 1);
        assert!(s.handle.read_all().await.unwrap().is_empty());

        drop(notify);
        task.await.unwrap();
        assert_eq!(s.remote.results().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn watcher_uploads_backed_off_record_once_due() {
        let retry = RetryPolicy {
            base_delay_secs: 1,
            max_delay_secs: 1,
            max_attempts: 5,
        };
        let s = setup(true, retry).await;
        s.remote.set_unavailable(true);
        s.handle.record(quiz(4)).await.unwrap();
        s.remote.set_unavailable(false);

        let (notify, mut outcomes, task) = spawn_watcher(&s);
        notify.send(()).await.unwrap();
        let waiting = outcomes.recv().await.unwrap();
        // Still inside the backoff window
        assert_eq!(waiting.report().unwrap().attempted, 0);
        assert_eq!(waiting.report().unwrap().remaining, 1);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        notify.send(()).await.unwrap();
        let due = outcomes.recv().await.unwrap();
        assert_eq!(due.report().unwrap().uploaded, 1);
        assert!(due.report().unwrap().drained());

        drop(notify);
        task.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn handle_reports_closed_queue() {
        let s = setup(true, RetryPolicy::default()).await;
        s.handle.shutdown().await.unwrap();
        s.task.await.unwrap();

        let error = s.handle.stats().await.unwrap_err();
        assert!(matches!(error, Error::QueueClosed));
    }
}

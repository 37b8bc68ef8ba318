//! In-process remote store used by tests and offline demos.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Mutex;

use super::{MarkerWrite, RemoteError, RemoteResult, RemoteStore};
use crate::models::{DailyActivityMarker, QuizResultRecord, UserId};

#[derive(Debug, Default)]
struct Documents {
    results: BTreeMap<String, QuizResultRecord>,
    markers: BTreeSet<(UserId, String)>,
    rejected_languages: HashSet<String>,
    failing_markers: bool,
}

/// Remote store kept in memory, with failure injection.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    documents: Mutex<Documents>,
    unavailable: AtomicBool,
    result_writes: AtomicUsize,
    marker_writes: AtomicUsize,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend being unreachable (every call fails transiently)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Permanently reject results for a language (validation failure)
    pub async fn reject_language(&self, language: &str) {
        self.documents
            .lock()
            .await
            .rejected_languages
            .insert(language.to_string());
    }

    /// Make every marker write fail
    pub async fn fail_markers(&self, failing: bool) {
        self.documents.lock().await.failing_markers = failing;
    }

    /// Stored quiz results ordered by client id
    pub async fn results(&self) -> Vec<QuizResultRecord> {
        self.documents.lock().await.results.values().cloned().collect()
    }

    /// Number of `put_quiz_result` calls, including failed ones
    pub fn result_writes(&self) -> usize {
        self.result_writes.load(Ordering::SeqCst)
    }

    /// Number of `put_activity_marker` calls, including failed ones
    pub fn marker_writes(&self) -> usize {
        self.marker_writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> RemoteResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RemoteError::Unavailable("network unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn put_quiz_result(&self, record: &QuizResultRecord) -> RemoteResult<()> {
        self.result_writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut documents = self.documents.lock().await;
        if documents.rejected_languages.contains(&record.language) {
            return Err(RemoteError::Rejected {
                status: 422,
                message: format!("language {} is not accepted", record.language),
            });
        }
        documents
            .results
            .insert(record.client_id.clone(), record.clone());
        Ok(())
    }

    async fn put_activity_marker(&self, marker: &DailyActivityMarker) -> RemoteResult<MarkerWrite> {
        self.marker_writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut documents = self.documents.lock().await;
        if documents.failing_markers {
            return Err(RemoteError::Unavailable("marker collection offline".to_string()));
        }
        if documents
            .markers
            .insert((marker.user_id.clone(), marker.date.clone()))
        {
            Ok(MarkerWrite::Created)
        } else {
            Ok(MarkerWrite::AlreadyPresent)
        }
    }

    async fn activity_dates(&self, user_id: &UserId) -> RemoteResult<Vec<String>> {
        self.check_available()?;

        let documents = self.documents.lock().await;
        Ok(documents
            .markers
            .iter()
            .filter(|(user, _)| user == user_id)
            .map(|(_, date)| date.clone())
            .collect())
    }
}

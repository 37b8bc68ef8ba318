use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lingua_core::config::QueueConfig;
use lingua_core::connectivity::{HttpProbe, Reachability};
use lingua_core::db::Database;
use lingua_core::identity::StaticIdentity;
use lingua_core::models::{DailyActivityMarker, QuizResultRecord};
use lingua_core::remote::{HttpRemoteStore, MarkerWrite, RemoteError, RemoteResult, RemoteStore};
use lingua_core::sync::{Flusher, ResultQueue, ResultQueueHandle};
use lingua_core::util::unix_millis_now;
use lingua_core::{PendingResult, UserId};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config_profiles::CliProfilesConfig;
use crate::credentials::resolve_access_token;
use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("LINGUA_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lingua")
        .join("lingua.db")
}

/// Remote store from the active profile, or a stand-in that refuses writes.
pub enum ConfiguredRemote {
    Http(HttpRemoteStore),
    Missing,
}

impl ConfiguredRemote {
    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

fn not_configured() -> RemoteError {
    RemoteError::InvalidConfiguration("no API base URL configured".to_string())
}

impl RemoteStore for ConfiguredRemote {
    async fn put_quiz_result(&self, record: &QuizResultRecord) -> RemoteResult<()> {
        match self {
            Self::Http(store) => store.put_quiz_result(record).await,
            Self::Missing => Err(not_configured()),
        }
    }

    async fn put_activity_marker(&self, marker: &DailyActivityMarker) -> RemoteResult<MarkerWrite> {
        match self {
            Self::Http(store) => store.put_activity_marker(marker).await,
            Self::Missing => Err(not_configured()),
        }
    }

    async fn activity_dates(&self, user_id: &UserId) -> RemoteResult<Vec<String>> {
        match self {
            Self::Http(store) => store.activity_dates(user_id).await,
            Self::Missing => Err(not_configured()),
        }
    }
}

/// Reachability probe for the configured API; unconfigured means offline.
pub enum ConfiguredProbe {
    Http(HttpProbe),
    Missing,
}

impl Reachability for ConfiguredProbe {
    async fn is_reachable(&self) -> bool {
        match self {
            Self::Http(probe) => probe.is_reachable().await,
            Self::Missing => false,
        }
    }
}

/// Everything a command needs to talk to the result queue.
pub struct QueueSession {
    pub handle: ResultQueueHandle,
    pub remote: Arc<ConfiguredRemote>,
    pub probe: Arc<ConfiguredProbe>,
    pub user: Option<UserId>,
    pub config: QueueConfig,
    task: JoinHandle<()>,
}

impl QueueSession {
    pub fn is_sync_configured(&self) -> bool {
        self.remote.is_configured() && self.user.is_some()
    }

    /// Stop the queue task once every queued command has run.
    pub async fn close(self) -> Result<(), CliError> {
        self.handle.shutdown().await?;
        if let Err(error) = self.task.await {
            tracing::warn!("Result queue task ended abnormally: {error}");
        }
        Ok(())
    }
}

/// Open the local store and spawn the result queue for the resolved profile.
pub async fn open_session(
    db_path: &Path,
    profile_name: Option<&str>,
) -> Result<QueueSession, CliError> {
    let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = profiles.resolve_profile_name(profile_name);
    let profile = profiles.profile(&profile_name).cloned().unwrap_or_default();

    let config = profile.queue_config();
    config.validate()?;

    let user = profile.user_id().map(UserId::new).transpose()?;
    let (remote, probe) = match profile.api_base_url() {
        Some(base_url) => {
            let token = resolve_access_token(&profile_name)?;
            let store = HttpRemoteStore::new(base_url.as_str(), token)
                .map_err(lingua_core::Error::from)?;
            let probe = HttpProbe::new(&base_url)?;
            (ConfiguredRemote::Http(store), ConfiguredProbe::Http(probe))
        }
        None => (ConfiguredRemote::Missing, ConfiguredProbe::Missing),
    };
    tracing::debug!(
        "Profile '{profile_name}': remote configured = {}, user = {:?}",
        remote.is_configured(),
        user.as_ref().map(UserId::as_str)
    );

    let remote = Arc::new(remote);
    let probe = Arc::new(probe);
    let identity = Arc::new(StaticIdentity::new(user.clone()));

    let db = open_database(db_path).await?;
    let flusher = Flusher::new(Arc::clone(&remote), identity, Arc::clone(&probe), &config);
    let (handle, task) = ResultQueue::spawn(db, flusher, config.channel_capacity);

    Ok(QueueSession {
        handle,
        remote,
        probe,
        user,
        config,
        task,
    })
}

async fn open_database(path: &Path) -> Result<Database, CliError> {
    tracing::debug!("Opening local store at {}", path.display());
    Ok(Database::open(path).await?)
}

#[derive(Debug, Serialize)]
pub struct PendingListItem {
    pub id: String,
    pub language: String,
    pub test_type: String,
    pub correct: u32,
    pub total: u32,
    pub recorded_at: i64,
    pub recorded_at_iso: String,
    pub relative_time: String,
    pub attempts: u32,
    pub next_attempt_at: Option<i64>,
    pub last_error: Option<String>,
    pub dead_lettered: bool,
}

pub fn pending_to_list_item(result: &PendingResult) -> PendingListItem {
    let now_ms = unix_millis_now();
    PendingListItem {
        id: result.id.to_string(),
        language: result.subject_language.clone(),
        test_type: result.test_type.to_string(),
        correct: result.correct_count,
        total: result.total_count,
        recorded_at: result.recorded_at,
        recorded_at_iso: format_timestamp(result.recorded_at),
        relative_time: format_relative_time(result.recorded_at, now_ms),
        attempts: result.attempts,
        next_attempt_at: result.next_attempt_at,
        last_error: result.last_error.clone(),
        dead_lettered: result.dead_lettered,
    }
}

pub fn format_pending_lines(results: &[PendingResult], now_ms: i64) -> Vec<String> {
    results
        .iter()
        .map(|result| {
            let id = result.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let score = format!("{}/{}", result.correct_count, result.total_count);
            let relative_time = format_relative_time(result.recorded_at, now_ms);
            let status = retry_status(result, now_ms);

            format!(
                "{short_id:<13}  {:<6}  {:<7}  {score:>7}  {relative_time:<10}  {status}",
                result.subject_language,
                result.test_type.as_str()
            )
        })
        .collect()
}

fn retry_status(result: &PendingResult, now_ms: i64) -> String {
    if result.dead_lettered {
        let reason = result.last_error.as_deref().unwrap_or("retries exhausted");
        return format!("dead-lettered after {} attempts: {reason}", result.attempts);
    }
    match result.next_attempt_at {
        Some(next) if next > now_ms => format!(
            "retry in {} (attempt {})",
            format_duration_ms(next - now_ms),
            result.attempts + 1
        ),
        _ if result.attempts > 0 => format!("due (attempt {})", result.attempts + 1),
        _ => "due".to_string(),
    }
}

pub fn format_duration_ms(duration_ms: i64) -> String {
    let seconds = (duration_ms.max(0) + 999) / 1000;
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 3600 {
        format!("{}m", seconds / 60)
    } else {
        format!("{}h", seconds / 3600)
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(|| timestamp_ms.to_string(), |value| value.to_rfc3339())
}

pub fn normalize_result_identifier(id: &str) -> Result<String, CliError> {
    let id = id.trim();
    if id.is_empty() {
        Err(CliError::EmptyResultId)
    } else {
        Ok(id.to_string())
    }
}

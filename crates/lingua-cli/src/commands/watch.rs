use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lingua_core::connectivity::{interval_notifications, ConnectivityWatcher};

use crate::commands::common::open_session;
use crate::error::CliError;

pub async fn run_watch(
    interval_secs: Option<u64>,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let session = open_session(db_path, profile).await?;
    if !session.is_sync_configured() {
        session.close().await?;
        return Err(CliError::SyncNotConfigured);
    }

    let interval = interval_secs
        .filter(|secs| *secs > 0)
        .map_or_else(|| session.config.probe_interval(), Duration::from_secs);
    let (notifications, ticker) = interval_notifications(interval);
    let watcher = ConnectivityWatcher::new(Arc::clone(&session.probe));
    let handle = session.handle.clone();

    println!(
        "Checking connectivity every {}s; pending results flush whenever the API is reachable. Press Ctrl-C to stop.",
        interval.as_secs()
    );

    let watch = watcher.run(notifications, move || {
        let handle = handle.clone();
        async move {
            tracing::debug!("API reachable; requesting a flush");
            if let Err(error) = handle.request_flush().await {
                tracing::warn!("Could not request a flush: {error}");
            }
        }
    });

    tokio::select! {
        () = watch => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            println!("Stopping watcher");
        }
    }

    ticker.abort();
    session.close().await
}

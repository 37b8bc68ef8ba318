use std::path::Path;

use lingua_core::sync::{FlushOutcome, FlushReport};

use crate::commands::common::open_session;
use crate::error::CliError;

pub async fn run_flush(db_path: &Path, profile: Option<&str>) -> Result<(), CliError> {
    let session = open_session(db_path, profile).await?;
    if !session.is_sync_configured() {
        session.close().await?;
        return Err(CliError::SyncNotConfigured);
    }

    let outcome = session.handle.flush().await;
    session.close().await?;

    match outcome? {
        FlushOutcome::Unauthenticated => println!("Not signed in; nothing was uploaded."),
        FlushOutcome::Offline => {
            println!("Progress API is unreachable; results stay queued until you reconnect.");
        }
        FlushOutcome::Completed(report) => {
            for line in format_flush_report(&report) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

pub fn format_flush_report(report: &FlushReport) -> Vec<String> {
    if report.attempted == 0 && report.drained() {
        return vec!["Nothing to sync.".to_string()];
    }

    let mut lines = vec![format!(
        "Uploaded {} of {} result(s)",
        report.uploaded, report.attempted
    )];
    if report.failed > 0 {
        lines.push(format!(
            "{} failed ({} dead-lettered)",
            report.failed, report.dead_lettered
        ));
    }
    let markers = &report.markers;
    if markers.created + markers.already_present + markers.failed > 0 {
        lines.push(format!(
            "Practice days: {} new, {} already recorded, {} failed",
            markers.created, markers.already_present, markers.failed
        ));
    }
    if report.drained() {
        lines.push("All quiz results synced".to_string());
    } else {
        lines.push(format!("{} result(s) still pending", report.remaining));
    }
    lines
}

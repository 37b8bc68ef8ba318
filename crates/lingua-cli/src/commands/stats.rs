use std::path::Path;

use chrono::NaiveDate;
use lingua_core::models::{activity_date, ACTIVITY_DATE_FORMAT};
use lingua_core::remote::RemoteStore;
use lingua_core::stats::{accuracy_by_language, summarize, LanguageAccuracy, ProgressSummary};
use lingua_core::util::unix_millis_now;
use lingua_core::PendingResult;
use serde::Serialize;

use crate::commands::common::open_session;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub today: String,
    pub progress: ProgressSummary,
    /// Whether remote activity markers were included
    pub remote_included: bool,
    pub pending_results: usize,
    pub accuracy: Vec<LanguageAccuracy>,
}

pub async fn run_stats(
    as_json: bool,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let session = open_session(db_path, profile).await?;
    let pending = session.handle.read_all().await?;

    let mut dates = Vec::new();
    let mut remote_included = false;
    if let (true, Some(user)) = (session.remote.is_configured(), session.user.as_ref()) {
        match session.remote.activity_dates(user).await {
            Ok(remote_dates) => {
                dates = remote_dates;
                remote_included = true;
            }
            Err(error) => tracing::warn!("Could not load practice days from the API: {error}"),
        }
    }
    let offset = session.config.utc_offset_minutes;
    session.close().await?;

    let report = build_stats_report(dates, &pending, offset, unix_millis_now(), remote_included)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_stats_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

/// Combine remote practice days with the days of results not uploaded yet.
pub fn build_stats_report(
    mut dates: Vec<String>,
    pending: &[PendingResult],
    utc_offset_minutes: i32,
    now_ms: i64,
    remote_included: bool,
) -> Result<StatsReport, CliError> {
    for result in pending {
        dates.push(activity_date(result.recorded_at, utc_offset_minutes)?);
    }

    let today_label = activity_date(now_ms, utc_offset_minutes)?;
    let today = NaiveDate::parse_from_str(&today_label, ACTIVITY_DATE_FORMAT)
        .map_err(|error| CliError::Config(format!("invalid local date {today_label}: {error}")))?;

    Ok(StatsReport {
        today: today_label,
        progress: summarize(&dates, today),
        remote_included,
        pending_results: pending.len(),
        accuracy: accuracy_by_language(pending),
    })
}

pub fn format_stats_lines(report: &StatsReport) -> Vec<String> {
    let progress = &report.progress;
    let mut lines = vec![
        format!("Days practiced:  {}", progress.days_practiced),
        format!(
            "Current streak:  {} day(s){}",
            progress.current_streak,
            if progress.practiced_today {
                ""
            } else {
                " (practice today to extend it)"
            }
        ),
        format!("Longest streak:  {} day(s)", progress.longest_streak),
    ];

    if !report.remote_included {
        lines.push("Only local results were counted; synced history is unavailable.".to_string());
    }

    if !report.accuracy.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Accuracy of {} unsynced result(s):",
            report.pending_results
        ));
        for language in &report.accuracy {
            lines.push(format!(
                "  {:<6}  {:>5.1}%  ({}/{} over {} quiz(zes))",
                language.language,
                language.ratio() * 100.0,
                language.correct,
                language.total,
                language.quizzes
            ));
        }
    }
    lines
}

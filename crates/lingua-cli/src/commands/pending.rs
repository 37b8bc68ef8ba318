use std::path::Path;

use lingua_core::sync::RequeueTarget;
use lingua_core::util::unix_millis_now;
use lingua_core::PendingResult;

use crate::commands::common::{
    format_pending_lines, normalize_result_identifier, open_session, pending_to_list_item,
    PendingListItem,
};
use crate::error::CliError;

pub async fn run_pending(
    as_json: bool,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let session = open_session(db_path, profile).await?;
    let results = session.handle.read_all().await?;
    let stats = session.handle.stats().await?;
    session.close().await?;

    if as_json {
        return print_json(&results);
    }

    if results.is_empty() {
        println!("No pending results. Everything is synced.");
        return Ok(());
    }

    for line in format_pending_lines(&results, unix_millis_now()) {
        println!("{line}");
    }
    println!(
        "\n{} pending: {} due, {} backing off, {} dead-lettered",
        stats.total(),
        stats.due,
        stats.backing_off,
        stats.dead_lettered
    );
    Ok(())
}

pub async fn run_dead_letters(
    as_json: bool,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let session = open_session(db_path, profile).await?;
    let results = session.handle.dead_letters().await?;
    session.close().await?;

    if as_json {
        return print_json(&results);
    }

    if results.is_empty() {
        println!("No dead-lettered results.");
        return Ok(());
    }

    for line in format_pending_lines(&results, unix_millis_now()) {
        println!("{line}");
    }
    println!("\nRun `lingua requeue <id>` or `lingua requeue --all` to retry them.");
    Ok(())
}

pub async fn run_requeue(
    id: Option<&str>,
    all: bool,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let target_query = if all {
        None
    } else {
        Some(normalize_result_identifier(id.unwrap_or_default())?)
    };

    let session = open_session(db_path, profile).await?;
    let target = match target_query {
        Some(query) => RequeueTarget::One(session.handle.resolve_id(&query).await?),
        None => RequeueTarget::AllDeadLetters,
    };
    let count = session.handle.requeue(target).await?;
    session.close().await?;

    match target {
        RequeueTarget::One(id) => println!("Requeued {id}"),
        RequeueTarget::AllDeadLetters => println!("Requeued {count} dead-lettered result(s)"),
    }
    Ok(())
}

fn print_json(results: &[PendingResult]) -> Result<(), CliError> {
    let items = results
        .iter()
        .map(pending_to_list_item)
        .collect::<Vec<PendingListItem>>();
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

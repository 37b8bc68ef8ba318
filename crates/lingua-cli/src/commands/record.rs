use std::path::Path;

use lingua_core::PendingResult;

use crate::cli::QuizKind;
use crate::commands::common::open_session;
use crate::error::CliError;

pub async fn run_record(
    language: &str,
    correct: u32,
    total: u32,
    kind: QuizKind,
    db_path: &Path,
    profile: Option<&str>,
) -> Result<(), CliError> {
    let result = PendingResult::now(language, kind.into(), correct, total)?;
    let language = result.subject_language.clone();

    let session = open_session(db_path, profile).await?;
    let id = session.handle.record(result).await?;
    // Queued behind the live upload attempt, so this sees its outcome
    let still_pending = session
        .handle
        .read_all()
        .await?
        .iter()
        .any(|stored| stored.id == id);
    let sync_configured = session.is_sync_configured();
    session.close().await?;

    let short_id = id.to_string().chars().take(13).collect::<String>();
    if still_pending {
        println!("Saved {correct}/{total} in {language} offline ({short_id})");
        if !sync_configured {
            println!("Sync is not configured; run `lingua config init` to upload results.");
        }
    } else {
        println!("Recorded {correct}/{total} in {language} ({short_id})");
    }
    Ok(())
}

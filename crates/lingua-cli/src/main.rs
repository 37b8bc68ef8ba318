//! Lingua CLI - record quiz results offline and sync them later
//!
//! Results are stored locally first and uploaded whenever the progress API
//! is reachable.

mod cli;
mod commands;
mod config_profiles;
mod credentials;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::flush::run_flush;
use crate::commands::pending::{run_dead_letters, run_pending, run_requeue};
use crate::commands::record::run_record;
use crate::commands::stats::run_stats;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "lingua=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let profile = cli.profile.as_deref();

    match cli.command {
        Some(Commands::Record {
            language,
            correct,
            total,
            test_type,
        }) => run_record(&language, correct, total, test_type, &db_path, profile).await?,
        Some(Commands::Pending { json }) => run_pending(json, &db_path, profile).await?,
        Some(Commands::DeadLetters { json }) => run_dead_letters(json, &db_path, profile).await?,
        Some(Commands::Requeue { id, all }) => {
            run_requeue(id.as_deref(), all, &db_path, profile).await?;
        }
        Some(Commands::Flush) => run_flush(&db_path, profile).await?,
        Some(Commands::Stats { json }) => run_stats(json, &db_path, profile).await?,
        Some(Commands::Watch { interval }) => run_watch(interval, &db_path, profile).await?,
        Some(Commands::Config { command }) => run_config(command, profile)?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}

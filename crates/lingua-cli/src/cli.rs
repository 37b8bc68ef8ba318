use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "lingua")]
#[command(about = "Record quiz results offline and sync them when you reconnect")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for remote sync configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a finished quiz (synced right away when online)
    Record {
        /// Language practiced, e.g. `es` or `pt-BR`
        #[arg(short, long)]
        language: String,
        /// Number of correct answers
        #[arg(short, long)]
        correct: u32,
        /// Number of questions asked
        #[arg(short, long)]
        total: u32,
        /// Quiz kind
        #[arg(long = "type", value_enum, default_value_t = QuizKind::Words)]
        test_type: QuizKind,
    },
    /// List results waiting to be uploaded
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List results that exhausted their upload retries
    DeadLetters {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reset a result's retry state so the next flush uploads it
    Requeue {
        /// Result ID or unique ID prefix
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,
        /// Requeue every dead-lettered result
        #[arg(long)]
        all: bool,
    },
    /// Upload pending results now
    #[command(alias = "sync")]
    Flush,
    /// Show practice days, streaks, and accuracy
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Watch connectivity and flush pending results whenever the API is reachable
    Watch {
        /// Seconds between reachability checks (defaults to the profile setting)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Manage CLI profile configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output file path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the profile chosen by --profile, LINGUA_PROFILE, or the active one
    Init {
        /// Base URL of the progress API
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Signed-in learner id
        #[arg(long)]
        user_id: Option<String>,
        /// Bearer token for the progress API (stored in the OS keychain)
        #[arg(long)]
        access_token: Option<String>,
        /// Calendar offset from UTC in minutes used for practice days
        #[arg(long, allow_hyphen_values = true)]
        utc_offset_minutes: Option<i32>,
        /// Keep the current active profile unchanged
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum QuizKind {
    Words,
    Phrases,
}

impl From<QuizKind> for lingua_core::TestType {
    fn from(kind: QuizKind) -> Self {
        match kind {
            QuizKind::Words => Self::Words,
            QuizKind::Phrases => Self::Phrases,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

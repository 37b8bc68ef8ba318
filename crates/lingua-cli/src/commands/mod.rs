pub mod common;
pub mod completions;
pub mod config;
pub mod flush;
pub mod pending;
pub mod record;
pub mod stats;
pub mod watch;

//! Database layer for Lingua

mod connection;
mod migrations;
mod pending_repository;

pub use connection::Database;
pub use pending_repository::{
    AttemptOutcome, LibSqlPendingRepository, PendingRepository, PendingStats,
};

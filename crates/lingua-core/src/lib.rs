//! lingua-core - Core library for Lingua
//!
//! This crate contains the offline quiz-result queue shared by Lingua clients:
//! the local pending store, the remote store clients, connectivity watching,
//! the sync flusher, and progress statistics.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod remote;
pub mod stats;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{PendingResult, PendingResultId, TestType, UserId};

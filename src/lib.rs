// ============================================================================
// votetally: poll voting over a transactional tally store
// ============================================================================
//
// Layers, bottom-up:
// - storage: in-memory tables, WAL and snapshot persistence
// - transaction: explicit transaction handle and its change log
// - store: Counter Store, Voter Ledger, poll catalog
// - vote: validator, vote transaction coordinator, results
// - facade / web: `VoteDatabase` and the axum router

pub mod config;
pub mod core;
pub mod facade;
pub mod storage;
pub mod store;
pub mod transaction;
pub mod vote;
pub mod web;

pub use config::AppConfig;
pub use crate::core::{CountKey, DbError, LedgerKey, NewPoll, Poll, PollId, Result, VoterId};
pub use facade::VoteDatabase;
pub use storage::{DurabilityMode, StorageConfig};
pub use store::{LedgerInsert, PollLookup};
pub use transaction::Transaction;
pub use vote::{PollResults, RejectReason, VoteOutcome};
pub use web::{AppState, build_router};

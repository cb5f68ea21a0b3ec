use crate::core::{CountKey, PollId, Result};
use crate::storage::VoteStorage;
use crate::transaction::{Change, Transaction};
use std::sync::Arc;

/// Result of an increment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Increment {
    /// The row existed; its count before this increment
    Previous(u64),
    /// No row for the (poll, option) pair
    NotFound,
}

/// Durable (poll, option) -> count mapping.
///
/// Increments are buffered in the transaction and applied additively at
/// commit, so concurrent increments of one key never lose updates.
#[derive(Clone)]
pub struct CounterStore {
    storage: Arc<VoteStorage>,
}

impl CounterStore {
    pub fn new(storage: Arc<VoteStorage>) -> Self {
        Self { storage }
    }

    /// Add one vote to an existing row.
    ///
    /// Never creates a row: a missing pair is reported as `NotFound` and the
    /// caller decides whether to seed one.
    pub fn increment(&self, txn: &mut Transaction, key: &CountKey) -> Result<Increment> {
        let committed = txn.storage().count(key)?;
        let base = match committed {
            Some(count) => count,
            None if txn.creates_count(key) => 0,
            None => return Ok(Increment::NotFound),
        };

        let previous = base + txn.pending_votes(key);
        txn.record_change(Change::IncrementCount { key: key.clone() })?;
        Ok(Increment::Previous(previous))
    }

    /// Create a row seeded to `count`
    pub fn seed(&self, txn: &mut Transaction, key: &CountKey, count: u64) -> Result<()> {
        txn.record_change(Change::InsertCount {
            key: key.clone(),
            count,
        })
    }

    /// Committed count, if the row exists
    pub fn get(&self, key: &CountKey) -> Result<Option<u64>> {
        self.storage.count(key)
    }

    /// Every committed row of one poll, in label order
    pub fn counts_for_poll(&self, poll_id: &PollId) -> Result<Vec<(String, u64)>> {
        self.storage.counts_for_poll(poll_id)
    }
}

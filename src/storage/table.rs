use crate::core::{CountKey, DbError, LedgerKey, Poll, PollId, Result, VoterRecord};
use crate::transaction::Change;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

// ============================================================================
// Polls
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct PollTable {
    rows: HashMap<PollId, Poll>,
}

impl PollTable {
    pub fn get(&self, id: &PollId) -> Option<&Poll> {
        self.rows.get(id)
    }

    pub fn contains(&self, id: &PollId) -> bool {
        self.rows.contains_key(id)
    }

    pub fn insert(&mut self, poll: Poll) -> Result<()> {
        if self.rows.contains_key(&poll.id) {
            return Err(DbError::UniqueViolation(format!(
                "poll '{}' already exists",
                poll.id
            )));
        }
        self.rows.insert(poll.id.clone(), poll);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Poll> {
        self.rows.values()
    }
}

// ============================================================================
// Vote counts, keyed by (poll, option)
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct CountTable {
    rows: BTreeMap<CountKey, u64>,
}

impl CountTable {
    pub fn get(&self, key: &CountKey) -> Option<u64> {
        self.rows.get(key).copied()
    }

    pub fn contains(&self, key: &CountKey) -> bool {
        self.rows.contains_key(key)
    }

    /// Insert a row, or add to it when it already exists
    pub fn insert_or_add(&mut self, key: CountKey, count: u64) {
        *self.rows.entry(key).or_insert(0) += count;
    }

    /// All rows of one poll, in label order
    pub fn rows_for_poll(&self, poll_id: &PollId) -> Vec<(String, u64)> {
        let start = CountKey::new(poll_id.clone(), String::new());
        self.rows
            .range(start..)
            .take_while(|(key, _)| &key.poll_id == poll_id)
            .map(|(key, count)| (key.option.clone(), *count))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CountKey, &u64)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Voter ledger, keyed by (poll, voter)
// ============================================================================

/// A ledger row is either committed or reserved by a live transaction.
/// Reserved rows already occupy the key, which is what serializes
/// concurrent inserts of the same pair.
#[derive(Debug, Clone)]
pub struct LedgerRow {
    pub record: VoterRecord,
    pub xmin: u64,
    pub committed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LedgerTable {
    rows: BTreeMap<LedgerKey, LedgerRow>,
}

impl LedgerTable {
    pub fn contains_committed(&self, key: &LedgerKey) -> bool {
        self.rows.get(key).is_some_and(|row| row.committed)
    }

    /// Uniqueness-enforcing insert of a pending row owned by `tx_id`
    pub fn reserve(&mut self, record: VoterRecord, tx_id: u64) -> Result<()> {
        if let Some(existing) = self.rows.get(&record.key) {
            let holder = if existing.committed {
                "committed".to_string()
            } else {
                format!("reserved by txn_{}", existing.xmin)
            };
            return Err(DbError::UniqueViolation(format!(
                "voter {} already present ({holder})",
                record.key
            )));
        }

        self.rows.insert(
            record.key.clone(),
            LedgerRow {
                record,
                xmin: tx_id,
                committed: false,
            },
        );
        Ok(())
    }

    /// Drop a pending row, but only if `tx_id` owns it
    pub fn release(&mut self, key: &LedgerKey, tx_id: u64) -> bool {
        let owned = self
            .rows
            .get(key)
            .is_some_and(|row| !row.committed && row.xmin == tx_id);
        if owned {
            self.rows.remove(key);
        }
        owned
    }

    pub fn is_reserved_by(&self, key: &LedgerKey, tx_id: u64) -> bool {
        self.rows
            .get(key)
            .is_some_and(|row| !row.committed && row.xmin == tx_id)
    }

    fn mark_committed(&mut self, key: &LedgerKey) {
        if let Some(row) = self.rows.get_mut(key) {
            row.committed = true;
        }
    }

    fn insert_committed(&mut self, record: VoterRecord) -> bool {
        if self.rows.contains_key(&record.key) {
            return false;
        }
        self.rows.insert(
            record.key.clone(),
            LedgerRow {
                record,
                xmin: 0,
                committed: true,
            },
        );
        true
    }

    pub fn committed_for_poll(&self, poll_id: &PollId) -> usize {
        self.committed().filter(|record| &record.key.poll_id == poll_id).count()
    }

    pub fn committed(&self) -> impl Iterator<Item = &VoterRecord> {
        self.rows
            .values()
            .filter(|row| row.committed)
            .map(|row| &row.record)
    }

    pub fn pending_count(&self) -> usize {
        self.rows.values().filter(|row| !row.committed).count()
    }
}

// ============================================================================
// All tables together
// ============================================================================

/// Serializable image of the committed state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablesImage {
    pub polls: Vec<Poll>,
    pub counts: Vec<(CountKey, u64)>,
    pub voters: Vec<VoterRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub polls: PollTable,
    pub counts: CountTable,
    pub ledger: LedgerTable,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `changes` can be applied in full by transaction `tx_id`.
    ///
    /// Rows are never deleted and reservations are only released by their
    /// owner, so a successful check stays valid until the commit applies.
    pub fn validate_commit(&self, tx_id: u64, changes: &[Change]) -> Result<()> {
        for (position, change) in changes.iter().enumerate() {
            match change {
                Change::InsertPoll { poll } => {
                    if self.polls.contains(&poll.id) {
                        return Err(DbError::UniqueViolation(format!(
                            "poll '{}' already exists",
                            poll.id
                        )));
                    }
                }
                Change::IncrementCount { key } => {
                    let seeded_earlier = changes[..position]
                        .iter()
                        .any(|earlier| earlier.creates_count(key));
                    if !self.counts.contains(key) && !seeded_earlier {
                        return Err(DbError::ConstraintViolation(format!(
                            "count row {key} does not exist"
                        )));
                    }
                }
                Change::InsertVoter { record } => {
                    if !self.ledger.is_reserved_by(&record.key, tx_id) {
                        return Err(DbError::ExecutionError(format!(
                            "voter {} is not reserved by txn_{tx_id}",
                            record.key
                        )));
                    }
                }
                Change::InsertCount { .. } => {}
            }
        }
        Ok(())
    }

    /// Apply a validated change list
    pub fn apply_commit(&mut self, changes: &[Change]) {
        for change in changes {
            match change {
                Change::InsertPoll { poll } => {
                    self.polls.rows.insert(poll.id.clone(), poll.clone());
                }
                Change::InsertCount { key, count } => {
                    self.counts.insert_or_add(key.clone(), *count);
                }
                Change::IncrementCount { key } => {
                    self.counts.insert_or_add(key.clone(), 1);
                }
                Change::InsertVoter { record } => {
                    self.ledger.mark_committed(&record.key);
                }
            }
        }
    }

    /// Re-apply a committed change list read back from the WAL
    pub fn replay(&mut self, tx_id: u64, changes: Vec<Change>) {
        for change in changes {
            match change {
                Change::InsertPoll { poll } => {
                    let id = poll.id.clone();
                    if self.polls.insert(poll).is_err() {
                        warn!(txn = tx_id, poll_id = %id, "replay skipped duplicate poll");
                    }
                }
                Change::InsertCount { key, count } => {
                    self.counts.insert_or_add(key, count);
                }
                Change::IncrementCount { key } => {
                    if !self.counts.contains(&key) {
                        warn!(txn = tx_id, key = %key, "replay found increment without count row");
                    }
                    self.counts.insert_or_add(key, 1);
                }
                Change::InsertVoter { record } => {
                    let key = record.key.clone();
                    if !self.ledger.insert_committed(record) {
                        warn!(txn = tx_id, key = %key, "replay skipped duplicate voter");
                    }
                }
            }
        }
    }

    pub fn image(&self) -> TablesImage {
        TablesImage {
            polls: self.polls.iter().cloned().collect(),
            counts: self
                .counts
                .iter()
                .map(|(key, count)| (key.clone(), *count))
                .collect(),
            voters: self.ledger.committed().cloned().collect(),
        }
    }

    pub fn from_image(image: TablesImage) -> Self {
        let mut tables = Self::new();
        for poll in image.polls {
            tables.polls.rows.insert(poll.id.clone(), poll);
        }
        for (key, count) in image.counts {
            tables.counts.insert_or_add(key, count);
        }
        for record in image.voters {
            tables.ledger.insert_committed(record);
        }
        tables
    }
}

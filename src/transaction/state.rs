// ============================================================================
// Transaction State Management
// ============================================================================
//
// A transaction moves through Active -> Committed/Aborted.
//
// Count writes are buffered in the change list and only reach the tables at
// commit. Ledger inserts reserve their key in the ledger table right away,
// which is what makes a concurrent insert of the same (poll, voter) fail
// before either side commits.
//
// ============================================================================

use super::Change;
use crate::core::{CountKey, DbError, LedgerKey, Result, VoterRecord};
use crate::storage::VoteStorage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction state
///
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Explicit transaction handle, scoped to one request.
///
/// Dropping a handle that is still active rolls it back, so every exit path
/// (early return, panic, cancelled future) releases what it reserved.
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    storage: Arc<VoteStorage>,
    changes: Vec<Change>,
    reserved: Vec<LedgerKey>,
    start_time: std::time::Instant,
}

impl Transaction {
    pub(crate) fn begin(storage: Arc<VoteStorage>) -> Self {
        Self {
            id: TransactionId::new(),
            state: TransactionState::Active,
            storage,
            changes: Vec::new(),
            reserved: Vec::new(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub(crate) fn storage(&self) -> &VoteStorage {
        &self.storage
    }

    fn ensure_active(&self, action: &str) -> Result<()> {
        if !self.state.is_active() {
            return Err(DbError::ExecutionError(format!(
                "Cannot {action}: transaction {} is already {}",
                self.id, self.state
            )));
        }
        Ok(())
    }

    /// Buffer a write until commit
    pub(crate) fn record_change(&mut self, change: Change) -> Result<()> {
        self.ensure_active("record change")?;
        self.changes.push(change);
        Ok(())
    }

    /// Votes this transaction has already added to `key`
    pub(crate) fn pending_votes(&self, key: &CountKey) -> u64 {
        self.changes.iter().map(|change| change.pending_votes(key)).sum()
    }

    /// Whether this transaction creates the count row for `key`
    pub(crate) fn creates_count(&self, key: &CountKey) -> bool {
        self.changes.iter().any(|change| change.creates_count(key))
    }

    /// Claim the ledger key for this transaction.
    ///
    /// Fails with `UniqueViolation` when any other row, committed or pending,
    /// already holds the key.
    pub(crate) fn reserve_voter(&mut self, record: VoterRecord) -> Result<()> {
        self.ensure_active("reserve voter")?;
        let key = record.key.clone();
        self.storage.reserve_voter(record.clone(), self.id.0)?;
        self.reserved.push(key);
        self.changes.push(Change::InsertVoter { record });
        Ok(())
    }

    /// Make every recorded change durable and visible at once.
    ///
    /// On error the transaction is rolled back.
    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_active("commit")?;

        match self.storage.commit(self.id.0, &self.changes).await {
            Ok(()) => {
                self.state = TransactionState::Committed;
                self.reserved.clear();
                debug!(
                    txn = %self.id,
                    changes = self.change_count(),
                    tables = ?self.touched_tables(),
                    elapsed_us = self.duration().as_micros() as u64,
                    "transaction committed"
                );
                Ok(())
            }
            Err(err) => {
                self.abort();
                Err(err)
            }
        }
    }

    /// Discard every recorded change and release reservations
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_active("rollback")?;
        self.abort();
        Ok(())
    }

    fn touched_tables(&self) -> Vec<&'static str> {
        let mut tables: Vec<_> = self.changes.iter().map(Change::table_name).collect();
        tables.sort_unstable();
        tables.dedup();
        tables
    }

    fn abort(&mut self) {
        for key in self.reserved.drain(..) {
            self.storage.release_voter(&key, self.id.0);
        }
        self.changes.clear();
        self.state = TransactionState::Aborted;
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state.is_active() {
            if !self.changes.is_empty() {
                warn!(txn = %self.id, changes = self.changes.len(), "transaction dropped while active, rolling back");
            }
            self.abort();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("changes", &self.changes.len())
            .field("reserved", &self.reserved.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PollId, VoterId};

    fn record(voter: &str) -> VoterRecord {
        VoterRecord::now(LedgerKey::new(PollId::from("p1"), VoterId::from(voter)))
    }

    #[test]
    fn test_transaction_id_generation() {
        let id1 = TransactionId::new();
        let id2 = TransactionId::new();
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[tokio::test]
    async fn test_transaction_lifecycle() {
        let storage = Arc::new(VoteStorage::in_memory());
        let mut txn = Transaction::begin(storage);

        assert_eq!(txn.state(), TransactionState::Active);
        assert!(!txn.state().is_terminal());

        txn.commit().await.unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);
        assert!(txn.state().is_terminal());
    }

    #[tokio::test]
    async fn test_cannot_commit_twice() {
        let storage = Arc::new(VoteStorage::in_memory());
        let mut txn = Transaction::begin(storage);

        txn.commit().await.unwrap();
        assert!(txn.commit().await.is_err());
    }

    #[test]
    fn test_rollback_releases_reservations() {
        let storage = Arc::new(VoteStorage::in_memory());
        let mut txn = Transaction::begin(storage.clone());

        txn.reserve_voter(record("v1")).unwrap();
        assert_eq!(storage.pending_voters().unwrap(), 1);

        txn.rollback().unwrap();
        assert_eq!(txn.change_count(), 0);
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert_eq!(storage.pending_voters().unwrap(), 0);
    }

    #[test]
    fn test_drop_rolls_back() {
        let storage = Arc::new(VoteStorage::in_memory());
        {
            let mut txn = Transaction::begin(storage.clone());
            txn.reserve_voter(record("v1")).unwrap();
        }
        assert_eq!(storage.pending_voters().unwrap(), 0);

        // The key is free again
        let mut txn = Transaction::begin(storage.clone());
        txn.reserve_voter(record("v1")).unwrap();
    }

    #[test]
    fn test_second_reservation_conflicts() {
        let storage = Arc::new(VoteStorage::in_memory());
        let mut first = Transaction::begin(storage.clone());
        let mut second = Transaction::begin(storage);

        first.reserve_voter(record("v1")).unwrap();
        let err = second.reserve_voter(record("v1")).unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation(_)));
        assert_eq!(second.change_count(), 0);
    }

    #[test]
    fn test_cannot_record_change_after_rollback() {
        let storage = Arc::new(VoteStorage::in_memory());
        let mut txn = Transaction::begin(storage);
        txn.rollback().unwrap();

        let change = Change::IncrementCount {
            key: CountKey::new(PollId::from("p1"), "Cats"),
        };
        assert!(txn.record_change(change).is_err());
    }
}

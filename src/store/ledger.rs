use crate::core::{DbError, LedgerKey, PollId, Result, VoterRecord};
use crate::storage::VoteStorage;
use crate::transaction::Transaction;
use std::sync::Arc;

/// Outcome of a ledger insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerInsert {
    Ok,
    /// Another row, committed or held by a concurrent transaction, owns the pair
    AlreadyRecorded,
}

/// Durable set of (poll, voter) pairs. Insertion is the commit point of
/// "this voter has voted".
#[derive(Clone)]
pub struct VoterLedger {
    storage: Arc<VoteStorage>,
}

impl VoterLedger {
    pub fn new(storage: Arc<VoteStorage>) -> Self {
        Self { storage }
    }

    /// Committed membership only; rows held by in-flight transactions do not count
    pub fn has_voted(&self, key: &LedgerKey) -> Result<bool> {
        self.storage.has_committed_voter(key)
    }

    /// Uniqueness-enforcing insert.
    ///
    /// Of two concurrent inserts for the same pair exactly one gets `Ok`; the
    /// uniqueness violation of the other is reported as `AlreadyRecorded`.
    pub fn record_vote(&self, txn: &mut Transaction, key: &LedgerKey) -> Result<LedgerInsert> {
        match txn.reserve_voter(VoterRecord::now(key.clone())) {
            Ok(()) => Ok(LedgerInsert::Ok),
            Err(DbError::UniqueViolation(_)) => Ok(LedgerInsert::AlreadyRecorded),
            Err(err) => Err(err),
        }
    }

    pub fn voters_in_poll(&self, poll_id: &PollId) -> Result<usize> {
        self.storage.committed_voters(poll_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VoterId;

    fn key(voter: &str) -> LedgerKey {
        LedgerKey::new(PollId::from("p1"), VoterId::from(voter))
    }

    #[tokio::test]
    async fn test_record_then_has_voted() {
        let storage = Arc::new(VoteStorage::in_memory());
        let ledger = VoterLedger::new(storage.clone());

        let mut txn = Transaction::begin(storage);
        assert_eq!(ledger.record_vote(&mut txn, &key("v1")).unwrap(), LedgerInsert::Ok);
        assert!(!ledger.has_voted(&key("v1")).unwrap());

        txn.commit().await.unwrap();
        assert!(ledger.has_voted(&key("v1")).unwrap());
        assert_eq!(ledger.voters_in_poll(&PollId::from("p1")).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_second_record_is_already_recorded() {
        let storage = Arc::new(VoteStorage::in_memory());
        let ledger = VoterLedger::new(storage.clone());

        let mut first = Transaction::begin(storage.clone());
        ledger.record_vote(&mut first, &key("v1")).unwrap();
        first.commit().await.unwrap();

        let mut second = Transaction::begin(storage);
        assert_eq!(
            ledger.record_vote(&mut second, &key("v1")).unwrap(),
            LedgerInsert::AlreadyRecorded
        );
    }

    #[tokio::test]
    async fn test_in_flight_reservation_blocks_concurrent_insert() {
        let storage = Arc::new(VoteStorage::in_memory());
        let ledger = VoterLedger::new(storage.clone());

        let mut first = Transaction::begin(storage.clone());
        let mut second = Transaction::begin(storage);
        assert_eq!(ledger.record_vote(&mut first, &key("v1")).unwrap(), LedgerInsert::Ok);
        assert_eq!(
            ledger.record_vote(&mut second, &key("v1")).unwrap(),
            LedgerInsert::AlreadyRecorded
        );

        first.commit().await.unwrap();
        assert_eq!(ledger.voters_in_poll(&PollId::from("p1")).unwrap(), 1);
    }
}

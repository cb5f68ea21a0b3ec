use super::validator::{Validation, VoteValidator};
use crate::core::{CountKey, LedgerKey, PollId, Result, VoterId};
use crate::storage::VoteStorage;
use crate::store::{CounterStore, Increment, LedgerInsert, PollLookup, VoterLedger};
use crate::transaction::Transaction;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a vote was not recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The poll does not exist
    NotFound,
    /// Option not in the poll, or a malformed request
    InvalidInput,
    /// The voter already voted in this poll, including the concurrent race
    Conflict,
    /// The store failed; nothing was written
    StorageError,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::NotFound => "poll not found",
            RejectReason::InvalidInput => "invalid input",
            RejectReason::Conflict => "vote already cast",
            RejectReason::StorageError => "storage error",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl VoteOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, VoteOutcome::Accepted)
    }
}

/// Runs validate -> increment -> ledger insert as one atomic unit.
///
/// The validator rejects most duplicates without opening a transaction.
/// The ledger insert is the only real serialization point: when it loses the
/// race the increment made earlier in the same transaction is rolled back with
/// it, so every committed increment has exactly one ledger row.
#[derive(Clone)]
pub struct VoteCoordinator {
    storage: Arc<VoteStorage>,
    validator: VoteValidator,
    counter: CounterStore,
    ledger: VoterLedger,
}

impl VoteCoordinator {
    pub fn new(storage: Arc<VoteStorage>, polls: Arc<dyn PollLookup>) -> Self {
        let ledger = VoterLedger::new(storage.clone());
        Self {
            validator: VoteValidator::new(polls, ledger.clone()),
            counter: CounterStore::new(storage.clone()),
            ledger,
            storage,
        }
    }

    /// Cast one vote. Never retries: after `Conflict` a retry must not re-vote,
    /// so retrying is left to the client.
    pub async fn cast_vote(&self, poll_id: &PollId, option: &str, voter_id: &VoterId) -> VoteOutcome {
        match self.validator.validate(poll_id, option, voter_id).await {
            Ok(Validation::Valid) => {}
            Ok(Validation::PollNotFound) => return VoteOutcome::Rejected(RejectReason::NotFound),
            Ok(Validation::InvalidOption) => {
                return VoteOutcome::Rejected(RejectReason::InvalidInput);
            }
            Ok(Validation::DuplicateVote) => {
                debug!(poll_id = %poll_id, voter_id = %voter_id, "duplicate vote blocked");
                return VoteOutcome::Rejected(RejectReason::Conflict);
            }
            Err(err) => {
                error!(poll_id = %poll_id, option, voter_id = %voter_id, error = %err, "vote validation failed");
                return VoteOutcome::Rejected(RejectReason::StorageError);
            }
        }

        // A blank option never passes validation; a blank voter would
        if voter_id.as_str().trim().is_empty() {
            return VoteOutcome::Rejected(RejectReason::InvalidInput);
        }

        let mut txn = Transaction::begin(self.storage.clone());
        match self.record(&mut txn, poll_id, option, voter_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if txn.state().is_active()
                    && let Err(rollback_err) = txn.rollback()
                {
                    warn!(txn = %txn.id(), error = %rollback_err, "rollback failed");
                }
                error!(
                    txn = %txn.id(),
                    poll_id = %poll_id,
                    option,
                    voter_id = %voter_id,
                    error = %err,
                    "vote transaction failed"
                );
                VoteOutcome::Rejected(RejectReason::StorageError)
            }
        }
    }

    async fn record(
        &self,
        txn: &mut Transaction,
        poll_id: &PollId,
        option: &str,
        voter_id: &VoterId,
    ) -> Result<VoteOutcome> {
        let count_key = CountKey::new(poll_id.clone(), option);
        if self.counter.increment(txn, &count_key)? == Increment::NotFound {
            // Rows are seeded at poll creation; reaching this means that was missed
            warn!(poll_id = %poll_id, option, "count row missing, seeding it with this vote");
            self.counter.seed(txn, &count_key, 1)?;
        }

        let ledger_key = LedgerKey::new(poll_id.clone(), voter_id.clone());
        match self.ledger.record_vote(txn, &ledger_key)? {
            LedgerInsert::AlreadyRecorded => {
                txn.rollback()?;
                debug!(txn = %txn.id(), poll_id = %poll_id, voter_id = %voter_id, "concurrent duplicate vote rolled back");
                Ok(VoteOutcome::Rejected(RejectReason::Conflict))
            }
            LedgerInsert::Ok => {
                txn.commit().await?;
                info!(txn = %txn.id(), poll_id = %poll_id, option, voter_id = %voter_id, "vote recorded");
                Ok(VoteOutcome::Accepted)
            }
        }
    }
}

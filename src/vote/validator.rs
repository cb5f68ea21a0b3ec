use crate::core::{LedgerKey, PollId, Result, VoterId};
use crate::store::{PollLookup, VoterLedger};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    PollNotFound,
    InvalidOption,
    DuplicateVote,
}

/// Read-only pre-checks run before any write.
///
/// The duplicate check is a fast path only. Two requests can both pass it;
/// the ledger insert inside the vote transaction is what decides.
#[derive(Clone)]
pub struct VoteValidator {
    polls: Arc<dyn PollLookup>,
    ledger: VoterLedger,
}

impl VoteValidator {
    pub fn new(polls: Arc<dyn PollLookup>, ledger: VoterLedger) -> Self {
        Self { polls, ledger }
    }

    pub async fn validate(
        &self,
        poll_id: &PollId,
        option: &str,
        voter_id: &VoterId,
    ) -> Result<Validation> {
        let Some(poll) = self.polls.get_poll(poll_id).await? else {
            return Ok(Validation::PollNotFound);
        };

        if !poll.has_option(option) {
            return Ok(Validation::InvalidOption);
        }

        let key = LedgerKey::new(poll_id.clone(), voter_id.clone());
        if self.ledger.has_voted(&key)? {
            return Ok(Validation::DuplicateVote);
        }

        Ok(Validation::Valid)
    }
}

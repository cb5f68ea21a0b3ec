use crate::core::{CountKey, NewPoll, Poll, PollId, Result};
use crate::storage::VoteStorage;
use crate::transaction::{Change, Transaction};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Read-only poll lookup used by the vote path
#[async_trait]
pub trait PollLookup: Send + Sync {
    /// The poll with its option set, or `None` when it does not exist
    async fn get_poll(&self, id: &PollId) -> Result<Option<Poll>>;
}

/// Poll records: creation with zero-seeded counts, and lookup
#[derive(Clone)]
pub struct PollCatalog {
    storage: Arc<VoteStorage>,
}

impl PollCatalog {
    pub fn new(storage: Arc<VoteStorage>) -> Self {
        Self { storage }
    }

    /// Store a new poll and one count row per option, seeded to 0, in a
    /// single transaction
    pub async fn create_poll(&self, new_poll: NewPoll) -> Result<Poll> {
        new_poll.validate()?;
        let poll = new_poll.into_poll(PollId::generate());

        let mut txn = Transaction::begin(self.storage.clone());
        txn.record_change(Change::InsertPoll { poll: poll.clone() })?;
        for option in &poll.options {
            txn.record_change(Change::InsertCount {
                key: CountKey::new(poll.id.clone(), option.clone()),
                count: 0,
            })?;
        }
        txn.commit().await?;

        info!(poll_id = %poll.id, options = poll.options.len(), "poll created");
        Ok(poll)
    }

    pub fn poll_count(&self) -> Result<usize> {
        self.storage.poll_count()
    }
}

#[async_trait]
impl PollLookup for PollCatalog {
    async fn get_poll(&self, id: &PollId) -> Result<Option<Poll>> {
        self.storage.poll(id)
    }
}

use crate::core::Result;
use crate::storage::{StorageConfig, VoteStorage};
use crate::store::{CounterStore, PollCatalog, VoterLedger};
use crate::transaction::Transaction;
use crate::vote::{ResultsReader, VoteCoordinator};
use std::sync::Arc;

/// Entry point that wires the stores and the vote path over one storage.
///
/// Cheap to clone; every clone shares the same tables and WAL.
///
/// # Examples
///
/// ```
/// use votetally::{NewPoll, VoteDatabase, VoterId};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let db = VoteDatabase::in_memory();
/// let poll = db
///     .polls()
///     .create_poll(NewPoll::new("Pets?", vec!["Cats".into(), "Dogs".into()]))
///     .await
///     .unwrap();
///
/// let outcome = db.coordinator().cast_vote(&poll.id, "Cats", &VoterId::from("v1")).await;
/// assert!(outcome.is_accepted());
/// # });
/// ```
#[derive(Clone)]
pub struct VoteDatabase {
    storage: Arc<VoteStorage>,
    polls: PollCatalog,
    counter: CounterStore,
    ledger: VoterLedger,
    coordinator: VoteCoordinator,
    results: ResultsReader,
}

impl VoteDatabase {
    /// Open per `config`, replaying the snapshot and WAL when durable
    pub fn open(config: StorageConfig) -> Result<Self> {
        Ok(Self::from_storage(Arc::new(VoteStorage::open(&config)?)))
    }

    pub fn in_memory() -> Self {
        Self::from_storage(Arc::new(VoteStorage::in_memory()))
    }

    fn from_storage(storage: Arc<VoteStorage>) -> Self {
        let polls = PollCatalog::new(storage.clone());
        let lookup = Arc::new(polls.clone());
        let counter = CounterStore::new(storage.clone());

        Self {
            ledger: VoterLedger::new(storage.clone()),
            coordinator: VoteCoordinator::new(storage.clone(), lookup.clone()),
            results: ResultsReader::new(lookup, counter.clone()),
            counter,
            polls,
            storage,
        }
    }

    /// Start an explicit transaction for Counter Store and Voter Ledger writes
    pub fn begin(&self) -> Transaction {
        Transaction::begin(self.storage.clone())
    }

    pub fn polls(&self) -> &PollCatalog {
        &self.polls
    }

    pub fn counter(&self) -> &CounterStore {
        &self.counter
    }

    pub fn ledger(&self) -> &VoterLedger {
        &self.ledger
    }

    pub fn coordinator(&self) -> &VoteCoordinator {
        &self.coordinator
    }

    pub fn results(&self) -> &ResultsReader {
        &self.results
    }

    pub fn storage(&self) -> &Arc<VoteStorage> {
        &self.storage
    }

    /// Snapshot committed state and truncate the WAL. No-op in memory.
    pub async fn checkpoint(&self) -> Result<()> {
        self.storage.checkpoint().await
    }

    pub async fn is_durable(&self) -> bool {
        self.storage.is_durable().await
    }
}

use super::config::StorageConfig;
use super::persistence::PersistenceManager;
use super::table::Tables;
use crate::core::{CountKey, LedgerKey, Poll, PollId, Result, VoterRecord};
use crate::transaction::Change;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Shared table state plus the commit path.
///
/// Table latches are `std` locks and are never held across an `.await`, so a
/// dropped transaction can release its reservations synchronously.
/// The commit mutex orders WAL records and guards checkpoints.
pub struct VoteStorage {
    tables: RwLock<Tables>,
    commit_lock: Mutex<Option<PersistenceManager>>,
}

impl VoteStorage {
    /// Fresh storage with nothing on disk
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
            commit_lock: Mutex::new(None),
        }
    }

    /// Open storage per `config`, recovering any data already on disk
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let Some(data_dir) = config.data_dir.as_ref().filter(|_| config.is_durable()) else {
            return Ok(Self::in_memory());
        };

        let mut persistence = PersistenceManager::new(data_dir, config.durability)?;
        persistence
            .wal_mut()
            .set_checkpoint_threshold(config.checkpoint_threshold);
        let tables = persistence.recover()?;
        debug!(
            data_dir = %data_dir.display(),
            polls = tables.polls.len(),
            "vote storage opened"
        );

        Ok(Self {
            tables: RwLock::new(tables),
            commit_lock: Mutex::new(Some(persistence)),
        })
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        Ok(self.tables.read()?)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        Ok(self.tables.write()?)
    }

    pub fn poll(&self, id: &PollId) -> Result<Option<Poll>> {
        Ok(self.read()?.polls.get(id).cloned())
    }

    pub fn poll_count(&self) -> Result<usize> {
        Ok(self.read()?.polls.len())
    }

    pub fn count(&self, key: &CountKey) -> Result<Option<u64>> {
        Ok(self.read()?.counts.get(key))
    }

    /// Every count row stored for the poll, in label order
    pub fn counts_for_poll(&self, poll_id: &PollId) -> Result<Vec<(String, u64)>> {
        Ok(self.read()?.counts.rows_for_poll(poll_id))
    }

    pub fn has_committed_voter(&self, key: &LedgerKey) -> Result<bool> {
        Ok(self.read()?.ledger.contains_committed(key))
    }

    pub fn committed_voters(&self, poll_id: &PollId) -> Result<usize> {
        Ok(self.read()?.ledger.committed_for_poll(poll_id))
    }

    pub fn pending_voters(&self) -> Result<usize> {
        Ok(self.read()?.ledger.pending_count())
    }

    pub(crate) fn reserve_voter(&self, record: VoterRecord, tx_id: u64) -> Result<()> {
        self.write()?.ledger.reserve(record, tx_id)
    }

    /// Release a pending reservation. Runs on drop paths, so it never fails.
    pub(crate) fn release_voter(&self, key: &LedgerKey, tx_id: u64) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.ledger.release(key, tx_id);
    }

    /// Make `changes` durable and visible.
    ///
    /// Nothing is awaited once the commit lock is held, so a cancelled caller
    /// either commits fully or not at all.
    pub(crate) async fn commit(&self, tx_id: u64, changes: &[Change]) -> Result<()> {
        let mut persistence = self.commit_lock.lock().await;

        self.read()?.validate_commit(tx_id, changes)?;

        if let Some(persistence) = persistence.as_mut() {
            persistence.log_commit(tx_id, changes)?;
        }

        self.write()?.apply_commit(changes);

        if let Some(persistence) = persistence.as_mut()
            && persistence.needs_checkpoint()
        {
            let tables = self.read()?;
            if let Err(err) = persistence.checkpoint(&tables) {
                // The record stays in the WAL; replay skips what a snapshot already holds
                warn!(error = %err, "automatic checkpoint failed");
            }
        }

        Ok(())
    }

    /// Write a snapshot of committed state and truncate the WAL
    pub async fn checkpoint(&self) -> Result<()> {
        let mut persistence = self.commit_lock.lock().await;
        if let Some(persistence) = persistence.as_mut() {
            let tables = self.read()?;
            persistence.checkpoint(&tables)?;
        }
        Ok(())
    }

    pub async fn is_durable(&self) -> bool {
        self.commit_lock.lock().await.is_some()
    }
}

impl Default for VoteStorage {
    fn default() -> Self {
        Self::in_memory()
    }
}

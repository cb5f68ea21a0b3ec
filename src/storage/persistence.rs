//! Write-Ahead Logging (WAL) and snapshot persistence for the vote store

use crate::core::{DbError, Result};
use crate::storage::table::{Tables, TablesImage};
use crate::transaction::Change;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub const WAL_FILE_NAME: &str = "votetally.wal";
pub const SNAPSHOT_FILE_NAME: &str = "votetally.snapshot";

// ============================================================================
// WAL Entry Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntry {
    /// One committed transaction with its complete change list.
    /// `lsn` grows by one per record and keeps counting across restarts.
    Commit {
        lsn: u64,
        txn: u64,
        changes: Vec<Change>,
    },
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    /// LSN of the last WAL record already folded into `tables`
    pub last_lsn: u64,
    pub tables: TablesImage,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: DateTime<Utc>,
    pub poll_count: usize,
    pub voter_count: usize,
}

impl StoreSnapshot {
    pub fn new(tables: TablesImage, last_lsn: u64) -> Self {
        let metadata = SnapshotMetadata {
            created_at: Utc::now(),
            poll_count: tables.polls.len(),
            voter_count: tables.voters.len(),
        };

        Self {
            version: 2,
            last_lsn,
            tables,
            metadata,
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync every commit record
    #[default]
    Sync,
    /// Write through to the OS, no fsync
    Async,
    /// Keep nothing on disk
    None,
}

impl FromStr for DurabilityMode {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            "none" | "off" => Ok(Self::None),
            other => Err(format!(
                "unknown durability mode '{other}', expected one of: sync, async, none"
            )),
        }
    }
}

// ============================================================================
// WAL Manager
// ============================================================================

pub struct WalManager {
    wal_path: PathBuf,
    wal_file: Option<File>,
    durability_mode: DurabilityMode,
    entries_since_checkpoint: usize,
    checkpoint_threshold: usize,
}

impl WalManager {
    pub fn new<P: AsRef<Path>>(wal_path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let wal_path = wal_path.as_ref().to_path_buf();
        if let Some(parent) = wal_path.parent() {
            fs::create_dir_all(parent).map_err(|e| DbError::io("failed to create WAL directory", e))?;
        }

        let wal_file = if durability_mode != DurabilityMode::None {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&wal_path)
                .map_err(|e| DbError::io("failed to open WAL file", e))?;
            Some(file)
        } else {
            None
        };

        Ok(Self {
            wal_path,
            wal_file,
            durability_mode,
            entries_since_checkpoint: 0,
            checkpoint_threshold: 1000,
        })
    }

    /// Append one length-prefixed record.
    ///
    /// On failure the file is cut back to its previous length, so a failed
    /// append never leaves a record that recovery would replay.
    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        let mode = self.durability_mode;
        if mode == DurabilityMode::None {
            return Ok(());
        }
        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| DbError::ExecutionError("WAL file not initialized".to_string()))?;

        let payload = rmp_serde::to_vec(entry)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| DbError::ExecutionError("WAL entry too large".to_string()))?;
        let mut frame = Vec::with_capacity(payload.len() + 4);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);

        let previous_len = file
            .metadata()
            .map_err(|e| DbError::io("failed to stat WAL", e))?
            .len();

        let written = file.write_all(&frame).and_then(|_| {
            if mode == DurabilityMode::Sync {
                file.sync_data()
            } else {
                file.flush()
            }
        });

        if let Err(err) = written {
            if let Err(truncate_err) = file.set_len(previous_len) {
                warn!(error = %truncate_err, "failed to truncate WAL after write error");
            }
            return Err(DbError::io("failed to write WAL", err));
        }

        self.entries_since_checkpoint += 1;
        Ok(())
    }

    /// Read every complete record. A torn trailing record is ignored.
    pub fn read_all(&self) -> Result<Vec<WalEntry>> {
        Ok(self.read_valid()?.0)
    }

    /// Complete records plus the byte length they span
    fn read_valid(&self) -> Result<(Vec<WalEntry>, u64)> {
        if !self.wal_path.exists() {
            return Ok((Vec::new(), 0));
        }
        let file = File::open(&self.wal_path).map_err(|e| DbError::io("failed to open WAL for reading", e))?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut valid_len = 0u64;
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(DbError::io("failed to read WAL entry length", e)),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            match reader.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    warn!(records = entries.len(), "ignoring torn record at WAL tail");
                    break;
                }
                Err(e) => return Err(DbError::io("failed to read WAL entry data", e)),
            }
            match rmp_serde::from_slice::<WalEntry>(&data) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(records = entries.len(), error = %e, "ignoring undecodable record at WAL tail");
                    break;
                }
            }
            valid_len += 4 + len as u64;
        }
        Ok((entries, valid_len))
    }

    /// Cut off anything past the last complete record so new appends stay readable
    fn discard_tail(&mut self, valid_len: u64) -> Result<()> {
        let Some(file) = self.wal_file.as_mut() else {
            return Ok(());
        };
        let current = file
            .metadata()
            .map_err(|e| DbError::io("failed to stat WAL", e))?
            .len();
        if current > valid_len {
            file.set_len(valid_len)
                .map_err(|e| DbError::io("failed to truncate torn WAL tail", e))?;
            file.sync_all().map_err(|e| DbError::io("failed to sync WAL", e))?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let file = self
            .wal_file
            .as_mut()
            .ok_or_else(|| DbError::ExecutionError("WAL file not initialized".to_string()))?;
        file.set_len(0).map_err(|e| DbError::io("failed to truncate WAL", e))?;
        file.sync_all().map_err(|e| DbError::io("failed to sync WAL", e))?;
        self.entries_since_checkpoint = 0;
        Ok(())
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.entries_since_checkpoint >= self.checkpoint_threshold
    }

    pub fn entries_since_checkpoint(&self) -> usize {
        self.entries_since_checkpoint
    }

    pub fn set_checkpoint_threshold(&mut self, threshold: usize) {
        self.checkpoint_threshold = threshold.max(1);
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    /// Write to a temp file in the same directory, fsync, then rename over
    /// the old snapshot
    pub fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let dir = self
            .snapshot_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| DbError::io("failed to create snapshot directory", e))?;

        let serialized = rmp_serde::to_vec(snapshot)?;
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| DbError::io("failed to create temp file", e))?;
        temp.write_all(&serialized)
            .map_err(|e| DbError::io("failed to write snapshot", e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| DbError::io("failed to sync snapshot", e))?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| DbError::io("failed to rename snapshot", e.error))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<StoreSnapshot>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.snapshot_path).map_err(|e| DbError::io("failed to read snapshot", e))?;
        let snapshot: StoreSnapshot = rmp_serde::from_slice(&data)?;
        Ok(Some(snapshot))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// Persistence Manager
// ============================================================================

pub struct PersistenceManager {
    wal: WalManager,
    snapshot: SnapshotManager,
    durability_mode: DurabilityMode,
    last_lsn: u64,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, durability_mode: DurabilityMode) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let wal = WalManager::new(data_dir.join(WAL_FILE_NAME), durability_mode)?;
        let snapshot = SnapshotManager::new(data_dir.join(SNAPSHOT_FILE_NAME));
        Ok(Self {
            wal,
            snapshot,
            durability_mode,
            last_lsn: 0,
        })
    }

    pub fn log_commit(&mut self, txn: u64, changes: &[Change]) -> Result<()> {
        let lsn = self.last_lsn + 1;
        self.wal.append(&WalEntry::Commit {
            lsn,
            txn,
            changes: changes.to_vec(),
        })?;
        self.last_lsn = lsn;
        Ok(())
    }

    /// Snapshot `tables` and truncate the WAL.
    ///
    /// The snapshot carries the last logged LSN, so a crash between the two
    /// steps leaves WAL records that recovery recognises and skips.
    pub fn checkpoint(&mut self, tables: &Tables) -> Result<()> {
        if self.durability_mode == DurabilityMode::None {
            return Ok(());
        }
        let snapshot = self.write_snapshot(tables)?;
        self.wal.clear()?;
        info!(
            polls = snapshot.metadata.poll_count,
            voters = snapshot.metadata.voter_count,
            last_lsn = snapshot.last_lsn,
            "checkpoint written"
        );
        Ok(())
    }

    fn write_snapshot(&self, tables: &Tables) -> Result<StoreSnapshot> {
        let snapshot = StoreSnapshot::new(tables.image(), self.last_lsn);
        self.snapshot.save(&snapshot)?;
        Ok(snapshot)
    }

    pub fn last_lsn(&self) -> u64 {
        self.last_lsn
    }

    pub fn needs_checkpoint(&self) -> bool {
        self.wal.needs_checkpoint()
    }

    /// Rebuild the committed tables from snapshot plus WAL
    pub fn recover(&mut self) -> Result<Tables> {
        let (mut tables, snapshot_lsn) = match self.snapshot.load()? {
            Some(snapshot) => {
                debug!(
                    created_at = %snapshot.metadata.created_at,
                    last_lsn = snapshot.last_lsn,
                    "loaded snapshot"
                );
                (Tables::from_image(snapshot.tables), snapshot.last_lsn)
            }
            None => (Tables::new(), 0),
        };
        self.last_lsn = snapshot_lsn;

        let (entries, valid_len) = self.wal.read_valid()?;
        self.wal.discard_tail(valid_len)?;
        let total = entries.len();
        let mut replayed = 0;
        for entry in entries {
            match entry {
                WalEntry::Commit { lsn, .. } if lsn <= snapshot_lsn => {}
                WalEntry::Commit { lsn, txn, changes } => {
                    tables.replay(txn, changes);
                    self.last_lsn = self.last_lsn.max(lsn);
                    replayed += 1;
                }
            }
        }
        self.wal.entries_since_checkpoint = total;

        if total > replayed {
            warn!(
                skipped = total - replayed,
                snapshot_lsn, "WAL records already in snapshot were skipped"
            );
        }
        if replayed > 0 {
            info!(records = replayed, "replayed WAL");
        }
        Ok(tables)
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn wal_mut(&mut self) -> &mut WalManager {
        &mut self.wal
    }

    pub fn snapshot(&self) -> &SnapshotManager {
        &self.snapshot
    }

    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}

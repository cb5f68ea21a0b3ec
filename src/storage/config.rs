use super::persistence::DurabilityMode;
use std::path::{Path, PathBuf};

/// Where and how the vote store keeps its data
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Data directory for the WAL and snapshot. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,

    /// How hard a commit pushes its WAL record to disk
    pub durability: DurabilityMode,

    /// WAL records between automatic checkpoints
    pub checkpoint_threshold: usize,
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            durability: DurabilityMode::None,
            checkpoint_threshold: 1000,
        }
    }

    pub fn durable(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: Some(data_dir.as_ref().to_path_buf()),
            durability: DurabilityMode::Sync,
            checkpoint_threshold: 1000,
        }
    }

    /// Set the durability mode
    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    /// Set the checkpoint threshold
    pub fn checkpoint_threshold(mut self, threshold: usize) -> Self {
        self.checkpoint_threshold = threshold;
        self
    }

    pub fn is_durable(&self) -> bool {
        self.data_dir.is_some() && self.durability != DurabilityMode::None
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

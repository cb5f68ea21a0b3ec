use crate::storage::{DurabilityMode, StorageConfig};
use clap::Parser;
use std::path::PathBuf;

/// Server settings. Every flag falls back to its environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "votetally")]
#[command(about = "Poll voting service with a durable tally store")]
pub struct AppConfig {
    #[arg(long, env = "APP_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "APP_PORT", default_value_t = 5002)]
    pub port: u16,

    /// Data directory for the WAL and snapshot; in-memory when unset
    #[arg(long, env = "POLLING_DB_PATH")]
    pub data_dir: Option<PathBuf>,

    /// sync, async or none
    #[arg(long, env = "DURABILITY", default_value = "sync")]
    pub durability: DurabilityMode,

    #[arg(long, env = "CHECKPOINT_THRESHOLD", default_value_t = 1000)]
    pub checkpoint_threshold: usize,
}

impl AppConfig {
    /// Load `.env` if present, then parse flags and environment
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn storage_config(&self) -> StorageConfig {
        match &self.data_dir {
            Some(dir) => StorageConfig::durable(dir)
                .durability(self.durability)
                .checkpoint_threshold(self.checkpoint_threshold),
            None => StorageConfig::in_memory(),
        }
    }
}

pub mod config;
pub mod memory;
pub mod persistence;
pub mod table;

pub use config::StorageConfig;
pub use memory::VoteStorage;
pub use persistence::{DurabilityMode, PersistenceManager};
pub use table::{CountTable, LedgerTable, PollTable, Tables};

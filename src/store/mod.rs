pub mod counter;
pub mod ledger;
pub mod polls;

pub use counter::{CounterStore, Increment};
pub use ledger::{LedgerInsert, VoterLedger};
pub use polls::{PollCatalog, PollLookup};

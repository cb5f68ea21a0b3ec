pub mod error;
pub mod types;

pub use error::{DbError, Result};
pub use types::{CountKey, LedgerKey, NewPoll, Poll, PollId, VoterId, VoterRecord, MIN_POLL_OPTIONS};

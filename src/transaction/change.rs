// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Every write a transaction makes is recorded here first. The list is
// applied to the tables at COMMIT and written to the WAL as one record;
// ROLLBACK simply discards it.
//
// ============================================================================

use crate::core::{CountKey, Poll, VoterRecord};
use serde::{Deserialize, Serialize};

/// A single buffered write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// Store a new poll
    InsertPoll { poll: Poll },

    /// Insert a count row seeded to `count`.
    /// Adds to the row instead if a concurrent commit created it first.
    InsertCount { key: CountKey, count: u64 },

    /// Add one vote to an existing count row
    IncrementCount { key: CountKey },

    /// Commit a ledger row reserved by this transaction
    InsertVoter { record: VoterRecord },
}

impl Change {
    /// Name of the table this change writes to
    pub fn table_name(&self) -> &'static str {
        match self {
            Change::InsertPoll { .. } => "polls",
            Change::InsertCount { .. } | Change::IncrementCount { .. } => "counts",
            Change::InsertVoter { .. } => "voters",
        }
    }

    /// Votes this change adds to `key`, as seen from inside the transaction
    pub fn pending_votes(&self, key: &CountKey) -> u64 {
        match self {
            Change::InsertCount { key: k, count } if k == key => *count,
            Change::IncrementCount { key: k } if k == key => 1,
            _ => 0,
        }
    }

    pub fn creates_count(&self, key: &CountKey) -> bool {
        matches!(self, Change::InsertCount { key: k, .. } if k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PollId;

    #[test]
    fn test_change_table_name() {
        let change = Change::IncrementCount {
            key: CountKey::new(PollId::from("p1"), "Cats"),
        };
        assert_eq!(change.table_name(), "counts");
    }

    #[test]
    fn test_pending_votes_only_count_matching_key() {
        let cats = CountKey::new(PollId::from("p1"), "Cats");
        let dogs = CountKey::new(PollId::from("p1"), "Dogs");

        let seed = Change::InsertCount {
            key: cats.clone(),
            count: 1,
        };
        assert_eq!(seed.pending_votes(&cats), 1);
        assert_eq!(seed.pending_votes(&dogs), 0);
        assert!(seed.creates_count(&cats));

        let bump = Change::IncrementCount { key: dogs.clone() };
        assert_eq!(bump.pending_votes(&dogs), 1);
        assert!(!bump.creates_count(&dogs));
    }
}

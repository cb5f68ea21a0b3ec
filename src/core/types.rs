use super::{DbError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const MIN_POLL_OPTIONS: usize = 2;

/// Opaque, unique poll identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollId(String);

impl PollId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh URL-safe identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PollId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Caller-supplied voter token. Trusted as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterId(String);

impl VoterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VoterId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A question with an immutable, ordered set of unique option labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
}

impl Poll {
    /// Exact string match against the declared options
    pub fn has_option(&self, label: &str) -> bool {
        self.options.iter().any(|option| option == label)
    }
}

/// Poll creation request, validated before anything is written
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
}

impl NewPoll {
    pub fn new(question: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            question: question.into(),
            options,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(DbError::invalid_input("question must not be blank"));
        }

        if self.options.len() < MIN_POLL_OPTIONS {
            return Err(DbError::invalid_input(format!(
                "a poll needs at least {MIN_POLL_OPTIONS} options"
            )));
        }

        let mut seen = HashSet::with_capacity(self.options.len());
        for option in &self.options {
            if option.trim().is_empty() {
                return Err(DbError::invalid_input("options must not be blank"));
            }
            if !seen.insert(option.as_str()) {
                return Err(DbError::invalid_input(format!(
                    "duplicate option '{option}'"
                )));
            }
        }

        Ok(())
    }

    pub(crate) fn into_poll(self, id: PollId) -> Poll {
        Poll {
            id,
            question: self.question,
            options: self.options,
        }
    }
}

/// Primary key of the counts table: (poll, option)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CountKey {
    pub poll_id: PollId,
    pub option: String,
}

impl CountKey {
    pub fn new(poll_id: PollId, option: impl Into<String>) -> Self {
        Self {
            poll_id,
            option: option.into(),
        }
    }
}

impl fmt::Display for CountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.poll_id, self.option)
    }
}

/// Primary key of the voter ledger: (poll, voter)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerKey {
    pub poll_id: PollId,
    pub voter_id: VoterId,
}

impl LedgerKey {
    pub fn new(poll_id: PollId, voter_id: VoterId) -> Self {
        Self { poll_id, voter_id }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.poll_id, self.voter_id)
    }
}

/// One ledger row. Presence means the voter has voted in the poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub key: LedgerKey,
    pub voted_at: DateTime<Utc>,
}

impl VoterRecord {
    pub fn now(key: LedgerKey) -> Self {
        Self {
            key,
            voted_at: Utc::now(),
        }
    }
}

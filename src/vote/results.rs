use crate::core::{PollId, Result};
use crate::store::{CounterStore, PollLookup};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionCount {
    pub option: String,
    pub votes: u64,
}

/// Tally of one poll. `results` keeps the poll's declared option order and
/// serializes as an `{option: votes}` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub poll_id: PollId,
    pub question: String,
    #[serde(serialize_with = "serialize_ordered")]
    pub results: Vec<OptionCount>,
    pub total_votes: u64,
}

impl PollResults {
    pub fn votes_for(&self, option: &str) -> Option<u64> {
        self.results
            .iter()
            .find(|entry| entry.option == option)
            .map(|entry| entry.votes)
    }
}

fn serialize_ordered<S>(results: &[OptionCount], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(results.len()))?;
    for entry in results {
        map.serialize_entry(&entry.option, &entry.votes)?;
    }
    map.end()
}

/// Read-only aggregation over the committed counts table
#[derive(Clone)]
pub struct ResultsReader {
    polls: Arc<dyn PollLookup>,
    counter: CounterStore,
}

impl ResultsReader {
    pub fn new(polls: Arc<dyn PollLookup>, counter: CounterStore) -> Self {
        Self { polls, counter }
    }

    /// `None` when the poll does not exist. Every declared option is reported,
    /// with 0 when its row is missing; rows for undeclared options are ignored.
    pub async fn get_results(&self, poll_id: &PollId) -> Result<Option<PollResults>> {
        let Some(poll) = self.polls.get_poll(poll_id).await? else {
            return Ok(None);
        };

        let stored: HashMap<String, u64> = self.counter.counts_for_poll(poll_id)?.into_iter().collect();

        let results: Vec<OptionCount> = poll
            .options
            .iter()
            .map(|option| OptionCount {
                option: option.clone(),
                votes: stored.get(option).copied().unwrap_or(0),
            })
            .collect();
        let total_votes = results.iter().map(|entry| entry.votes).sum();

        Ok(Some(PollResults {
            poll_id: poll.id,
            question: poll.question,
            results,
            total_votes,
        }))
    }
}

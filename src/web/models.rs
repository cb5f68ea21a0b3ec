use crate::core::{NewPoll, Poll, PollId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl From<CreatePollRequest> for NewPoll {
    fn from(request: CreatePollRequest) -> Self {
        NewPoll::new(request.question, request.options)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollResponse {
    pub poll_id: PollId,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
}

impl From<Poll> for PollResponse {
    fn from(poll: Poll) -> Self {
        Self {
            id: poll.id,
            question: poll.question,
            options: poll.options,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub option: Option<String>,
    /// Older clients send the voter token as `userIP`
    #[serde(alias = "userIP")]
    pub voter_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

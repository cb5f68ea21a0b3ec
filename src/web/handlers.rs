use super::error::{Result, WebError};
use super::models::{
    CastVoteRequest, CreatePollRequest, CreatePollResponse, HealthResponse, MessageResponse,
    PollResponse,
};
use super::state::AppState;
use crate::core::{PollId, VoterId};
use crate::store::PollLookup;
use crate::vote::{PollResults, VoteOutcome};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use std::net::SocketAddr;

pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn create_poll(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreatePollRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatePollResponse>)> {
    let Json(payload) = payload?;
    let poll = state.db.polls().create_poll(payload.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePollResponse {
            poll_id: poll.id,
            message: "Poll created successfully".to_string(),
        }),
    ))
}

pub async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> Result<Json<PollResponse>> {
    let poll = state
        .db
        .polls()
        .get_poll(&PollId::new(poll_id))
        .await?
        .ok_or_else(|| WebError::not_found("poll not found"))?;

    Ok(Json(poll.into()))
}

pub async fn cast_vote(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    payload: std::result::Result<Json<CastVoteRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(payload) = payload?;
    let option = payload
        .option
        .filter(|option| !option.trim().is_empty())
        .ok_or_else(|| WebError::input("option is required"))?;

    // Without an explicit token the client address identifies the voter
    let voter_id = payload
        .voter_id
        .filter(|voter| !voter.trim().is_empty())
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .map(VoterId::new)
        .ok_or_else(|| WebError::input("voterId is required"))?;

    match state
        .db
        .coordinator()
        .cast_vote(&PollId::new(poll_id), &option, &voter_id)
        .await
    {
        VoteOutcome::Accepted => Ok(Json(MessageResponse::new("Vote recorded successfully"))),
        VoteOutcome::Rejected(reason) => Err(reason.into()),
    }
}

pub async fn get_results(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> Result<Json<PollResults>> {
    let results = state
        .db
        .results()
        .get_results(&PollId::new(poll_id))
        .await?
        .ok_or_else(|| WebError::not_found("poll not found"))?;

    Ok(Json(results))
}

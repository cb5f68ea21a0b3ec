//! HTTP surface over [`VoteDatabase`](crate::facade::VoteDatabase).
//!
//! Errors render as `{"error": ..., "code": ...}` with codes `not_found`,
//! `invalid_input`, `conflict` and `storage_error`.

pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub use error::{ErrorResponse, WebError};
pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::healthcheck))
        .route("/polls", post(handlers::create_poll))
        .route("/polls/:poll_id", get(handlers::get_poll))
        .route("/polls/:poll_id/vote", post(handlers::cast_vote))
        .route("/polls/:poll_id/results", get(handlers::get_results))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

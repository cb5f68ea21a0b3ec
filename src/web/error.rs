use crate::core::DbError;
use crate::vote::RejectReason;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Database(DbError),
    Input(String),
    NotFound(String),
    Conflict(String),
    Storage(String),
}

impl WebError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<DbError> for WebError {
    fn from(err: DbError) -> Self {
        WebError::Database(err)
    }
}

impl From<JsonRejection> for WebError {
    fn from(rejection: JsonRejection) -> Self {
        WebError::Input(rejection.body_text())
    }
}

impl From<RejectReason> for WebError {
    fn from(reason: RejectReason) -> Self {
        let message = reason.to_string();
        match reason {
            RejectReason::NotFound => Self::NotFound(message),
            RejectReason::InvalidInput => Self::Input(message),
            RejectReason::Conflict => Self::Conflict(message),
            RejectReason::StorageError => Self::Storage(message),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            WebError::Database(DbError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, msg, "invalid_input")
            }
            WebError::Database(DbError::UniqueViolation(msg))
            | WebError::Database(DbError::ConstraintViolation(msg)) => {
                (StatusCode::CONFLICT, msg, "conflict")
            }
            // Internal details stay in the logs
            WebError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage error".to_string(),
                "storage_error",
            ),

            WebError::Input(msg) => (StatusCode::BAD_REQUEST, msg, "invalid_input"),
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "not_found"),
            WebError::Conflict(msg) => (StatusCode::CONFLICT, msg, "conflict"),
            WebError::Storage(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, "storage_error"),
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reasons_map_to_statuses() {
        let cases = [
            (RejectReason::NotFound, StatusCode::NOT_FOUND),
            (RejectReason::InvalidInput, StatusCode::BAD_REQUEST),
            (RejectReason::Conflict, StatusCode::CONFLICT),
            (RejectReason::StorageError, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (reason, status) in cases {
            assert_eq!(WebError::from(reason).into_response().status(), status);
        }
    }

    #[test]
    fn storage_failures_hide_details() {
        let response =
            WebError::from(DbError::IoError("wal append: disk full".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::crdt::DocumentError;

/// Faults raised while a `Room` processes a connect, an event batch, or a
/// presence update. None of these propagate beyond the offending site: the
/// websocket session handler maps each variant to a session teardown.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("site {0} is already connected")]
    AlreadyConnected(u32),

    #[error("room is full")]
    RoomFull,

    #[error("event log full: {current} + {incoming} would exceed the {limit} event hard cap")]
    LogFull {
        current: usize,
        incoming: usize,
        limit: usize,
    },

    #[error("transport disconnected")]
    Disconnected,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl RoomError {
    /// Whether this error should tear the websocket session down (as
    /// opposed to `RoomFull`, which is rejected before a session starts).
    pub fn is_fatal_to_session(&self) -> bool {
        !matches!(self, RoomError::RoomFull)
    }
}

pub type RoomResult<T> = Result<T, RoomError>;

/// Errors surfaced by the plain HTTP handlers (room CRUD, health).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::RoomNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("room {id} not found"))
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": { "message": message } }));
        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_full_is_not_fatal_to_an_existing_session() {
        assert!(!RoomError::RoomFull.is_fatal_to_session());
    }

    #[test]
    fn protocol_violation_is_fatal() {
        assert!(RoomError::ProtocolViolation("bad frame".into()).is_fatal_to_session());
    }
}

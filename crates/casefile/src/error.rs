//! Unified error type for the Casefile server.
//!
//! Every layer crate owns its error enum. Handlers return
//! `Result<_, CasefileError>` and let `?` convert; the mapping to an HTTP
//! status and a stable machine-readable code happens once, in
//! [`CasefileError::kind`].

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use casefile_hub::HubError;
use casefile_protocol::ProtocolError;
use casefile_session::SessionError;
use casefile_store::StoreError;
use casefile_turn::TurnError;
use serde::Serialize;

/// Top-level error that wraps all crate-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum CasefileError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Turn(#[from] TurnError),

    /// A request body that isn't the JSON the endpoint expects.
    #[error("invalid request body: {0}")]
    Body(#[from] JsonRejection),

    #[error("invalid query: {0}")]
    Query(#[from] QueryRejection),

    /// A path id that doesn't parse can't name anything that exists.
    #[error("invalid path: {0}")]
    Path(#[from] PathRejection),

    /// Something named in the path doesn't exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A semantically wrong request the layer crates don't cover.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The error taxonomy clients see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Conflict,
    InvalidPayload,
    IllegalTurnAction,
    SessionClosed,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidPayload => StatusCode::BAD_REQUEST,
            ErrorKind::IllegalTurnAction => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::SessionClosed => StatusCode::GONE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidPayload => "invalid_payload",
            ErrorKind::IllegalTurnAction => "illegal_turn_action",
            ErrorKind::SessionClosed => "session_closed",
            ErrorKind::Internal => "internal",
        }
    }
}

impl CasefileError {
    /// Which bucket of the taxonomy this error falls in.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CasefileError::Protocol(e) => protocol_kind(e),
            CasefileError::Store(e) => store_kind(e),
            CasefileError::Session(e) => match e {
                SessionError::NotFound(_) => ErrorKind::NotFound,
                SessionError::Unauthorized => ErrorKind::Unauthorized,
                SessionError::Conflict(_) => ErrorKind::Conflict,
                SessionError::InvalidPayload(_) => ErrorKind::InvalidPayload,
                SessionError::SessionClosed(_) => ErrorKind::SessionClosed,
                SessionError::Store(e) => store_kind(e),
            },
            CasefileError::Hub(e) => match e {
                HubError::NotFound(_) => ErrorKind::NotFound,
                HubError::SessionClosed(_) => ErrorKind::SessionClosed,
                HubError::Unavailable(_) => ErrorKind::Internal,
                HubError::Store(e) => store_kind(e),
            },
            CasefileError::Turn(e) => match e {
                TurnError::Payload(e) => protocol_kind(e),
                TurnError::NoSolution => ErrorKind::InvalidPayload,
                _ => ErrorKind::IllegalTurnAction,
            },
            CasefileError::Body(_)
            | CasefileError::Query(_)
            | CasefileError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            CasefileError::NotFound(_) | CasefileError::Path(_) => {
                ErrorKind::NotFound
            }
            CasefileError::Config(_) | CasefileError::Io(_) => {
                ErrorKind::Internal
            }
        }
    }
}

fn protocol_kind(e: &ProtocolError) -> ErrorKind {
    match e {
        ProtocolError::Encode(_) => ErrorKind::Internal,
        ProtocolError::Decode(_)
        | ProtocolError::InvalidMessage(_)
        | ProtocolError::InvalidPayload(_) => ErrorKind::InvalidPayload,
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::NotFound(_) => ErrorKind::NotFound,
        StoreError::Conflict(_)
        | StoreError::StaleHead { .. }
        | StoreError::InvalidTransition { .. } => ErrorKind::Conflict,
        StoreError::SessionClosed(_) => ErrorKind::SessionClosed,
        StoreError::CodesExhausted { .. }
        | StoreError::Corrupt(_)
        | StoreError::Internal(_)
        | StoreError::Sqlite(_)
        | StoreError::Json(_) => ErrorKind::Internal,
    }
}

/// JSON error body: `{"error": "<code>", "message": "..."}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for CasefileError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::Internal => {
                tracing::error!(error = %self, "request failed");
                "internal server error".to_string()
            }
            _ => {
                tracing::debug!(error = %self, code = kind.code(), "request rejected");
                self.to_string()
            }
        };
        let body = ErrorBody {
            error: kind.code(),
            message,
        };
        (kind.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use casefile_protocol::{PlayerId, SessionCode, SessionId};

    use super::*;

    #[test]
    fn test_from_session_error_unauthorized_is_403() {
        let err: CasefileError = SessionError::Unauthorized.into();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.kind().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_from_store_conflict_is_409() {
        let err: CasefileError = StoreError::Conflict("suspect plum".into()).into();
        assert_eq!(err.kind().status(), StatusCode::CONFLICT);
        assert_eq!(err.kind().code(), "conflict");
    }

    #[test]
    fn test_from_store_session_closed_is_410() {
        let err: CasefileError = StoreError::SessionClosed(SessionId(1)).into();
        assert_eq!(err.kind().status(), StatusCode::GONE);
    }

    #[test]
    fn test_from_turn_error_illegal_is_422() {
        let err: CasefileError = TurnError::NotYourTurn {
            player: PlayerId(2),
            current: None,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::IllegalTurnAction);
        assert_eq!(err.kind().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_from_turn_payload_error_is_400() {
        let err: CasefileError =
            TurnError::Payload(ProtocolError::InvalidPayload("x".into())).into();
        assert_eq!(err.kind(), ErrorKind::InvalidPayload);
    }

    #[test]
    fn test_from_hub_error_closed_is_410() {
        let code = SessionCode::parse("KX7PQ").unwrap();
        let err: CasefileError = HubError::SessionClosed(code).into();
        assert_eq!(err.kind(), ErrorKind::SessionClosed);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err: CasefileError =
            StoreError::Internal("lock poisoned".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

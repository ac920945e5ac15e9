//! Hub error types with HTTP status code mapping.
//!
//! [`HubError`] is the central error type. Connection- and item-scoped
//! failures (decode errors, unknown actions, unauthorized targets) are
//! logged where they occur and never terminate the process; the HTTP
//! mapping applies only where an error surfaces through a REST or
//! upgrade handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::{ActionTag, Role};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "malformed message: ...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`HubError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Hub-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                |
/// |-----------|-----------------------|----------------------------|
/// | 1000–1999 | Decode / dispatch     | 400 Bad Request            |
/// | 2000–2999 | Target resolution     | 404 Not Found / 403        |
/// | 3000–3999 | Transport / server    | 500 Internal Server Error  |
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Inbound frame or payload could not be decoded.
    #[error("malformed message: {0}")]
    Decode(String),

    /// The action tag has no registered handler.
    #[error("no handler registered for action {0}")]
    UnknownAction(ActionTag),

    /// The action exists but is not accepted from this connection role.
    #[error("action {action} is not accepted from a {role} connection")]
    ActionNotAllowed {
        /// The rejected action tag.
        action: ActionTag,
        /// Role of the connection that sent it.
        role: Role,
    },

    /// The addressed entity does not exist.
    #[error("target not found: {0}")]
    TargetNotFound(String),

    /// The acting user does not own the addressed node.
    #[error("{0} is not owned by the acting user")]
    NotOwned(String),

    /// Connection authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Pub/sub transport failure (publish, subscribe, or unsubscribe).
    #[error("transport error: {0}")]
    Transport(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Decode(_) => 1001,
            Self::UnknownAction(_) => 1002,
            Self::ActionNotAllowed { .. } => 1003,
            Self::TargetNotFound(_) => 2001,
            Self::NotOwned(_) => 2002,
            Self::Unauthorized(_) => 2003,
            Self::Transport(_) => 3001,
            Self::Persistence(_) => 3002,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Decode(_) | Self::UnknownAction(_) | Self::ActionNotAllowed { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::TargetNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotOwned(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Transport(_) | Self::Persistence(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

//! Error types for the handshake, the transports and the collaborator seam.
//!
//! [`SyncError`] is the only error a request handler ever sees. Each variant
//! maps to an HTTP status code and a structured JSON error response, so the
//! handshake can answer the client itself. [`TransportError`] happens after
//! the handshake and only ever terminates the session it belongs to.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "protocol version mismatch: expected v2, got v1"
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
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Handshake failure. No session survives any of these.
///
/// # Error Code Ranges
///
/// | Range     | Category     | HTTP Status               |
/// |-----------|--------------|---------------------------|
/// | 1000–1999 | Handshake    | 400 Bad Request           |
/// | 3000–3999 | Collaborator | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The `p` query parameter is absent or names another protocol.
    #[error("protocol version mismatch: expected {expected}, got {}", .found.as_deref().unwrap_or("nothing"))]
    ProtocolMismatch {
        /// Protocol tag this server speaks.
        expected: &'static str,
        /// Tag the client sent, if any.
        found: Option<String>,
    },

    /// The transport could not be negotiated (bad upgrade headers,
    /// rejected origin).
    #[error("cannot upgrade connection: {0}")]
    Upgrade(String),

    /// The synchronization collaborator refused the session.
    #[error("cannot sync: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl SyncError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::ProtocolMismatch { .. } => 1001,
            Self::Upgrade(_) => 1002,
            Self::Collaborator(_) => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::ProtocolMismatch { .. } | Self::Upgrade(_) => StatusCode::BAD_REQUEST,
            Self::Collaborator(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SyncError {
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

/// Failure of a live transport, after the handshake succeeded.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel has been torn down; nothing can be sent anymore.
    #[error("transport closed")]
    Closed,

    /// The HTTP connection was never handed over to the transport.
    #[error("upgrade did not complete: {0}")]
    Upgrade(String),

    /// Read or write failure on the WebSocket.
    #[error("websocket error: {0}")]
    Socket(#[from] axum::Error),

    /// The update could not be serialized.
    #[error("cannot encode update: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Error reported by a [`crate::domain::Syncable`] collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The synchronized object could not be serialized.
    #[error("cannot serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The collaborator declined the session.
    #[error("{0}")]
    Rejected(String),
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn protocol_mismatch_is_bad_request() {
        let err = SyncError::ProtocolMismatch {
            expected: "v2",
            found: Some("v1".to_string()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), 1001);
        assert_eq!(
            err.to_string(),
            "protocol version mismatch: expected v2, got v1"
        );
    }

    #[test]
    fn missing_protocol_mentions_nothing() {
        let err = SyncError::ProtocolMismatch {
            expected: "v2",
            found: None,
        };
        assert!(err.to_string().ends_with("got nothing"));
    }

    #[test]
    fn collaborator_error_is_server_error() {
        let err = SyncError::from(CollaboratorError::Rejected("full".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), 3001);
        assert_eq!(err.to_string(), "cannot sync: full");
    }

    #[test]
    fn into_response_sets_status() {
        let response = SyncError::Upgrade("missing headers".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

//! HTTP mapping for connection errors
//!
//! Handlers return `ApiError` and the taxonomy decides the status code
//! and the short, user-safe reason string. Raw provider payloads and
//! anything secret-bearing never reach the response body — the full
//! error is logged server-side only.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use zoom_auth::Error;

/// Wrapper turning a connection error into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

/// Short reason string safe to show next to "Not connected".
pub fn short_reason(error: &Error) -> &'static str {
    match error {
        Error::Auth(_) => "not_connected",
        Error::Network(_) => "temporarily_unavailable",
        Error::Protocol(_) | Error::Storage(_) => "integration_failure",
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Auth(_) => StatusCode::BAD_REQUEST,
        Error::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Protocol(_) | Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        match &self.0 {
            Error::Auth(msg) => warn!(reason = %msg, "connection request rejected"),
            other => error!(error = %other, "connection request failed"),
        }

        let body = serde_json::json!({
            "error": {
                "type": short_reason(&self.0),
                "message": user_message(&self.0),
            }
        });
        (status, Json(body)).into_response()
    }
}

fn user_message(error: &Error) -> &'static str {
    match error {
        Error::Auth(_) => "Not connected.",
        Error::Network(_) => "The provider is temporarily unavailable.",
        Error::Protocol(_) | Error::Storage(_) => "The connection could not be completed.",
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

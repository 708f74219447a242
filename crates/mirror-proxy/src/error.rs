//! Error types for the mirror path.
//!
//! Per-destination transport faults are values ([`DispatchError`]) carried in
//! a dispatch outcome. Only [`MirrorError`] and [`SnapshotError`] ever reach
//! the caller, as JSON error bodies.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Outcome of a fan-out that produced no usable primary response.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The primary dispatch failed, or no destinations are configured.
    #[error("No valid response from primary URL")]
    NoPrimaryResponse,

    /// The concurrent join itself failed (a dispatch task panicked or was
    /// cancelled), independent of any single destination's result.
    #[error("Forwarding failed")]
    ForwardingFailed(#[source] tokio::task::JoinError),
}

impl MirrorError {
    pub fn status(&self) -> StatusCode {
        match self {
            MirrorError::NoPrimaryResponse => StatusCode::BAD_GATEWAY,
            MirrorError::ForwardingFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MirrorError {
    fn into_response(self) -> Response {
        (
            self.status(),
            axum::Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// The inbound body could not be captured.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read request body: {0}")]
    Body(#[from] BytesRejection),
}

impl IntoResponse for SnapshotError {
    fn into_response(self) -> Response {
        match self {
            SnapshotError::Body(rejection) => (
                rejection.status(),
                axum::Json(serde_json::json!({ "error": rejection.body_text() })),
            )
                .into_response(),
        }
    }
}

/// Transport-level failure of one outbound exchange.
///
/// HTTP error statuses are not represented here; a 4xx/5xx reply is a
/// successful exchange.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request timed out: {0}")]
    Timeout(reqwest::Error),

    #[error("connection failed: {0}")]
    Connect(reqwest::Error),

    #[error("redirect failed: {0}")]
    Redirect(reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),

    #[error("request failed: {0}")]
    Request(reqwest::Error),
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DispatchError::Timeout(e)
        } else if e.is_connect() {
            DispatchError::Connect(e)
        } else if e.is_redirect() {
            DispatchError::Redirect(e)
        } else if e.is_body() || e.is_decode() {
            DispatchError::Body(e)
        } else {
            DispatchError::Request(e)
        }
    }
}

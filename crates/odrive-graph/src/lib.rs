//! odrive-graph - Microsoft Graph sync client
//!
//! Provides:
//! - [`hash`] - SHA-1, SHA-256, and quickXorHash, buffer and stream variants
//! - [`url`] - pure `(id, path)` to Graph resource URL translation
//! - [`auth`] - OAuth2 authorization-code flow, persisted token store, single-flight refresh
//! - [`transport`] - the shared HTTP session and offline-mode gate
//! - [`cache`] - the TTL response cache with prefix invalidation
//! - [`retry`] - exponential backoff with jitter and the rate-limit queue
//! - [`executor`] - the single authenticated-request primitive
//! - [`items`] - typed item operations built on the executor
//! - [`mock`] - the in-process mock transport used by tests
//! - [`runtime`] - the owned handle bundling the above for a caller

pub mod auth;
pub mod cache;
pub mod executor;
pub mod hash;
pub mod items;
pub mod mock;
pub mod retry;
pub mod runtime;
pub mod transport;
pub mod url;

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the Graph sync client.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The requested resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Authentication failed: invalid/expired credentials, a failed reauth,
    /// or an attempt to use an empty auth record (HTTP 401/403).
    #[error("authentication error: {0}")]
    AuthError(String),

    /// The request itself was malformed, or the server's error envelope
    /// could not be parsed (HTTP 400, or an unparseable error body).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Rate-limited (HTTP 429). Carries the server's `Retry-After`, if any.
    #[error("rate limited, retry after {retry_after:?}")]
    ResourceBusy { retry_after: Option<Duration> },

    /// A server-side error occurred (HTTP >= 500).
    #[error("server error: {0}")]
    OperationError(String),

    /// A transport-level failure, or the offline-mode short-circuit.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The request or retry budget exceeded its deadline.
    #[error("timed out: {0}")]
    TimeoutError(String),

    /// The caller cancelled the operation.
    #[error("cancelled")]
    Cancelled,
}

impl GraphError {
    /// Whether the retry engine (`retry::run_with_backoff`) should retry
    /// this error. 401 is handled separately by the executor and is not
    /// retryable at this layer.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            GraphError::ResourceBusy { .. }
                | GraphError::OperationError(_)
                | GraphError::NetworkError(_)
                | GraphError::TimeoutError(_)
        )
    }
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GraphError::TimeoutError(err.to_string())
        } else {
            GraphError::NetworkError(err.to_string())
        }
    }
}

/// The Graph error envelope returned in HTTP error bodies:
/// `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct GraphErrorEnvelope {
    pub error: GraphErrorBody,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct GraphErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Maps an HTTP status and (already-read) response body to a [`GraphError`],
/// parsing the Graph error envelope when present.
#[must_use]
pub(crate) fn classify_error_response(status: reqwest::StatusCode, body: &str) -> GraphError {
    let message = serde_json::from_str::<GraphErrorEnvelope>(body)
        .map(|env| format!("{}: {}", env.error.code, env.error.message))
        .unwrap_or_else(|_| format!("HTTP {status}: {body}"));

    match status.as_u16() {
        404 => GraphError::NotFound(message),
        401 | 403 => GraphError::AuthError(message),
        400 => GraphError::ValidationError(message),
        429 => GraphError::ResourceBusy { retry_after: None },
        s if s >= 500 => GraphError::OperationError(message),
        _ => GraphError::ValidationError(message),
    }
}

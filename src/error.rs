//! Failure taxonomy for a single enrichment attempt.

use thiserror::Error;

/// Why one attempt for one record did not yield a usable result.
///
/// Every variant is recovered by the retry policy; none of them escapes the
/// record boundary as a run-level error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// The request did not complete within the per-request timeout.
    #[error("request timed out")]
    TransportTimeout,
    /// Connection, TLS, or body transfer failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// HTTP 429.
    #[error("rate limited (429)")]
    RateLimited,
    /// Any other non-success HTTP status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Provider error message, or the status when the body carried none.
        message: String,
    },
    /// The body was not a JSON object carrying all six fields.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl AttemptError {
    /// True for failures raised below HTTP (timeouts and connection errors).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TransportTimeout | Self::Transport(_))
    }
}

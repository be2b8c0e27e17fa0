//! Chat-completion clients that produce one raw response per record.

use serde::Deserialize;

use crate::error::AttemptError;
use crate::record::Record;

pub mod openrouter;

pub use openrouter::{ClientSettings, OpenRouterClient};

/// Issues exactly one request per call; retrying is the caller's job.
///
/// Implementations return `Ok` for any HTTP response, whatever its status, and
/// reserve `Err` for transport failures ([`AttemptError::TransportTimeout`] and
/// [`AttemptError::Transport`]).
pub trait EnrichmentClient: Send + Sync {
    /// Sends the enrichment request for `record`.
    fn enrich(&self, record: &Record) -> Result<RawResponse, AttemptError>;
}

impl<C: EnrichmentClient + ?Sized> EnrichmentClient for &C {
    fn enrich(&self, record: &Record) -> Result<RawResponse, AttemptError> {
        (**self).enrich(record)
    }
}

/// HTTP status plus undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl RawResponse {
    /// Builds a response from its parts.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Classifies the response and extracts the assistant message text.
    ///
    /// 429 maps to [`AttemptError::RateLimited`], other non-2xx statuses to
    /// [`AttemptError::Api`], and a 2xx body without `choices[0].message.content`
    /// to [`AttemptError::InvalidResponse`].
    pub fn completion_text(self) -> Result<String, AttemptError> {
        if self.status == 429 {
            return Err(AttemptError::RateLimited);
        }
        if !(200..300).contains(&self.status) {
            let message = serde_json::from_str::<ErrorEnvelope>(&self.body)
                .ok()
                .and_then(|envelope| envelope.error)
                .and_then(|detail| detail.message)
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| self.status.to_string());
            return Err(AttemptError::Api {
                status: self.status,
                message,
            });
        }
        let parsed: ChatResponse = serde_json::from_str(&self.body)
            .map_err(|err| AttemptError::InvalidResponse(format!("undecodable body: {err}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AttemptError::InvalidResponse("response carried no message".into()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

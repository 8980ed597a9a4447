//! Generation failures and the replies shown in their place.

use mercy_core::error::ProviderError;
use thiserror::Error;

/// Why a reply could not be generated.
///
/// Each variant keeps the internal detail for logging; users only ever see
/// [`fallback_message`](Self::fallback_message).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("model backend unreachable: {0}")]
    ConnectionUnreachable(String),

    #[error("model backend timed out: {0}")]
    Timeout(String),

    /// Reachable backend, unusable answer: an error status or a malformed body.
    #[error("model backend error (status {status:?}): {detail}")]
    BackendError { status: Option<u16>, detail: String },

    #[error("generation failed: {0}")]
    Unknown(String),
}

impl GenerationError {
    /// Short label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::ConnectionUnreachable(_) => "connection_unreachable",
            GenerationError::Timeout(_) => "timeout",
            GenerationError::BackendError { .. } => "backend_error",
            GenerationError::Unknown(_) => "unknown",
        }
    }

    /// The fixed, user-facing text sent instead of a reply.
    pub fn fallback_message(&self) -> String {
        match self {
            GenerationError::ConnectionUnreachable(_) => {
                "I can't reach my brain right now! Is Ollama running? Try: ollama serve".into()
            }
            GenerationError::Timeout(_) => {
                "I'm taking too long to think... maybe we should talk about something simpler?"
                    .into()
            }
            GenerationError::BackendError { status: Some(status), .. } => {
                format!("Sorry, I got a {status} error. Let me try again?")
            }
            GenerationError::BackendError { status: None, .. } | GenerationError::Unknown(_) => {
                "Oops! Something went wrong. Let's try again in a moment?".into()
            }
        }
    }
}

impl From<ProviderError> for GenerationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unreachable(detail) => GenerationError::ConnectionUnreachable(detail),
            ProviderError::Timeout(detail) => GenerationError::Timeout(detail),
            ProviderError::ApiError { status_code, message } => GenerationError::BackendError {
                status: Some(status_code),
                detail: message,
            },
            ProviderError::InvalidResponse(detail) => {
                GenerationError::BackendError { status: None, detail }
            }
            other @ (ProviderError::Network(_) | ProviderError::NotConfigured(_)) => {
                GenerationError::Unknown(other.to_string())
            }
        }
    }
}

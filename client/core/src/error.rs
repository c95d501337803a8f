//! Chat Error Types

use thiserror::Error;

/// Errors raised by the chat transport and dispatcher
#[derive(Debug, Error)]
pub enum ChatError {
    /// The backend answered with a non-2xx status
    #[error("HTTP {status}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Response body, if it could be read
        body: String,
    },

    /// The backend accepted the stream request but sent no body
    #[error("No stream available")]
    MissingBody,

    /// The stream ended without a terminal event and without any content
    #[error("Stream closed before any content arrived")]
    StreamClosed,

    /// Connection, timeout, or body read failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A frame carried a payload that is not a valid event
    #[error("Malformed event frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// The backend sent an `error` event
    #[error("{0}")]
    StreamEvent(String),

    /// The single-shot request came back with a failed status
    #[error("{0}")]
    Backend(String),

    /// A turn is already being assembled
    #[error("A turn is already in progress")]
    TurnInProgress,

    /// The HTTP client could not be constructed
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

impl ChatError {
    /// Whether this failure should hand the turn to the non-streaming fallback
    ///
    /// Transport failures, decode failures and protocol error events all
    /// qualify; the dispatcher does not distinguish them any further.
    #[must_use]
    pub fn is_fallback_trigger(&self) -> bool {
        matches!(
            self,
            Self::HttpStatus { .. }
                | Self::MissingBody
                | Self::StreamClosed
                | Self::Network(_)
                | Self::Decode(_)
                | Self::StreamEvent(_)
        )
    }
}

/// Result alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

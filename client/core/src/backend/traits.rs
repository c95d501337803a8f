//! Chat Backend Traits
//!
//! The transport seam between the chat core and an agent backend. The core
//! only ever needs two calls: open an event stream for a turn, or send the
//! same turn as a single request/response exchange.
//!
//! # Design Philosophy
//!
//! Implementations deal in raw bytes and wire types only. Frame decoding,
//! event interpretation and state changes stay in the core so every backend
//! (HTTP, in-process test scripts) behaves identically above this line.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::messages::{ConversationId, MessageRole, ParticipantId};

/// Raw response body of a streaming request, chunked as it arrives
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Fallback text when a single-shot response carries neither `result` nor `message`
pub const NO_RESPONSE_TEXT: &str = "No response";

/// One prior message sent as conversation context
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who sent it
    pub role: MessageRole,
    /// What was said
    pub content: String,
}

/// Body of a chat turn, streaming or not
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatTriggerRequest {
    /// User text (empty for an init turn)
    pub message: String,
    /// Conversation identifier
    pub session_id: ConversationId,
    /// Participant identifier
    pub user_id: ParticipantId,
    /// Messages preceding this turn
    pub conversation_history: Vec<HistoryEntry>,
    /// Whether an event stream is requested
    pub stream: bool,
    /// Marks the agent-opens-the-conversation turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<bool>,
}

/// Status of a single-shot response
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerStatus {
    /// Accepted, still working
    Processing,
    /// Finished
    #[default]
    Completed,
    /// Failed on the backend
    Failed,
}

/// Body of a single-shot response
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    /// Outcome
    #[serde(default)]
    pub status: TriggerStatus,
    /// Human-readable status or reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Backend session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Agent reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server timestamp
    #[serde(default)]
    pub timestamp: String,
}

impl TriggerResponse {
    /// A completed response carrying `result`
    pub fn completed(result: impl Into<String>) -> Self {
        Self {
            status: TriggerStatus::Completed,
            result: Some(result.into()),
            ..Default::default()
        }
    }

    /// Text to show the user: `result`, else `message`, else a placeholder
    #[must_use]
    pub fn text(&self) -> &str {
        self.result
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or(NO_RESPONSE_TEXT)
    }

    /// Failure description when `status` is `failed`
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        if self.status != TriggerStatus::Failed {
            return None;
        }
        Some(
            self.error
                .clone()
                .or_else(|| self.message.clone())
                .unwrap_or_else(|| "Request failed".to_string()),
        )
    }
}

/// Agent backend trait
///
/// Implement this trait to talk to a different backend or to script one in
/// tests.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (for logs)
    fn name(&self) -> &str;

    /// Start a streaming turn and return its raw body
    ///
    /// A non-success status or a missing body is an error; no bytes are
    /// decoded before this returns.
    async fn open_stream(
        &self,
        request: &ChatTriggerRequest,
        credential: &str,
    ) -> Result<ByteStream>;

    /// Send a turn and wait for the complete response
    async fn send(&self, request: &ChatTriggerRequest, credential: &str)
        -> Result<TriggerResponse>;
}

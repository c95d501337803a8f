//! Chat Messages
//!
//! Identifiers, roles, and invocation metadata shared by every part of the
//! client, plus the [`ChatUpdate`] messages a client sends to whatever surface
//! is rendering the conversation.
//!
//! # Design Philosophy
//!
//! The chat core owns the conversation. Surfaces (terminal, GUI, tests) are
//! pure renderers: they receive `ChatUpdate`s and draw what they are told,
//! without touching conversation state themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Client-generated message identifier, unique within a conversation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque conversation identifier
///
/// Sent to the backend as `session_id`. Minted once and persisted in
/// client-local storage; see [`crate::identity`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the human participant, sent as `user_id` on every turn
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Generate a fresh participant ID (one per process without persisted auth)
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("user_{}", uuid::Uuid::new_v4()))
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Human input
    User,
    /// Agent reply
    Assistant,
    /// Client-surfaced notice (errors)
    System,
}

impl MessageRole {
    /// Wire name of the role
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// Outcome of a single tool or agent call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    /// The call succeeded
    #[default]
    Completed,
    /// The call failed
    Failed,
}

/// Which accumulating list an invocation belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvocationKind {
    /// A tool call (`tool` events)
    Tool,
    /// A sub-agent call (`agent` events)
    Agent,
}

/// Record of one tool or sub-agent call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Tool or agent name
    pub name: String,
    /// How the call ended
    pub status: InvocationStatus,
    /// Failure description, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Invocation {
    /// A successful invocation
    pub fn completed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: InvocationStatus::Completed,
            error: None,
        }
    }

    /// A failed invocation with an error description
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: InvocationStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Tool/agent calls made while producing an assistant message
///
/// Replaced wholesale on every stream event: it is a snapshot of everything
/// accumulated so far in the turn, never merged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAgentMetadata {
    /// Tool calls in arrival order
    pub tool_calls: Vec<Invocation>,
    /// Agent calls in arrival order
    pub agent_calls: Vec<Invocation>,
}

impl ToolAgentMetadata {
    /// True when no tool or agent call has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty() && self.agent_calls.is_empty()
    }
}

/// Updates from the chat core to a rendering surface
///
/// Emitted in the exact order state changes are applied.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatUpdate {
    /// A turn started or finished (drives the typing indicator)
    Busy(bool),

    /// A complete message was appended (user input, fallback reply, error)
    MessageAdded {
        /// Message ID
        id: MessageId,
        /// Who sent it
        role: MessageRole,
        /// Full content
        content: String,
    },

    /// The backend confirmed the stream; carries its session ID for diagnostics
    StreamOpened {
        /// Open assistant message receiving the stream
        message_id: MessageId,
        /// Backend-confirmed session ID, once `start` arrives
        backend_session: Option<String>,
    },

    /// Transient progress label changed (`None` means the default label)
    Progress {
        /// Label to show while no content has streamed yet
        label: Option<String>,
    },

    /// Text appended to the open assistant message
    Delta {
        /// Open assistant message
        message_id: MessageId,
        /// Fragment appended
        text: String,
    },

    /// Metadata snapshot of the open assistant message was replaced
    Metadata {
        /// Open assistant message
        message_id: MessageId,
        /// New snapshot
        metadata: ToolAgentMetadata,
    },

    /// The open assistant message is complete
    StreamEnd {
        /// Completed message
        message_id: MessageId,
        /// Final assembled content
        content: String,
    },

    /// Streaming failed; the single-shot request is being tried
    FallbackEngaged {
        /// Why the stream was abandoned
        reason: String,
    },

    /// A message was removed from the visible conversation
    MessageRemoved {
        /// Removed message
        id: MessageId,
    },
}

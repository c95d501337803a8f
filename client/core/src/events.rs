//! Stream Events
//!
//! The partial-message events an agent backend sends inside `data: ` frames.
//! Every payload is a JSON object discriminated by its `type` field:
//!
//! ```text
//! start     { session_id? }                      informational
//! thinking  { message? }                         progress label
//! tool      { name?, status?, error?, message? } tool invocation
//! agent     { name?, status?, error?, message? } sub-agent invocation
//! delta     { text? }                            text fragment
//! final     { text? }                            terminal, normal
//! error     { error? }                           terminal, abnormal
//! ```
//!
//! Unrecognised `type` values decode to [`StreamEvent::Unknown`] and are
//! ignored by the controller. Anything that is not a JSON object with a
//! `type` field is a decode error.

use serde::{Deserialize, Deserializer, Serialize};

use crate::messages::{Invocation, InvocationStatus};

/// Name used when a tool/agent event omits `name`
pub const UNKNOWN_INVOCATION_NAME: &str = "unknown";

/// Message used when an `error` event omits `error`
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// One decoded stream event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Backend accepted the turn
    Start {
        /// Backend-confirmed session identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },

    /// Backend is working; carries a human-readable progress string
    Thinking {
        /// Progress label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// A tool call finished
    Tool(InvocationEvent),

    /// A sub-agent call finished
    Agent(InvocationEvent),

    /// A fragment of assistant text
    Delta {
        /// Text to append
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },

    /// The turn is complete
    Final {
        /// Backend's view of the full completion
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },

    /// The turn failed on the backend
    Error {
        /// Error description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Any other `type`; ignored
    #[serde(other)]
    Unknown,
}

/// Payload of `tool` and `agent` events
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationEvent {
    /// Tool or agent name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Call outcome; anything but `failed` counts as completed
    #[serde(
        default,
        deserialize_with = "lenient_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<InvocationStatus>,
    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Optional progress label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<InvocationStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.map(|value| match value.as_str() {
        Some("failed") => InvocationStatus::Failed,
        _ => InvocationStatus::Completed,
    }))
}

impl InvocationEvent {
    /// Convert to an [`Invocation`], defaulting name and status
    #[must_use]
    pub fn to_invocation(&self) -> Invocation {
        Invocation {
            name: self
                .name
                .clone()
                .unwrap_or_else(|| UNKNOWN_INVOCATION_NAME.to_string()),
            status: self.status.unwrap_or_default(),
            error: self.error.clone(),
        }
    }
}

impl StreamEvent {
    /// Parse a frame payload
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the payload is not a well-formed event.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Whether no further frames are read after this event
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final { .. } | Self::Error { .. })
    }

    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Thinking { .. } => "thinking",
            Self::Tool(_) => "tool",
            Self::Agent(_) => "agent",
            Self::Delta { .. } => "delta",
            Self::Final { .. } => "final",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }
}

//! Stream Session Controller
//!
//! Owns one streaming exchange: issues the request, drives the frame
//! decoder, interprets each event and applies it to the [`Session`] in the
//! order it was decoded.
//!
//! # Event Handling
//!
//! ```text
//! start           log the backend session, nothing else
//! thinking        progress label
//! tool / agent    record invocation, snapshot metadata, maybe progress label
//! delta           append text
//! final           complete the open message, stop reading
//! error           fail with the event's description, stop reading
//! anything else   ignored
//! ```
//!
//! Any failure (transport, decode, `error` event) is returned to the caller
//! unchanged. This module never retries; that decision belongs to the
//! dispatcher.

use std::pin::pin;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::backend::{ChatBackend, ChatTriggerRequest, HistoryEntry};
use crate::error::{ChatError, Result};
use crate::events::{InvocationEvent, StreamEvent, UNKNOWN_ERROR};
use crate::messages::{ChatUpdate, ConversationId, InvocationKind, MessageId, ParticipantId};
use crate::session::Session;
use crate::sse;

/// Everything the backend needs for one turn
#[derive(Clone, Debug, PartialEq)]
pub struct Turn {
    /// User text (empty for an init turn)
    pub message: String,
    /// Conversation identifier
    pub conversation_id: ConversationId,
    /// Participant identifier
    pub participant_id: ParticipantId,
    /// Messages preceding this turn
    pub history: Vec<HistoryEntry>,
    /// Whether this is the agent-opens-the-conversation turn
    pub init: bool,
}

impl Turn {
    /// Build the request body for this turn
    #[must_use]
    pub fn request(&self, stream: bool) -> ChatTriggerRequest {
        ChatTriggerRequest {
            message: self.message.clone(),
            session_id: self.conversation_id.clone(),
            user_id: self.participant_id.clone(),
            conversation_history: self.history.clone(),
            stream,
            init: self.init.then_some(true),
        }
    }
}

/// How a stream that did not fail came to an end
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A `final` event completed the message
    Completed {
        /// Completed assistant message
        message_id: MessageId,
        /// Session ID from the `start` event, if any
        backend_session: Option<String>,
    },
    /// The connection closed without a terminal event, after some content
    Closed {
        /// Assistant message left with whatever had streamed
        message_id: MessageId,
    },
}

impl StreamOutcome {
    /// The assistant message the stream wrote into
    #[must_use]
    pub fn message_id(&self) -> &MessageId {
        match self {
            Self::Completed { message_id, .. } | Self::Closed { message_id } => message_id,
        }
    }
}

/// Drives a single streaming exchange against a backend
pub struct StreamController<'a> {
    backend: &'a dyn ChatBackend,
    updates: Option<&'a mpsc::UnboundedSender<ChatUpdate>>,
}

impl<'a> StreamController<'a> {
    /// Create a controller over `backend`
    pub fn new(backend: &'a dyn ChatBackend) -> Self {
        Self {
            backend,
            updates: None,
        }
    }

    /// Send surface updates to `updates` as state changes
    #[must_use]
    pub fn with_updates(mut self, updates: &'a mpsc::UnboundedSender<ChatUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    fn notify(&self, update: ChatUpdate) {
        if let Some(tx) = self.updates {
            // A surface that went away just stops receiving
            let _ = tx.send(update);
        }
    }

    /// Stream one turn into `session`
    ///
    /// The open assistant message is created only after the backend accepted
    /// the request. Reading stops at the first terminal event; bytes after it
    /// are never decoded.
    ///
    /// # Errors
    ///
    /// Returns the transport, decode or `error`-event failure that ended the
    /// stream, or [`ChatError::StreamClosed`] when the connection closed
    /// before any content. The open message is left as it was when the
    /// failure hit.
    pub async fn open_stream(
        &self,
        turn: &Turn,
        credential: &str,
        session: &mut Session,
    ) -> Result<StreamOutcome> {
        let request = turn.request(true);
        let body = self.backend.open_stream(&request, credential).await?;

        let message_id = session.apply_stream_start();
        self.notify(ChatUpdate::StreamOpened {
            message_id: message_id.clone(),
            backend_session: None,
        });

        let mut frames = pin!(sse::frames(body));
        let mut backend_session = None;

        while let Some(frame) = frames.next().await {
            let frame = frame?;
            let Some(payload) = sse::frame_payload(&frame) else {
                continue;
            };
            let event = StreamEvent::parse(payload)?;
            debug!(kind = event.kind(), terminal = event.is_terminal(), "Stream event");

            match event {
                StreamEvent::Start { session_id } => {
                    info!(
                        backend_session = session_id.as_deref().unwrap_or("-"),
                        "Chat stream started"
                    );
                    if session_id.is_some() {
                        self.notify(ChatUpdate::StreamOpened {
                            message_id: message_id.clone(),
                            backend_session: session_id.clone(),
                        });
                    }
                    backend_session = session_id;
                }
                StreamEvent::Thinking { message } => {
                    if let Some(label) = message {
                        session.apply_progress(&label);
                        self.notify(ChatUpdate::Progress { label: Some(label) });
                    }
                }
                StreamEvent::Tool(event) => {
                    self.apply_invocation(session, &message_id, InvocationKind::Tool, &event);
                }
                StreamEvent::Agent(event) => {
                    self.apply_invocation(session, &message_id, InvocationKind::Agent, &event);
                }
                StreamEvent::Delta { text } => {
                    let text = text.unwrap_or_default();
                    if session.apply_delta(&text).is_some() {
                        self.notify(ChatUpdate::Delta {
                            message_id: message_id.clone(),
                            text,
                        });
                    }
                }
                StreamEvent::Final { text } => {
                    if let Some(done) = session.apply_final(text.as_deref()) {
                        self.notify(ChatUpdate::StreamEnd {
                            message_id: done.id.clone(),
                            content: done.content.clone(),
                        });
                    }
                    info!(message_id = %message_id, "Chat stream completed");
                    return Ok(StreamOutcome::Completed {
                        message_id,
                        backend_session,
                    });
                }
                StreamEvent::Error { error } => {
                    return Err(ChatError::StreamEvent(
                        error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
                    ));
                }
                StreamEvent::Unknown => {}
            }
        }

        debug!(message_id = %message_id, "Stream closed without a terminal event");
        if session
            .open_message()
            .is_some_and(|m| m.content.is_empty())
        {
            return Err(ChatError::StreamClosed);
        }
        if let Some(done) = session.apply_final(None) {
            self.notify(ChatUpdate::StreamEnd {
                message_id: done.id.clone(),
                content: done.content.clone(),
            });
        }
        Ok(StreamOutcome::Closed { message_id })
    }

    fn apply_invocation(
        &self,
        session: &mut Session,
        message_id: &MessageId,
        kind: InvocationKind,
        event: &InvocationEvent,
    ) {
        let invocation = event.to_invocation();
        debug!(
            kind = ?kind,
            name = %invocation.name,
            status = ?invocation.status,
            "Invocation recorded"
        );
        if let Some(label) = &event.message {
            session.apply_progress(label);
            self.notify(ChatUpdate::Progress {
                label: Some(label.clone()),
            });
        }
        let metadata = session.apply_invocation(kind, invocation);
        self.notify(ChatUpdate::Metadata {
            message_id: message_id.clone(),
            metadata,
        });
    }
}

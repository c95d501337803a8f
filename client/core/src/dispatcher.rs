//! Chat Client and Fallback Dispatcher
//!
//! [`ChatClient`] is the entry point a surface talks to. It turns user input
//! into turns, resolves identity, and runs each turn through a two-stage
//! dispatch:
//!
//! ```text
//! stream (stream=true) ──ok──▶ done
//!        │
//!      fails (HTTP status, no body, network, bad frame, error event)
//!        ▼
//! single-shot (stream=false) ──ok──▶ reply fills the open message
//!        │
//!      fails
//!        ▼
//! open message discarded, "Error: ..." system message appended
//! ```
//!
//! Exactly one fallback attempt is made per failed stream. There is no other
//! retry anywhere in the client.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::backend::{ChatBackend, HttpBackend};
use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use crate::identity::IdentityManager;
use crate::messages::{ChatUpdate, ConversationId, MessageId, MessageRole, ParticipantId};
use crate::session::Session;
use crate::stream::{StreamController, Turn};

/// How a turn ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The stream delivered the reply
    Streamed {
        /// Assistant message
        message_id: MessageId,
    },
    /// The stream failed and the single-shot request delivered the reply
    Fallback {
        /// Assistant message
        message_id: MessageId,
    },
    /// Both attempts failed; an error message was appended
    Failed {
        /// System message describing the failure
        message_id: MessageId,
        /// Failure description
        error: String,
    },
    /// Nothing was sent (blank input)
    Skipped,
}

/// Chat client facade
///
/// Owns the conversation state and is the only writer to it.
pub struct ChatClient {
    backend: Arc<dyn ChatBackend>,
    identity: IdentityManager,
    /// Resolved on first use; stable until `reset_conversation`
    conversation_id: Option<ConversationId>,
    session: Session,
    participant_id: ParticipantId,
    configured_token: Option<String>,
    history_limit: Option<usize>,
    updates: Option<mpsc::UnboundedSender<ChatUpdate>>,
}

impl ChatClient {
    /// Create a client over a backend and identity store
    pub fn new(backend: Arc<dyn ChatBackend>, identity: IdentityManager) -> Self {
        Self {
            backend,
            identity,
            conversation_id: None,
            session: Session::new(),
            participant_id: ParticipantId::generate(),
            configured_token: None,
            history_limit: None,
            updates: None,
        }
    }

    /// Create an HTTP client from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ClientBuild`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let backend = HttpBackend::from_config(config)?;
        let identity =
            IdentityManager::new(config.identity_store()).with_strategy(config.identity.id_strategy);

        let mut client = Self::new(Arc::new(backend), identity);
        if let Some(ref id) = config.identity.participant_id {
            client.participant_id = ParticipantId(id.clone());
        }
        client.configured_token = config.auth.token.clone();
        client.history_limit = config.chat.history_limit;
        Ok(client)
    }

    /// Send surface updates to `updates`
    #[must_use]
    pub fn with_updates(mut self, updates: mpsc::UnboundedSender<ChatUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Use a fixed participant ID
    #[must_use]
    pub fn with_participant_id(mut self, id: ParticipantId) -> Self {
        self.participant_id = id;
        self
    }

    /// Use a fixed bearer credential instead of storage
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.configured_token = Some(token.into());
        self
    }

    /// Send at most `limit` history entries per turn
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Conversation state
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Participant ID sent with every turn
    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Identity store access
    #[must_use]
    pub fn identity(&self) -> &IdentityManager {
        &self.identity
    }

    fn notify(&self, update: ChatUpdate) {
        if let Some(ref tx) = self.updates {
            let _ = tx.send(update);
        }
    }

    /// Submit user input as a new turn
    ///
    /// Blank input is ignored. The user message is appended before anything
    /// is sent, and the turn always ends in either assistant content or a
    /// visible error message.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TurnInProgress`] if a turn is still outstanding.
    /// Backend failures are not errors here; they end up in the conversation.
    pub async fn submit(&mut self, text: &str) -> Result<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Skipped);
        }
        self.session.begin_turn()?;
        self.notify(ChatUpdate::Busy(true));

        // History is what the conversation looked like before this turn
        let turn = self.turn(text.to_string(), false);
        let user_id = self.session.apply_user_submit(text);
        self.notify(ChatUpdate::MessageAdded {
            id: user_id,
            role: MessageRole::User,
            content: text.to_string(),
        });

        let outcome = self.send_with_fallback(&turn).await;
        self.finish_turn();
        Ok(outcome)
    }

    /// Ask the agent to open the conversation
    ///
    /// Sends an empty message flagged `init`, without a user message.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TurnInProgress`] if a turn is still outstanding.
    pub async fn initiate(&mut self) -> Result<TurnOutcome> {
        self.session.begin_turn()?;
        self.notify(ChatUpdate::Busy(true));

        let turn = self.turn(String::new(), true);
        let outcome = self.send_with_fallback(&turn).await;
        self.finish_turn();
        Ok(outcome)
    }

    /// Start a new conversation: forget the stored ID and clear all messages
    pub fn reset_conversation(&mut self) {
        self.identity.reset_conversation();
        self.conversation_id = None;
        self.session.clear();
        info!("Conversation reset");
    }

    /// Abandon an outstanding turn, keeping what was already applied
    pub fn cancel_turn(&mut self) {
        if self.session.is_busy() {
            self.session.cancel_turn();
            self.notify(ChatUpdate::Busy(false));
        }
    }

    fn finish_turn(&mut self) {
        self.session.end_turn();
        self.notify(ChatUpdate::Busy(false));
    }

    /// Conversation ID used for every turn of this client
    ///
    /// Read from the identity store once, so a store that cannot persist
    /// still yields one ID for the whole process.
    pub fn conversation_id(&mut self) -> ConversationId {
        self.conversation_id
            .get_or_insert_with(|| self.identity.conversation_id())
            .clone()
    }

    fn turn(&mut self, message: String, init: bool) -> Turn {
        Turn {
            message,
            conversation_id: self.conversation_id(),
            participant_id: self.participant_id.clone(),
            history: self.session.history(self.history_limit),
            init,
        }
    }

    /// Run a turn through the stream, then at most one single-shot retry
    pub async fn send_with_fallback(&mut self, turn: &Turn) -> TurnOutcome {
        let credential = self.identity.access_token(self.configured_token.as_deref());
        info!(
            conversation_id = %turn.conversation_id,
            init = turn.init,
            backend = self.backend.name(),
            "Sending turn"
        );

        let mut controller = StreamController::new(self.backend.as_ref());
        if let Some(ref tx) = self.updates {
            controller = controller.with_updates(tx);
        }

        let stream_error = match controller
            .open_stream(turn, &credential, &mut self.session)
            .await
        {
            Ok(outcome) => {
                return TurnOutcome::Streamed {
                    message_id: outcome.message_id().clone(),
                }
            }
            Err(e) => e,
        };

        if !stream_error.is_fallback_trigger() {
            return self.fail_turn(&stream_error.to_string());
        }

        warn!(error = %stream_error, "Streaming failed, falling back to single-shot request");
        self.notify(ChatUpdate::FallbackEngaged {
            reason: stream_error.to_string(),
        });

        let request = turn.request(false);
        let response = self
            .backend
            .send(&request, &credential)
            .await
            .and_then(|response| match response.failure() {
                Some(reason) => Err(ChatError::Backend(reason)),
                None => Ok(response),
            });

        match response {
            Ok(response) => {
                let text = response.text().to_string();
                let message_id = self.session.apply_fallback_result(&text);
                self.notify(ChatUpdate::MessageAdded {
                    id: message_id.clone(),
                    role: MessageRole::Assistant,
                    content: text,
                });
                info!(message_id = %message_id, "Fallback request completed");
                TurnOutcome::Fallback { message_id }
            }
            Err(e) => self.fail_turn(&e.to_string()),
        }
    }

    fn fail_turn(&mut self, description: &str) -> TurnOutcome {
        error!(error = %description, "Turn failed");
        if let Some(id) = self.session.discard_open() {
            self.notify(ChatUpdate::MessageRemoved { id });
        }
        let message_id = self.session.apply_error(description);
        self.notify(ChatUpdate::MessageAdded {
            id: message_id.clone(),
            role: MessageRole::System,
            content: format!("Error: {description}"),
        });
        TurnOutcome::Failed {
            message_id,
            error: description.to_string(),
        }
    }
}

//! Conversation State
//!
//! The authoritative, ordered list of messages in a conversation and the
//! transitions that mutate it. Nothing outside this module changes a
//! message; the stream controller and the dispatcher only call the
//! `apply_*` transitions below.
//!
//! # Design Philosophy
//!
//! A turn has at most one "open" assistant message, the one still
//! accepting content. It is tracked by ID rather than by role so a stale
//! empty placeholder left by an aborted turn can never be mistaken for it.
//! Messages are only ever appended; the single exception is discarding the
//! open placeholder of a turn that failed outright.

use serde::{Deserialize, Serialize};

use crate::backend::HistoryEntry;
use crate::error::{ChatError, Result};
use crate::messages::{Invocation, InvocationKind, MessageId, MessageRole, ToolAgentMetadata};

/// A message in the conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Tool/agent calls made while producing this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ToolAgentMetadata>,
    /// When the message was created (Unix timestamp ms)
    pub timestamp: u64,
    /// Whether the message is still being streamed
    pub streaming: bool,
}

impl ConversationMessage {
    /// Create a complete message
    pub fn new(role: MessageRole, content: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            metadata: None,
            timestamp: now_ms(),
            streaming: false,
        }
    }

    /// Create an empty assistant message that will receive a stream
    pub fn streaming() -> Self {
        Self {
            id: MessageId::new(),
            role: MessageRole::Assistant,
            content: String::new(),
            metadata: Some(ToolAgentMetadata::default()),
            timestamp: now_ms(),
            streaming: true,
        }
    }

    /// Whether this is an assistant message that never received content
    #[must_use]
    pub fn is_empty_placeholder(&self) -> bool {
        self.role == MessageRole::Assistant && self.content.is_empty()
    }
}

/// Whether a turn is outstanding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Ready for a new turn
    #[default]
    Idle,
    /// A turn is being assembled
    Busy,
}

/// Conversation state and its transitions
#[derive(Clone, Debug, Default)]
pub struct Session {
    messages: Vec<ConversationMessage>,
    /// The open assistant message, if a turn is streaming into one
    open_id: Option<MessageId>,
    state: SessionState,
    /// Transient progress label from `thinking`/`tool`/`agent` events
    progress: Option<String>,
    tool_calls: Vec<Invocation>,
    agent_calls: Vec<Invocation>,
}

impl Session {
    /// Create an empty conversation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a turn as outstanding and reset per-turn accumulators
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::TurnInProgress`] if a turn is already outstanding.
    pub fn begin_turn(&mut self) -> Result<()> {
        if self.state == SessionState::Busy {
            return Err(ChatError::TurnInProgress);
        }
        self.state = SessionState::Busy;
        self.tool_calls.clear();
        self.agent_calls.clear();
        self.reset_progress();
        Ok(())
    }

    /// Mark the outstanding turn as finished
    pub fn end_turn(&mut self) {
        self.state = SessionState::Idle;
        self.reset_progress();
    }

    /// Append a user message
    pub fn apply_user_submit(&mut self, text: &str) -> MessageId {
        let msg = ConversationMessage::new(MessageRole::User, text.to_string());
        let id = msg.id.clone();
        self.messages.push(msg);
        id
    }

    /// Open the assistant message for the current turn
    ///
    /// If a message is already open it is returned instead; a turn never has
    /// two open assistant messages.
    pub fn apply_stream_start(&mut self) -> MessageId {
        if let Some(open) = self.open_message() {
            return open.id.clone();
        }
        let msg = ConversationMessage::streaming();
        let id = msg.id.clone();
        self.open_id = Some(id.clone());
        self.messages.push(msg);
        id
    }

    /// Append a text fragment to the open message and refresh its metadata
    ///
    /// Returns the open message ID, or `None` if nothing is open.
    pub fn apply_delta(&mut self, text: &str) -> Option<MessageId> {
        let metadata = self.metadata_snapshot();
        let msg = self.open_message_mut()?;
        msg.content.push_str(text);
        msg.metadata = Some(metadata);
        Some(msg.id.clone())
    }

    /// Record a tool or agent call and snapshot both lists into the open message
    ///
    /// The call is recorded even when no message is open, so it still shows
    /// up on the message the turn eventually produces.
    pub fn apply_invocation(
        &mut self,
        kind: InvocationKind,
        invocation: Invocation,
    ) -> ToolAgentMetadata {
        match kind {
            InvocationKind::Tool => self.tool_calls.push(invocation),
            InvocationKind::Agent => self.agent_calls.push(invocation),
        }
        let metadata = self.metadata_snapshot();
        if let Some(msg) = self.open_message_mut() {
            msg.metadata = Some(metadata.clone());
        }
        metadata
    }

    /// Set the transient progress label
    pub fn apply_progress(&mut self, label: &str) {
        self.progress = Some(label.to_string());
    }

    /// Reset the progress label to its default
    pub fn reset_progress(&mut self) {
        self.progress = None;
    }

    /// Complete the open message
    ///
    /// Accumulated deltas are authoritative. `text` only fills the message
    /// when nothing was streamed into it. Returns the completed message, or
    /// `None` when nothing is open (so re-applying is a no-op).
    pub fn apply_final(&mut self, text: Option<&str>) -> Option<&ConversationMessage> {
        let open_id = self.open_id.take()?;
        self.reset_progress();
        let metadata = self.metadata_snapshot();

        let msg = self.messages.iter_mut().find(|m| m.id == open_id)?;
        if msg.content.is_empty() {
            if let Some(text) = text.filter(|t| !t.is_empty()) {
                msg.content.push_str(text);
            }
        }
        msg.metadata = Some(metadata);
        msg.streaming = false;
        Some(&*msg)
    }

    /// Append a system message describing a failure
    ///
    /// The open message is closed, not edited; an empty placeholder drops out
    /// of [`Session::visible_messages`].
    pub fn apply_error(&mut self, text: &str) -> MessageId {
        self.close_open();
        self.reset_progress();
        let msg = ConversationMessage::new(MessageRole::System, format!("Error: {text}"));
        let id = msg.id.clone();
        self.messages.push(msg);
        id
    }

    /// Place a single-shot reply into the conversation
    ///
    /// Reuses the open message if it is still empty. A partially streamed
    /// message is closed as-is and the reply is appended after it.
    pub fn apply_fallback_result(&mut self, text: &str) -> MessageId {
        let metadata = self.metadata_snapshot();
        self.reset_progress();

        if let Some(msg) = self.open_message_mut() {
            if msg.content.is_empty() {
                msg.content.push_str(text);
                msg.metadata = Some(metadata);
                msg.streaming = false;
                let id = msg.id.clone();
                self.open_id = None;
                return id;
            }
        }

        self.close_open();
        let mut msg = ConversationMessage::new(MessageRole::Assistant, text.to_string());
        msg.metadata = Some(metadata);
        let id = msg.id.clone();
        self.messages.push(msg);
        id
    }

    /// Remove the open message entirely, returning its ID
    pub fn discard_open(&mut self) -> Option<MessageId> {
        let open_id = self.open_id.take()?;
        self.messages.retain(|m| m.id != open_id);
        Some(open_id)
    }

    /// Abandon the outstanding turn, keeping whatever was already applied
    pub fn cancel_turn(&mut self) {
        self.close_open();
        self.end_turn();
    }

    /// Drop every message and any turn state
    pub fn clear(&mut self) {
        self.messages.clear();
        self.open_id = None;
        self.tool_calls.clear();
        self.agent_calls.clear();
        self.end_turn();
    }

    /// Label to show while waiting
    ///
    /// `None` once the open message has content, or when no custom label is
    /// set (surfaces then show their default).
    #[must_use]
    pub fn progress_label(&self) -> Option<&str> {
        if self.open_message().is_some_and(|m| !m.content.is_empty()) {
            return None;
        }
        self.progress.as_deref()
    }

    /// All messages in order, including empty placeholders
    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Messages a surface should draw (empty assistant placeholders hidden)
    pub fn visible_messages(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter().filter(|m| !m.is_empty_placeholder())
    }

    /// The open assistant message, if any
    #[must_use]
    pub fn open_message(&self) -> Option<&ConversationMessage> {
        let open_id = self.open_id.as_ref()?;
        self.messages.iter().find(|m| &m.id == open_id)
    }

    /// Get message by ID
    #[must_use]
    pub fn get_message(&self, id: &MessageId) -> Option<&ConversationMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Whether a turn is outstanding
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state == SessionState::Busy
    }

    /// Current turn state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Build the `conversation_history` payload
    ///
    /// Empty assistant placeholders are skipped. With `limit`, only the most
    /// recent entries are kept.
    #[must_use]
    pub fn history(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        let entries: Vec<HistoryEntry> = self
            .visible_messages()
            .map(|m| HistoryEntry {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();

        match limit {
            Some(limit) if entries.len() > limit => entries[entries.len() - limit..].to_vec(),
            _ => entries,
        }
    }

    fn metadata_snapshot(&self) -> ToolAgentMetadata {
        ToolAgentMetadata {
            tool_calls: self.tool_calls.clone(),
            agent_calls: self.agent_calls.clone(),
        }
    }

    fn open_message_mut(&mut self) -> Option<&mut ConversationMessage> {
        let open_id = self.open_id.as_ref()?;
        self.messages.iter_mut().find(|m| &m.id == open_id)
    }

    fn close_open(&mut self) {
        if let Some(open_id) = self.open_id.take() {
            if let Some(msg) = self.messages.iter_mut().find(|m| m.id == open_id) {
                msg.streaming = false;
            }
        }
    }
}

/// Get current timestamp in milliseconds
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_session_creation() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.messages().is_empty());
        assert!(session.open_message().is_none());
    }

    #[test]
    fn test_user_submit_appends() {
        let mut session = Session::new();

        let first = session.apply_user_submit("Hello");
        let second = session.apply_user_submit("Again");
        assert_eq!(session.messages().len(), 2);

        let msg = session.get_message(&first).unwrap();
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "Hello");
        assert!(!msg.streaming);
        assert_eq!(session.messages()[1].id, second);
    }

    #[test]
    fn test_streaming_response() {
        let mut session = Session::new();
        session.begin_turn().unwrap();

        let stream_id = session.apply_stream_start();
        assert!(session.is_busy());

        session.apply_delta("Hi ");
        session.apply_delta("there!");

        let msg = session.get_message(&stream_id).unwrap();
        assert!(msg.streaming);
        assert_eq!(msg.content, "Hi there!");

        let done = session.apply_final(None).unwrap();
        assert_eq!(done.content, "Hi there!");
        assert!(!done.streaming);
        assert!(done.metadata.as_ref().unwrap().is_empty());
        assert!(session.open_message().is_none());
    }

    #[test]
    fn test_stream_start_never_opens_second_message() {
        let mut session = Session::new();
        let first = session.apply_stream_start();
        let second = session.apply_stream_start();
        assert_eq!(first, second);
        assert_eq!(session.messages().len(), 1);

        session.apply_delta("partial");
        assert_eq!(session.apply_stream_start(), first);
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_stale_placeholder_is_not_targeted() {
        let mut session = Session::new();
        let stale = session.apply_stream_start();
        session.apply_error("boom");

        let open = session.apply_stream_start();
        assert_ne!(stale, open);
        session.apply_delta("fresh");

        assert_eq!(session.get_message(&stale).unwrap().content, "");
        assert_eq!(session.get_message(&open).unwrap().content, "fresh");
    }

    #[test]
    fn test_final_is_idempotent() {
        let mut session = Session::new();
        session.apply_stream_start();
        session.apply_delta("done");

        assert!(session.apply_final(None).is_some());
        assert!(session.apply_final(Some("ignored")).is_none());
        assert_eq!(session.messages()[0].content, "done");
    }

    #[test]
    fn test_final_text_only_fills_empty_message() {
        let mut session = Session::new();
        session.apply_stream_start();
        session.apply_delta("streamed");
        let done = session.apply_final(Some("different")).unwrap();
        assert_eq!(done.content, "streamed");

        let mut session = Session::new();
        session.apply_stream_start();
        let done = session.apply_final(Some("only final")).unwrap();
        assert_eq!(done.content, "only final");
    }

    #[test]
    fn test_invocations_snapshot_into_open_message() {
        let mut session = Session::new();
        session.begin_turn().unwrap();
        let id = session.apply_stream_start();

        session.apply_invocation(InvocationKind::Tool, Invocation::completed("get_contacts"));
        let snapshot =
            session.apply_invocation(InvocationKind::Agent, Invocation::failed("scheduler", "x"));
        assert_eq!(snapshot.tool_calls.len(), 1);
        assert_eq!(snapshot.agent_calls.len(), 1);

        let msg = session.get_message(&id).unwrap();
        assert_eq!(msg.metadata.as_ref(), Some(&snapshot));

        // Next turn starts from empty lists
        session.apply_final(None);
        session.end_turn();
        session.begin_turn().unwrap();
        let next = session.apply_stream_start();
        session.apply_delta("x");
        assert!(session.get_message(&next).unwrap().metadata.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_progress_label_hidden_once_content_streams() {
        let mut session = Session::new();
        session.apply_stream_start();
        session.apply_progress("Looking up leads");
        assert_eq!(session.progress_label(), Some("Looking up leads"));

        session.apply_delta("Here");
        assert_eq!(session.progress_label(), None);

        session.reset_progress();
        session.apply_final(None);
        assert_eq!(session.progress_label(), None);
    }

    #[test]
    fn test_error_appends_system_message() {
        let mut session = Session::new();
        session.apply_user_submit("Hello");
        let placeholder = session.apply_stream_start();
        let err = session.apply_error("HTTP 500");

        let msg = session.get_message(&err).unwrap();
        assert_eq!(msg.role, MessageRole::System);
        assert_eq!(msg.content, "Error: HTTP 500");

        // Placeholder stays in state but is not visible
        assert!(session.get_message(&placeholder).is_some());
        let visible: Vec<_> = session.visible_messages().map(|m| m.role).collect();
        assert_eq!(visible, vec![MessageRole::User, MessageRole::System]);
    }

    #[test]
    fn test_fallback_reuses_empty_placeholder() {
        let mut session = Session::new();
        let placeholder = session.apply_stream_start();
        let id = session.apply_fallback_result("OK");

        assert_eq!(id, placeholder);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "OK");
        assert!(session.open_message().is_none());
    }

    #[test]
    fn test_fallback_after_partial_stream_appends() {
        let mut session = Session::new();
        let partial = session.apply_stream_start();
        session.apply_delta("Half");

        let id = session.apply_fallback_result("Whole reply");
        assert_ne!(id, partial);
        assert_eq!(session.messages().len(), 2);
        assert!(!session.get_message(&partial).unwrap().streaming);

        let mut session = Session::new();
        let id = session.apply_fallback_result("No stream opened");
        assert_eq!(session.get_message(&id).unwrap().role, MessageRole::Assistant);
    }

    #[test]
    fn test_discard_open() {
        let mut session = Session::new();
        session.apply_user_submit("Hello");
        let placeholder = session.apply_stream_start();

        assert_eq!(session.discard_open(), Some(placeholder));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.discard_open(), None);
    }

    #[test]
    fn test_second_turn_rejected_while_busy() {
        let mut session = Session::new();
        session.begin_turn().unwrap();
        assert!(matches!(session.begin_turn(), Err(ChatError::TurnInProgress)));

        session.end_turn();
        assert!(session.begin_turn().is_ok());
    }

    #[test]
    fn test_history_skips_placeholders_and_limits() {
        let mut session = Session::new();
        session.apply_user_submit("one");
        session.apply_fallback_result("two");
        session.apply_user_submit("three");
        session.apply_stream_start();

        let history = session.history(None);
        let contents: Vec<_> = history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);

        let limited = session.history(Some(2));
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].content, "two");
        assert_eq!(limited[0].role, MessageRole::Assistant);
    }

    #[test]
    fn test_clear() {
        let mut session = Session::new();
        session.begin_turn().unwrap();
        session.apply_user_submit("Hello");
        session.apply_stream_start();

        session.clear();
        assert!(session.messages().is_empty());
        assert!(session.open_message().is_none());
        assert!(!session.is_busy());
    }
}

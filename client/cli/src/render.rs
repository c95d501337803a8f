//! Terminal rendering of chat updates
//!
//! [`Renderer`] turns the ordered [`ChatUpdate`] feed into text for a plain
//! line-oriented terminal. It only produces strings; the caller owns stdout.

use chat_client_core::messages::{
    ChatUpdate, Invocation, InvocationStatus, MessageRole, ToolAgentMetadata,
};
use chat_client_core::profile::StarterPrompt;
use chat_client_core::ConversationMessage;

/// Input prompt shown when the client is idle
pub const PROMPT: &str = "> ";

/// Turns chat updates into terminal output
#[derive(Debug)]
pub struct Renderer {
    /// Label shown while waiting, unless the backend sends its own
    default_label: String,
    /// Whether the cursor sits after streamed text with no newline yet
    mid_line: bool,
    /// Latest metadata snapshot of the open message
    metadata: Option<ToolAgentMetadata>,
}

impl Renderer {
    /// Create a renderer using `default_label` as the waiting indicator
    pub fn new(default_label: impl Into<String>) -> Self {
        Self {
            default_label: default_label.into(),
            mid_line: false,
            metadata: None,
        }
    }

    /// Text to write for `update`, if any
    pub fn render(&mut self, update: &ChatUpdate) -> Option<String> {
        match update {
            ChatUpdate::Busy(true) => {
                self.metadata = None;
                Some(format!("{}\n", self.default_label))
            }
            ChatUpdate::Busy(false) => Some(format!("{}{PROMPT}", self.break_line())),
            ChatUpdate::Progress { label } => {
                let brk = self.break_line();
                let label = label.as_deref().unwrap_or(&self.default_label);
                Some(format!("{brk}{label}\n"))
            }
            ChatUpdate::Delta { text, .. } => {
                self.mid_line = !text.ends_with('\n');
                Some(text.clone())
            }
            ChatUpdate::Metadata { metadata, .. } => {
                self.metadata = Some(metadata.clone());
                None
            }
            ChatUpdate::StreamEnd { content, .. } => {
                let mut out = String::new();
                if self.mid_line {
                    out.push('\n');
                } else if content.is_empty() {
                    out.push_str("(empty reply)\n");
                }
                self.mid_line = false;
                out.push_str(&self.take_badges());
                Some(out)
            }
            ChatUpdate::MessageAdded {
                role: MessageRole::Assistant,
                content,
                ..
            } => {
                let mut out = self.break_line();
                out.push_str(content);
                out.push('\n');
                out.push_str(&self.take_badges());
                Some(out)
            }
            ChatUpdate::MessageAdded {
                role: MessageRole::System,
                content,
                ..
            } => Some(format!("{}! {content}\n", self.break_line())),
            ChatUpdate::FallbackEngaged { reason } => Some(format!(
                "{}(stream interrupted: {reason}; retrying without streaming)\n",
                self.break_line()
            )),
            ChatUpdate::MessageRemoved { .. } if self.mid_line => {
                Some(format!("{}(partial reply discarded)\n", self.break_line()))
            }
            ChatUpdate::MessageAdded {
                role: MessageRole::User,
                ..
            }
            | ChatUpdate::MessageRemoved { .. }
            | ChatUpdate::StreamOpened { .. } => None,
        }
    }

    fn break_line(&mut self) -> String {
        if std::mem::take(&mut self.mid_line) {
            "\n".to_string()
        } else {
            String::new()
        }
    }

    fn take_badges(&mut self) -> String {
        match self.metadata.take() {
            Some(metadata) if !metadata.is_empty() => format!("{}\n", badges(&metadata)),
            _ => String::new(),
        }
    }
}

fn badge(kind: &str, invocation: &Invocation) -> String {
    match invocation.status {
        InvocationStatus::Completed => format!("[{kind}: {} ✓]", invocation.name),
        InvocationStatus::Failed => match invocation.error {
            Some(ref error) => format!("[{kind}: {} ✗ {error}]", invocation.name),
            None => format!("[{kind}: {} ✗]", invocation.name),
        },
    }
}

/// One line listing every tool and agent call
pub fn badges(metadata: &ToolAgentMetadata) -> String {
    metadata
        .tool_calls
        .iter()
        .map(|i| badge("tool", i))
        .chain(metadata.agent_calls.iter().map(|i| badge("agent", i)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Numbered starter prompt menu
pub fn starter_menu(prompts: &[StarterPrompt]) -> String {
    let mut out = String::from("Try one of these (type its number):\n");
    for (i, prompt) in prompts.iter().enumerate() {
        out.push_str(&format!("  {}. {} {}\n", i + 1, prompt.icon, prompt.label));
    }
    out
}

/// Transcript of the visible conversation
pub fn transcript<'a>(messages: impl Iterator<Item = &'a ConversationMessage>) -> String {
    let mut out = String::new();
    for message in messages {
        out.push_str(&format!("{:>9}: {}\n", message.role.as_str(), message.content));
        if let Some(metadata) = message.metadata.as_ref().filter(|m| !m.is_empty()) {
            out.push_str(&format!("           {}\n", badges(metadata)));
        }
    }
    out
}

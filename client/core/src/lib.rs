//! Chat Client Core - Headless Streaming Chat for Agent Backends
//!
//! This crate holds everything a chat surface needs to talk to a
//! conversational-agent backend, completely independent of how the
//! conversation is drawn. It can drive a terminal REPL, a GUI, or run
//! headless in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Surfaces                                 │
//! │        ┌──────────────┐   ┌──────────────┐   ┌──────────────┐    │
//! │        │ Terminal CLI │   │     GUI      │   │  Headless    │    │
//! │        └──────┬───────┘   └──────┬───────┘   └──────┬───────┘    │
//! │               └──────────────────┴──────────────────┘            │
//! │                 submit() (down)      ChatUpdate (up)              │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │                         CHAT CORE                                 │
//! │  ┌────────────────────────────┴───────────────────────────────┐  │
//! │  │                ChatClient (fallback dispatcher)             │  │
//! │  │  ┌──────────┐  ┌──────────────┐  ┌─────────┐  ┌─────────┐  │  │
//! │  │  │ Identity │  │    Stream    │  │ Session │  │ Backend │  │  │
//! │  │  │ Manager  │  │  Controller  │  │ reducer │  │ (HTTP)  │  │  │
//! │  │  └──────────┘  └──────┬───────┘  └─────────┘  └─────────┘  │  │
//! │  │                       │                                     │  │
//! │  │               SSE frame decoder                             │  │
//! │  └─────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatClient`]: Submits turns and owns the conversation
//! - [`Session`]: Ordered messages and the transitions that build them
//! - [`StreamController`]: Runs one streaming exchange
//! - [`IdentityManager`]: Persistent conversation ID and credential
//! - [`ChatUpdate`]: Messages sent from the core to a surface
//!
//! # Quick Start
//!
//! ```ignore
//! use chat_client_core::{config, ChatClient, ChatUpdate};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = config::load_config()?;
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let mut client = ChatClient::from_config(&config)?.with_updates(tx);
//!
//!     tokio::spawn(async move {
//!         while let Some(update) = rx.recv().await {
//!             if let ChatUpdate::Delta { text, .. } = update {
//!                 print!("{text}");
//!             }
//!         }
//!     });
//!
//!     client.submit("Show me recent leads").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Agent backend abstraction (HTTP)
//! - [`config`]: TOML/env/CLI configuration
//! - [`dispatcher`]: Chat client and stream-then-fallback dispatch
//! - [`error`]: Error types
//! - [`events`]: Stream event types
//! - [`identity`]: Conversation identity and client-local storage
//! - [`messages`]: Identifiers, invocation metadata, surface updates
//! - [`profile`]: Session validation, greeting, access gate, starter prompts
//! - [`session`]: Conversation state machine
//! - [`sse`]: Event-stream frame decoding
//! - [`stream`]: Stream session controller
//!
//! # No Surface Dependencies
//!
//! This crate has **zero** dependencies on any terminal or UI framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod identity;
pub mod messages;
pub mod profile;
pub mod session;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use backend::{ChatBackend, ChatTriggerRequest, HistoryEntry, HttpBackend, TriggerResponse};
pub use config::{ClientConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use dispatcher::{ChatClient, TurnOutcome};
pub use error::{ChatError, Result};
pub use events::StreamEvent;
pub use identity::{IdentityManager, IdentityStore, StorageError};
pub use messages::{
    ChatUpdate, ConversationId, Invocation, InvocationKind, InvocationStatus, MessageId,
    MessageRole, ParticipantId, ToolAgentMetadata,
};
pub use profile::{access_gate, greeting, GateDecision, ProfileClient, SessionProfile};
pub use session::{ConversationMessage, Session};
pub use stream::{StreamController, StreamOutcome, Turn};

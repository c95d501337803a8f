//! Agent Backend Integration
//!
//! Abstracted access to the conversational-agent backend through a common
//! trait, so the stream controller and dispatcher never touch HTTP directly.
//!
//! # Available Backends
//!
//! - **HTTP**: the trigger endpoint over reqwest (default)
//!
//! # Usage
//!
//! ```ignore
//! use chat_client_core::backend::{ChatBackend, HttpBackend};
//!
//! let backend = HttpBackend::from_config(&config)?;
//! let body = backend.open_stream(&request, "token").await?;
//! ```

mod http;
mod traits;

pub use http::HttpBackend;
pub use traits::{
    ByteStream, ChatBackend, ChatTriggerRequest, HistoryEntry, TriggerResponse, TriggerStatus,
    NO_RESPONSE_TEXT,
};

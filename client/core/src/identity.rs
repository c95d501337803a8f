//! Conversation Identity
//!
//! Obtains and persists the identifiers that tie turns together across
//! restarts: the conversation ID (sent as `session_id`) and the bearer
//! credential. Both live in a small client-local key/value store, the
//! terminal equivalent of browser `localStorage`.
//!
//! # Degraded Mode
//!
//! Storage failures are never fatal. If the store cannot be read or written,
//! a fresh identifier is generated and returned without being persisted, and
//! the next call will generate another one. This is logged at `warn` and
//! otherwise silent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::messages::ConversationId;

/// Storage key holding the conversation ID
pub const CONVERSATION_ID_KEY: &str = "chat_session_id";

/// Storage key holding the bearer credential
pub const TOKEN_KEY: &str = "token";

/// Placeholder credential used until real authentication is wired in
pub const DEMO_CREDENTIAL: &str = "demo-development-token";

/// Errors from a client-local store
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("Storage I/O failed at {path}: {source}")]
    Io {
        /// Backing file
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of strings
    #[error("Storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Persistence is switched off
    #[error("Storage is unavailable")]
    Unavailable,
}

/// A string key/value store that survives restarts (or pretends to)
pub trait IdentityStore: Send + Sync {
    /// Read a key
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a key
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key; deleting a missing key is not an error
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl IdentityStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Store that refuses every operation (persistence disabled)
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStore;

impl IdentityStore for DisabledStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }
}

/// JSON-file store
///
/// The whole file is one JSON object of string values. It is read on every
/// access so that clearing the file takes effect immediately.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store backed by `path` (created on first write)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `$XDG_DATA_HOME/chat-client/storage.json`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("chat-client").join("storage.json"))
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json).map_err(|e| self.io_error(e))
    }
}

impl IdentityStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

/// How new opaque identifiers are minted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Random v4 UUID
    #[default]
    Uuid,
    /// `<unix millis>-<random base36>`, for backends that reject UUIDs
    Timestamp,
}

/// Mint a new opaque identifier
#[must_use]
pub fn generate_opaque_id(strategy: IdStrategy) -> String {
    match strategy {
        IdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
        IdStrategy::Timestamp => {
            const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis();
            let mut rng = rand::thread_rng();
            let suffix: String = (0..11)
                .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
                .collect();
            format!("{millis}-{suffix}")
        }
    }
}

/// Process-wide access to persisted identity
///
/// Every read goes through the store: the first call mints and writes the
/// ID, later calls read it back. [`ChatClient`](crate::ChatClient) keeps the
/// first result for the whole process, so degraded storage never changes the
/// ID between turns.
#[derive(Clone)]
pub struct IdentityManager {
    store: Arc<dyn IdentityStore>,
    strategy: IdStrategy,
}

impl std::fmt::Debug for IdentityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityManager")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl IdentityManager {
    /// Create a manager over `store`
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self {
            store,
            strategy: IdStrategy::default(),
        }
    }

    /// Ephemeral manager backed by memory
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Set the ID minting strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: IdStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Return the persisted conversation ID, minting and storing one if absent
    ///
    /// The stored value is returned unchanged, without format validation.
    #[must_use]
    pub fn conversation_id(&self) -> ConversationId {
        match self.store.get(CONVERSATION_ID_KEY) {
            Ok(Some(existing)) if !existing.is_empty() => ConversationId(existing),
            Ok(_) => {
                let id = generate_opaque_id(self.strategy);
                if let Err(e) = self.store.set(CONVERSATION_ID_KEY, &id) {
                    warn!(error = %e, "Could not persist conversation ID, using ephemeral ID");
                } else {
                    debug!(conversation_id = %id, "Created conversation ID");
                }
                ConversationId(id)
            }
            Err(e) => {
                warn!(error = %e, "Identity storage unavailable, using ephemeral conversation ID");
                ConversationId(generate_opaque_id(self.strategy))
            }
        }
    }

    /// Forget the stored conversation ID so the next call mints a new one
    pub fn reset_conversation(&self) {
        if let Err(e) = self.store.remove(CONVERSATION_ID_KEY) {
            warn!(error = %e, "Could not clear stored conversation ID");
        }
    }

    /// Resolve the bearer credential for a request
    ///
    /// Priority: `configured` > stored token > [`DEMO_CREDENTIAL`]. A
    /// configured token is used as-is and never written to storage; only the
    /// placeholder is persisted, on a best-effort basis.
    #[must_use]
    pub fn access_token(&self, configured: Option<&str>) -> String {
        if let Some(token) = configured.filter(|t| !t.is_empty()) {
            return token.to_string();
        }

        if let Some(stored) = self.store.get(TOKEN_KEY).ok().flatten() {
            if !stored.is_empty() {
                return stored;
            }
        }

        if let Err(e) = self.store.set(TOKEN_KEY, DEMO_CREDENTIAL) {
            debug!(error = %e, "Could not persist access token");
        }
        DEMO_CREDENTIAL.to_string()
    }
}

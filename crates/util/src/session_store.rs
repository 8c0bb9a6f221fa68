//! Local key-value storage holding the admin session.
//!
//! The renderer never reads storage itself; callers look up the session id
//! through a [`SessionStore`] and pass the resulting [`SessionToken`] in.
//! [`JsonSessionStore`] persists entries to a JSON file in the user's config
//! directory (`~/.config/shm/session.json` on most platforms), and
//! [`InMemorySessionStore`] backs tests and ephemeral runs.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use shm_types::SessionToken;
use thiserror::Error;
use tracing::warn;

use crate::expand_tilde;

/// Environment variable overriding the session file location.
pub const SESSION_PATH_ENV: &str = "SHM_SESSION_PATH";

/// Default filename for the persisted session storage.
pub const SESSION_FILE_NAME: &str = "session.json";

/// Storage key under which the session id lives.
pub const SESSION_ID_KEY: &str = "session_id";

/// Errors surfaced by session storage operations.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stored value plus the time it was written.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredEntry {
    pub value: String,
    #[serde(with = "ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Default, Serialize, Deserialize)]
struct SessionFile {
    entries: BTreeMap<String, StoredEntry>,
}

impl SessionFile {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&mut self, key: &str, value: String) {
        let entry = StoredEntry {
            value,
            updated_at: Utc::now(),
        };
        self.entries.insert(key.to_string(), entry);
    }

    fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
}

/// String key-value storage shared by the session-access commands.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError>;

    /// Remove a key. Returns `true` when an entry existed.
    fn remove(&self, key: &str) -> Result<bool, SessionStoreError>;
}

/// Read the session token for a render pass.
///
/// Storage failures never abort rendering: they are logged and the token is
/// treated as absent.
pub fn read_session_token(store: &dyn SessionStore) -> SessionToken {
    match store.get(SESSION_ID_KEY) {
        Ok(value) => SessionToken::from_option(value),
        Err(error) => {
            warn!(error = %error, "Failed to read session id; continuing without one");
            SessionToken::absent()
        }
    }
}

/// JSON-backed session storage persisted on disk.
pub struct JsonSessionStore {
    path: PathBuf,
    entries: Mutex<SessionFile>,
}

impl JsonSessionStore {
    /// Open the store at `path`, or at the default location when omitted.
    pub fn new<P: Into<Option<PathBuf>>>(path: P) -> Result<Self, SessionStoreError> {
        let resolved_path = match path.into() {
            Some(path) => expand_tilde(&path.to_string_lossy()),
            None => default_session_path(),
        };
        let file = load_session_file(&resolved_path)?;
        Ok(Self {
            path: resolved_path,
            entries: Mutex::new(file),
        })
    }

    pub fn with_defaults() -> Result<Self, SessionStoreError> {
        Self::new(None::<PathBuf>)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_locked(&self, file: &SessionFile) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(file)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SessionStore for JsonSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let entries = self.entries.lock().expect("session lock poisoned");
        Ok(entries.get(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        let mut entries = self.entries.lock().expect("session lock poisoned");
        entries.set(key, value.to_string());
        self.save_locked(&entries)
    }

    fn remove(&self, key: &str) -> Result<bool, SessionStoreError> {
        let mut entries = self.entries.lock().expect("session lock poisoned");
        let removed = entries.remove(key);
        if removed {
            self.save_locked(&entries)?;
        }
        Ok(removed)
    }
}

/// In-memory session storage.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<SessionFile>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store that already holds a session id.
    pub fn with_session(session_id: &str) -> Self {
        let store = Self::new();
        store
            .entries
            .lock()
            .expect("session lock poisoned")
            .set(SESSION_ID_KEY, session_id.to_string());
        store
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(self.entries.lock().expect("session lock poisoned").get(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        self.entries
            .lock()
            .expect("session lock poisoned")
            .set(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, SessionStoreError> {
        Ok(self.entries.lock().expect("session lock poisoned").remove(key))
    }
}

fn default_session_path() -> PathBuf {
    if let Ok(path) = env::var(SESSION_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shm")
        .join(SESSION_FILE_NAME)
}

fn load_session_file(path: &Path) -> Result<SessionFile, SessionStoreError> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<SessionFile>(&content) {
            Ok(file) => Ok(file),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse session file; starting empty"
                );
                Ok(SessionFile::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(SessionFile::default()),
        Err(error) => Err(SessionStoreError::Io(error)),
    }
}

//! In-memory user table — username to shared key.
//!
//! Reads vastly outnumber writes (every handshake reads, only enrollment
//! writes), so a reader/writer lock over a plain map is the right tool.
//! Keys are wiped from memory when dropped. Persistence is an external
//! concern.

use std::collections::HashMap;
use std::sync::RwLock;

use zeroize::Zeroizing;

use filesync_core::crypto;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user already exists: {0}")]
    AlreadyExists(String),

    #[error("user not found: {0}")]
    NotFound(String),
}

/// Process-wide user table.
#[derive(Default)]
pub struct UserStore {
    users: RwLock<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll a user. Existing usernames are not overwritten — a second
    /// enrollment under the same name is always an error.
    pub fn create(&self, username: &str, shared_key: Vec<u8>) -> Result<(), UserError> {
        let mut users = self.users.write().expect("user table lock poisoned");
        if users.contains_key(username) {
            return Err(UserError::AlreadyExists(username.to_string()));
        }
        users.insert(username.to_string(), Zeroizing::new(shared_key));
        Ok(())
    }

    /// The user's shared key, if enrolled.
    pub fn shared_key(&self, username: &str) -> Option<Zeroizing<Vec<u8>>> {
        self.users
            .read()
            .expect("user table lock poisoned")
            .get(username)
            .cloned()
    }

    pub fn delete(&self, username: &str) {
        self.users
            .write()
            .expect("user table lock poisoned")
            .remove(username);
    }

    /// The user's storage directory name, derived from the shared key.
    pub fn storage_dir(&self, username: &str) -> Result<String, UserError> {
        let key = self
            .shared_key(username)
            .ok_or_else(|| UserError::NotFound(username.to_string()))?;
        Ok(crypto::storage_dir_name(&key))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

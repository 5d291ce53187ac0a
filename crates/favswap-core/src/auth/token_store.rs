use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Token file name in the data directory
const TOKEN_FILE: &str = "session.dat";

/// What survives a restart of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedToken {
    pub username: Option<String>,
    pub token: String,
    pub api_key: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// Durable storage for the last session token.
///
/// The blob is base64 over JSON. That keeps the token out of casual view
/// in a file listing; it is not encryption.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(TOKEN_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted token. Absent or unreadable stores yield `None`.
    pub fn load(&self) -> Option<PersistedToken> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read token store");
                return None;
            }
        };

        match Self::decode(&raw) {
            Some(token) => {
                debug!(saved_at = %token.saved_at, "Loaded persisted session token");
                Some(token)
            }
            None => {
                warn!(path = %self.path.display(), "Token store is corrupt, ignoring");
                None
            }
        }
    }

    pub fn save(&self, token: &PersistedToken) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, Self::encode(token)?)
    }

    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn encode(token: &PersistedToken) -> std::io::Result<Vec<u8>> {
        let json = serde_json::to_vec(token)?;
        Ok(STANDARD.encode(json).into_bytes())
    }

    fn decode(raw: &[u8]) -> Option<PersistedToken> {
        let text = std::str::from_utf8(raw).ok()?;
        let json = STANDARD.decode(text.trim()).ok()?;
        let token: PersistedToken = serde_json::from_slice(&json).ok()?;
        if token.token.is_empty() {
            return None;
        }
        Some(token)
    }
}

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

/// Keychain service the password is filed under.
const KEYCHAIN_SERVICE: &str = "favswap";

/// OS keychain storage for the password used to re-authenticate after a
/// restart. Only consulted when the user opted in to remembering it.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(username: &str) -> Result<Entry> {
        Entry::new(KEYCHAIN_SERVICE, username).context("Failed to open keychain entry")
    }

    pub fn remember(username: &str, password: &str) -> Result<()> {
        Self::entry(username)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    /// Stored password for `username`, if the keychain has one.
    pub fn recall(username: &str) -> Option<String> {
        match Self::entry(username).and_then(|entry| {
            entry
                .get_password()
                .context("Failed to read password from keychain")
        }) {
            Ok(password) => Some(password),
            Err(e) => {
                debug!(username, error = %e, "No remembered password");
                None
            }
        }
    }

    pub fn forget(username: &str) -> Result<()> {
        match Self::entry(username)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete password from keychain"),
        }
    }
}

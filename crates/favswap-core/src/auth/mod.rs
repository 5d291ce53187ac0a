//! Authentication module for managing the session with the favorites service.
//!
//! This module provides:
//! - `AuthSession`: token lifecycle with validation before use and
//!   single-flight re-authentication
//! - `TokenStore`: obfuscated on-disk copy of the last token
//! - `CredentialStore`: OS keychain storage for the re-authentication password

pub mod credentials;
pub mod session;
pub mod token_store;

pub use credentials::CredentialStore;
pub use session::{AuthSession, SessionStatus, SessionToken};
pub use token_store::{PersistedToken, TokenStore};

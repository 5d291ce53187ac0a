//! Wiring of config, session, client, group store, and engine for a host
//! program (CLI, GUI, or service).

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::api::{RemoteFavoriteClient, ReqwestTransport, Transport};
use crate::auth::{AuthSession, CredentialStore, SessionStatus, TokenStore};
use crate::config::Config;
use crate::groups::GroupStore;
use crate::sync::GroupSyncEngine;

pub struct App {
    config: Config,
    engine: GroupSyncEngine,
}

impl App {
    /// Load `.env` and the user config, then build everything against the
    /// live service.
    pub async fn open() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        Self::with_config(config).await
    }

    pub async fn with_config(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::new(config.api_base_url())
            .context("Failed to build HTTP client")?;
        Self::with_transport(config, Arc::new(transport)).await
    }

    pub async fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let data_dir = config.data_dir()?;
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        debug!(data_dir = %data_dir.display(), "Data directory configured");

        let session = AuthSession::new(transport.clone(), TokenStore::new(&data_dir))
            .with_validity_window(config.validity_window());
        if session.load_persisted().await {
            debug!("Loaded persisted session token");
        }
        if let Some((username, password)) = Self::stored_credentials(&config) {
            session.set_credentials(&username, &password).await;
        }

        let client = RemoteFavoriteClient::new(transport, Arc::new(session));
        let store = GroupStore::open(&data_dir);
        let engine = GroupSyncEngine::new(client, store, config.sync_options());

        Ok(Self { config, engine })
    }

    /// Credentials for renewing a session without prompting: environment
    /// first, then the keychain if the user opted in.
    fn stored_credentials(config: &Config) -> Option<(String, String)> {
        if let Some(credentials) = Config::env_credentials() {
            debug!("Using credentials from environment");
            return Some(credentials);
        }
        if !config.remember_password {
            return None;
        }
        let username = config.last_username.clone()?;
        let password = CredentialStore::recall(&username)?;
        Some((username, password))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &GroupSyncEngine {
        &self.engine
    }

    pub fn session(&self) -> &AuthSession {
        self.engine.client().session()
    }

    pub async fn is_logged_in(&self) -> bool {
        !matches!(
            self.session().status().await,
            SessionStatus::NoToken | SessionStatus::AuthFailed
        )
    }

    /// Log in and remember the username (and, if enabled, the password).
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.engine
            .login(username, password)
            .await
            .with_context(|| format!("Login failed for {}", username))?;

        if self.config.remember_password {
            if let Err(e) = CredentialStore::remember(username, password) {
                warn!(error = %e, "Failed to remember password");
            }
        }

        self.config.last_username = Some(username.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        info!(username, "Logged in");
        Ok(())
    }

    /// Drop the session token and any remembered password.
    pub async fn logout(&self) -> Result<()> {
        let username = self
            .session()
            .username()
            .await
            .or_else(|| self.config.last_username.clone());
        self.session().logout().await.context("Failed to clear session")?;

        if self.config.remember_password {
            if let Some(ref username) = username {
                if let Err(e) = CredentialStore::forget(username) {
                    warn!(error = %e, "Failed to forget password");
                }
            }
        }
        Ok(())
    }
}

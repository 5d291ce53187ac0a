use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ApiRequest, Transport, API_KEY_COOKIE, AUTH_COOKIE};
use crate::error::{AuthError, Error, Result};

use super::token_store::{PersistedToken, TokenStore};

/// An opaque session token obtained from the service.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Lifecycle of the cached token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NoToken,
    /// Loaded from disk, not yet checked against the service.
    Unverified,
    Validated,
    Invalid,
    /// The service rejected the stored credentials. Only an explicit
    /// `login` leaves this state.
    AuthFailed,
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

struct SessionState {
    credentials: Option<Credentials>,
    /// Username of the last rejected login.
    rejected_username: Option<String>,
    token: Option<String>,
    api_key: Option<String>,
    status: SessionStatus,
    validated_at: Option<DateTime<Utc>>,
    /// Bumped on every login attempt outcome and logout.
    generation: u64,
}

impl SessionState {
    fn is_fresh(&self, window: Duration) -> bool {
        self.validated_at
            .map(|at| Utc::now() - at < window)
            .unwrap_or(false)
    }

    fn rejected(&self) -> Error {
        AuthError::CredentialsRejected {
            username: self.rejected_username.clone().unwrap_or_default(),
        }
        .into()
    }
}

#[derive(Debug, Deserialize)]
struct AuthCheckResponse {
    #[serde(default = "default_ok")]
    ok: bool,
}

fn default_ok() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ConfigResponse {
    #[serde(rename = "apiKey")]
    api_key: String,
}

/// Owns the credential and token lifecycle.
///
/// `ensure_valid` is called before every remote operation. Re-authentication
/// is single-flight: concurrent callers that find the token invalid queue on
/// `login_gate`, and all but the first reuse the token it obtained.
pub struct AuthSession {
    transport: Arc<dyn Transport>,
    store: TokenStore,
    validity_window: Duration,
    state: Mutex<SessionState>,
    login_gate: Mutex<()>,
}

impl AuthSession {
    pub fn new(transport: Arc<dyn Transport>, store: TokenStore) -> Self {
        Self {
            transport,
            store,
            validity_window: Duration::zero(),
            state: Mutex::new(SessionState {
                credentials: None,
                rejected_username: None,
                token: None,
                api_key: None,
                status: SessionStatus::NoToken,
                validated_at: None,
                generation: 0,
            }),
            login_gate: Mutex::new(()),
        }
    }

    /// Trust a validated token for `window` before checking it again.
    /// Zero (the default) validates before every call.
    pub fn with_validity_window(mut self, window: Duration) -> Self {
        self.validity_window = window;
        self
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.status
    }

    pub async fn username(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.credentials.as_ref().map(|c| c.username.clone())
    }

    pub async fn api_key(&self) -> Option<String> {
        self.state.lock().await.api_key.clone()
    }

    /// Seed the credentials used for re-authentication without a network call.
    pub async fn set_credentials(&self, username: &str, password: &str) {
        let mut state = self.state.lock().await;
        state.credentials = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        if state.status == SessionStatus::AuthFailed {
            state.status = if state.token.is_some() {
                SessionStatus::Invalid
            } else {
                SessionStatus::NoToken
            };
        }
    }

    // ===== Persistence =====

    /// Load the cached token from disk. Returns whether one was found.
    pub async fn load_persisted(&self) -> bool {
        let Some(persisted) = self.store.load() else {
            return false;
        };

        let mut state = self.state.lock().await;
        state.token = Some(persisted.token);
        if persisted.api_key.is_some() {
            state.api_key = persisted.api_key;
        }
        state.status = SessionStatus::Unverified;
        state.validated_at = None;
        true
    }

    /// Write the current token to disk.
    pub async fn save_persisted(&self) -> Result<()> {
        let persisted = {
            let state = self.state.lock().await;
            let Some(ref token) = state.token else {
                return Ok(());
            };
            PersistedToken {
                username: state.credentials.as_ref().map(|c| c.username.clone()),
                token: token.clone(),
                api_key: state.api_key.clone(),
                saved_at: Utc::now(),
            }
        };
        self.store.save(&persisted)?;
        Ok(())
    }

    // ===== Remote checks =====

    /// Ask the service whether `token` is still accepted.
    ///
    /// Only an explicit 401 means "invalid"; any other failure is an error.
    pub async fn validate(&self, token: &str) -> Result<bool> {
        let api_key = self.api_key().await;
        let request = ApiRequest::get("/auth").session(token, api_key.as_deref());
        let response = self.transport.execute(request).await?;

        if response.status == 401 {
            debug!("Session token is no longer valid");
            return Ok(false);
        }
        let response = response.error_for_status()?;
        let check: AuthCheckResponse = response.decode("session check")?;
        Ok(check.ok)
    }

    /// Return a token that was accepted by the service, re-authenticating
    /// with the stored credentials if needed.
    pub async fn ensure_valid(&self) -> Result<SessionToken> {
        let (token, status, generation, fresh) = {
            let state = self.state.lock().await;
            if state.status == SessionStatus::AuthFailed {
                return Err(state.rejected());
            }
            (
                state.token.clone(),
                state.status,
                state.generation,
                state.is_fresh(self.validity_window),
            )
        };

        if let Some(token) = token {
            if status == SessionStatus::Validated && fresh {
                return Ok(SessionToken(token));
            }
            if status != SessionStatus::Invalid {
                if self.validate(&token).await? {
                    self.mark_validated(generation).await;
                    return Ok(SessionToken(token));
                }
                self.mark_invalid(generation).await;
            }
        }

        self.reauthenticate(generation).await
    }

    /// Mark `token` invalid after the service answered a call with 401.
    /// Has no effect if the session already moved on to a newer token.
    pub async fn invalidate(&self, token: &SessionToken) {
        let mut state = self.state.lock().await;
        if state.token.as_deref() == Some(token.as_str()) && state.status != SessionStatus::AuthFailed {
            debug!("Session token invalidated by a rejected call");
            state.status = SessionStatus::Invalid;
            state.validated_at = None;
        }
    }

    async fn mark_validated(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation == generation {
            state.status = SessionStatus::Validated;
            state.validated_at = Some(Utc::now());
        }
    }

    async fn mark_invalid(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation == generation {
            state.status = SessionStatus::Invalid;
            state.validated_at = None;
        }
    }

    // ===== Login =====

    /// Authenticate with username and password.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionToken> {
        let _gate = self.login_gate.lock().await;
        self.authenticate(username, password).await
    }

    /// Forget the token in memory and on disk.
    pub async fn logout(&self) -> Result<()> {
        let _gate = self.login_gate.lock().await;
        {
            let mut state = self.state.lock().await;
            state.token = None;
            state.credentials = None;
            state.status = SessionStatus::NoToken;
            state.validated_at = None;
            state.generation += 1;
        }
        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }

    async fn reauthenticate(&self, seen_generation: u64) -> Result<SessionToken> {
        let _gate = self.login_gate.lock().await;

        let credentials = {
            let state = self.state.lock().await;
            if state.generation != seen_generation {
                match (state.status, &state.token) {
                    (SessionStatus::Validated, Some(token)) => {
                        debug!("Reusing token from a concurrent re-authentication");
                        return Ok(SessionToken(token.clone()));
                    }
                    (SessionStatus::AuthFailed, _) => return Err(state.rejected()),
                    _ => {}
                }
            }
            state.credentials.clone().ok_or(AuthError::NotLoggedIn)?
        };

        info!(username = %credentials.username, "Re-authenticating session");
        self.authenticate(&credentials.username, &credentials.password)
            .await
    }

    /// Caller must hold `login_gate`.
    async fn authenticate(&self, username: &str, password: &str) -> Result<SessionToken> {
        let request = ApiRequest::get("/auth/user").basic_auth(username, password);
        let response = self.transport.execute(request).await?;

        if response.status == 401 {
            let mut state = self.state.lock().await;
            state.credentials = None;
            state.rejected_username = Some(username.to_string());
            state.token = None;
            state.status = SessionStatus::AuthFailed;
            state.validated_at = None;
            state.generation += 1;
            drop(state);

            // A stale token on disk would revive the session on restart
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Failed to clear persisted session token");
            }
            warn!(username, "Login rejected");
            return Err(AuthError::InvalidCredentials {
                username: username.to_string(),
            }
            .into());
        }

        let response = response.error_for_status()?;
        let token = response
            .cookie(AUTH_COOKIE)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::Decode("login response carried no auth cookie".to_string()))?;

        let mut api_key = response.cookie(API_KEY_COOKIE).map(str::to_string);
        if api_key.is_none() {
            api_key = self.api_key().await;
        }
        if api_key.is_none() {
            api_key = Some(self.fetch_api_key().await?);
        }

        {
            let mut state = self.state.lock().await;
            state.credentials = Some(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            });
            state.rejected_username = None;
            state.token = Some(token.clone());
            state.api_key = api_key;
            state.status = SessionStatus::Validated;
            state.validated_at = Some(Utc::now());
            state.generation += 1;
        }

        if let Err(e) = self.save_persisted().await {
            warn!(error = %e, "Failed to persist session token");
        }

        info!(username, "Login successful");
        Ok(SessionToken(token))
    }

    /// Fetch the service-wide API key.
    async fn fetch_api_key(&self) -> Result<String> {
        let response = self
            .transport
            .execute(ApiRequest::get("/config"))
            .await?
            .error_for_status()?;
        let config: ConfigResponse = response.decode("service config")?;
        debug!("Fetched API key from service config");
        Ok(config.api_key)
    }
}

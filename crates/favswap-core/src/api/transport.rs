//! HTTP transport seam for the favorites service.
//!
//! Everything above this module speaks in `ApiRequest`/`ApiResponse`; only
//! `ReqwestTransport` knows about reqwest. Tests swap in an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use tracing::debug;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the favorites service.
pub const DEFAULT_API_BASE_URL: &str = "https://vrchat.com/api/1";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth";

/// Cookie carrying the service-wide API key.
pub const API_KEY_COOKIE: &str = "apiKey";

/// The service rejects requests without an identifying user agent.
const USER_AGENT: &str = concat!("favswap/", env!("CARGO_PKG_VERSION"));

/// How a request authenticates itself.
#[derive(Clone)]
pub enum RequestAuth {
    None,
    Basic { username: String, password: String },
    Session { token: String, api_key: Option<String> },
}

impl std::fmt::Debug for RequestAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestAuth::None => write!(f, "None"),
            RequestAuth::Basic { username, .. } => write!(f, "Basic({})", username),
            RequestAuth::Session { .. } => write!(f, "Session(***)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub auth: RequestAuth,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            auth: RequestAuth::None,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        self.auth = RequestAuth::Basic {
            username: username.to_string(),
            password: password.to_string(),
        };
        self
    }

    pub fn session(mut self, token: &str, api_key: Option<&str>) -> Self {
        self.auth = RequestAuth::Session {
            token: token.to_string(),
            api_key: api_key.map(str::to_string),
        };
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    /// Cookies set by the response, in header order.
    pub cookies: Vec<(String, String)>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Turn a non-success response into the matching `ApiError`.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status, &self.body))
        }
    }

    pub fn decode<T: serde::de::DeserializeOwned>(&self, what: &str) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::Decode(format!("{}: {}", what, e)))
    }
}

/// Executes requests against the remote service.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn session_cookie(token: &str, api_key: Option<&str>) -> String {
        match api_key {
            Some(key) => format!("{}={}; {}={}", AUTH_COOKIE, token, API_KEY_COOKIE, key),
            None => format!("{}={}", AUTH_COOKIE, token),
        }
    }
}

/// Parse the `name=value` pair at the front of a `Set-Cookie` header.
pub(crate) fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, url = %url, auth = ?request.auth, "Sending request");

        let mut builder = self.client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.auth {
            RequestAuth::None => builder,
            RequestAuth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            RequestAuth::Session { token, api_key } => {
                builder.header(header::COOKIE, Self::session_cookie(token, api_key.as_deref()))
            }
        };
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();
        let body = response.text().await?;

        debug!(url = %url, status, "Response received");
        Ok(ApiResponse { status, body, cookies })
    }
}

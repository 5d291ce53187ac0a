//! In-memory stand-in for the favorites service, used by unit tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use super::transport::{ApiRequest, ApiResponse, RequestAuth, Transport, API_KEY_COOKIE, AUTH_COOKIE};
use super::{ApiError, RemoteFavoriteClient};
use crate::auth::{AuthSession, TokenStore};

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";
pub const API_KEY: &str = "fake-api-key";

#[derive(Debug, Clone)]
pub struct FakeFavorite {
    pub favorite_id: String,
    pub item_id: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub users: HashMap<String, String>,
    pub valid_tokens: HashSet<String>,
    /// Whether a login response carries the `apiKey` cookie.
    pub login_sets_api_key: bool,
    pub next_id: u64,
    pub favorites: Vec<FakeFavorite>,
    /// Item ids whose add/remove answers with a 500.
    pub fail_items: HashSet<String>,
    /// Item ids whose add/remove fails at the transport level.
    pub unreachable_items: HashSet<String>,
    pub fail_list: bool,
    pub fail_validate: bool,
    /// Answer the next N favorite calls with 401 and expire every token.
    pub force_unauthorized: usize,
    pub login_calls: usize,
    pub validate_calls: usize,
    pub config_calls: usize,
    pub list_calls: usize,
    pub add_calls: usize,
    pub remove_calls: usize,
}

pub struct FakeService {
    pub state: Mutex<FakeState>,
    /// Yield to the scheduler before answering a login, so concurrent
    /// callers pile up behind it.
    pub yield_on_login: bool,
}

impl FakeService {
    pub fn new() -> Self {
        let mut state = FakeState {
            login_sets_api_key: true,
            ..FakeState::default()
        };
        state.users.insert(USERNAME.to_string(), PASSWORD.to_string());
        Self {
            state: Mutex::new(state),
            yield_on_login: false,
        }
    }

    pub fn with_favorites(items: &[&str]) -> Self {
        let service = Self::new();
        for item in items {
            service.favorite(item);
        }
        service
    }

    pub fn favorite(&self, item_id: &str) -> String {
        let mut state = self.state.lock().unwrap();
        Self::insert_favorite(&mut state, item_id, vec!["avatars1".to_string()])
    }

    pub fn favorited_items(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.favorites.iter().map(|f| f.item_id.clone()).collect()
    }

    pub fn issue_token(&self) -> String {
        let mut state = self.state.lock().unwrap();
        Self::new_token(&mut state)
    }

    pub fn expire_tokens(&self) {
        self.state.lock().unwrap().valid_tokens.clear();
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn mutation_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.add_calls + state.remove_calls
    }

    pub fn network_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.login_calls
            + state.validate_calls
            + state.config_calls
            + state.list_calls
            + state.add_calls
            + state.remove_calls
    }

    fn new_token(state: &mut FakeState) -> String {
        state.next_id += 1;
        let token = format!("authcookie_{}", state.next_id);
        state.valid_tokens.insert(token.clone());
        token
    }

    fn insert_favorite(state: &mut FakeState, item_id: &str, tags: Vec<String>) -> String {
        state.next_id += 1;
        let favorite_id = format!("fvrt_{}", state.next_id);
        state.favorites.push(FakeFavorite {
            favorite_id: favorite_id.clone(),
            item_id: item_id.to_string(),
            tags,
        });
        favorite_id
    }

    fn respond(status: u16, body: serde_json::Value) -> Result<ApiResponse, ApiError> {
        Ok(ApiResponse {
            status,
            body: body.to_string(),
            cookies: Vec::new(),
        })
    }

    fn session_ok(state: &FakeState, request: &ApiRequest) -> bool {
        match &request.auth {
            RequestAuth::Session { token, .. } => state.valid_tokens.contains(token),
            _ => false,
        }
    }

    fn query_usize(request: &ApiRequest, key: &str, default: usize) -> usize {
        request
            .query
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(default)
    }

    fn handle(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        let unauthorized = json!({"error": {"message": "Missing Credentials", "status_code": 401}});

        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/config") => {
                state.config_calls += 1;
                Self::respond(200, json!({"apiKey": API_KEY}))
            }
            ("GET", "/auth/user") => {
                state.login_calls += 1;
                let accepted = match &request.auth {
                    RequestAuth::Basic { username, password } => {
                        state.users.get(username) == Some(password)
                    }
                    _ => false,
                };
                if !accepted {
                    return Self::respond(401, unauthorized);
                }
                let token = Self::new_token(&mut state);
                let mut cookies = vec![(AUTH_COOKIE.to_string(), token)];
                if state.login_sets_api_key {
                    cookies.push((API_KEY_COOKIE.to_string(), API_KEY.to_string()));
                }
                Ok(ApiResponse {
                    status: 200,
                    body: json!({"username": USERNAME, "displayName": "Alice"}).to_string(),
                    cookies,
                })
            }
            ("GET", "/auth") => {
                state.validate_calls += 1;
                if state.fail_validate {
                    return Self::respond(503, json!({"error": "maintenance"}));
                }
                if Self::session_ok(&state, request) {
                    Self::respond(200, json!({"ok": true, "token": "redacted"}))
                } else {
                    Self::respond(401, unauthorized)
                }
            }
            (method, path) => {
                if state.force_unauthorized > 0 {
                    state.force_unauthorized -= 1;
                    state.valid_tokens.clear();
                    return Self::respond(401, unauthorized);
                }
                if !Self::session_ok(&state, request) {
                    return Self::respond(401, unauthorized);
                }
                match method {
                    "GET" if path == "/avatars/favorites" => {
                        state.list_calls += 1;
                        if state.fail_list {
                            return Err(ApiError::ConnectionFailed("connection reset".to_string()));
                        }
                        let offset = Self::query_usize(request, "offset", 0);
                        let n = Self::query_usize(request, "n", 60);
                        let page: Vec<serde_json::Value> = state
                            .favorites
                            .iter()
                            .skip(offset)
                            .take(n)
                            .map(|f| {
                                json!({
                                    "id": f.item_id,
                                    "favoriteId": f.favorite_id,
                                    "name": format!("Avatar {}", f.item_id),
                                    "favoriteGroup": f.tags.first(),
                                    "releaseStatus": "public",
                                })
                            })
                            .collect();
                        Self::respond(200, json!(page))
                    }
                    "POST" if path == "/favorites" => {
                        state.add_calls += 1;
                        let body = request.body.clone().unwrap_or_default();
                        let item_id = body["favoriteId"].as_str().unwrap_or_default().to_string();
                        if state.unreachable_items.contains(&item_id) {
                            return Err(ApiError::ConnectionFailed("timed out".to_string()));
                        }
                        if state.fail_items.contains(&item_id) {
                            return Self::respond(500, json!({"error": "boom"}));
                        }
                        if state.favorites.iter().any(|f| f.item_id == item_id) {
                            return Self::respond(
                                400,
                                json!({"error": {"message": "You already have that avatar favorited", "status_code": 400}}),
                            );
                        }
                        let tags = body["tags"]
                            .as_array()
                            .map(|tags| {
                                tags.iter()
                                    .filter_map(|t| t.as_str().map(str::to_string))
                                    .collect()
                            })
                            .unwrap_or_default();
                        let favorite_id = Self::insert_favorite(&mut state, &item_id, tags);
                        Self::respond(
                            200,
                            json!({"id": favorite_id, "favoriteId": item_id, "type": body["type"]}),
                        )
                    }
                    "DELETE" if path.starts_with("/favorites/") => {
                        state.remove_calls += 1;
                        let favorite_id = &path["/favorites/".len()..];
                        let position = state.favorites.iter().position(|f| f.favorite_id == favorite_id);
                        let Some(position) = position else {
                            return Self::respond(404, json!({"error": {"message": "Favorite not found"}}));
                        };
                        let item_id = state.favorites[position].item_id.clone();
                        if state.unreachable_items.contains(&item_id) {
                            return Err(ApiError::ConnectionFailed("timed out".to_string()));
                        }
                        if state.fail_items.contains(&item_id) {
                            return Self::respond(500, json!({"error": "boom"}));
                        }
                        state.favorites.remove(position);
                        Self::respond(200, json!({"success": {"message": "OK"}}))
                    }
                    _ => Self::respond(404, json!({"error": "no such route"})),
                }
            }
        }
    }
}

#[async_trait]
impl Transport for FakeService {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if self.yield_on_login && request.path == "/auth/user" {
            tokio::task::yield_now().await;
        }
        self.handle(&request)
    }
}

/// A session over `service` that already holds valid credentials and token.
pub async fn logged_in_session(service: &Arc<FakeService>, data_dir: &Path) -> Arc<AuthSession> {
    let session = AuthSession::new(service.clone(), TokenStore::new(data_dir));
    session.login(USERNAME, PASSWORD).await.unwrap();
    Arc::new(session)
}

pub async fn logged_in_client(service: &Arc<FakeService>, data_dir: &Path) -> RemoteFavoriteClient {
    let session = logged_in_session(service, data_dir).await;
    RemoteFavoriteClient::new(service.clone(), session)
}

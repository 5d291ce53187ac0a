//! API client for the favorites endpoints.
//!
//! Each operation asks the `AuthSession` for a validated token before it
//! talks to the service. A 401 on the call itself invalidates that token and
//! the call is retried exactly once with a freshly authenticated one.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::{AuthSession, SessionToken};
use crate::error::Result;
use crate::models::favorite::DEFAULT_AVATAR_TAG;
use crate::models::{FavoriteRecord, FavoriteType};

use super::transport::{ApiRequest, ApiResponse, Transport};
use super::ApiError;

/// How the service answered a single add/remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Applied,
    /// The item was already in the requested state.
    AlreadySatisfied,
    Rejected { status: u16, message: String },
}

impl FavoriteOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, FavoriteOutcome::Rejected { .. })
    }

    fn rejected(response: &ApiResponse) -> Self {
        FavoriteOutcome::Rejected {
            status: response.status,
            message: ApiError::truncate_body(&response.body),
        }
    }

    fn from_add(response: &ApiResponse) -> Self {
        if response.is_success() {
            return FavoriteOutcome::Applied;
        }
        let already = response.status == 409
            || (response.status == 400 && response.body.to_lowercase().contains("already"));
        if already {
            FavoriteOutcome::AlreadySatisfied
        } else {
            Self::rejected(response)
        }
    }

    /// A 404 is a failure: the entry id may be stale while the item is
    /// still favorited under a newer one.
    fn from_remove(response: &ApiResponse) -> Self {
        if response.is_success() {
            FavoriteOutcome::Applied
        } else {
            Self::rejected(response)
        }
    }
}

/// One entry of the favorites listing as the service sends it.
#[derive(Debug, Deserialize)]
struct FavoriteEntryResponse {
    id: Option<String>,
    #[serde(rename = "favoriteId")]
    favorite_id: Option<String>,
    name: Option<String>,
    #[serde(rename = "favoriteGroup")]
    favorite_group: Option<String>,
}

impl FavoriteEntryResponse {
    fn into_record(self, index: usize) -> std::result::Result<FavoriteRecord, ApiError> {
        let item_id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Decode(format!("favorite entry {} has no `id`", index)))?;
        let favorite_id = self.favorite_id.filter(|id| !id.is_empty()).ok_or_else(|| {
            ApiError::Decode(format!("favorite entry {} ({}) has no `favoriteId`", index, item_id))
        })?;
        let tag = self
            .favorite_group
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| DEFAULT_AVATAR_TAG.to_string());

        Ok(FavoriteRecord {
            item_id,
            favorite_id,
            kind: FavoriteType::Avatar,
            tags: vec![tag],
            name: self.name,
        })
    }
}

/// Typed operations against the favorites API.
/// Clone is cheap - both fields are shared.
#[derive(Clone)]
pub struct RemoteFavoriteClient {
    transport: Arc<dyn Transport>,
    session: Arc<AuthSession>,
}

impl RemoteFavoriteClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<AuthSession>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    async fn attempt<F>(&self, build: &F, token: &SessionToken) -> Result<ApiResponse>
    where
        F: Fn(&str, Option<&str>) -> ApiRequest,
    {
        let api_key = self.session.api_key().await;
        let request = build(token.as_str(), api_key.as_deref());
        Ok(self.transport.execute(request).await?)
    }

    /// Send an authenticated request, re-authenticating once on 401.
    async fn send_authenticated<F>(&self, build: F) -> Result<ApiResponse>
    where
        F: Fn(&str, Option<&str>) -> ApiRequest,
    {
        let token = self.session.ensure_valid().await?;
        let response = self.attempt(&build, &token).await?;
        if response.status != 401 {
            return Ok(response);
        }

        warn!("Session expired mid-call, re-authenticating once");
        self.session.invalidate(&token).await;
        let token = self.session.ensure_valid().await?;
        let response = self.attempt(&build, &token).await?;
        if response.status == 401 {
            return Err(ApiError::Unauthorized.into());
        }
        Ok(response)
    }

    // ===== Favorites =====

    /// Fetch one page of favorited avatars.
    ///
    /// Callers page to completion themselves; a page shorter than `limit`
    /// is the last one.
    pub async fn list_favorites(
        &self,
        offset: usize,
        limit: usize,
        include_offline: bool,
    ) -> Result<Vec<FavoriteRecord>> {
        let response = self
            .send_authenticated(|token, api_key| {
                ApiRequest::get("/avatars/favorites")
                    .query("offset", offset)
                    .query("n", limit)
                    .query("offline", include_offline)
                    .session(token, api_key)
            })
            .await?
            .error_for_status()?;

        let entries: Vec<FavoriteEntryResponse> = response.decode("favorites listing")?;
        let records = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| entry.into_record(offset + i))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(offset, limit, count = records.len(), "Fetched favorites page");
        Ok(records)
    }

    /// Favorite an avatar. `false` means the service refused; transport
    /// failures are errors.
    pub async fn add_favorite(&self, item_id: &str, tags: &[String]) -> Result<bool> {
        Ok(self
            .add_favorite_detailed(FavoriteType::Avatar, item_id, tags)
            .await?
            .is_success())
    }

    pub async fn add_favorite_detailed(
        &self,
        kind: FavoriteType,
        item_id: &str,
        tags: &[String],
    ) -> Result<FavoriteOutcome> {
        let tags = if tags.is_empty() && kind == FavoriteType::Avatar {
            vec![DEFAULT_AVATAR_TAG.to_string()]
        } else {
            tags.to_vec()
        };
        let body = json!({
            "type": kind.as_str(),
            "favoriteId": item_id,
            "tags": tags,
        });

        let response = self
            .send_authenticated(|token, api_key| {
                ApiRequest::post("/favorites")
                    .json(body.clone())
                    .session(token, api_key)
            })
            .await?;

        let outcome = FavoriteOutcome::from_add(&response);
        debug!(item_id, status = response.status, ?outcome, "Add favorite");
        Ok(outcome)
    }

    /// Remove a favorite entry. Same contract as `add_favorite`.
    pub async fn remove_favorite(&self, favorite_id: &str) -> Result<bool> {
        Ok(self.remove_favorite_detailed(favorite_id).await?.is_success())
    }

    pub async fn remove_favorite_detailed(&self, favorite_id: &str) -> Result<FavoriteOutcome> {
        let path = format!("/favorites/{}", favorite_id);
        let response = self
            .send_authenticated(|token, api_key| ApiRequest::delete(path.as_str()).session(token, api_key))
            .await?;

        let outcome = FavoriteOutcome::from_remove(&response);
        debug!(favorite_id, status = response.status, ?outcome, "Remove favorite");
        Ok(outcome)
    }
}

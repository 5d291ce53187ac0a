use serde::{Deserialize, Serialize};

/// Favorite tag the service assigns to the first avatar favorites list.
pub const DEFAULT_AVATAR_TAG: &str = "avatars1";

/// Kind of object a favorite points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteType {
    #[default]
    Avatar,
    World,
    Friend,
}

impl FavoriteType {
    /// Value of the `type` field the remote API expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            FavoriteType::Avatar => "avatar",
            FavoriteType::World => "world",
            FavoriteType::Friend => "friend",
        }
    }
}

/// A favorited remote item.
///
/// `item_id` is stable across favorite/unfavorite cycles; `favorite_id`
/// names the favorite entry and is only meaningful while the item is
/// favorited remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub item_id: String,
    pub favorite_id: String,
    #[serde(default)]
    pub kind: FavoriteType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FavoriteRecord {
    pub fn new(item_id: impl Into<String>, favorite_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            favorite_id: favorite_id.into(),
            kind: FavoriteType::Avatar,
            tags: vec![DEFAULT_AVATAR_TAG.to_string()],
            name: None,
        }
    }
}

//! Data models for favorites and local groups.
//!
//! - `FavoriteRecord`, `FavoriteType`: one favorited remote item
//! - `Group`, `GroupSummary`: named local snapshots of favorites

pub mod favorite;
pub mod group;

pub use favorite::{FavoriteRecord, FavoriteType};
pub use group::{Group, GroupSummary};

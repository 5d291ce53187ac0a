//! favswap-core - swap named groups of favorites in and out of a remote
//! account whose favorite list is capped.
//!
//! Groups are saved locally (`groups`), and the live favorite set is
//! changed through an authenticated client (`api`, `auth`). `sync` ties
//! them together: snapshot the live set into a group, load or unload a
//! group, or switch to another group with a backup taken first.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod groups;
pub mod models;
pub mod sync;

pub use api::{ApiError, FavoriteOutcome, RemoteFavoriteClient, ReqwestTransport, Transport};
pub use app::App;
pub use auth::{AuthSession, SessionStatus, SessionToken, TokenStore};
pub use config::Config;
pub use error::{AuthError, Error, Result};
pub use groups::GroupStore;
pub use models::{FavoriteRecord, FavoriteType, Group, GroupSummary};
pub use sync::{BatchReport, GroupSyncEngine, SnapshotReport, SwitchOutcome, SwitchReport, SyncOptions};

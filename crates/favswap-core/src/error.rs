//! Typed failures returned by the session, the group store, and the sync engine.

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password for {username}")]
    InvalidCredentials { username: String },

    #[error("Not logged in - no credentials available to authenticate")]
    NotLoggedIn,

    #[error("Credentials for {username} were rejected; log in again")]
    CredentialsRejected { username: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("A group named '{0}' already exists")]
    DuplicateGroup(String),

    #[error("No group named '{0}'")]
    GroupNotFound(String),

    #[error("Invalid group name: {0:?}")]
    InvalidGroupName(String),

    #[error("Target and backup group must differ (both are '{0}')")]
    SameGroup(String),

    #[error("{} of {attempted} items failed to {action} for group '{group}'", failed_ids.len())]
    PartialBatchFailure {
        group: String,
        action: &'static str,
        attempted: usize,
        failed_ids: Vec<String>,
    },

    #[error("Switch aborted while saving backup group '{backup}': {source}")]
    SwitchAborted {
        backup: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

//! REST API client module for the favorites service.
//!
//! This module provides the `RemoteFavoriteClient` for listing, adding and
//! removing favorites. Every call obtains a validated token from the
//! `AuthSession` first; the wire transport sits behind the `Transport` trait.

pub mod client;
pub mod error;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{FavoriteOutcome, RemoteFavoriteClient};
pub use error::ApiError;
pub use transport::{
    ApiRequest, ApiResponse, RequestAuth, ReqwestTransport, Transport, API_KEY_COOKIE,
    AUTH_COOKIE, DEFAULT_API_BASE_URL,
};

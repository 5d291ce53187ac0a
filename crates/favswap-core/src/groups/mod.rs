//! Local group storage.
//!
//! This module provides the `GroupStore`, the single owner of the named
//! groups and their on-disk file. The collection is stored as versioned
//! JSON and rewritten in full on every mutation.

pub mod store;

pub use store::{GroupStore, FORMAT_VERSION};

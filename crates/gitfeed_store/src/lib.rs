//! # gitfeed Store
//!
//! Versioned store abstraction and git backend for gitfeed.
//!
//! The versioned store is the transport and log of the change feed: a
//! producer commits path-addressed record files, consumers diff between the
//! version they last applied and a target version. This crate defines the
//! boundary the engine relies on and ships two implementations.
//!
//! ## Design Principles
//!
//! - [`VersionPointer`]s are opaque; they are compared by identity and never
//!   parsed outside the store
//! - Diffs are returned as ordered [`DiffEntry`] sequences with the content
//!   at the new version already loaded
//! - Network operations are synchronous and bounded by [`NetworkLimits`]
//! - Stores must be `Send + Sync`
//!
//! ## Available Stores
//!
//! - [`GitStore`] - git repositories through libgit2
//! - [`MockStore`] - scripted diffs for tests

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod diff;
mod error;
mod git;
mod limits;
mod mock;
mod pointer;
mod store;

pub use diff::DiffEntry;
pub use error::{LimitKind, StoreError, StoreResult};
pub use git::GitStore;
pub use limits::NetworkLimits;
pub use mock::{MockStore, StoreCall};
pub use pointer::VersionPointer;
pub use store::{VersionedStore, WalkOrder};

/// Name of the remote a consumer fetches from.
pub const DEFAULT_REMOTE: &str = "origin";

/// Name of the primary branch producers commit to and push.
pub const PRIMARY_BRANCH: &str = "master";

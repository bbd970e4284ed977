//! # gitfeed Testkit
//!
//! Test utilities for gitfeed.
//!
//! This crate provides:
//! - Temporary feed layouts with a bare remote, a producer and consumers
//! - An in-memory record category that records what was applied to it
//! - Property-based generators for records and diffs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gitfeed_testkit::prelude::*;
//!
//! let feed = TestFeed::new();
//! let producer_config = feed.producer_config().build()?;
//! let posts = MemoryCategory::new("Post");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod memory;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::memory::*;
}

pub use fixtures::*;
pub use generators::*;
pub use memory::*;

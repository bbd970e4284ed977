//! Temporary feed layouts.
//!
//! ```text
//! <tmp>/
//! ├─ remote.git/     # bare repository producers push to
//! ├─ producer/       # producer working tree
//! └─ <consumer>/     # bare clones, one per consumer
//! ```

use gitfeed_codec::Record;
use gitfeed_core::ConfigBuilder;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory laid out as a feed.
pub struct TestFeed {
    temp_dir: TempDir,
}

impl TestFeed {
    /// Creates a feed with an empty bare remote.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut opts = git2::RepositoryInitOptions::new();
        opts.bare(true).initial_head("master");
        git2::Repository::init_opts(temp_dir.path().join("remote.git"), &opts)
            .expect("Failed to create bare remote");
        Self { temp_dir }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the bare remote's path.
    pub fn remote_path(&self) -> PathBuf {
        self.root().join("remote.git")
    }

    /// Returns the bare remote as a URL-like string for configuration.
    pub fn remote_url(&self) -> String {
        self.remote_path().display().to_string()
    }

    /// Returns the producer's working tree path.
    pub fn producer_path(&self) -> PathBuf {
        self.root().join("producer")
    }

    /// Configuration for a producer that pushes to the remote.
    pub fn producer_config(&self) -> ConfigBuilder {
        ConfigBuilder::new(self.producer_path()).repo_push_url(self.remote_url())
    }

    /// Configuration for a consumer that clones from the remote into
    /// `<root>/<name>`.
    pub fn consumer_config(&self, name: &str) -> ConfigBuilder {
        ConfigBuilder::new(self.root().join(name)).repo_url(self.remote_url())
    }

    /// Configuration for a consumer reading the producer's repository in
    /// place. It shares the producer's lock.
    pub fn local_consumer_config(&self) -> ConfigBuilder {
        ConfigBuilder::new(self.producer_path())
    }
}

impl Default for TestFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a record from a JSON object literal.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn record(value: serde_json::Value) -> Record {
    gitfeed_codec::record_from_value(value).expect("record must be a JSON object")
}

//! Engine configuration.
//!
//! A [`Config`] is built once with [`ConfigBuilder`] (or loaded from a
//! [`ConfigFile`]) and shared as `Arc<Config>` between engines and record
//! handlers. Repository settings are fixed at build time; mappings, the
//! category registry, the ordering, the version manager and the active
//! producer can change at runtime and sit behind locks.

use crate::category::{Category, RecordCategory};
use crate::changeset::{CategoryResolver, Resolution};
use crate::error::{CoreError, CoreResult};
use crate::lock::FileLock;
use crate::mapping::ClassMapping;
use crate::registry::CategoryRegistry;
use crate::version::VersionManager;
use crate::writeback::RecordWriter;
use gitfeed_codec::RecordFormat;
use gitfeed_store::{NetworkLimits, DEFAULT_REMOTE, PRIMARY_BRANCH};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::warn;

/// Shared engine configuration.
pub struct Config {
    repo_path: PathBuf,
    repo_url: Option<String>,
    repo_push_url: Option<String>,
    lock: FileLock,
    format: RecordFormat,
    limits: NetworkLimits,
    remote_name: String,
    branch: String,
    ordering: RwLock<Option<Vec<Category>>>,
    mappings: RwLock<ClassMapping>,
    registry: RwLock<CategoryRegistry>,
    version_manager: RwLock<Option<Arc<dyn VersionManager>>>,
    producer: RwLock<Option<Weak<dyn RecordWriter>>>,
}

impl Config {
    /// Starts building a configuration for the repository at `repo_path`.
    pub fn builder(repo_path: impl Into<PathBuf>) -> ConfigBuilder {
        ConfigBuilder::new(repo_path)
    }

    /// Returns the local repository path.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Returns the URL consumers fetch from, if any.
    pub fn repo_url(&self) -> Option<&str> {
        self.repo_url.as_deref()
    }

    /// Returns the URL producers push to, if any.
    pub fn repo_push_url(&self) -> Option<&str> {
        self.repo_push_url.as_deref()
    }

    /// Returns the lock file path.
    pub fn lock_file(&self) -> &Path {
        self.lock.path()
    }

    /// Returns the record file format.
    pub fn format(&self) -> RecordFormat {
        self.format
    }

    /// Returns the network limits.
    pub fn limits(&self) -> NetworkLimits {
        self.limits
    }

    /// Returns the remote name consumers fetch from.
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    /// Returns the branch producers commit to and push.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Returns true if no fetch URL is configured.
    pub fn local(&self) -> bool {
        self.repo_url.is_none()
    }

    /// Returns true if a fetch URL is configured.
    pub fn remote(&self) -> bool {
        !self.local()
    }

    /// Returns true if a push URL is configured.
    pub fn remote_push(&self) -> bool {
        self.repo_push_url.is_some()
    }

    /// Returns the category ordering, if one is set.
    pub fn ordering(&self) -> Option<Vec<Category>> {
        self.ordering.read().clone()
    }

    /// Sets or clears the category ordering.
    pub fn set_ordering<I, C>(&self, ordering: Option<I>)
    where
        I: IntoIterator<Item = C>,
        C: Into<Category>,
    {
        *self.ordering.write() = ordering.map(|o| o.into_iter().map(Into::into).collect());
    }

    /// Appends consumer categories for a producer category.
    pub fn map_class<I, C>(&self, producer: impl Into<Category>, consumers: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Category>,
    {
        self.mappings.write().map(producer, consumers);
    }

    /// Removes every class mapping.
    pub fn clear_mappings(&self) {
        self.mappings.write().clear();
    }

    /// Returns a snapshot of the mapping table.
    pub fn mappings(&self) -> ClassMapping {
        self.mappings.read().clone()
    }

    /// Registers a consumer category handle.
    pub fn register(&self, name: impl Into<Category>, handle: Arc<dyn RecordCategory>) {
        self.registry.write().register(name, handle);
    }

    /// Resolves a registered category handle.
    pub fn category(&self, name: &str) -> Option<Arc<dyn RecordCategory>> {
        self.registry.read().get(name)
    }

    /// Returns registered category names, sorted.
    pub fn registered_categories(&self) -> Vec<Category> {
        self.registry.read().names()
    }

    /// Returns the registered consumer categories mapped for `producer`.
    ///
    /// Mapped names with no registered handle are logged and dropped.
    pub fn consumer_classes_for(&self, producer: &Category) -> Vec<Category> {
        let mappings = self.mappings.read();
        let registry = self.registry.read();
        mappings
            .get(producer.as_str())
            .iter()
            .filter(|consumer| {
                let known = registry.contains(consumer.as_str());
                if !known {
                    warn!(
                        producer = %producer,
                        consumer = %consumer,
                        "mapped category is not registered; skipping"
                    );
                }
                known
            })
            .cloned()
            .collect()
    }

    /// Returns a resolver applying `resolution` to this configuration.
    pub fn resolver(&self, resolution: Resolution) -> ConfigResolver<'_> {
        ConfigResolver {
            config: self,
            resolution,
        }
    }

    /// Installs the version manager.
    pub fn set_version_manager(&self, manager: Arc<dyn VersionManager>) {
        *self.version_manager.write() = Some(manager);
    }

    /// Returns the version manager.
    ///
    /// # Errors
    ///
    /// Returns `VersionManagerUnconfigured` if none is installed.
    pub fn version_manager(&self) -> CoreResult<Arc<dyn VersionManager>> {
        self.version_manager
            .read()
            .clone()
            .ok_or(CoreError::VersionManagerUnconfigured)
    }

    /// Records the active producer used for write-back. Only a weak
    /// reference is kept.
    pub fn set_producer(&self, writer: Weak<dyn RecordWriter>) {
        *self.producer.write() = Some(writer);
    }

    /// Returns the active producer, if it is still alive.
    pub fn producer(&self) -> Option<Arc<dyn RecordWriter>> {
        self.producer.read().as_ref().and_then(Weak::upgrade)
    }

    /// Runs `section` while holding the cross-process lock.
    ///
    /// The section does not run if the lock is held elsewhere; the caller
    /// gets `LockUnavailable` converted into its own error type. The lock is
    /// released when the section returns or unwinds.
    pub fn lock<T, E, F>(&self, section: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<CoreError>,
    {
        let Some(_guard) = self.lock.try_acquire()? else {
            warn!(path = %self.lock.path().display(), "could not acquire lock, skipping");
            return Err(E::from(CoreError::LockUnavailable {
                path: self.lock.path().display().to_string(),
            }));
        };
        section()
    }

    /// Clears runtime state: ordering, mappings, registry, version manager
    /// and producer.
    pub fn reset(&self) {
        *self.ordering.write() = None;
        self.mappings.write().clear();
        self.registry.write().clear();
        *self.version_manager.write() = None;
        *self.producer.write() = None;
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("repo_path", &self.repo_path)
            .field("repo_url", &self.repo_url)
            .field("repo_push_url", &self.repo_push_url)
            .field("lock_file", &self.lock.path())
            .field("format", &self.format)
            .field("limits", &self.limits)
            .field("ordering", &*self.ordering.read())
            .field("mappings", &*self.mappings.read())
            .field("registry", &*self.registry.read())
            .finish_non_exhaustive()
    }
}

/// [`CategoryResolver`] over a [`Config`].
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    config: &'a Config,
    resolution: Resolution,
}

impl CategoryResolver for ConfigResolver<'_> {
    fn resolve(&self, producer: &Category) -> Vec<Category> {
        let consumers = self.config.consumer_classes_for(producer);
        match self.resolution {
            Resolution::MappedOrSelf if consumers.is_empty() => vec![producer.clone()],
            _ => consumers,
        }
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    repo_path: PathBuf,
    repo_url: Option<String>,
    repo_push_url: Option<String>,
    lock_file: Option<PathBuf>,
    format: RecordFormat,
    limits: NetworkLimits,
    remote_name: String,
    branch: String,
    ordering: Option<Vec<Category>>,
    mappings: ClassMapping,
}

impl ConfigBuilder {
    /// Creates a builder with default settings.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            repo_url: None,
            repo_push_url: None,
            lock_file: None,
            format: RecordFormat::default(),
            limits: NetworkLimits::default(),
            remote_name: DEFAULT_REMOTE.to_string(),
            branch: PRIMARY_BRANCH.to_string(),
            ordering: None,
            mappings: ClassMapping::new(),
        }
    }

    /// Sets the URL consumers fetch from.
    #[must_use]
    pub fn repo_url(mut self, url: impl Into<String>) -> Self {
        self.repo_url = Some(url.into());
        self
    }

    /// Sets the URL producers push to.
    #[must_use]
    pub fn repo_push_url(mut self, url: impl Into<String>) -> Self {
        self.repo_push_url = Some(url.into());
        self
    }

    /// Sets the lock file path. Defaults to `<repo_path>.lock`.
    #[must_use]
    pub fn lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = Some(path.into());
        self
    }

    /// Sets the record file format.
    #[must_use]
    pub fn format(mut self, format: RecordFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the network limits.
    #[must_use]
    pub fn limits(mut self, limits: NetworkLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the remote name consumers fetch from.
    #[must_use]
    pub fn remote_name(mut self, name: impl Into<String>) -> Self {
        self.remote_name = name.into();
        self
    }

    /// Sets the branch producers commit to and push.
    #[must_use]
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Sets the category ordering.
    #[must_use]
    pub fn ordering<I, C>(mut self, ordering: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Category>,
    {
        self.ordering = Some(ordering.into_iter().map(Into::into).collect());
        self
    }

    /// Appends consumer categories for a producer category.
    #[must_use]
    pub fn map_class<I, C>(mut self, producer: impl Into<Category>, consumers: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Category>,
    {
        self.mappings.map(producer, consumers);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the repository path is empty.
    pub fn build(self) -> CoreResult<Config> {
        if self.repo_path.as_os_str().is_empty() {
            return Err(CoreError::invalid_config("repo_path must not be empty"));
        }
        let lock_file = self
            .lock_file
            .unwrap_or_else(|| default_lock_file(&self.repo_path));

        Ok(Config {
            repo_path: self.repo_path,
            repo_url: self.repo_url,
            repo_push_url: self.repo_push_url,
            lock: FileLock::new(lock_file),
            format: self.format,
            limits: self.limits,
            remote_name: self.remote_name,
            branch: self.branch,
            ordering: RwLock::new(self.ordering),
            mappings: RwLock::new(self.mappings),
            registry: RwLock::new(CategoryRegistry::new()),
            version_manager: RwLock::new(None),
            producer: RwLock::new(None),
        })
    }
}

fn default_lock_file(repo_path: &Path) -> PathBuf {
    let mut name = repo_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// On-disk configuration, loaded from JSON.
///
/// ```json
/// {
///   "repo_path": "/var/lib/feed/repo",
///   "repo_url": "https://example.com/feed.git",
///   "ordering": ["Author", "Post"],
///   "mappings": { "BlogPost": ["Post", "SearchEntry"] },
///   "network": { "timeout_secs": 30 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Local repository path.
    pub repo_path: PathBuf,
    /// URL consumers fetch from.
    pub repo_url: Option<String>,
    /// URL producers push to.
    pub repo_push_url: Option<String>,
    /// Lock file path.
    pub lock_file: Option<PathBuf>,
    /// Record file format.
    pub format: RecordFormat,
    /// Category ordering.
    pub ordering: Option<Vec<String>>,
    /// Producer category to consumer categories.
    pub mappings: BTreeMap<String, Vec<String>>,
    /// Network limits.
    pub network: NetworkSection,
}

/// Network settings in a [`ConfigFile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSection {
    /// Per-operation timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Largest object accepted from the store, in bytes.
    pub max_object_size: Option<u64>,
}

impl ConfigFile {
    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_slice(&data).map_err(|e| match e {
            CoreError::InvalidConfig { message } => {
                CoreError::invalid_config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Parses configuration JSON.
    pub fn from_slice(data: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(data).map_err(|e| CoreError::invalid_config(e.to_string()))
    }

    /// Converts the file into a builder.
    pub fn into_builder(self) -> ConfigBuilder {
        let mut limits = NetworkLimits::default();
        if let Some(secs) = self.network.timeout_secs {
            limits = limits.with_timeout(Duration::from_secs(secs));
        }
        if let Some(max) = self.network.max_object_size {
            limits = limits.with_max_object_size(max);
        }

        let mut builder = ConfigBuilder::new(self.repo_path)
            .format(self.format)
            .limits(limits);
        if let Some(url) = self.repo_url {
            builder = builder.repo_url(url);
        }
        if let Some(url) = self.repo_push_url {
            builder = builder.repo_push_url(url);
        }
        if let Some(path) = self.lock_file {
            builder = builder.lock_file(path);
        }
        if let Some(ordering) = self.ordering {
            builder = builder.ordering(ordering);
        }
        for (producer, consumers) in self.mappings {
            builder = builder.map_class(producer, consumers);
        }
        builder
    }
}

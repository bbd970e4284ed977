//! CLI command implementations.

pub mod changes;
pub mod commit;
pub mod history;
pub mod rollback;
pub mod status;
pub mod update;

use gitfeed_core::{Config, ConfigFile, FileVersionManager, StoreVersionManager};
use gitfeed_store::GitStore;
use gitfeed_sync::{Consumer, CycleReport, Producer};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loaded configuration shared by every command.
pub struct Context {
    /// The feed configuration.
    pub config: Arc<Config>,
    state_path: PathBuf,
}

impl Context {
    /// Loads `config_path`. The consumer state file defaults to
    /// `<repo_path>.version`.
    pub fn load(
        config_path: &Path,
        state_path: Option<PathBuf>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config = ConfigFile::load(config_path)?.into_builder().build()?;
        let state_path = state_path.unwrap_or_else(|| {
            let mut path = config.repo_path().as_os_str().to_owned();
            path.push(".version");
            PathBuf::from(path)
        });
        Ok(Self {
            config: Arc::new(config),
            state_path,
        })
    }

    /// Opens the configured repository without modifying it.
    pub fn open_store(&self) -> Result<Arc<GitStore>, Box<dyn std::error::Error>> {
        Ok(Arc::new(GitStore::open(
            self.config.repo_path(),
            self.config.limits(),
        )?))
    }

    /// Opens the producer, bootstrapping the repository if needed. The
    /// version manager follows the repository's own history.
    pub fn producer(&self) -> Result<Producer, Box<dyn std::error::Error>> {
        let producer = Producer::open(Arc::clone(&self.config))?;
        let manager = StoreVersionManager::new(Arc::clone(producer.store()))
            .with_branch(self.config.branch());
        self.config.set_version_manager(Arc::new(manager));
        Ok(producer)
    }

    /// Opens a consumer whose version pointer lives in the state file.
    pub fn consumer(&self) -> Result<Consumer, Box<dyn std::error::Error>> {
        let manager = FileVersionManager::open(&self.state_path)?;
        self.config.set_version_manager(Arc::new(manager));
        Ok(Consumer::open(Arc::clone(&self.config))?)
    }
}

/// Printable summary of a finished cycle.
#[derive(Debug, Serialize)]
pub struct CycleSummary {
    /// Version the cycle started from.
    pub from: String,
    /// Version now recorded as applied.
    pub to: String,
    /// Categories applied, in order.
    pub categories: Vec<String>,
    /// Changes applied.
    pub applied: usize,
    /// Changes skipped.
    pub skipped: usize,
    /// Deferred tasks run.
    pub callbacks: usize,
    /// Duration in milliseconds.
    pub duration_ms: u128,
}

impl From<&CycleReport> for CycleSummary {
    fn from(report: &CycleReport) -> Self {
        Self {
            from: report.from.to_string(),
            to: report.to.to_string(),
            categories: report.categories.iter().map(ToString::to_string).collect(),
            applied: report.changes_applied,
            skipped: report.changes_skipped,
            callbacks: report.callbacks_run,
            duration_ms: report.duration.as_millis(),
        }
    }
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

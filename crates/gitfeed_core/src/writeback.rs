//! Producer-side record files and write-back.
//!
//! [`WorkingTree`] writes and removes record files in a producer's working
//! tree. Application records opt into the feed by implementing
//! [`ProducerRecord`]; [`write_back`] and [`remove_back`] route them through
//! whichever producer is registered on the [`Config`].

use crate::category::Category;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::naming;
use gitfeed_codec::{FileContent, Record, RecordFormat};
use gitfeed_store::VersionedStore;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Writes record files on behalf of a producer.
pub trait RecordWriter: Send + Sync {
    /// Returns the format records are written in.
    fn format(&self) -> RecordFormat;

    /// Returns true if `name` exists in the working tree.
    fn file_exists(&self, name: &str) -> bool;

    /// Writes `content` to `name`, creating directories as needed, and
    /// stages it if `add` is set.
    fn write_file(&self, name: &str, content: FileContent, add: bool) -> CoreResult<()>;

    /// Removes `name` from the working tree if present.
    fn remove_file(&self, name: &str) -> CoreResult<()>;
}

/// A producer's working tree.
pub struct WorkingTree {
    root: PathBuf,
    format: RecordFormat,
    store: Arc<dyn VersionedStore>,
}

impl WorkingTree {
    /// Creates a working tree rooted at `root`, staging through `store`.
    pub fn new(root: impl Into<PathBuf>, format: RecordFormat, store: Arc<dyn VersionedStore>) -> Self {
        Self {
            root: root.into(),
            format,
            store,
        }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> CoreResult<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(CoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("record file name must be relative to the repository: {name}"),
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl RecordWriter for WorkingTree {
    fn format(&self) -> RecordFormat {
        self.format
    }

    fn file_exists(&self, name: &str) -> bool {
        self.resolve(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn write_file(&self, name: &str, content: FileContent, add: bool) -> CoreResult<()> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content.to_bytes(self.format)?)?;
        debug!(file = name, staged = add, "wrote record file");
        if add {
            self.store.add(name)?;
        }
        Ok(())
    }

    fn remove_file(&self, name: &str) -> CoreResult<()> {
        let path = self.resolve(name)?;
        if path.is_file() {
            fs::remove_file(&path)?;
            debug!(file = name, "removed record file");
        }
        Ok(())
    }
}

impl fmt::Debug for WorkingTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkingTree")
            .field("root", &self.root)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// An application record published through the feed.
pub trait ProducerRecord {
    /// Category the record belongs to, e.g. `NsyncTestFoo`.
    fn category(&self) -> Category;

    /// Stable id; becomes the file name.
    fn sync_id(&self) -> String;

    /// Structured form written to the record file.
    fn to_record(&self) -> Record;

    /// Whether the record should currently be published. A record that
    /// stops qualifying has its file removed on the next write-back.
    fn should_sync(&self) -> bool {
        true
    }
}

/// Outcome of [`write_back`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBack {
    /// The record file was written.
    Written,
    /// The record no longer qualifies and its file was removed.
    Removed,
    /// The record does not qualify and had no file.
    Unchanged,
}

/// Returns the repository-relative path of a record's file.
pub fn record_path<R: ProducerRecord + ?Sized>(record: &R, format: RecordFormat) -> String {
    naming::record_file_name(
        record.category().as_str(),
        &record.sync_id(),
        format.extension(),
    )
}

/// Writes a record's file through the active producer, or removes it if the
/// record no longer qualifies.
///
/// # Errors
///
/// Returns `NoActiveProducer` if no live producer is registered.
pub fn write_back<R: ProducerRecord + ?Sized>(config: &Config, record: &R) -> CoreResult<WriteBack> {
    let writer = config.producer().ok_or(CoreError::NoActiveProducer)?;
    let path = record_path(record, writer.format());

    if record.should_sync() {
        writer.write_file(&path, FileContent::Record(record.to_record()), false)?;
        Ok(WriteBack::Written)
    } else if writer.file_exists(&path) {
        writer.remove_file(&path)?;
        Ok(WriteBack::Removed)
    } else {
        Ok(WriteBack::Unchanged)
    }
}

/// Removes a record's file through the active producer. Returns true if a
/// file was removed.
pub fn remove_back<R: ProducerRecord + ?Sized>(config: &Config, record: &R) -> CoreResult<bool> {
    let writer = config.producer().ok_or(CoreError::NoActiveProducer)?;
    let path = record_path(record, writer.format());
    if !writer.file_exists(&path) {
        return Ok(false);
    }
    writer.remove_file(&path)?;
    Ok(true)
}

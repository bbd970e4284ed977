//! libgit2-backed versioned store.

use crate::diff::DiffEntry;
use crate::error::{LimitKind, StoreError, StoreResult};
use crate::limits::NetworkLimits;
use crate::pointer::VersionPointer;
use crate::store::{VersionedStore, WalkOrder};
use git2::build::RepoBuilder;
use git2::{
    Delta, Diff, DiffOptions, FetchOptions, Oid, PushOptions, RemoteCallbacks,
    Repository, RepositoryInitOptions, ResetType, Signature, Sort,
};
use parking_lot::Mutex;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::Instant;

const FALLBACK_NAME: &str = "gitfeed";
const FALLBACK_EMAIL: &str = "gitfeed@localhost";

/// A [`VersionedStore`] over a git repository.
///
/// Producers use a repository with a working tree; consumers usually hold a
/// bare replica cloned from the producer's push destination.
///
/// # Thread Safety
///
/// The repository handle is guarded by a mutex, so a `GitStore` can be
/// shared across threads. Every operation takes the mutex for its whole
/// duration.
pub struct GitStore {
    repo: Mutex<Repository>,
    path: PathBuf,
    limits: NetworkLimits,
}

impl std::fmt::Debug for GitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitStore")
            .field("path", &self.path)
            .field("limits", &self.limits)
            .finish()
    }
}

impl GitStore {
    /// Opens an existing repository.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoSuchRepository`] if nothing exists at `path`.
    pub fn open(path: &Path, limits: NetworkLimits) -> StoreResult<Self> {
        if !path.exists() {
            return Err(StoreError::NoSuchRepository {
                path: path.display().to_string(),
            });
        }
        let repo = Repository::open(path)?;
        Ok(Self::wrap(repo, path, limits))
    }

    /// Initializes a new repository with a working tree whose HEAD points
    /// at `branch`.
    pub fn init(path: &Path, branch: &str, limits: NetworkLimits) -> StoreResult<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(branch);
        let repo = Repository::init_opts(path, &opts)?;
        tracing::info!(path = %path.display(), "initialized repository");
        Ok(Self::wrap(repo, path, limits))
    }

    /// Clones `branch` of `source` into a new bare repository at
    /// `destination`.
    pub fn clone_bare(
        source: &str,
        destination: &Path,
        branch: &str,
        limits: NetworkLimits,
    ) -> StoreResult<Self> {
        let started = Instant::now();
        let tripped = Cell::new(None);
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(bounded_transfer(&limits, started, &tripped));

        let result = RepoBuilder::new()
            .bare(true)
            .branch(branch)
            .fetch_options(fetch)
            .clone(source, destination);
        let repo = check_limit(result, &tripped, "clone")?;

        tracing::info!(source, destination = %destination.display(), "cloned bare replica");
        Ok(Self::wrap(repo, destination, limits))
    }

    fn wrap(repo: Repository, path: &Path, limits: NetworkLimits) -> Self {
        Self {
            repo: Mutex::new(repo),
            path: path.to_path_buf(),
            limits,
        }
    }

    /// Returns the repository path this store was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the limits applied to network operations.
    pub fn limits(&self) -> NetworkLimits {
        self.limits
    }

    /// Returns true if the repository is bare.
    pub fn is_bare(&self) -> bool {
        self.repo.lock().is_bare()
    }

    fn resolve(repo: &Repository, pointer: &VersionPointer) -> StoreResult<Oid> {
        let object = repo
            .revparse_single(pointer.as_str())
            .map_err(|_| StoreError::unknown_version(pointer.as_str()))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| StoreError::unknown_version(pointer.as_str()))?;
        Ok(commit.id())
    }

    fn signature(repo: &Repository) -> StoreResult<Signature<'static>> {
        match repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?),
        }
    }

    fn commit_index(repo: &Repository, message: &str) -> StoreResult<VersionPointer> {
        let mut index = repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let sig = Self::signature(repo)?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) if e.code() == git2::ErrorCode::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(VersionPointer::new(oid.to_string()))
    }

    /// Converts a libgit2 diff into entries, loading new-version content.
    fn collect_entries(
        &self,
        repo: &Repository,
        diff: &Diff<'_>,
        read_workdir: bool,
    ) -> StoreResult<Vec<DiffEntry>> {
        let workdir = repo.workdir().map(Path::to_path_buf);
        let mut entries = Vec::with_capacity(diff.deltas().len());

        for delta in diff.deltas() {
            let added = matches!(delta.status(), Delta::Added | Delta::Untracked);
            let deleted = delta.status() == Delta::Deleted;
            let old_path = if added {
                None
            } else {
                delta.old_file().path().map(path_string)
            };
            let new_path = if deleted {
                None
            } else {
                delta.new_file().path().map(path_string)
            };

            let content = match (&new_path, deleted) {
                (Some(path), false) => {
                    if read_workdir {
                        self.read_workdir_file(workdir.as_deref(), path)?
                    } else {
                        self.read_blob(repo, delta.new_file().id())?
                    }
                }
                _ => None,
            };

            entries.push(DiffEntry {
                old_path,
                new_path,
                added,
                deleted,
                content,
            });
        }

        Ok(entries)
    }

    fn read_blob(&self, repo: &Repository, id: Oid) -> StoreResult<Option<Vec<u8>>> {
        if id.is_zero() {
            return Ok(None);
        }
        let blob = repo.find_blob(id)?;
        self.check_size(blob.size() as u64, "diff")?;
        Ok(Some(blob.content().to_vec()))
    }

    fn read_workdir_file(&self, workdir: Option<&Path>, path: &str) -> StoreResult<Option<Vec<u8>>> {
        let Some(root) = workdir else {
            return Ok(None);
        };
        let full = root.join(path);
        if !full.is_file() {
            return Ok(None);
        }
        self.check_size(std::fs::metadata(&full)?.len(), "diff")?;
        Ok(Some(std::fs::read(full)?))
    }

    fn check_size(&self, size: u64, operation: &'static str) -> StoreResult<()> {
        if size > self.limits.max_object_size {
            return Err(StoreError::LimitExceeded {
                operation,
                kind: LimitKind::ObjectSize(self.limits.max_object_size),
            });
        }
        Ok(())
    }

    /// Finds the commit recorded in FETCH_HEAD for `branch`, falling back to
    /// the remote-tracking ref.
    fn fetched_head(repo: &Repository, remote: &str, branch: &str) -> StoreResult<Oid> {
        let wanted = format!("refs/heads/{branch}");
        let mut found: Option<Oid> = None;
        let mut first_merge: Option<Oid> = None;

        // FETCH_HEAD is absent when the fetch brought nothing new on some
        // transports; the tracking ref still names the remote head then.
        let _ = repo.fetchhead_foreach(|name, _url, oid, is_merge| {
            if name == wanted {
                found = Some(*oid);
                return false;
            }
            if is_merge && first_merge.is_none() {
                first_merge = Some(*oid);
            }
            true
        });

        if let Some(oid) = found.or(first_merge) {
            return Ok(oid);
        }

        let tracking = format!("refs/remotes/{remote}/{branch}");
        let reference = repo
            .find_reference(&tracking)
            .map_err(|_| StoreError::unknown_version(tracking.clone()))?;
        reference
            .target()
            .ok_or_else(|| StoreError::unknown_version(tracking))
    }
}

impl VersionedStore for GitStore {
    fn head(&self) -> StoreResult<VersionPointer> {
        let repo = self.repo.lock();
        let commit = repo.head()?.peel_to_commit()?;
        Ok(VersionPointer::new(commit.id().to_string()))
    }

    fn diff(&self, from: &VersionPointer, to: &VersionPointer) -> StoreResult<Vec<DiffEntry>> {
        let repo = self.repo.lock();
        let old_tree = repo.find_commit(Self::resolve(&repo, from)?)?.tree()?;
        let new_tree = repo.find_commit(Self::resolve(&repo, to)?)?.tree()?;

        let mut opts = DiffOptions::new();
        opts.include_typechange(true);
        let diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;

        self.collect_entries(&repo, &diff, false)
    }

    fn working_diff(&self) -> StoreResult<Vec<DiffEntry>> {
        let repo = self.repo.lock();
        if repo.is_bare() {
            return Err(StoreError::NoWorkingTree);
        }
        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(_) => None,
        };

        let mut opts = DiffOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true)
            .include_typechange(true);
        let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;

        self.collect_entries(&repo, &diff, true)
    }

    fn fetch(&self, remote: &str, branch: &str) -> StoreResult<VersionPointer> {
        let repo = self.repo.lock();
        let started = Instant::now();
        let tripped = Cell::new(None);

        let mut opts = FetchOptions::new();
        opts.remote_callbacks(bounded_transfer(&self.limits, started, &tripped));

        let mut handle = repo.find_remote(remote)?;
        let result = handle.fetch::<&str>(&[], Some(&mut opts), None);
        drop(opts);
        check_limit(result, &tripped, "fetch")?;

        let oid = Self::fetched_head(&repo, remote, branch)?;
        tracing::info!(remote, branch, head = %oid, elapsed_ms = started.elapsed().as_millis() as u64, "fetched");
        Ok(VersionPointer::new(oid.to_string()))
    }

    fn reset_soft(&self, target: &VersionPointer) -> StoreResult<()> {
        let repo = self.repo.lock();
        let object = repo.find_object(Self::resolve(&repo, target)?, None)?;
        repo.reset(&object, ResetType::Soft, None)?;
        Ok(())
    }

    fn reset_hard(&self, target: &VersionPointer) -> StoreResult<()> {
        let repo = self.repo.lock();
        if repo.is_bare() {
            return Err(StoreError::NoWorkingTree);
        }
        let object = repo.find_object(Self::resolve(&repo, target)?, None)?;
        repo.reset(&object, ResetType::Hard, None)?;
        Ok(())
    }

    fn add(&self, path: &str) -> StoreResult<()> {
        let repo = self.repo.lock();
        let mut index = repo.index()?;
        index.add_path(Path::new(path))?;
        index.write()?;
        Ok(())
    }

    fn remove(&self, path: &str) -> StoreResult<()> {
        let repo = self.repo.lock();
        let mut index = repo.index()?;
        index.remove_path(Path::new(path))?;
        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> StoreResult<VersionPointer> {
        let repo = self.repo.lock();
        Self::commit_index(&repo, message)
    }

    fn commit_selected(&self, paths: &[String], message: &str) -> StoreResult<VersionPointer> {
        let repo = self.repo.lock();
        let workdir = repo.workdir().ok_or(StoreError::NoWorkingTree)?.to_path_buf();

        let mut index = repo.index()?;
        for path in paths {
            if workdir.join(path).exists() {
                index.add_path(Path::new(path))?;
            } else {
                index.remove_path(Path::new(path))?;
            }
        }
        index.write()?;

        Self::commit_index(&repo, message)
    }

    fn push(&self, destination: &str, branch: &str) -> StoreResult<()> {
        let repo = self.repo.lock();
        let started = Instant::now();
        let timeout = self.limits.timeout;
        let tripped = Cell::new(None);

        let mut callbacks = RemoteCallbacks::new();
        callbacks.sideband_progress(|_| {
            if started.elapsed() > timeout {
                tripped.set(Some(LimitKind::Timeout(timeout)));
                return false;
            }
            true
        });
        let mut opts = PushOptions::new();
        opts.remote_callbacks(callbacks);

        let refspec = format!("+refs/heads/{branch}:refs/heads/{branch}");
        let mut remote = repo.remote_anonymous(destination)?;
        let result = remote.push(&[refspec.as_str()], Some(&mut opts));
        drop(opts);
        check_limit(result, &tripped, "push")?;

        if started.elapsed() > timeout {
            return Err(StoreError::LimitExceeded {
                operation: "push",
                kind: LimitKind::Timeout(timeout),
            });
        }
        Ok(())
    }

    fn list_remotes(&self) -> StoreResult<Vec<String>> {
        let repo = self.repo.lock();
        let remotes = repo.remotes()?;
        Ok(remotes.iter().flatten().map(str::to_string).collect())
    }

    fn list_commits(
        &self,
        branch: &str,
        limit: usize,
        offset: usize,
        order: WalkOrder,
    ) -> StoreResult<Vec<VersionPointer>> {
        let repo = self.repo.lock();
        let mut walk = repo.revwalk()?;
        let reference = format!("refs/heads/{branch}");
        if walk.push_ref(&reference).is_err() {
            walk.push_head()?;
        }
        match order {
            WalkOrder::NewestFirst => walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?,
            WalkOrder::OldestFirst => {
                walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)?
            }
        }

        let mut ids = Vec::new();
        for oid in walk.skip(offset).take(limit) {
            ids.push(VersionPointer::new(oid?.to_string()));
        }
        Ok(ids)
    }

    fn workdir(&self) -> Option<PathBuf> {
        self.repo.lock().workdir().map(Path::to_path_buf)
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Callbacks that abort a transfer once it runs past the timeout or
/// receives more than the size ceiling. The tripped limit is recorded in
/// `tripped` so the caller can report it.
fn bounded_transfer<'a>(
    limits: &NetworkLimits,
    started: Instant,
    tripped: &'a Cell<Option<LimitKind>>,
) -> RemoteCallbacks<'a> {
    let timeout = limits.timeout;
    let max = limits.max_object_size;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(move |progress| {
        if started.elapsed() > timeout {
            tripped.set(Some(LimitKind::Timeout(timeout)));
            return false;
        }
        if progress.received_bytes() as u64 > max {
            tripped.set(Some(LimitKind::ObjectSize(max)));
            return false;
        }
        true
    });
    callbacks
}

fn check_limit<T>(
    result: Result<T, git2::Error>,
    tripped: &Cell<Option<LimitKind>>,
    operation: &'static str,
) -> StoreResult<T> {
    match (result, tripped.get()) {
        (_, Some(kind)) => Err(StoreError::LimitExceeded { operation, kind }),
        (Ok(value), None) => Ok(value),
        (Err(e), None) => Err(e.into()),
    }
}

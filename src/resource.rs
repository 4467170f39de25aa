//! Resource
//!
//! A named directory inside a database holding immutable revisions, a
//! changelog of commits and a lock marker. Head and default type are derived
//! from the changelog every time they are needed, so they cannot drift from it.

use crate::allocator::{retire_tree, SharedAllocator};
use crate::changelog::graph::dedup_supplants;
use crate::changelog::{Changelog, Commit, History, SupplantGraph};
use crate::error::StorageError;
use crate::heads::HeadIndex;
use crate::lock::LockMarker;
use crate::store::{ContentStore, RevisionInfo, RevisionReader, StorageOptions};
use crate::types::{Identifier, RevisionId};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Content type used when neither the caller nor the resource names one.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// In-flight writes older than this are considered abandoned.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Snapshot of the commit history, read once from the changelog.
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub graph: SupplantGraph,
    pub heads: HeadIndex,
}

impl ResourceState {
    fn from_commits(commits: &[Commit]) -> Self {
        Self {
            graph: SupplantGraph::from_commits(commits),
            heads: HeadIndex::from_commits(commits),
        }
    }

    pub fn head(&self) -> Option<RevisionId> {
        self.graph.head()
    }

    pub fn default_type(&self) -> Option<&str> {
        self.graph.default_type()
    }

    pub fn leaves(&self) -> Vec<RevisionId> {
        self.graph.leaves()
    }

    /// Revision that `read_current` resolves to.
    ///
    /// With a type: the latest commit of that type. Without: the latest commit
    /// of the default type, or the head when no commit declared a type.
    pub fn current(&self, content_type: Option<&str>) -> Option<RevisionId> {
        match content_type.or(self.default_type()) {
            Some(ty) => self.heads.get_head(ty),
            None => self.head(),
        }
    }
}

/// Handle on one resource.
#[derive(Debug)]
pub struct Resource {
    database: Identifier,
    name: Identifier,
    path: PathBuf,
    lock: LockMarker,
    store: ContentStore,
    changelog: Changelog,
    allocator: SharedAllocator,
}

impl Resource {
    /// Build a handle. Nothing is touched on disk; the handle starts unlocked.
    pub fn new(
        database: Identifier,
        name: Identifier,
        path: &Path,
        options: StorageOptions,
        allocator: SharedAllocator,
    ) -> Self {
        Self {
            database,
            name,
            path: path.to_path_buf(),
            lock: LockMarker::new(path),
            store: ContentStore::new(path, options, allocator.clone()),
            changelog: Changelog::new(path, options.sync),
            allocator,
        }
    }

    pub fn name(&self) -> Identifier {
        self.name
    }

    pub fn database(&self) -> Identifier {
        self.database
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_held()
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Take the resource lock and clear out temporary files abandoned by
    /// writers that crashed more than an hour ago.
    pub fn lock(&mut self) -> Result<(), StorageError> {
        self.lock.acquire().map_err(|e| self.not_found_as_resource(e))?;
        if let Err(e) = self.store.sweep_stale_temp_files(STALE_TEMP_AGE) {
            warn!(resource = %self.name, error = %e, "Sweeping stale temporary files failed");
        }
        Ok(())
    }

    pub fn unlock(&mut self) -> Result<(), StorageError> {
        self.lock.release()
    }

    /// Delete the resource and everything in it. Requires the lock, which
    /// disappears together with the directory.
    pub fn drop(&mut self) -> Result<(), StorageError> {
        self.lock.verify()?;
        retire_tree(self.allocator.as_ref(), &self.path)?;
        self.lock.forget();
        info!(database = %self.database, resource = %self.name, "Resource dropped");
        Ok(())
    }

    /// Store content from a stream. No lock needed.
    pub fn write<R: Read>(&self, reader: R, content_type: &str) -> Result<RevisionId, StorageError> {
        self.store
            .write(reader, content_type)
            .map_err(|e| self.not_found_as_resource(e))
    }

    pub fn write_bytes(&self, bytes: &[u8], content_type: &str) -> Result<RevisionId, StorageError> {
        self.write(bytes, content_type)
    }

    pub fn write_stream<R: Read>(&self, reader: R, content_type: &str) -> Result<RevisionId, StorageError> {
        self.write(reader, content_type)
    }

    /// Store a structured value as `application/json`.
    pub fn write_object<T: Serialize + ?Sized>(&self, value: &T) -> Result<RevisionId, StorageError> {
        self.store
            .write_object(value)
            .map_err(|e| self.not_found_as_resource(e))
    }

    /// Make `revision` the new head, supplanting `supplants`.
    ///
    /// The first commit is always accepted. Later commits must supplant a
    /// non-empty subset of the current leaves, otherwise they are rejected as
    /// conflicts and nothing is written. When `content_type` is `None` the
    /// type recorded at write time is used.
    pub fn commit(
        &self,
        revision: RevisionId,
        content_type: Option<&str>,
        supplants: &[RevisionId],
    ) -> Result<RevisionId, StorageError> {
        self.lock.verify()?;
        let written: RevisionInfo = self.store.info(&revision)?;
        let supplants = dedup_supplants(supplants);
        let graph = self.changelog.graph()?;
        if let Err(rejection) = graph.check(&revision, &supplants) {
            warn!(
                resource = %self.name,
                revision = %revision,
                reason = %rejection.describe(),
                "Commit rejected"
            );
            return Err(StorageError::conflict(
                &self.name.to_string(),
                rejection.describe(),
                rejection.rejected(),
            ));
        }

        // The first commit has nothing to supplant; whatever was named is dropped.
        let supplants = if graph.is_empty() { Vec::new() } else { supplants };
        let commit = Commit {
            revision,
            content_type: Some(
                content_type
                    .map(str::to_string)
                    .unwrap_or(written.content_type),
            ),
            supplants,
            timestamp: Utc::now(),
        };
        self.changelog.append(&commit)?;
        info!(
            resource = %self.name,
            revision = %revision,
            supplanted = commit.supplants.len(),
            "Commit accepted"
        );
        Ok(revision)
    }

    /// Write content and commit it. The lock is checked before anything is written.
    ///
    /// Without a content type the resource's default type is used, falling back
    /// to `application/octet-stream`.
    pub fn write_and_commit<R: Read>(
        &self,
        reader: R,
        content_type: Option<&str>,
        supplants: &[RevisionId],
    ) -> Result<RevisionId, StorageError> {
        self.lock.verify()?;
        let content_type = match content_type {
            Some(ty) => ty.to_string(),
            None => self
                .state()?
                .default_type()
                .unwrap_or(OCTET_STREAM)
                .to_string(),
        };
        let revision = self.write(reader, &content_type)?;
        self.commit(revision, Some(&content_type), supplants)
    }

    /// Write a structured value and commit it, supplanting the current leaves.
    pub fn write_object_and_commit<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<RevisionId, StorageError> {
        self.lock.verify()?;
        let leaves = self.leaves()?;
        let revision = self.write_object(value)?;
        self.commit(revision, None, &leaves)
    }

    /// Read the changelog once and derive head, leaves and per-type heads.
    pub fn state(&self) -> Result<ResourceState, StorageError> {
        self.ensure_exists()?;
        let commits = self.changelog.load()?;
        Ok(ResourceState::from_commits(&commits))
    }

    pub fn head(&self) -> Result<Option<RevisionId>, StorageError> {
        Ok(self.state()?.head())
    }

    pub fn default_type(&self) -> Result<Option<String>, StorageError> {
        Ok(self.state()?.default_type().map(str::to_string))
    }

    /// Revisions a new commit may supplant.
    pub fn leaves(&self) -> Result<Vec<RevisionId>, StorageError> {
        Ok(self.state()?.leaves())
    }

    /// Read a revision by id, committed or not.
    pub fn read(&self, revision: &RevisionId) -> Result<RevisionReader, StorageError> {
        self.ensure_exists()?;
        self.store.read(revision)
    }

    /// Revision currently recorded for `content_type` (or the default type).
    pub fn current_revision(&self, content_type: Option<&str>) -> Result<RevisionId, StorageError> {
        self.state()?.current(content_type).ok_or_else(|| {
            StorageError::NotFound(match content_type {
                Some(ty) => format!("no {} content committed to resource {}", ty, self.name),
                None => format!("no content committed to resource {}", self.name),
            })
        })
    }

    /// Content most recently committed for `content_type` (or the default type).
    pub fn read_current(&self, content_type: Option<&str>) -> Result<RevisionReader, StorageError> {
        let revision = self.current_revision(content_type)?;
        self.store.read(&revision)
    }

    /// Deserialize the current JSON content.
    pub fn read_object<T: DeserializeOwned>(&self, content_type: Option<&str>) -> Result<T, StorageError> {
        let reader = self.read_current(content_type)?;
        Ok(serde_json::from_reader(reader)?)
    }

    /// Commits in insertion order. Each `iter()` rereads from the start.
    pub fn history(&self) -> History {
        History::new(self.changelog.clone())
    }

    /// Every revision written to this resource, committed or not.
    pub fn revisions(&self) -> Result<Vec<RevisionId>, StorageError> {
        self.ensure_exists()?;
        self.store.list()
    }

    fn ensure_exists(&self) -> Result<(), StorageError> {
        if self.exists() {
            Ok(())
        } else {
            Err(self.missing())
        }
    }

    fn missing(&self) -> StorageError {
        StorageError::NotFound(format!("resource {}/{}", self.database, self.name))
    }

    fn not_found_as_resource(&self, err: StorageError) -> StorageError {
        match err {
            StorageError::NotFound(_) if !self.exists() => self.missing(),
            other => other,
        }
    }
}

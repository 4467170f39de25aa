//! Content Store
//!
//! Immutable byte blobs keyed by random identifiers, one file per revision
//! inside the resource directory. Writes stream into a temporary file and are
//! published with a no-clobber rename, so readers only ever see complete
//! revisions. Reads by identifier are never gated by the resource lock.

pub mod revision;

use crate::allocator::SharedAllocator;
use crate::error::StorageError;
use crate::types::{Identifier, RevisionId, JSON_CONTENT_TYPE};
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

pub use revision::{RevisionInfo, RevisionReader};

const META_EXTENSION: &str = "meta";
const TEMP_PREFIX: &str = ".tmp-";
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// On-disk options shared by every database, resource and store of a datadir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageOptions {
    /// Permission bits for created directories (Unix only)
    pub dir_mode: u32,
    /// Permission bits for published blobs (Unix only)
    pub file_mode: u32,
    /// fsync blobs, metadata and the directory before returning
    pub sync: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            dir_mode: 0o770,
            file_mode: 0o660,
            sync: true,
        }
    }
}

/// Revision storage for one resource directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    dir: PathBuf,
    options: StorageOptions,
    allocator: SharedAllocator,
}

impl ContentStore {
    pub fn new(dir: &Path, options: StorageOptions, allocator: SharedAllocator) -> Self {
        Self {
            dir: dir.to_path_buf(),
            options,
            allocator,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, id: &RevisionId) -> PathBuf {
        self.dir.join(id.to_string())
    }

    fn meta_path(&self, id: &RevisionId) -> PathBuf {
        self.dir.join(format!("{}.{}", id, META_EXTENSION))
    }

    /// Store the bytes produced by `reader` as a new revision.
    ///
    /// The revision becomes visible only after `reader` reports end of data
    /// and everything is on disk. If `reader` fails, nothing is published.
    pub fn write<R: Read>(&self, mut reader: R, content_type: &str) -> Result<RevisionId, StorageError> {
        if !self.dir.is_dir() {
            return Err(StorageError::NotFound(self.dir.display().to_string()));
        }

        let id = self.allocator.generate_id();
        let blob_path = self.blob_path(&id);
        if blob_path.exists() {
            return Err(StorageError::AlreadyExists(format!("revision {}", id)));
        }

        let mut tmp = self.temp_file()?;
        let mut hasher = blake3::Hasher::new();
        let mut size = 0u64;
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // tmp is unlinked on drop
                Err(e) => return Err(StorageError::IoError(e)),
            };
            hasher.update(&buf[..n]);
            tmp.write_all(&buf[..n])?;
            size += n as u64;
        }
        self.finish_file(&tmp)?;

        let info = RevisionInfo {
            revision: id,
            content_type: content_type.to_string(),
            size,
            digest: hasher.finalize().to_hex().to_string(),
            written_at: Utc::now(),
        };
        let meta_path = self.meta_path(&id);
        let mut meta = self.temp_file()?;
        serde_json::to_writer(&mut meta, &info)?;
        self.finish_file(&meta)?;
        meta.persist_noclobber(&meta_path)
            .map_err(|e| StorageError::from_io(e.error, format!("revision {}", id)))?;

        // Metadata without a blob is invisible; the blob rename is the publish.
        if let Err(e) = tmp.persist_noclobber(&blob_path) {
            let _ = fs::remove_file(&meta_path);
            return Err(StorageError::from_io(e.error, format!("revision {}", id)));
        }
        self.settle_published(&id);

        tracing::debug!(
            resource_dir = %self.dir.display(),
            revision = %id,
            content_type,
            size,
            "Revision written"
        );
        Ok(id)
    }

    /// Store a byte slice.
    pub fn write_bytes(&self, bytes: &[u8], content_type: &str) -> Result<RevisionId, StorageError> {
        self.write(bytes, content_type)
    }

    /// Store a live stream; the same as `write`.
    pub fn write_stream<R: Read>(&self, reader: R, content_type: &str) -> Result<RevisionId, StorageError> {
        self.write(reader, content_type)
    }

    /// Store a structured value as JSON under `application/json`.
    pub fn write_object<T: Serialize + ?Sized>(&self, value: &T) -> Result<RevisionId, StorageError> {
        let bytes = serde_json::to_vec(value)?;
        self.write(bytes.as_slice(), JSON_CONTENT_TYPE)
    }

    /// Whether a revision has been published.
    pub fn contains(&self, id: &RevisionId) -> bool {
        self.blob_path(id).is_file()
    }

    /// Metadata for a published revision.
    pub fn info(&self, id: &RevisionId) -> Result<RevisionInfo, StorageError> {
        if !self.contains(id) {
            return Err(StorageError::NotFound(format!("revision {}", id)));
        }
        let meta_path = self.meta_path(id);
        let body = fs::read(&meta_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::Corrupt {
                path: meta_path.clone(),
                reason: "revision metadata missing".to_string(),
            },
            _ => StorageError::IoError(e),
        })?;
        serde_json::from_slice(&body).map_err(|e| StorageError::Corrupt {
            path: meta_path,
            reason: e.to_string(),
        })
    }

    /// Open a revision for streaming reads.
    pub fn read(&self, id: &RevisionId) -> Result<RevisionReader, StorageError> {
        let file = File::open(self.blob_path(id))
            .map_err(|e| StorageError::from_io(e, format!("revision {}", id)))?;
        let info = self.info(id)?;
        Ok(RevisionReader::new(info, file))
    }

    /// Read a whole revision into memory.
    pub fn read_bytes(&self, id: &RevisionId) -> Result<Vec<u8>, StorageError> {
        Ok(self.read(id)?.into_bytes()?)
    }

    /// Read a whole revision and check it against its recorded digest.
    pub fn read_verified(&self, id: &RevisionId) -> Result<Vec<u8>, StorageError> {
        let reader = self.read(id)?;
        let expected = reader.info().digest.clone();
        let bytes = reader.into_bytes()?;
        let actual = blake3::hash(&bytes).to_hex().to_string();
        if actual != expected {
            return Err(StorageError::Corrupt {
                path: self.blob_path(id),
                reason: format!("digest mismatch: expected {}, found {}", expected, actual),
            });
        }
        Ok(bytes)
    }

    /// All published revisions, sorted by identifier.
    pub fn list(&self) -> Result<Vec<RevisionId>, StorageError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StorageError::from_io(e, self.dir.display()))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(|n| Identifier::parse(n).ok()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove in-flight write files older than `max_age`, left behind by
    /// writers that died before publishing. Returns how many were removed.
    pub fn sweep_stale_temp_files(&self, max_age: Duration) -> Result<usize, StorageError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StorageError::from_io(e, self.dir.display()))?;
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let is_temp = entry
                .file_name()
                .to_str()
                .map_or(false, |name| name.starts_with(TEMP_PREFIX));
            if !is_temp || !entry.file_type()?.is_file() {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age < max_age {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                // Published or swept by someone else meanwhile.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::IoError(e)),
            }
        }
        if removed > 0 {
            tracing::debug!(resource_dir = %self.dir.display(), removed, "Swept stale temporary files");
        }
        Ok(removed)
    }

    fn temp_file(&self) -> Result<NamedTempFile, StorageError> {
        tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| StorageError::from_io(e, self.dir.display()))
    }

    fn finish_file(&self, tmp: &NamedTempFile) -> Result<(), StorageError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(self.options.file_mode))?;
        }
        if self.options.sync {
            tmp.as_file().sync_all()?;
        }
        Ok(())
    }

    /// Make the publishing rename durable. The revision is already visible and
    /// its bytes are synced, so a failure here is logged rather than returned.
    fn settle_published(&self, id: &RevisionId) {
        if let Err(e) = self.sync_dir() {
            tracing::warn!(
                resource_dir = %self.dir.display(),
                revision = %id,
                error = %e,
                "Directory sync after publish failed"
            );
        }
    }

    fn sync_dir(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            if self.options.sync {
                File::open(&self.dir)?.sync_all()?;
            }
        }
        Ok(())
    }
}

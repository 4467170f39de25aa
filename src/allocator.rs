//! Directory allocation
//!
//! The storage engine needs three things from its environment: fresh
//! identifiers, directory creation and recursive removal. They sit behind the
//! `Allocator` trait so databases and resources can be wired explicitly, and so
//! tests can pin identifiers.

use crate::error::StorageError;
use crate::types::Identifier;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Identifier generation and directory primitives.
pub trait Allocator: Send + Sync + fmt::Debug {
    /// Produce a fresh identifier.
    fn generate_id(&self) -> Identifier;

    /// Create a single directory. Fails with `AlreadyExists` rather than
    /// reusing an existing one, and with `NotFound` when the parent is missing.
    fn create_dir(&self, path: &Path, mode: u32) -> Result<(), StorageError>;

    /// Recursively remove a directory tree.
    fn remove_tree(&self, path: &Path) -> Result<(), StorageError>;
}

/// Shared allocator handle.
pub type SharedAllocator = Arc<dyn Allocator>;

/// Production allocator backed by the OS CSPRNG and `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsAllocator;

impl FsAllocator {
    pub fn new() -> Self {
        FsAllocator
    }

    pub fn shared() -> SharedAllocator {
        Arc::new(FsAllocator)
    }
}

impl Allocator for FsAllocator {
    fn generate_id(&self) -> Identifier {
        Identifier::random()
    }

    fn create_dir(&self, path: &Path, mode: u32) -> Result<(), StorageError> {
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        builder
            .create(path)
            .map_err(|e| StorageError::from_io(e, path.display()))?;

        // The builder mode is filtered through the umask; set it explicitly.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        tracing::debug!(path = %path.display(), mode = format!("{:o}", mode), "Created directory");
        Ok(())
    }

    fn remove_tree(&self, path: &Path) -> Result<(), StorageError> {
        fs::remove_dir_all(path).map_err(|e| StorageError::from_io(e, path.display()))?;
        tracing::debug!(path = %path.display(), "Removed directory tree");
        Ok(())
    }
}

/// Remove `path` from its parent in one rename, then delete the renamed tree.
///
/// Once the rename succeeds the directory is gone for every other handle, so a
/// failure while deleting the renamed copy is logged and not reported.
pub(crate) fn retire_tree(allocator: &dyn Allocator, path: &Path) -> Result<(), StorageError> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::NotFound(path.display().to_string()))?;
    let graveyard = parent.join(format!(".dropped-{}", allocator.generate_id()));
    fs::rename(path, &graveyard).map_err(|e| StorageError::from_io(e, path.display()))?;
    if let Err(e) = allocator.remove_tree(&graveyard) {
        tracing::warn!(
            path = %graveyard.display(),
            error = %e,
            "Dropped directory could not be fully removed"
        );
    }
    Ok(())
}

//! Database
//!
//! A locked directory of resources. The database lock guards the database as
//! a whole (open/close/drop); each resource carries its own lock.

use crate::allocator::{retire_tree, SharedAllocator};
use crate::error::StorageError;
use crate::lock::LockMarker;
use crate::resource::Resource;
use crate::store::StorageOptions;
use crate::types::Identifier;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug)]
pub struct Database {
    name: Identifier,
    path: PathBuf,
    lock: LockMarker,
    options: StorageOptions,
    allocator: SharedAllocator,
}

impl Database {
    /// Build a handle. Nothing is touched on disk; the handle starts closed.
    pub fn new(
        name: Identifier,
        path: &Path,
        options: StorageOptions,
        allocator: SharedAllocator,
    ) -> Self {
        Self {
            name,
            path: path.to_path_buf(),
            lock: LockMarker::new(path),
            options,
            allocator,
        }
    }

    pub fn name(&self) -> Identifier {
        self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.lock.is_held()
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Take the database lock.
    pub fn open(&mut self) -> Result<(), StorageError> {
        match self.lock.acquire() {
            Err(StorageError::NotFound(_)) => Err(self.missing()),
            other => other,
        }
    }

    /// Release the database lock.
    pub fn close(&mut self) -> Result<(), StorageError> {
        self.lock.release()
    }

    /// Delete the database and all its resources. Requires the database lock.
    pub fn drop(&mut self) -> Result<(), StorageError> {
        self.lock.verify()?;
        retire_tree(self.allocator.as_ref(), &self.path)?;
        self.lock.forget();
        info!(database = %self.name, "Database dropped");
        Ok(())
    }

    /// Create an empty resource, generating a name when none is given.
    ///
    /// Fails with `AlreadyExists` instead of reusing an existing directory.
    pub fn create_resource(&self, name: Option<Identifier>) -> Result<Resource, StorageError> {
        self.ensure_exists()?;
        let name = name.unwrap_or_else(|| self.allocator.generate_id());
        let path = self.resource_path(&name);
        self.allocator
            .create_dir(&path, self.options.dir_mode)
            .map_err(|e| match e {
                StorageError::AlreadyExists(_) => {
                    StorageError::AlreadyExists(format!("resource {}/{}", self.name, name))
                }
                StorageError::NotFound(_) => self.missing(),
                other => other,
            })?;
        info!(database = %self.name, resource = %name, "Resource created");
        Ok(self.handle(name, &path))
    }

    /// Unlocked handle on an existing resource.
    pub fn resource(&self, name: Identifier) -> Result<Resource, StorageError> {
        let path = self.resource_path(&name);
        if !path.is_dir() {
            return Err(StorageError::NotFound(format!("resource {}/{}", self.name, name)));
        }
        Ok(self.handle(name, &path))
    }

    /// Handle on an existing resource, already locked.
    pub fn lock_resource(&self, name: Identifier) -> Result<Resource, StorageError> {
        let mut resource = self.resource(name)?;
        resource.lock()?;
        Ok(resource)
    }

    /// Lock a resource and delete it.
    pub fn drop_resource(&self, name: Identifier) -> Result<(), StorageError> {
        self.lock_resource(name)?.drop()
    }

    /// Names of all resources, sorted.
    pub fn list_resources(&self) -> Result<Vec<Identifier>, StorageError> {
        let entries = fs::read_dir(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => self.missing(),
            _ => StorageError::IoError(e),
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str().and_then(|n| Identifier::parse(n).ok()) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn resource_path(&self, name: &Identifier) -> PathBuf {
        self.path.join(name.to_string())
    }

    fn handle(&self, name: Identifier, path: &Path) -> Resource {
        Resource::new(self.name, name, path, self.options, self.allocator.clone())
    }

    fn ensure_exists(&self) -> Result<(), StorageError> {
        if self.exists() {
            Ok(())
        } else {
            Err(self.missing())
        }
    }

    fn missing(&self) -> StorageError {
        StorageError::NotFound(format!("database {}", self.name))
    }
}

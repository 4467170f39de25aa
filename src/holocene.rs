//! Data directory
//!
//! Allocates databases as randomly named directories under one data
//! directory, and hands out `Database` handles for them.

use crate::allocator::{FsAllocator, SharedAllocator};
use crate::database::Database;
use crate::error::StorageError;
use crate::store::StorageOptions;
use crate::types::Identifier;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Holocene {
    datadir: PathBuf,
    options: StorageOptions,
    allocator: SharedAllocator,
}

impl Holocene {
    /// Data directory with default options and the filesystem allocator.
    pub fn new(datadir: &Path) -> Self {
        Self::with_allocator(datadir, StorageOptions::default(), FsAllocator::shared())
    }

    pub fn with_allocator(datadir: &Path, options: StorageOptions, allocator: SharedAllocator) -> Self {
        Self {
            datadir: datadir.to_path_buf(),
            options,
            allocator,
        }
    }

    /// Fresh random identifier.
    pub fn keygen() -> Identifier {
        Identifier::random()
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    pub fn options(&self) -> StorageOptions {
        self.options
    }

    /// Create a database directory, generating a name when none is given.
    pub fn create_db(&self, name: Option<Identifier>) -> Result<Database, StorageError> {
        self.ensure_datadir()?;
        let name = name.unwrap_or_else(|| self.allocator.generate_id());
        let path = self.db_path(&name);
        self.allocator
            .create_dir(&path, self.options.dir_mode)
            .map_err(|e| match e {
                StorageError::AlreadyExists(_) => {
                    StorageError::AlreadyExists(format!("database {}", name))
                }
                other => other,
            })?;
        info!(database = %name, datadir = %self.datadir.display(), "Database created");
        Ok(self.handle(name, &path))
    }

    /// Closed handle on an existing database.
    pub fn database(&self, name: Identifier) -> Result<Database, StorageError> {
        let path = self.db_path(&name);
        if !path.is_dir() {
            return Err(StorageError::NotFound(format!("database {}", name)));
        }
        Ok(self.handle(name, &path))
    }

    /// Handle on an existing database, already open.
    pub fn open_db(&self, name: Identifier) -> Result<Database, StorageError> {
        let mut db = self.database(name)?;
        db.open()?;
        Ok(db)
    }

    /// Open a database and delete it.
    pub fn drop_db(&self, name: Identifier) -> Result<(), StorageError> {
        self.open_db(name)?.drop()
    }

    /// Names of all databases, sorted.
    pub fn list_dbs(&self) -> Result<Vec<Identifier>, StorageError> {
        self.ensure_datadir()?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.datadir)? {
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

    fn db_path(&self, name: &Identifier) -> PathBuf {
        self.datadir.join(name.to_string())
    }

    fn handle(&self, name: Identifier, path: &Path) -> Database {
        Database::new(name, path, self.options, self.allocator.clone())
    }

    fn ensure_datadir(&self) -> Result<(), StorageError> {
        let meta = fs::metadata(&self.datadir)
            .map_err(|e| StorageError::from_io(e, format!("data directory {}", self.datadir.display())))?;
        if !meta.is_dir() {
            return Err(StorageError::NotFound(format!(
                "data directory {} (not a directory)",
                self.datadir.display()
            )));
        }
        Ok(())
    }
}

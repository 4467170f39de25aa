//! Holocene: Versioned Resource Storage
//!
//! A data directory holds databases, a database holds resources, and a resource
//! holds immutable revisions plus a changelog of commits. Commits are accepted
//! only when they supplant the current leaves, so concurrent writers detect
//! each other instead of silently overwriting.

pub mod allocator;
pub mod changelog;
pub mod config;
pub mod database;
pub mod error;
pub mod heads;
pub mod holocene;
pub mod lock;
pub mod logging;
pub mod resource;
pub mod store;
pub mod tooling;
pub mod types;

pub use allocator::{Allocator, FsAllocator, SharedAllocator};
pub use changelog::{Commit, History};
pub use database::Database;
pub use error::{ApiError, StorageError};
pub use holocene::Holocene;
pub use resource::Resource;
pub use store::{RevisionInfo, RevisionReader, StorageOptions};
pub use types::{Identifier, RevisionId};

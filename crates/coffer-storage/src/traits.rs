//! Storage abstraction trait
//!
//! This module defines the Storage trait that physical backends implement.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use coffer_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => AppError::NotFound(format!("stored object {}", path)),
            StorageError::IoError(source) => AppError::io("storage", source),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// A freshly written object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Opaque `{uuid}.{ext}` file name
    pub name: String,
    /// Absolute physical path
    pub path: PathBuf,
}

/// Physical store for file bytes.
///
/// Paths are absolute locations previously produced by [`Storage::write`];
/// implementations reject paths that resolve outside their root.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Root directory all objects live under
    fn root(&self) -> &Path;

    /// Ensure the shard directory for today exists and return it.
    async fn allocate(&self, user_id: i64) -> StorageResult<PathBuf>;

    /// Write `data` as a new object with the given extension inside `dir`.
    ///
    /// The object is never observable partially written.
    async fn write(&self, dir: &Path, data: &[u8], extension: &str) -> StorageResult<StoredObject>;

    /// Replace the contents of an existing object.
    async fn overwrite(&self, path: &Path, data: &[u8]) -> StorageResult<()>;

    async fn read(&self, path: &Path) -> StorageResult<Vec<u8>>;

    /// Remove an object. A missing object is not an error and yields `false`.
    async fn delete(&self, path: &Path) -> StorageResult<bool>;

    async fn exists(&self, path: &Path) -> StorageResult<bool>;

    /// Public URL of a stored path. Never persisted, recomputed on each read.
    fn url_for(&self, path: &Path) -> String;

    /// Allocate today's shard for `user_id` and write `data` into it.
    async fn store(&self, user_id: i64, data: &[u8], extension: &str) -> StorageResult<StoredObject> {
        let dir = self.allocate(user_id).await?;
        self.write(&dir, data, extension).await
    }
}

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata record of one stored object.
///
/// `file_path` is the physical location and is never serialized. Callers see
/// [`FileView`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StoredFile {
    pub id: i64,
    pub user_id: i64,
    /// Opaque `{uuid}.{ext}` name of the object on disk
    pub filename: String,
    pub original_name: String,
    pub file_path: String,
    /// Logical folder tag; empty means root
    pub folder_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn physical_path(&self) -> PathBuf {
        PathBuf::from(&self.file_path)
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    pub fn into_view(self, url: String) -> FileView {
        FileView {
            id: self.id,
            user_id: self.user_id,
            filename: self.filename,
            original_name: self.original_name,
            folder_path: self.folder_path,
            file_size: self.file_size,
            mime_type: self.mime_type,
            url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Record about to be inserted; the repository assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub user_id: i64,
    pub filename: String,
    pub original_name: String,
    pub file_path: String,
    pub folder_path: String,
    pub file_size: i64,
    pub mime_type: String,
}

/// Outward representation of a file. The URL is computed on every read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileView {
    pub id: i64,
    pub user_id: i64,
    pub filename: String,
    pub original_name: String,
    pub folder_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// File contents together with their metadata.
#[derive(Debug, Clone)]
pub struct Download {
    pub file: FileView,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub file: FileView,
    /// `None` when the stored bytes cannot be decoded
    pub dimensions: Option<(u32, u32)>,
}

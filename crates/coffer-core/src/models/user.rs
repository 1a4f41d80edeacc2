use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_STORAGE};
use crate::error::QuotaViolation;

/// Owner of stored files, carrying its own quota limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub max_files: i64,
    pub max_file_size: i64,
    pub max_storage: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn limits(&self) -> QuotaLimits {
        QuotaLimits {
            max_files: self.max_files,
            max_file_size: self.max_file_size,
            max_storage: self.max_storage,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub limits: QuotaLimits,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            limits: QuotaLimits::default(),
        }
    }
}

/// Per-user limits checked before every quota-affecting write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub max_files: i64,
    pub max_file_size: i64,
    pub max_storage: i64,
}

impl QuotaLimits {
    /// Check whether one more file of `incoming_size` bytes fits next to
    /// `file_count` files totalling `total_size` bytes.
    ///
    /// Checks run in order: per-file size, file count, total storage.
    pub fn check(
        &self,
        file_count: i64,
        total_size: i64,
        incoming_size: i64,
    ) -> Result<(), QuotaViolation> {
        if incoming_size > self.max_file_size {
            return Err(QuotaViolation::FileSize {
                size: incoming_size,
                limit: self.max_file_size,
            });
        }
        if file_count >= self.max_files {
            return Err(QuotaViolation::FileCount {
                count: file_count,
                limit: self.max_files,
            });
        }
        if total_size.saturating_add(incoming_size) > self.max_storage {
            return Err(QuotaViolation::Storage {
                used: total_size,
                incoming: incoming_size,
                limit: self.max_storage,
            });
        }
        Ok(())
    }
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_storage: DEFAULT_MAX_STORAGE,
        }
    }
}

/// Requested limit changes. Only strictly positive values are applied.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserSettings {
    pub max_files: i64,
    pub max_file_size: i64,
    pub max_storage: i64,
}

impl UserSettings {
    /// Overlay the positive fields of `self` onto `current`.
    pub fn apply_to(&self, current: QuotaLimits) -> QuotaLimits {
        QuotaLimits {
            max_files: if self.max_files > 0 {
                self.max_files
            } else {
                current.max_files
            },
            max_file_size: if self.max_file_size > 0 {
                self.max_file_size
            } else {
                current.max_file_size
            },
            max_storage: if self.max_storage > 0 {
                self.max_storage
            } else {
                current.max_storage
            },
        }
    }
}

impl From<QuotaLimits> for UserSettings {
    fn from(limits: QuotaLimits) -> Self {
        Self {
            max_files: limits.max_files,
            max_file_size: limits.max_file_size,
            max_storage: limits.max_storage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total_files: i64,
    pub total_size: i64,
    pub max_files: i64,
    pub max_file_size: i64,
    pub max_storage: i64,
}

//! Repository traits
//!
//! This abstracts the database implementation (PostgreSQL or in-memory).

use async_trait::async_trait;
use coffer_core::models::{FileQuery, NewFile, NewUser, QuotaLimits, StoredFile, User};
use coffer_core::AppError;

#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Insert `file` only if its owner stays within `limits`.
    ///
    /// Count and total size are re-read atomically with the insert, so two
    /// concurrent inserts can never both pass the check.
    async fn create_within_quota(
        &self,
        file: NewFile,
        limits: QuotaLimits,
    ) -> Result<StoredFile, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<StoredFile>, AppError>;

    /// One page of a user's files and the total number of matches.
    /// `query` must already be normalized.
    async fn list(
        &self,
        user_id: i64,
        query: &FileQuery,
    ) -> Result<(Vec<StoredFile>, i64), AppError>;

    async fn count_by_user(&self, user_id: i64) -> Result<i64, AppError>;

    async fn total_size_by_user(&self, user_id: i64) -> Result<i64, AppError>;

    /// Files in `folder_path` and all its descendants.
    async fn count_in_folder(&self, user_id: i64, folder_path: &str) -> Result<i64, AppError>;

    /// Persist the mutable fields of `file` and bump `updated_at`.
    async fn update(&self, file: &StoredFile) -> Result<StoredFile, AppError>;

    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    /// Rewrite `old_path` to `new_path` on exact matches and descendants
    /// (`old_path/...`). Returns the number of records touched.
    async fn rename_folder(
        &self,
        user_id: i64,
        old_path: &str,
        new_path: &str,
    ) -> Result<u64, AppError>;

    /// Delete every record in `folder_path` or below and return them.
    async fn delete_folder(
        &self,
        user_id: i64,
        folder_path: &str,
    ) -> Result<Vec<StoredFile>, AppError>;

    /// Distinct non-empty folder paths, sorted.
    async fn distinct_folder_paths(&self, user_id: i64) -> Result<Vec<String>, AppError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    async fn update_limits(&self, id: i64, limits: QuotaLimits) -> Result<User, AppError>;
}

/// True when `folder_path` is `root` or lies below it.
pub fn in_folder_subtree(folder_path: &str, root: &str) -> bool {
    folder_path == root
        || (folder_path.len() > root.len()
            && folder_path.starts_with(root)
            && folder_path.as_bytes()[root.len()] == b'/')
}

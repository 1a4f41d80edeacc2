//! In-memory repositories
//!
//! Same semantics as the Postgres repositories, kept in process. Used by
//! tests and by the CLI's dry-run mode.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use coffer_core::models::{
    FileQuery, NewFile, NewUser, QuotaLimits, SortField, SortOrder, StoredFile, User,
};
use coffer_core::AppError;

use crate::traits::{in_folder_subtree, FileRepository, UserRepository};

struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::Internal("in-memory repository lock poisoned".to_string()))
}

#[derive(Clone, Default)]
pub struct MemoryFileRepository {
    files: Arc<Mutex<Table<StoredFile>>>,
}

impl MemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare(a: &StoredFile, b: &StoredFile, field: SortField) -> Ordering {
    let primary = match field {
        SortField::Name => a.original_name.cmp(&b.original_name),
        SortField::Size => a.file_size.cmp(&b.file_size),
        SortField::Created => a.created_at.cmp(&b.created_at),
        SortField::Updated => a.updated_at.cmp(&b.updated_at),
    };
    primary.then(a.id.cmp(&b.id))
}

#[async_trait]
impl FileRepository for MemoryFileRepository {
    async fn create_within_quota(
        &self,
        file: NewFile,
        limits: QuotaLimits,
    ) -> Result<StoredFile, AppError> {
        // The table lock is held across check and insert.
        let mut table = lock(&self.files)?;

        let (count, total) = table
            .rows
            .values()
            .filter(|f| f.user_id == file.user_id)
            .fold((0i64, 0i64), |(c, t), f| (c + 1, t + f.file_size));
        limits
            .check(count, total, file.file_size)
            .map_err(AppError::QuotaExceeded)?;

        let now = Utc::now();
        let stored = StoredFile {
            id: table.allocate_id(),
            user_id: file.user_id,
            filename: file.filename,
            original_name: file.original_name,
            file_path: file.file_path,
            folder_path: file.folder_path,
            file_size: file.file_size,
            mime_type: file.mime_type,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<StoredFile>, AppError> {
        Ok(lock(&self.files)?.rows.get(&id).cloned())
    }

    async fn list(
        &self,
        user_id: i64,
        query: &FileQuery,
    ) -> Result<(Vec<StoredFile>, i64), AppError> {
        let table = lock(&self.files)?;
        let mut matching: Vec<&StoredFile> = table
            .rows
            .values()
            .filter(|f| f.user_id == user_id)
            .filter(|f| match &query.folder_path {
                Some(folder) => &f.folder_path == folder,
                None => true,
            })
            .collect();

        matching.sort_by(|a, b| {
            let ordering = compare(a, b, query.sort_by);
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset().max(0) as usize)
            .take(query.page_size.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn count_by_user(&self, user_id: i64) -> Result<i64, AppError> {
        let table = lock(&self.files)?;
        Ok(table.rows.values().filter(|f| f.user_id == user_id).count() as i64)
    }

    async fn total_size_by_user(&self, user_id: i64) -> Result<i64, AppError> {
        let table = lock(&self.files)?;
        Ok(table
            .rows
            .values()
            .filter(|f| f.user_id == user_id)
            .map(|f| f.file_size)
            .sum())
    }

    async fn count_in_folder(&self, user_id: i64, folder_path: &str) -> Result<i64, AppError> {
        let table = lock(&self.files)?;
        Ok(table
            .rows
            .values()
            .filter(|f| f.user_id == user_id && in_folder_subtree(&f.folder_path, folder_path))
            .count() as i64)
    }

    async fn update(&self, file: &StoredFile) -> Result<StoredFile, AppError> {
        let mut table = lock(&self.files)?;
        let existing = table
            .rows
            .get_mut(&file.id)
            .filter(|existing| existing.user_id == file.user_id)
            .ok_or_else(|| AppError::NotFound(format!("file {}", file.id)))?;

        existing.original_name = file.original_name.clone();
        existing.folder_path = file.folder_path.clone();
        existing.file_size = file.file_size;
        existing.mime_type = file.mime_type.clone();
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        Ok(lock(&self.files)?.rows.remove(&id).is_some())
    }

    async fn rename_folder(
        &self,
        user_id: i64,
        old_path: &str,
        new_path: &str,
    ) -> Result<u64, AppError> {
        let mut table = lock(&self.files)?;
        let now = Utc::now();
        let mut touched = 0u64;

        for file in table.rows.values_mut() {
            if file.user_id != user_id || !in_folder_subtree(&file.folder_path, old_path) {
                continue;
            }
            file.folder_path = format!("{}{}", new_path, &file.folder_path[old_path.len()..]);
            file.updated_at = now;
            touched += 1;
        }

        Ok(touched)
    }

    async fn delete_folder(
        &self,
        user_id: i64,
        folder_path: &str,
    ) -> Result<Vec<StoredFile>, AppError> {
        let mut table = lock(&self.files)?;
        let ids: Vec<i64> = table
            .rows
            .values()
            .filter(|f| f.user_id == user_id && in_folder_subtree(&f.folder_path, folder_path))
            .map(|f| f.id)
            .collect();

        Ok(ids
            .into_iter()
            .filter_map(|id| table.rows.remove(&id))
            .collect())
    }

    async fn distinct_folder_paths(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        let table = lock(&self.files)?;
        let mut paths: Vec<String> = table
            .rows
            .values()
            .filter(|f| f.user_id == user_id && !f.folder_path.is_empty())
            .map(|f| f.folder_path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        Ok(paths)
    }
}

#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<Mutex<Table<User>>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(lock(&self.users)?.rows.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(lock(&self.users)?
            .rows
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut table = lock(&self.users)?;
        if table
            .rows
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(AppError::Validation(
                "username or email already taken".to_string(),
            ));
        }

        let now = Utc::now();
        let created = User {
            id: table.allocate_id(),
            username: user.username,
            email: user.email,
            max_files: user.limits.max_files,
            max_file_size: user.limits.max_file_size,
            max_storage: user.limits.max_storage,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_limits(&self, id: i64, limits: QuotaLimits) -> Result<User, AppError> {
        let mut table = lock(&self.users)?;
        let user = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))?;

        user.max_files = limits.max_files;
        user.max_file_size = limits.max_file_size;
        user.max_storage = limits.max_storage;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_file(user_id: i64, name: &str, folder: &str, size: i64) -> NewFile {
        NewFile {
            user_id,
            filename: format!("{}.bin", name),
            original_name: name.to_string(),
            file_path: format!("/uploads/{}/{}.bin", user_id, name),
            folder_path: folder.to_string(),
            file_size: size,
            mime_type: "application/octet-stream".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_within_quota_rejects_over_limit() {
        let repo = MemoryFileRepository::new();
        let limits = QuotaLimits {
            max_files: 2,
            max_file_size: 100,
            max_storage: 1000,
        };

        repo.create_within_quota(new_file(1, "a", "", 10), limits).await.unwrap();
        repo.create_within_quota(new_file(1, "b", "", 10), limits).await.unwrap();
        let err = repo
            .create_within_quota(new_file(1, "c", "", 10), limits)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::QuotaExceeded(_)));

        // Other users are unaffected
        repo.create_within_quota(new_file(2, "c", "", 10), limits).await.unwrap();
        assert_eq!(repo.count_by_user(1).await.unwrap(), 2);
        assert_eq!(repo.total_size_by_user(1).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_rename_folder_rewrites_prefix_only() {
        let repo = MemoryFileRepository::new();
        let limits = QuotaLimits::default();
        for (name, folder) in [("1", "a"), ("2", "a/b"), ("3", "ab"), ("4", "x/a")] {
            repo.create_within_quota(new_file(1, name, folder, 1), limits)
                .await
                .unwrap();
        }

        let touched = repo.rename_folder(1, "a", "z").await.unwrap();
        assert_eq!(touched, 2);
        assert_eq!(
            repo.distinct_folder_paths(1).await.unwrap(),
            vec!["ab", "x/a", "z", "z/b"]
        );
    }

    #[tokio::test]
    async fn test_list_sorted_and_paged() {
        let repo = MemoryFileRepository::new();
        let limits = QuotaLimits::default();
        for (name, size) in [("b", 3), ("a", 1), ("c", 2)] {
            repo.create_within_quota(new_file(1, name, "docs", size), limits)
                .await
                .unwrap();
        }

        let query = FileQuery {
            folder_path: Some("docs".to_string()),
            page: 1,
            page_size: 2,
            sort_by: SortField::Size,
            sort_order: SortOrder::Asc,
        };
        let (files, total) = repo.list(1, &query).await.unwrap();
        assert_eq!(total, 3);
        let names: Vec<&str> = files.iter().map(|f| f.original_name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);

        let (files, _) = repo.list(1, &FileQuery { page: 2, ..query }).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].original_name, "b");
    }

    #[tokio::test]
    async fn test_user_limits() {
        let repo = MemoryUserRepository::new();
        let user = repo.create(NewUser::new("ada", "ada@example.com")).await.unwrap();
        assert_eq!(user.limits(), QuotaLimits::default());
        assert!(repo.create(NewUser::new("ada", "other@example.com")).await.is_err());

        let limits = QuotaLimits {
            max_files: 3,
            ..user.limits()
        };
        let updated = repo.update_limits(user.id, limits).await.unwrap();
        assert_eq!(updated.max_files, 3);
        assert!(repo.update_limits(99, limits).await.is_err());
    }
}

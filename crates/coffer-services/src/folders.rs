//! Logical folder operations
//!
//! Folders are tags on file records, so renaming or deleting one rewrites or
//! removes records in a single repository call. A folder matches itself and
//! every path below it (`a` covers `a/b`, never `ab`).

use std::time::Instant;

use coffer_core::models::{build_folder_tree, FolderNode, StoredFile};
use coffer_core::validation::{sanitize_filename, sanitize_folder_path};
use coffer_core::AppError;

use crate::ServiceContext;

#[derive(Clone)]
pub struct FolderService {
    context: ServiceContext,
}

impl FolderService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }

    /// Distinct non-empty folder paths of `user_id`, sorted.
    pub async fn list(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        self.context.files.distinct_folder_paths(user_id).await
    }

    pub async fn tree(&self, user_id: i64) -> Result<Vec<FolderNode>, AppError> {
        let paths = self.context.files.distinct_folder_paths(user_id).await?;
        Ok(build_folder_tree(paths))
    }

    /// Files in `folder_path` and below.
    pub async fn count(&self, user_id: i64, folder_path: &str) -> Result<i64, AppError> {
        let folder_path = sanitize_folder_path(folder_path);
        self.context.files.count_in_folder(user_id, &folder_path).await
    }

    /// Replace the last segment of `old_path` with `new_name`.
    ///
    /// Returns the number of file records retagged.
    pub async fn rename(
        &self,
        user_id: i64,
        old_path: &str,
        new_name: &str,
    ) -> Result<u64, AppError> {
        let old_path = sanitize_folder_path(old_path);
        if old_path.is_empty() {
            return Err(AppError::Validation("folder path is required".to_string()));
        }

        let name = sanitize_filename(new_name);
        if name.is_empty() {
            return Err(AppError::Validation("invalid folder name".to_string()));
        }

        let new_path = match old_path.rsplit_once('/') {
            Some((parent, _)) => sanitize_folder_path(&format!("{}/{}", parent, name)),
            None => sanitize_folder_path(&name),
        };
        if new_path.is_empty() {
            return Err(AppError::Validation("invalid folder name".to_string()));
        }
        if new_path == old_path {
            return Ok(0);
        }

        let touched = self
            .context
            .files
            .rename_folder(user_id, &old_path, &new_path)
            .await?;

        tracing::info!(
            user_id,
            old_path = %old_path,
            new_path = %new_path,
            files = touched,
            "Folder renamed"
        );
        Ok(touched)
    }

    /// Delete the folder with everything below it and return the removed
    /// records. Physical removal is best effort and never fails the call.
    pub async fn delete(&self, user_id: i64, folder_path: &str) -> Result<Vec<StoredFile>, AppError> {
        let start = Instant::now();
        let folder_path = sanitize_folder_path(folder_path);
        if folder_path.is_empty() {
            return Err(AppError::Validation("cannot delete root folder".to_string()));
        }

        let removed = self.context.files.delete_folder(user_id, &folder_path).await?;

        let mut missing = 0usize;
        for file in &removed {
            let path = file.physical_path();
            match self.context.storage.delete(&path).await {
                Ok(true) => {}
                Ok(false) => missing += 1,
                Err(e) => {
                    tracing::error!(
                        file_id = file.id,
                        path = %path.display(),
                        error = %e,
                        "Failed to delete stored object"
                    );
                }
            }
        }
        if missing > 0 {
            tracing::warn!(user_id, missing, folder_path = %folder_path, "Stored objects already missing");
        }

        tracing::info!(
            user_id,
            folder_path = %folder_path,
            files = removed.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Folder deleted"
        );
        Ok(removed)
    }
}

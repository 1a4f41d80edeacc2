//! Per-file operations: lookup, listing, download, rename, move, delete

use std::time::Instant;

use coffer_core::models::{Download, FileQuery, FileView, ImageInfo, Page};
use coffer_core::validation::{sanitize_filename, sanitize_folder_path};
use coffer_core::AppError;

use crate::ServiceContext;

#[derive(Clone)]
pub struct FileService {
    context: ServiceContext,
}

impl FileService {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }

    pub async fn get(&self, file_id: i64, user_id: i64) -> Result<FileView, AppError> {
        let file = self.context.owned_file(file_id, user_id).await?;
        Ok(self.context.view(file))
    }

    pub async fn list(&self, user_id: i64, query: FileQuery) -> Result<Page<FileView>, AppError> {
        let mut query = query.normalized();
        if let Some(folder) = query.folder_path.take() {
            query.folder_path = Some(sanitize_folder_path(&folder));
        }

        let (files, total) = self.context.files.list(user_id, &query).await?;
        let page = Page::new(files, &query, total);
        Ok(page.map(|file| self.context.view(file)))
    }

    pub async fn download(&self, file_id: i64, user_id: i64) -> Result<Download, AppError> {
        let file = self.context.owned_file(file_id, user_id).await?;
        let data = self.context.storage.read(&file.physical_path()).await?;

        tracing::debug!(file_id, user_id, size_bytes = data.len(), "File read");
        Ok(Download {
            file: self.context.view(file),
            data,
        })
    }

    /// Change the display name. The stored object keeps its opaque name.
    pub async fn rename(
        &self,
        file_id: i64,
        user_id: i64,
        new_name: &str,
    ) -> Result<FileView, AppError> {
        let name = sanitize_filename(new_name);
        if name.is_empty() {
            return Err(AppError::Validation("invalid filename".to_string()));
        }

        let mut file = self.context.owned_file(file_id, user_id).await?;
        file.original_name = name;
        let updated = self.context.files.update(&file).await?;

        tracing::info!(file_id, user_id, "File renamed");
        Ok(self.context.view(updated))
    }

    /// Retag a file with another logical folder. Physical bytes stay put.
    pub async fn move_file(
        &self,
        file_id: i64,
        user_id: i64,
        folder_path: &str,
    ) -> Result<FileView, AppError> {
        let mut file = self.context.owned_file(file_id, user_id).await?;
        file.folder_path = sanitize_folder_path(folder_path);
        let updated = self.context.files.update(&file).await?;

        tracing::info!(file_id, user_id, folder_path = %updated.folder_path, "File moved");
        Ok(self.context.view(updated))
    }

    /// Remove the bytes, then the record. A missing object on disk is not an
    /// error; a failed metadata delete is.
    pub async fn delete(&self, file_id: i64, user_id: i64) -> Result<(), AppError> {
        let start = Instant::now();
        let file = self.context.owned_file(file_id, user_id).await?;

        let path = file.physical_path();
        match self.context.storage.delete(&path).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(file_id, path = %path.display(), "Stored object already missing")
            }
            Err(e) => {
                tracing::error!(file_id, path = %path.display(), error = %e, "Failed to delete stored object");
                return Err(e.into());
            }
        }

        if !self.context.files.delete(file_id).await? {
            return Err(AppError::NotFound(format!("file {}", file_id)));
        }

        tracing::info!(
            file_id,
            user_id,
            size_bytes = file.file_size,
            duration_ms = start.elapsed().as_millis() as u64,
            "File deleted"
        );
        Ok(())
    }

    /// Metadata plus pixel dimensions. Files whose stored bytes do not decode
    /// as an image come back without dimensions.
    pub async fn image_info(&self, file_id: i64, user_id: i64) -> Result<ImageInfo, AppError> {
        let file = self.context.owned_file(file_id, user_id).await?;

        let path = file.physical_path();
        let dimensions = tokio::task::spawn_blocking(move || coffer_processing::dimensions_of(&path))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read image header: {}", e)))?;

        Ok(ImageInfo {
            file: self.context.view(file),
            dimensions,
        })
    }
}

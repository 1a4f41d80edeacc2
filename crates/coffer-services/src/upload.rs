//! Upload pipeline
//!
//! ceiling → user lock → quota → filename → classify → folder → write → insert
//!
//! Nothing reaches the disk before every check has passed. If the metadata
//! insert fails after the bytes were written, the object is removed again.

use std::time::Instant;

use coffer_core::models::{FileView, NewFile, User};
use coffer_core::validation::{sanitize_filename, sanitize_folder_path};
use coffer_core::AppError;
use coffer_processing::{classify, classify_image, normalize};

use crate::quota::QuotaLedger;
use crate::ServiceContext;

/// One file handed in by a user.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub user_id: i64,
    pub filename: String,
    pub data: Vec<u8>,
    pub folder_path: Option<String>,
}

impl UploadRequest {
    pub fn new(user_id: i64, filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            user_id,
            filename: filename.into(),
            data,
            folder_path: None,
        }
    }

    pub fn in_folder(mut self, folder_path: impl Into<String>) -> Self {
        self.folder_path = Some(folder_path.into());
        self
    }
}

/// Validated bytes ready to be written.
struct Accepted {
    original_name: String,
    folder_path: String,
    data: Vec<u8>,
    mime_type: &'static str,
    extension: &'static str,
}

#[derive(Clone)]
pub struct UploadService {
    context: ServiceContext,
    quota: QuotaLedger,
    max_upload_bytes: u64,
}

impl UploadService {
    pub fn new(context: ServiceContext, quota: QuotaLedger, max_upload_bytes: u64) -> Self {
        Self {
            context,
            quota,
            max_upload_bytes,
        }
    }

    #[tracing::instrument(skip(self, request), fields(user_id = request.user_id, size_bytes = request.data.len()))]
    pub async fn upload_file(&self, request: UploadRequest) -> Result<FileView, AppError> {
        let start = Instant::now();
        self.check_ceiling(request.data.len())?;

        let _guard = self.quota.lock_user(request.user_id).await;
        let user = self.quota.user(request.user_id).await?;
        self.quota
            .check_upload_allowed(&user, request.data.len() as i64)
            .await?;

        let original_name = valid_filename(&request.filename)?;
        let verified = classify(&request.data, &original_name)?;
        let folder_path = sanitize_folder_path(request.folder_path.as_deref().unwrap_or(""));

        let view = self
            .persist(
                &user,
                Accepted {
                    original_name,
                    folder_path,
                    data: request.data,
                    mime_type: verified.mime_type,
                    extension: verified.extension,
                },
            )
            .await?;

        tracing::info!(
            user_id = user.id,
            file_id = view.id,
            size_bytes = view.file_size,
            mime_type = %view.mime_type,
            duration_ms = start.elapsed().as_millis() as u64,
            "File uploaded"
        );
        Ok(view)
    }

    /// Upload an image. Limits are checked against the incoming bytes; the
    /// stored bytes, size and MIME type are those of the normalized image,
    /// which is what the quota is charged with.
    #[tracing::instrument(skip(self, request), fields(user_id = request.user_id, size_bytes = request.data.len()))]
    pub async fn upload_image(&self, request: UploadRequest) -> Result<FileView, AppError> {
        let start = Instant::now();
        self.check_ceiling(request.data.len())?;

        let _guard = self.quota.lock_user(request.user_id).await;
        let user = self.quota.user(request.user_id).await?;
        self.quota
            .check_upload_allowed(&user, request.data.len() as i64)
            .await?;

        let original_name = valid_filename(&request.filename)?;
        let kind = classify_image(&request.data)?;

        let data = request.data;
        let normalized = tokio::task::spawn_blocking(move || normalize(&data, kind))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to process image: {}", e)))??;

        let folder_path = sanitize_folder_path(request.folder_path.as_deref().unwrap_or(""));
        let extension = coffer_processing::image::extension_for(normalized.mime_type);

        let view = self
            .persist(
                &user,
                Accepted {
                    original_name,
                    folder_path,
                    data: normalized.data,
                    mime_type: normalized.mime_type,
                    extension,
                },
            )
            .await?;

        tracing::info!(
            user_id = user.id,
            file_id = view.id,
            size_bytes = view.file_size,
            width = normalized.width,
            height = normalized.height,
            duration_ms = start.elapsed().as_millis() as u64,
            "Image uploaded"
        );
        Ok(view)
    }

    fn check_ceiling(&self, size: usize) -> Result<(), AppError> {
        if size as u64 > self.max_upload_bytes {
            return Err(AppError::Validation(format!(
                "file exceeds maximum upload size of {} bytes",
                self.max_upload_bytes
            )));
        }
        Ok(())
    }

    async fn persist(&self, user: &User, accepted: Accepted) -> Result<FileView, AppError> {
        let object = self
            .context
            .storage
            .store(user.id, &accepted.data, accepted.extension)
            .await?;

        let new_file = NewFile {
            user_id: user.id,
            filename: object.name.clone(),
            original_name: accepted.original_name,
            file_path: object.path.to_string_lossy().into_owned(),
            folder_path: accepted.folder_path,
            file_size: accepted.data.len() as i64,
            mime_type: accepted.mime_type.to_string(),
        };

        match self.context.files.create_within_quota(new_file, user.limits()).await {
            Ok(stored) => Ok(self.context.view(stored)),
            Err(e) => {
                tracing::warn!(
                    user_id = user.id,
                    path = %object.path.display(),
                    error = %e,
                    "Metadata insert failed, removing written object"
                );
                if let Err(cleanup) = self.context.storage.delete(&object.path).await {
                    tracing::error!(
                        path = %object.path.display(),
                        error = %cleanup,
                        "Failed to remove orphaned object"
                    );
                }
                Err(e)
            }
        }
    }
}

fn valid_filename(raw: &str) -> Result<String, AppError> {
    let name = sanitize_filename(raw);
    if name.is_empty() {
        return Err(AppError::Validation("invalid filename".to_string()));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_filename_strips_directories() {
        assert_eq!(valid_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(valid_filename("C:\\docs\\report.pdf").unwrap(), "report.pdf");
    }

    #[test]
    fn test_valid_filename_rejects_empty() {
        assert!(matches!(valid_filename(".."), Err(AppError::Validation(_))));
        assert!(matches!(valid_filename("dir/"), Err(AppError::Validation(_))));
        assert!(matches!(valid_filename("  "), Err(AppError::Validation(_))));
    }
}

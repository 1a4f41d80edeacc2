//! In-place editing of small text files

use coffer_core::constants::MAX_EDITABLE_BYTES;
use coffer_core::models::{FileView, StoredFile};
use coffer_core::validation::file_extension;
use coffer_core::AppError;
use coffer_processing::classify;

use crate::quota::QuotaLedger;
use crate::ServiceContext;

const EDITABLE_MIME_TYPES: &[&str] = &[
    "text/plain",
    "text/html",
    "text/css",
    "text/csv",
    "text/xml",
    "application/json",
    "application/xml",
    "text/markdown",
    "application/x-yaml",
    "text/yaml",
];

const EDITABLE_EXTENSIONS: &[&str] = &[
    "txt", "md", "json", "xml", "html", "css", "csv", "yaml", "yml", "ini", "conf", "log",
];

/// Whether `file` holds text that may be read and rewritten in place.
pub fn is_editable(file: &StoredFile) -> bool {
    if EDITABLE_MIME_TYPES.contains(&file.mime_type.as_str()) {
        return true;
    }
    file_extension(&file.original_name)
        .map(|ext| EDITABLE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct ContentEditor {
    context: ServiceContext,
    quota: QuotaLedger,
}

impl ContentEditor {
    pub fn new(context: ServiceContext, quota: QuotaLedger) -> Self {
        Self { context, quota }
    }

    pub async fn read_content(&self, file_id: i64, user_id: i64) -> Result<String, AppError> {
        let file = self.editable_file(file_id, user_id).await?;

        let data = self.context.storage.read(&file.physical_path()).await?;
        String::from_utf8(data)
            .map_err(|_| AppError::Validation("file is not valid UTF-8 text".to_string()))
    }

    /// Replace the contents of a text file and record its new size.
    pub async fn write_content(
        &self,
        file_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<FileView, AppError> {
        let new_size = content.len() as i64;
        if new_size > MAX_EDITABLE_BYTES {
            return Err(AppError::Validation("content too large to edit".to_string()));
        }

        let _guard = self.quota.lock_user(user_id).await;
        let mut file = self.editable_file(file_id, user_id).await?;

        // Edited text must pass the same screening as an upload would.
        classify(content.as_bytes(), &file.original_name)?;

        let user = self.quota.user(user_id).await?;
        self.quota.check_growth(&user, file.file_size, new_size).await?;

        let path = file.physical_path();
        let previous = self.context.storage.read(&path).await?;
        self.context.storage.overwrite(&path, content.as_bytes()).await?;

        file.file_size = new_size;
        let updated = match self.context.files.update(&file).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(
                    file_id,
                    path = %path.display(),
                    error = %e,
                    "Metadata update failed, restoring previous content"
                );
                if let Err(restore) = self.context.storage.overwrite(&path, &previous).await {
                    tracing::error!(
                        file_id,
                        path = %path.display(),
                        error = %restore,
                        "Failed to restore previous content"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(file_id, user_id, size_bytes = new_size, "File content updated");
        Ok(self.context.view(updated))
    }

    async fn editable_file(&self, file_id: i64, user_id: i64) -> Result<StoredFile, AppError> {
        let file = self.context.owned_file(file_id, user_id).await?;
        if !is_editable(&file) {
            return Err(AppError::Validation("file is not editable".to_string()));
        }
        if file.file_size > MAX_EDITABLE_BYTES {
            return Err(AppError::Validation("file too large to edit".to_string()));
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn file(mime_type: &str, original_name: &str) -> StoredFile {
        StoredFile {
            id: 1,
            user_id: 1,
            filename: "x.bin".to_string(),
            original_name: original_name.to_string(),
            file_path: "/tmp/x.bin".to_string(),
            folder_path: String::new(),
            file_size: 3,
            mime_type: mime_type.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_editable_by_mime_type() {
        assert!(is_editable(&file("application/json", "data")));
        assert!(is_editable(&file("text/plain", "notes")));
    }

    #[test]
    fn test_editable_by_extension() {
        assert!(is_editable(&file("application/octet-stream", "server.CONF")));
        assert!(is_editable(&file("application/octet-stream", "notes.md")));
    }

    #[test]
    fn test_binary_not_editable() {
        assert!(!is_editable(&file("image/png", "photo.png")));
        assert!(!is_editable(&file("application/pdf", "report")));
    }
}

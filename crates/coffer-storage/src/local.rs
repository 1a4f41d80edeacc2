use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::keys;
use crate::traits::{Storage, StorageError, StorageResult, StoredObject};

#[cfg(unix)]
const FILE_MODE: u32 = 0o640;
#[cfg(unix)]
const DIR_MODE: u32 = 0o750;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/coffer/uploads")
    /// * `base_url` - Base URL stored paths are served under (e.g., "http://localhost:8080")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_path = fs::canonicalize(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn check_path(&self, path: &Path) -> StorageResult<()> {
        if !keys::is_within(&self.base_path, path) {
            return Err(StorageError::InvalidPath(
                "Path resolves outside storage directory".to_string(),
            ));
        }
        Ok(())
    }

    async fn create_dir(&self, dir: &Path) -> StorageResult<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder.create(dir).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create directory {}: {}", dir.display(), e))
        })
    }

    /// Write to a hidden temp sibling, sync, then rename over `target`.
    /// The temp file is removed on any failure after it was created.
    async fn write_atomically(&self, target: &Path, data: &[u8]) -> StorageResult<()> {
        let tmp = keys::temp_path_for(target).ok_or_else(|| {
            StorageError::InvalidPath(format!("No file name in {}", target.display()))
        })?;

        // Another writer owns an existing temp file; leave it alone.
        let file = create_exclusive(&tmp).await?;

        let result: StorageResult<()> = async {
            write_synced(file, &tmp, data).await?;
            fs::rename(&tmp, target).await.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to move {} into place: {}", target.display(), e))
            })
        }
        .await;

        if result.is_err() {
            if let Err(e) = fs::remove_file(&tmp).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %tmp.display(), error = %e, "Failed to remove temp file");
                }
            }
        }
        result
    }
}

/// Create `path` with the final file mode; fails if it already exists.
async fn create_exclusive(path: &Path) -> StorageResult<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    options.open(path).await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
    })
}

async fn write_synced(mut file: fs::File, path: &Path, data: &[u8]) -> StorageResult<()> {
    file.write_all(data).await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
    })?;

    file.sync_all().await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
    })?;

    // The creation mode is masked by the umask.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_MODE)).await?;
    }

    Ok(())
}

#[async_trait]
impl Storage for LocalStorage {
    fn root(&self) -> &Path {
        &self.base_path
    }

    async fn allocate(&self, user_id: i64) -> StorageResult<PathBuf> {
        let dir = keys::shard_dir(&self.base_path, user_id, Utc::now().date_naive());
        self.create_dir(&dir).await?;
        Ok(dir)
    }

    async fn write(&self, dir: &Path, data: &[u8], extension: &str) -> StorageResult<StoredObject> {
        self.check_path(dir)?;
        if !keys::is_valid_extension(extension) {
            return Err(StorageError::InvalidPath(format!(
                "Invalid extension: {}",
                extension
            )));
        }

        let start = Instant::now();
        let name = keys::object_name(extension);
        let path = dir.join(&name);

        self.write_atomically(&path, data).await?;

        tracing::info!(
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(StoredObject { name, path })
    }

    async fn overwrite(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        self.check_path(path)?;
        let start = Instant::now();

        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(path.display().to_string()));
        }

        self.write_atomically(path, data).await?;

        tracing::info!(
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage overwrite successful"
        );

        Ok(())
    }

    async fn read(&self, path: &Path) -> StorageResult<Vec<u8>> {
        self.check_path(path)?;

        match fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StorageError::ReadFailed(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn delete(&self, path: &Path) -> StorageResult<bool> {
        self.check_path(path)?;
        let start = Instant::now();

        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::info!(
                    path = %path.display(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage delete successful"
                );
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, path: &Path) -> StorageResult<bool> {
        self.check_path(path)?;
        Ok(fs::try_exists(path).await?)
    }

    fn url_for(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.base_path).unwrap_or(path);
        let relative = relative.to_string_lossy().replace('\\', "/");
        format!("{}/{}", self.base_url, relative.trim_start_matches('/'))
    }
}

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use coffer_core::models::{FileQuery, NewFile, NewUser, QuotaLimits, StoredFile, User};
use coffer_core::{AppError, CofferConfig};
use coffer_db::{FileRepository, MemoryFileRepository, MemoryUserRepository, UserRepository};
use coffer_services::{Coffer, ServiceContext, UploadRequest};
use coffer_storage::{LocalStorage, Storage};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;

pub struct TestEnv {
    pub coffer: Coffer,
    pub users: MemoryUserRepository,
    pub files: MemoryFileRepository,
    /// Wraps `files` as seen by the services
    pub faults: Arc<FaultyFileRepository>,
    pub storage: Arc<LocalStorage>,
    pub root: PathBuf,
    _dir: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_config(CofferConfig::default()).await
    }

    pub async fn with_config(config: CofferConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            LocalStorage::new(dir.path(), "http://files.test")
                .await
                .unwrap(),
        );
        let root = storage.root().to_path_buf();
        let users = MemoryUserRepository::new();
        let files = MemoryFileRepository::new();
        let faults = Arc::new(FaultyFileRepository::new(files.clone()));

        let context = ServiceContext::new(
            faults.clone(),
            Arc::new(users.clone()),
            storage.clone(),
        );

        Self {
            coffer: Coffer::new(context, &config),
            users,
            files,
            faults,
            storage,
            root,
            _dir: dir,
        }
    }

    pub async fn user(&self, username: &str) -> User {
        self.user_with_limits(username, QuotaLimits::default()).await
    }

    pub async fn user_with_limits(&self, username: &str, limits: QuotaLimits) -> User {
        let mut new_user = NewUser::new(username, format!("{}@example.com", username));
        new_user.limits = limits;
        self.users.create(new_user).await.unwrap()
    }

    pub fn stored_object_count(&self) -> usize {
        count_files(&self.root)
    }
}

pub fn limits(max_files: i64, max_file_size: i64, max_storage: i64) -> QuotaLimits {
    QuotaLimits {
        max_files,
        max_file_size,
        max_storage,
    }
}

pub fn text_upload(user_id: i64, name: &str, body: &str) -> UploadRequest {
    UploadRequest::new(user_id, name, body.as_bytes().to_vec())
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

pub fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 90, 255]));
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8()),
        _ => DynamicImage::ImageRgba8(img),
    };
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

/// File repository that fails inserts or updates on demand.
pub struct FaultyFileRepository {
    inner: MemoryFileRepository,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
}

impl FaultyFileRepository {
    pub fn new(inner: MemoryFileRepository) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
        }
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    fn injected() -> AppError {
        AppError::Internal("injected repository failure".to_string())
    }
}

#[async_trait]
impl FileRepository for FaultyFileRepository {
    async fn create_within_quota(
        &self,
        file: NewFile,
        limits: QuotaLimits,
    ) -> Result<StoredFile, AppError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.create_within_quota(file, limits).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<StoredFile>, AppError> {
        self.inner.find_by_id(id).await
    }

    async fn list(
        &self,
        user_id: i64,
        query: &FileQuery,
    ) -> Result<(Vec<StoredFile>, i64), AppError> {
        self.inner.list(user_id, query).await
    }

    async fn count_by_user(&self, user_id: i64) -> Result<i64, AppError> {
        self.inner.count_by_user(user_id).await
    }

    async fn total_size_by_user(&self, user_id: i64) -> Result<i64, AppError> {
        self.inner.total_size_by_user(user_id).await
    }

    async fn count_in_folder(&self, user_id: i64, folder_path: &str) -> Result<i64, AppError> {
        self.inner.count_in_folder(user_id, folder_path).await
    }

    async fn update(&self, file: &StoredFile) -> Result<StoredFile, AppError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.update(file).await
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        self.inner.delete(id).await
    }

    async fn rename_folder(
        &self,
        user_id: i64,
        old_path: &str,
        new_path: &str,
    ) -> Result<u64, AppError> {
        self.inner.rename_folder(user_id, old_path, new_path).await
    }

    async fn delete_folder(
        &self,
        user_id: i64,
        folder_path: &str,
    ) -> Result<Vec<StoredFile>, AppError> {
        self.inner.delete_folder(user_id, folder_path).await
    }

    async fn distinct_folder_paths(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        self.inner.distinct_folder_paths(user_id).await
    }
}

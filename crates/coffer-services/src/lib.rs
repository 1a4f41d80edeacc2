//! Coffer Services Layer
//!
//! Orchestration over the repositories, the physical store and the content
//! pipeline. Every public operation takes the acting user's id and enforces
//! ownership itself; callers never touch `coffer-db` or `coffer-storage`
//! directly.

pub mod editor;
pub mod files;
pub mod folders;
pub mod quota;
pub mod upload;

use std::sync::Arc;

use coffer_core::models::{FileView, StoredFile};
use coffer_core::{AppError, CofferConfig};
use coffer_db::{FileRepository, UserRepository};
use coffer_storage::Storage;

pub use editor::ContentEditor;
pub use files::FileService;
pub use folders::FolderService;
pub use quota::{QuotaLedger, UserLocks};
pub use upload::{UploadRequest, UploadService};

/// Collaborators shared by every service.
#[derive(Clone)]
pub struct ServiceContext {
    pub files: Arc<dyn FileRepository>,
    pub users: Arc<dyn UserRepository>,
    pub storage: Arc<dyn Storage>,
    pub locks: UserLocks,
}

impl ServiceContext {
    pub fn new(
        files: Arc<dyn FileRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            files,
            users,
            storage,
            locks: UserLocks::default(),
        }
    }

    /// Load a file on behalf of `user_id`.
    ///
    /// A record owned by someone else yields `Forbidden`, which renders to
    /// clients exactly like `NotFound`.
    pub(crate) async fn owned_file(&self, file_id: i64, user_id: i64) -> Result<StoredFile, AppError> {
        let file = self
            .files
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("file {}", file_id)))?;

        if !file.is_owned_by(user_id) {
            tracing::warn!(file_id, user_id, "Access to foreign file denied");
            return Err(AppError::Forbidden(format!("file {}", file_id)));
        }

        Ok(file)
    }

    pub(crate) fn view(&self, file: StoredFile) -> FileView {
        let url = self.storage.url_for(&file.physical_path());
        file.into_view(url)
    }
}

/// All services wired over one context.
#[derive(Clone)]
pub struct Coffer {
    pub uploads: UploadService,
    pub files: FileService,
    pub folders: FolderService,
    pub editor: ContentEditor,
    pub quota: QuotaLedger,
}

impl Coffer {
    pub fn new(context: ServiceContext, config: &CofferConfig) -> Self {
        let quota = QuotaLedger::new(context.clone());
        Self {
            uploads: UploadService::new(context.clone(), quota.clone(), config.max_upload_bytes),
            files: FileService::new(context.clone()),
            folders: FolderService::new(context.clone()),
            editor: ContentEditor::new(context, quota.clone()),
            quota,
        }
    }
}

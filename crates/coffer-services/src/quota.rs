//! Per-user quota accounting and write serialization

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use coffer_core::models::{User, UserSettings, UserStats};
use coffer_core::{AppError, QuotaViolation};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::ServiceContext;

/// Registry of one async mutex per user.
///
/// Every quota-affecting write holds the owner's guard from the quota check
/// until the metadata insert, so two writes of the same user never interleave.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl UserLocks {
    pub async fn lock(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody holds or waits on.
            locks.retain(|id, lock| *id == user_id || Arc::strong_count(lock) > 1);
            locks.entry(user_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

/// Usage accounting and limit management for users.
#[derive(Clone)]
pub struct QuotaLedger {
    context: ServiceContext,
}

impl QuotaLedger {
    pub fn new(context: ServiceContext) -> Self {
        Self { context }
    }

    pub async fn user(&self, user_id: i64) -> Result<User, AppError> {
        self.context
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
    }

    /// Serialize quota-affecting writes of `user_id`.
    pub async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        self.context.locks.lock(user_id).await
    }

    /// Check whether `user` may store one more file of `incoming_size` bytes.
    pub async fn check_upload_allowed(&self, user: &User, incoming_size: i64) -> Result<(), AppError> {
        let total_files = self.context.files.count_by_user(user.id).await?;
        let total_size = self.context.files.total_size_by_user(user.id).await?;

        user.limits()
            .check(total_files, total_size, incoming_size)
            .map_err(|violation| {
                tracing::warn!(
                    user_id = user.id,
                    size_bytes = incoming_size,
                    total_files,
                    total_size,
                    %violation,
                    "Upload rejected by quota"
                );
                AppError::QuotaExceeded(violation)
            })
    }

    /// Check that replacing `current_size` bytes with `new_size` bytes keeps
    /// `user` within its storage limit. Shrinking always passes.
    pub async fn check_growth(
        &self,
        user: &User,
        current_size: i64,
        new_size: i64,
    ) -> Result<(), AppError> {
        if new_size <= current_size {
            return Ok(());
        }

        let total_size = self.context.files.total_size_by_user(user.id).await?;
        let grown = new_size - current_size;
        if total_size.saturating_add(grown) > user.max_storage {
            tracing::warn!(
                user_id = user.id,
                size_bytes = new_size,
                total_size,
                "Content edit rejected by quota"
            );
            return Err(AppError::QuotaExceeded(QuotaViolation::Storage {
                used: total_size,
                incoming: grown,
                limit: user.max_storage,
            }));
        }
        Ok(())
    }

    pub async fn stats(&self, user_id: i64) -> Result<UserStats, AppError> {
        let user = self.user(user_id).await?;
        let total_files = self.context.files.count_by_user(user_id).await?;
        let total_size = self.context.files.total_size_by_user(user_id).await?;

        Ok(UserStats {
            total_files,
            total_size,
            max_files: user.max_files,
            max_file_size: user.max_file_size,
            max_storage: user.max_storage,
        })
    }

    pub async fn settings(&self, user_id: i64) -> Result<UserSettings, AppError> {
        let user = self.user(user_id).await?;
        Ok(UserSettings::from(user.limits()))
    }

    /// Apply the positive fields of `settings` and return the resulting limits.
    pub async fn update_settings(
        &self,
        user_id: i64,
        settings: UserSettings,
    ) -> Result<UserSettings, AppError> {
        let _guard = self.lock_user(user_id).await;
        let user = self.user(user_id).await?;
        let limits = settings.apply_to(user.limits());

        let updated = self.context.users.update_limits(user_id, limits).await?;
        tracing::info!(
            user_id,
            max_files = updated.max_files,
            max_file_size = updated.max_file_size,
            max_storage = updated.max_storage,
            "User limits updated"
        );

        Ok(UserSettings::from(updated.limits()))
    }
}

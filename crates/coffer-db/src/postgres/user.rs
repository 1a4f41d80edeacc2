use async_trait::async_trait;
use coffer_core::models::{NewUser, QuotaLimits, User};
use coffer_core::AppError;
use sqlx::{PgPool, Postgres};

use crate::traits::UserRepository;

const USER_COLUMNS: &str =
    "id, username, email, max_files, max_file_size, max_storage, created_at, updated_at";

/// Repository for users and their limits
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select", db.record_id = id))]
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, user), fields(db.table = "users", db.operation = "insert"))]
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let created = sqlx::query_as::<Postgres, User>(&format!(
            r#"
            INSERT INTO users (username, email, max_files, max_file_size, max_storage)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.limits.max_files)
        .bind(user.limits.max_file_size)
        .bind(user.limits.max_storage)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Validation("username or email already taken".to_string())
            }
            other => AppError::Database(other),
        })?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update", db.record_id = id))]
    async fn update_limits(&self, id: i64, limits: QuotaLimits) -> Result<User, AppError> {
        let updated = sqlx::query_as::<Postgres, User>(&format!(
            r#"
            UPDATE users
            SET max_files = $2, max_file_size = $3, max_storage = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(limits.max_files)
        .bind(limits.max_file_size)
        .bind(limits.max_storage)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }
}

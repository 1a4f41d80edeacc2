use async_trait::async_trait;
use coffer_core::models::{FileQuery, NewFile, QuotaLimits, StoredFile};
use coffer_core::AppError;
use sqlx::{PgPool, Postgres};

use crate::traits::FileRepository;
use crate::transaction::{lock_user_row, TransactionGuard};

const FILE_COLUMNS: &str = "id, user_id, filename, original_name, file_path, folder_path, \
                            file_size, mime_type, created_at, updated_at";

// Matches a folder and everything below it, never a sibling sharing the prefix.
const SUBTREE_FILTER: &str =
    "(folder_path = $2 OR left(folder_path, char_length($2) + 1) = $2 || '/')";

/// Repository for file metadata
#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    #[tracing::instrument(skip(self, file), fields(db.table = "files", db.operation = "insert", user_id = file.user_id, size_bytes = file.file_size))]
    async fn create_within_quota(
        &self,
        file: NewFile,
        limits: QuotaLimits,
    ) -> Result<StoredFile, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        lock_user_row(tx.conn()?, file.user_id).await?;

        let (count, total): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(file_size), 0)::BIGINT FROM files WHERE user_id = $1",
        )
        .bind(file.user_id)
        .fetch_one(tx.conn()?)
        .await?;

        if let Err(violation) = limits.check(count, total, file.file_size) {
            tx.rollback().await?;
            return Err(AppError::QuotaExceeded(violation));
        }

        let created = sqlx::query_as::<Postgres, StoredFile>(&format!(
            r#"
            INSERT INTO files (user_id, filename, original_name, file_path, folder_path, file_size, mime_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            FILE_COLUMNS
        ))
        .bind(file.user_id)
        .bind(&file.filename)
        .bind(&file.original_name)
        .bind(&file.file_path)
        .bind(&file.folder_path)
        .bind(file.file_size)
        .bind(&file.mime_type)
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select", db.record_id = id))]
    async fn find_by_id(&self, id: i64) -> Result<Option<StoredFile>, AppError> {
        let file = sqlx::query_as::<Postgres, StoredFile>(&format!(
            "SELECT {} FROM files WHERE id = $1",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(file)
    }

    #[tracing::instrument(skip(self, query), fields(db.table = "files", db.operation = "select"))]
    async fn list(
        &self,
        user_id: i64,
        query: &FileQuery,
    ) -> Result<(Vec<StoredFile>, i64), AppError> {
        // Sort column and direction come from closed enums, never from input text.
        let order = format!(
            "{} {}, id {}",
            query.sort_by.column(),
            query.sort_order.as_sql(),
            query.sort_order.as_sql()
        );

        let (files, total) = match &query.folder_path {
            Some(folder) => {
                let files = sqlx::query_as::<Postgres, StoredFile>(&format!(
                    "SELECT {} FROM files WHERE user_id = $1 AND folder_path = $2 ORDER BY {} LIMIT $3 OFFSET $4",
                    FILE_COLUMNS, order
                ))
                .bind(user_id)
                .bind(folder)
                .bind(query.page_size)
                .bind(query.offset())
                .fetch_all(&self.pool)
                .await?;

                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM files WHERE user_id = $1 AND folder_path = $2",
                )
                .bind(user_id)
                .bind(folder)
                .fetch_one(&self.pool)
                .await?;

                (files, total)
            }
            None => {
                let files = sqlx::query_as::<Postgres, StoredFile>(&format!(
                    "SELECT {} FROM files WHERE user_id = $1 ORDER BY {} LIMIT $2 OFFSET $3",
                    FILE_COLUMNS, order
                ))
                .bind(user_id)
                .bind(query.page_size)
                .bind(query.offset())
                .fetch_all(&self.pool)
                .await?;

                let total = self.count_by_user(user_id).await?;
                (files, total)
            }
        };

        Ok((files, total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn count_by_user(&self, user_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn total_size_by_user(&self, user_id: i64) -> Result<i64, AppError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(file_size), 0)::BIGINT FROM files WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn count_in_folder(&self, user_id: i64, folder_path: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM files WHERE user_id = $1 AND {}",
            SUBTREE_FILTER
        ))
        .bind(user_id)
        .bind(folder_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self, file), fields(db.table = "files", db.operation = "update", db.record_id = file.id))]
    async fn update(&self, file: &StoredFile) -> Result<StoredFile, AppError> {
        let updated = sqlx::query_as::<Postgres, StoredFile>(&format!(
            r#"
            UPDATE files
            SET original_name = $3, folder_path = $4, file_size = $5, mime_type = $6, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            FILE_COLUMNS
        ))
        .bind(file.id)
        .bind(file.user_id)
        .bind(&file.original_name)
        .bind(&file.folder_path)
        .bind(file.file_size)
        .bind(&file.mime_type)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| AppError::NotFound(format!("file {}", file.id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete", db.record_id = id))]
    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update"))]
    async fn rename_folder(
        &self,
        user_id: i64,
        old_path: &str,
        new_path: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE files
            SET folder_path = CASE
                    WHEN folder_path = $2 THEN $3
                    ELSE $3 || substr(folder_path, char_length($2) + 1)
                END,
                updated_at = NOW()
            WHERE user_id = $1 AND {}
            "#,
            SUBTREE_FILTER
        ))
        .bind(user_id)
        .bind(old_path)
        .bind(new_path)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete"))]
    async fn delete_folder(
        &self,
        user_id: i64,
        folder_path: &str,
    ) -> Result<Vec<StoredFile>, AppError> {
        let deleted = sqlx::query_as::<Postgres, StoredFile>(&format!(
            "DELETE FROM files WHERE user_id = $1 AND {} RETURNING {}",
            SUBTREE_FILTER, FILE_COLUMNS
        ))
        .bind(user_id)
        .bind(folder_path)
        .fetch_all(&self.pool)
        .await?;

        Ok(deleted)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn distinct_folder_paths(&self, user_id: i64) -> Result<Vec<String>, AppError> {
        let paths: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT folder_path FROM files WHERE user_id = $1 AND folder_path <> '' ORDER BY folder_path",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(paths)
    }
}

//! Database transaction utilities
//!
//! Used for the quota-checked insert, which must read usage and insert the new
//! record while holding the owner's row lock.

use coffer_core::AppError;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// A transaction that must be committed explicitly.
///
/// Dropping it without [`TransactionGuard::commit`] rolls back, which sqlx
/// does when the inner transaction is dropped.
///
/// ```ignore
/// let mut tx = TransactionGuard::begin(&pool).await?;
/// lock_user_row(tx.conn()?, user_id).await?;
/// sqlx::query("INSERT INTO ...").execute(tx.conn()?).await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard {
    transaction: Option<Transaction<'static, Postgres>>,
}

impl TransactionGuard {
    pub async fn begin(pool: &PgPool) -> Result<Self, AppError> {
        let transaction = pool.begin().await?;
        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// Connection the transaction runs on.
    pub fn conn(&mut self) -> Result<&mut PgConnection, AppError> {
        self.transaction
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("transaction already finished".to_string()))
    }

    pub async fn commit(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.transaction.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            tracing::debug!("Transaction dropped without commit - rolling back");
        }
    }
}

/// Take the row lock of `user_id` for the rest of the transaction.
pub async fn lock_user_row(conn: &mut PgConnection, user_id: i64) -> Result<(), AppError> {
    let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

    match locked {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("user {}", user_id))),
    }
}

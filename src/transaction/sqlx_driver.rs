use async_trait::async_trait;
use sqlx::{Any, Transaction as SqlxTransaction};
use thiserror::Error;
use tokio::sync::Mutex;

use super::Driver;

/// Errors surfaced by [`SqlxDriver`].
#[derive(Debug, Error)]
pub enum SqlxDriverError {
    /// A `sqlx` operation failed.
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    /// `execute`/`commit`/`rollback` was called after the transaction had
    /// already been consumed by a prior `commit`/`rollback`.
    #[error("transaction already finalized")]
    AlreadyFinalized,
}

/// A [`Driver`] backed by a `sqlx::Any` transaction.
///
/// `sqlx::Transaction::commit`/`rollback` consume `self`, so the
/// transaction is held behind an `Option` that `commit`/`rollback` take out
/// of; `execute` borrows it mutably for the statement's duration.
pub struct SqlxDriver {
    tx: Mutex<Option<SqlxTransaction<'static, Any>>>,
}

impl SqlxDriver {
    /// Wraps an already-open `sqlx::Any` transaction as a [`Driver`].
    pub fn new(tx: SqlxTransaction<'static, Any>) -> Self {
        Self { tx: Mutex::new(Some(tx)) }
    }
}

#[async_trait]
impl Driver for SqlxDriver {
    type Error = SqlxDriverError;

    async fn execute(&self, sql: &str) -> Result<(), Self::Error> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(SqlxDriverError::AlreadyFinalized)?;
        sqlx::query(sql).execute(&mut *tx).await?;
        Ok(())
    }

    async fn commit(&self) -> Result<(), Self::Error> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or(SqlxDriverError::AlreadyFinalized)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), Self::Error> {
        let tx = self
            .tx
            .lock()
            .await
            .take()
            .ok_or(SqlxDriverError::AlreadyFinalized)?;
        tx.rollback().await?;
        Ok(())
    }
}

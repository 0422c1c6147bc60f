//! Persistence ports used by the orchestration core.
//! Adapters in `crate::adapters` implement these against Postgres or memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{Product, Transaction};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Insert rejected by the unique key on `unique_ref`.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                RepositoryError::Duplicate(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Durable keyed store for sale activations.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Inserts a new row. Fails with [`RepositoryError::Duplicate`] when `unique_ref` exists.
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn find_by_unique_ref(&self, unique_ref: &str) -> RepositoryResult<Option<Transaction>>;

    /// Writes every mutable field of the row identified by `tx.id` in one statement
    /// and returns the stored row with its refreshed `updated_at`.
    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    /// Rows with status PENDING, `retry_count < max_retries` and `updated_at < cutoff`.
    async fn find_pending_for_retry(
        &self,
        max_retries: i32,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>>;
}

/// Read-only product reference data.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Looks up an active product by code; inactive products are invisible.
    async fn find_active(&self, product_code: &str) -> RepositoryResult<Option<Product>>;
}

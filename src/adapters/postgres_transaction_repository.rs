//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Transaction, TransactionStatus};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const COLUMNS: &str = r#"
    id, unique_ref, product_code, amount, currency, card_no, invoice_no, store_code,
    device_id, txn_date, status, activation_code, void_code, tnc, activation_steps,
    vendor_raw_request, vendor_raw_response, error_code, error_message, retry_count,
    created_at, updated_at
"#;

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"
            INSERT INTO sale_activations (
                id, unique_ref, product_code, amount, currency, card_no, invoice_no,
                store_code, device_id, txn_date, status, retry_count, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(tx.id)
            .bind(&tx.unique_ref)
            .bind(&tx.product_code)
            .bind(tx.amount)
            .bind(&tx.currency)
            .bind(&tx.card_no)
            .bind(&tx.invoice_no)
            .bind(&tx.store_code)
            .bind(&tx.device_id)
            .bind(tx.txn_date)
            .bind(tx.status.as_str())
            .bind(tx.retry_count)
            .bind(tx.created_at)
            .bind(tx.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn find_by_unique_ref(&self, unique_ref: &str) -> RepositoryResult<Option<Transaction>> {
        let sql = format!("SELECT {COLUMNS} FROM sale_activations WHERE unique_ref = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(unique_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"
            UPDATE sale_activations SET
                status = $2, activation_code = $3, void_code = $4, tnc = $5,
                activation_steps = $6, vendor_raw_request = $7, vendor_raw_response = $8,
                error_code = $9, error_message = $10, retry_count = $11, updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(tx.id)
            .bind(tx.status.as_str())
            .bind(&tx.activation_code)
            .bind(&tx.void_code)
            .bind(&tx.tnc)
            .bind(&tx.activation_steps)
            .bind(&tx.vendor_raw_request)
            .bind(&tx.vendor_raw_response)
            .bind(&tx.error_code)
            .bind(&tx.error_message)
            .bind(tx.retry_count)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(tx.unique_ref.clone()))?
            .into_domain()
    }

    async fn find_pending_for_retry(
        &self,
        max_retries: i32,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM sale_activations
            WHERE status = 'PENDING'
            AND retry_count < $1
            AND updated_at < $2
            ORDER BY updated_at ASC
            "#
        );

        let rows = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(max_retries)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    unique_ref: String,
    product_code: String,
    amount: i64,
    currency: String,
    card_no: Option<String>,
    invoice_no: String,
    store_code: String,
    device_id: String,
    txn_date: DateTime<Utc>,
    status: String,
    activation_code: Option<String>,
    void_code: Option<String>,
    tnc: Option<String>,
    activation_steps: Option<String>,
    vendor_raw_request: Option<String>,
    vendor_raw_response: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
    retry_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let status = self
            .status
            .parse::<TransactionStatus>()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(Transaction {
            id: self.id,
            unique_ref: self.unique_ref,
            product_code: self.product_code,
            amount: self.amount,
            currency: self.currency,
            card_no: self.card_no,
            invoice_no: self.invoice_no,
            store_code: self.store_code,
            device_id: self.device_id,
            txn_date: self.txn_date,
            status,
            activation_code: self.activation_code,
            void_code: self.void_code,
            tnc: self.tnc,
            activation_steps: self.activation_steps,
            vendor_raw_request: self.vendor_raw_request,
            vendor_raw_response: self.vendor_raw_response,
            error_code: self.error_code,
            error_message: self.error_message,
            retry_count: self.retry_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{Product, Transaction, TransactionStatus};
use crate::ports::{
    ProductCatalog, RepositoryError, RepositoryResult, TransactionRepository,
};

/// A thread-safe in-memory transaction store keyed by `unique_ref`.
///
/// The write lock around insert gives the same unique-key guarantee the
/// Postgres index provides, so concurrent first requests race the same way.
#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<RwLock<HashMap<String, Transaction>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        if transactions.contains_key(&tx.unique_ref) {
            return Err(RepositoryError::Duplicate(tx.unique_ref.clone()));
        }
        transactions.insert(tx.unique_ref.clone(), tx.clone());
        Ok(tx.clone())
    }

    async fn find_by_unique_ref(&self, unique_ref: &str) -> RepositoryResult<Option<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(unique_ref).cloned())
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        match transactions.get_mut(&tx.unique_ref) {
            Some(stored) if stored.id == tx.id => {
                let mut updated = tx.clone();
                updated.updated_at = Utc::now();
                *stored = updated.clone();
                Ok(updated)
            }
            _ => Err(RepositoryError::NotFound(tx.unique_ref.clone())),
        }
    }

    async fn find_pending_for_retry(
        &self,
        max_retries: i32,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let mut pending: Vec<Transaction> = transactions
            .values()
            .filter(|t| {
                t.status == TransactionStatus::Pending
                    && t.retry_count < max_retries
                    && t.updated_at < cutoff
            })
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.updated_at);
        Ok(pending)
    }
}

/// In-memory product catalog; inactive entries are stored but never returned.
#[derive(Default, Clone)]
pub struct InMemoryProductCatalog {
    products: Arc<RwLock<HashMap<String, Product>>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, product: Product) {
        let mut products = self.products.write().await;
        products.insert(product.product_code.clone(), product);
    }

    pub async fn remove(&self, product_code: &str) -> Option<Product> {
        self.products.write().await.remove(product_code)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn find_active(&self, product_code: &str) -> RepositoryResult<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.get(product_code).filter(|p| p.active).cloned())
    }
}

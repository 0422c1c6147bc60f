//! Postgres implementation of ProductCatalog.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::Product;
use crate::ports::{ProductCatalog, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresProductCatalog {
    pool: PgPool,
}

impl PostgresProductCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PostgresProductCatalog {
    async fn find_active(&self, product_code: &str) -> RepositoryResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT product_code, currency, vendor_code, active, min_amount, max_amount
            FROM products
            WHERE product_code = $1 AND active = TRUE
            "#,
        )
        .bind(product_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(Into::into))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    product_code: String,
    currency: String,
    vendor_code: String,
    active: bool,
    min_amount: Option<i64>,
    max_amount: Option<i64>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            product_code: row.product_code,
            currency: row.currency,
            vendor_code: row.vendor_code,
            active: row.active,
            min_amount: row.min_amount,
            max_amount: row.max_amount,
        }
    }
}

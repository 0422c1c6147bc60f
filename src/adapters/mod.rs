pub mod in_memory;
pub mod postgres_product_catalog;
pub mod postgres_transaction_repository;

pub use in_memory::{InMemoryProductCatalog, InMemoryTransactionRepository};
pub use postgres_product_catalog::PostgresProductCatalog;
pub use postgres_transaction_repository::PostgresTransactionRepository;

pub mod product;
pub mod transaction;

pub use product::{AmountBound, Product};
pub use transaction::{InvalidTransition, NewTransaction, Transaction, TransactionStatus};

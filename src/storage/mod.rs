mod repository;

pub use repository::*;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    Customer, Paise, Product, Quote, Transaction, TransactionId, TransactionType,
};

/// SQL migration for the initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// Customer field values written after a ledger entry is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionUpdate {
    pub customer_id: String,
    pub transaction_id: TransactionId,
    pub balance: Paise,
    pub gas_on_hand: i64,
    pub transaction_date: DateTime<Utc>,
    /// Customer version the values were computed against
    pub expected_version: i64,
}

impl ProjectionUpdate {
    pub fn from_quote(quote: &Quote) -> Self {
        Self::from_transaction(&quote.transaction, quote.customer_version)
    }

    pub fn from_transaction(transaction: &Transaction, expected_version: i64) -> Self {
        Self {
            customer_id: transaction.customer_id.clone(),
            transaction_id: transaction.id,
            balance: transaction.total_balance,
            gas_on_hand: transaction.gas_on_hand_after,
            transaction_date: transaction.timestamp,
            expected_version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// The customer record now holds the update's values
    Applied,
    /// The customer record already reflected this ledger entry; nothing changed
    AlreadyApplied,
    /// The customer changed since the update was computed; nothing changed
    Stale,
}

/// The document store the ledger reads from and writes to.
///
/// `customers` and `products` are keyed by their domain id; `transactions`
/// is append-only.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn save_customer(&self, customer: &Customer) -> Result<()>;
    async fn get_customer(&self, id: &str) -> Result<Option<Customer>>;
    async fn list_customers_by_route(&self, route: &str) -> Result<Vec<Customer>>;
    async fn list_customers(&self) -> Result<Vec<Customer>>;

    /// Overwrite a customer's balance, gas count and last-transaction fields,
    /// guarded by `update.expected_version`. Safe to repeat.
    async fn apply_projection(&self, update: &ProjectionUpdate) -> Result<ProjectionOutcome>;

    async fn save_product(&self, product: &Product) -> Result<()>;
    async fn get_product(&self, id: &str) -> Result<Option<Product>>;
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Append a ledger entry, assigning its sequence number.
    async fn append_transaction(&self, transaction: &mut Transaction) -> Result<()>;
    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;
    async fn latest_transaction_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Transaction>>;
    async fn list_transactions_by_route_and_date(
        &self,
        route: &str,
        date: NaiveDate,
    ) -> Result<Vec<Transaction>>;
    async fn list_transactions_by_date_and_type(
        &self,
        date: NaiveDate,
        transaction_type: TransactionType,
    ) -> Result<Vec<Transaction>>;
    async fn list_transactions(&self) -> Result<Vec<Transaction>>;
}

pub type SharedStore = Arc<dyn LedgerStore>;

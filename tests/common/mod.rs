// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use cylinder_ledger::application::{LedgerService, Session};
use cylinder_ledger::domain::{
    Customer, Product, Transaction, TransactionId, TransactionType,
};
use cylinder_ledger::storage::{
    LedgerStore, ProjectionOutcome, ProjectionUpdate, Repository,
};
use tempfile::TempDir;
use uuid::Uuid;

pub const ROUTE: &str = "North";
pub const OTHER_ROUTE: &str = "South";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service =
        LedgerService::init(db_path.to_str().unwrap(), Session::for_route(ROUTE)).await?;
    Ok((service, temp_dir))
}

/// Helper to create a test service over a store whose writes can be made to fail
pub async fn faulty_service() -> Result<(LedgerService, Arc<FaultyStore>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;
    let store = Arc::new(FaultyStore::new(repo));
    let service = LedgerService::new(store.clone(), Session::for_route(ROUTE));
    Ok((service, store, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Test fixture: a route with two customers, one customer elsewhere and two products
pub struct StandardRoute;

impl StandardRoute {
    pub async fn create(service: &LedgerService) -> Result<()> {
        service
            .add_product(Product::new("P-14", "14.2kg Domestic", 85000))
            .await?;
        service
            .add_product(Product::new("P-19", "19kg Commercial", 100000))
            .await?;

        service
            .add_customer(
                Customer::new("C-001", "Ravi Kumar", ROUTE)
                    .with_phone("9876543210")
                    .with_address("12 Station Road"),
            )
            .await?;
        service
            .add_customer(
                Customer::new("C-002", "Meena Stores", ROUTE)
                    .with_opening_balance(75000)
                    .with_gas_on_hand(2),
            )
            .await?;
        service
            .add_customer(Customer::new("C-100", "Southside Hotel", OTHER_ROUTE))
            .await?;
        Ok(())
    }
}

/// `LedgerStore` wrapper that fails the ledger append or the customer update on demand.
pub struct FaultyStore {
    inner: Repository,
    fail_append: AtomicBool,
    fail_projection: AtomicBool,
    interfere_before_projection: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Repository) -> Self {
        Self {
            inner,
            fail_append: AtomicBool::new(false),
            fail_projection: AtomicBool::new(false),
            interfere_before_projection: AtomicBool::new(false),
        }
    }

    pub fn fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    pub fn fail_projection(&self, fail: bool) {
        self.fail_projection.store(fail, Ordering::SeqCst);
    }

    /// Simulate another writer updating the customer between append and projection.
    pub fn interfere_before_projection(&self, interfere: bool) {
        self.interfere_before_projection
            .store(interfere, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn save_customer(&self, customer: &Customer) -> Result<()> {
        self.inner.save_customer(customer).await
    }

    async fn get_customer(&self, id: &str) -> Result<Option<Customer>> {
        self.inner.get_customer(id).await
    }

    async fn list_customers_by_route(&self, route: &str) -> Result<Vec<Customer>> {
        self.inner.list_customers_by_route(route).await
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        self.inner.list_customers().await
    }

    async fn apply_projection(&self, update: &ProjectionUpdate) -> Result<ProjectionOutcome> {
        if self.fail_projection.load(Ordering::SeqCst) {
            bail!("connection reset while updating customer");
        }
        if self.interfere_before_projection.swap(false, Ordering::SeqCst) {
            let other = ProjectionUpdate {
                transaction_id: Uuid::new_v4(),
                ..update.clone()
            };
            self.inner.apply_projection(&other).await?;
        }
        self.inner.apply_projection(update).await
    }

    async fn save_product(&self, product: &Product) -> Result<()> {
        self.inner.save_product(product).await
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        self.inner.get_product(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.inner.list_products().await
    }

    async fn append_transaction(&self, transaction: &mut Transaction) -> Result<()> {
        if self.fail_append.load(Ordering::SeqCst) {
            bail!("connection reset while appending ledger entry");
        }
        self.inner.append_transaction(transaction).await
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.inner.get_transaction(id).await
    }

    async fn latest_transaction_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Transaction>> {
        self.inner.latest_transaction_for_customer(customer_id).await
    }

    async fn list_transactions_by_route_and_date(
        &self,
        route: &str,
        date: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        self.inner
            .list_transactions_by_route_and_date(route, date)
            .await
    }

    async fn list_transactions_by_date_and_type(
        &self,
        date: NaiveDate,
        transaction_type: TransactionType,
    ) -> Result<Vec<Transaction>> {
        self.inner
            .list_transactions_by_date_and_type(date, transaction_type)
            .await
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.inner.list_transactions().await
    }
}

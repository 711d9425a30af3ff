use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    Customer, CustomerSnapshot, Product, ProductSnapshot, Transaction, TransactionId,
    TransactionType,
};

use super::{LedgerStore, ProjectionOutcome, ProjectionUpdate, MIGRATION_001_INITIAL};

const CUSTOMER_COLUMNS: &str = "id, name, phone, address, route, current_balance, current_gas_on_hand, last_transaction_date, last_transaction_id, version";

const TRANSACTION_COLUMNS: &str = "id, sequence, reference, transaction_type, customer_id, customer_name, customer_phone, customer_address, product_id, product_name, product_base_price, date, route, sales_quantity, empty_quantity, base_price, custom_price, effective_price, sale_amount, previous_balance, amount_received, today_credit, total_balance, previous_gas_on_hand, gas_on_hand_after, timestamp";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed store for customers, products and the transaction ledger.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        debug!(url = %database_url, "Connecting to database");
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    async fn fetch_transactions(
        &self,
        filter: &str,
        binds: &[String],
        error_context: &'static str,
    ) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions {} ORDER BY sequence",
            TRANSACTION_COLUMNS, filter
        );
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }

        let rows = query.fetch_all(&self.pool).await.context(error_context)?;
        rows.iter().map(Self::row_to_transaction).collect()
    }

    fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer> {
        let last_date_str: Option<String> = row.get("last_transaction_date");
        let last_id_str: Option<String> = row.get("last_transaction_id");

        Ok(Customer {
            id: row.get("id"),
            name: row.get("name"),
            phone: row.get("phone"),
            address: row.get("address"),
            route: row.get("route"),
            current_balance: row.get("current_balance"),
            current_gas_on_hand: row.get("current_gas_on_hand"),
            last_transaction_date: last_date_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid last_transaction_date")?
                .map(|dt| dt.with_timezone(&Utc)),
            last_transaction_id: last_id_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid last_transaction_id")?,
            version: row.get("version"),
        })
    }

    fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product> {
        Ok(Product {
            id: row.get("id"),
            name: row.get("name"),
            price: row.get("price"),
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let type_str: String = row.get("transaction_type");
        let date_str: String = row.get("date");
        let timestamp_str: String = row.get("timestamp");
        let product_name: Option<String> = row.get("product_name");
        let product_base_price: Option<i64> = row.get("product_base_price");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.get("sequence"),
            reference: row.get("reference"),
            transaction_type: TransactionType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", type_str))?,
            customer_id: row.get("customer_id"),
            customer_snapshot: CustomerSnapshot {
                name: row.get("customer_name"),
                phone: row.get("customer_phone"),
                address: row.get("customer_address"),
            },
            product_id: row.get("product_id"),
            product_snapshot: match (product_name, product_base_price) {
                (Some(name), Some(base_price)) => Some(ProductSnapshot { name, base_price }),
                _ => None,
            },
            date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                .context("Invalid transaction date")?,
            route: row.get("route"),
            sales_quantity: row.get("sales_quantity"),
            empty_quantity: row.get("empty_quantity"),
            base_price: row.get("base_price"),
            custom_price: row.get("custom_price"),
            effective_price: row.get("effective_price"),
            sale_amount: row.get("sale_amount"),
            previous_balance: row.get("previous_balance"),
            amount_received: row.get("amount_received"),
            today_credit: row.get("today_credit"),
            total_balance: row.get("total_balance"),
            previous_gas_on_hand: row.get("previous_gas_on_hand"),
            gas_on_hand_after: row.get("gas_on_hand_after"),
            timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                .context("Invalid timestamp")?
                .with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl LedgerStore for Repository {
    // ========================
    // Customer operations
    // ========================

    async fn save_customer(&self, customer: &Customer) -> Result<()> {
        debug!(id = %customer.id, route = %customer.route, "Saving customer");
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, address, route, current_balance, current_gas_on_hand, last_transaction_date, last_transaction_id, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.route)
        .bind(customer.current_balance)
        .bind(customer.current_gas_on_hand)
        .bind(customer.last_transaction_date.map(|dt| dt.to_rfc3339()))
        .bind(customer.last_transaction_id.map(|id| id.to_string()))
        .bind(customer.version)
        .execute(&self.pool)
        .await
        .context("Failed to save customer")?;
        Ok(())
    }

    async fn get_customer(&self, id: &str) -> Result<Option<Customer>> {
        let sql = format!("SELECT {} FROM customers WHERE id = ?", CUSTOMER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch customer")?;

        row.as_ref().map(Self::row_to_customer).transpose()
    }

    async fn list_customers_by_route(&self, route: &str) -> Result<Vec<Customer>> {
        let sql = format!(
            "SELECT {} FROM customers WHERE route = ? ORDER BY name",
            CUSTOMER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(route)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list customers for route")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        let sql = format!(
            "SELECT {} FROM customers ORDER BY route, name",
            CUSTOMER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list customers")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    async fn apply_projection(&self, update: &ProjectionUpdate) -> Result<ProjectionOutcome> {
        debug!(
            customer = %update.customer_id,
            transaction = %update.transaction_id,
            expected_version = update.expected_version,
            "Applying customer projection"
        );

        let result = sqlx::query(
            r#"
            UPDATE customers
            SET current_balance = ?,
                current_gas_on_hand = ?,
                last_transaction_date = ?,
                last_transaction_id = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(update.balance)
        .bind(update.gas_on_hand)
        .bind(update.transaction_date.to_rfc3339())
        .bind(update.transaction_id.to_string())
        .bind(&update.customer_id)
        .bind(update.expected_version)
        .execute(&self.pool)
        .await
        .context("Failed to update customer")?;

        if result.rows_affected() == 1 {
            return Ok(ProjectionOutcome::Applied);
        }

        let row = sqlx::query("SELECT last_transaction_id FROM customers WHERE id = ?")
            .bind(&update.customer_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to re-read customer")?
            .ok_or_else(|| anyhow::anyhow!("Customer {} does not exist", update.customer_id))?;

        let last_id: Option<String> = row.get("last_transaction_id");
        if last_id.as_deref() == Some(update.transaction_id.to_string().as_str()) {
            Ok(ProjectionOutcome::AlreadyApplied)
        } else {
            Ok(ProjectionOutcome::Stale)
        }
    }

    // ========================
    // Product operations
    // ========================

    async fn save_product(&self, product: &Product) -> Result<()> {
        debug!(id = %product.id, "Saving product");
        sqlx::query("INSERT INTO products (id, name, price) VALUES (?, ?, ?)")
            .bind(&product.id)
            .bind(&product.name)
            .bind(product.price)
            .execute(&self.pool)
            .await
            .context("Failed to save product")?;
        Ok(())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch product")?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query("SELECT id, name, price FROM products ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list products")?;

        rows.iter().map(Self::row_to_product).collect()
    }

    // ========================
    // Ledger operations
    // ========================

    /// Sequence allocation and insert share one database transaction, so a
    /// failed insert never leaves a gap in the ledger order.
    async fn append_transaction(&self, transaction: &mut Transaction) -> Result<()> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin ledger append")?;

        let sequence: i64 = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'transaction_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *db_tx)
        .await
        .context("Failed to get next sequence number")?
        .get("value");

        debug!(id = %transaction.id, sequence, "Appending ledger entry");

        let product = transaction.product_snapshot.as_ref();
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, sequence, reference, transaction_type,
                customer_id, customer_name, customer_phone, customer_address,
                product_id, product_name, product_base_price,
                date, route, sales_quantity, empty_quantity,
                base_price, custom_price, effective_price, sale_amount,
                previous_balance, amount_received, today_credit, total_balance,
                previous_gas_on_hand, gas_on_hand_after, timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(sequence)
        .bind(&transaction.reference)
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.customer_id)
        .bind(&transaction.customer_snapshot.name)
        .bind(&transaction.customer_snapshot.phone)
        .bind(&transaction.customer_snapshot.address)
        .bind(&transaction.product_id)
        .bind(product.map(|p| p.name.clone()))
        .bind(product.map(|p| p.base_price))
        .bind(transaction.date.format(DATE_FORMAT).to_string())
        .bind(&transaction.route)
        .bind(transaction.sales_quantity)
        .bind(transaction.empty_quantity)
        .bind(transaction.base_price)
        .bind(transaction.custom_price)
        .bind(transaction.effective_price)
        .bind(transaction.sale_amount)
        .bind(transaction.previous_balance)
        .bind(transaction.amount_received)
        .bind(transaction.today_credit)
        .bind(transaction.total_balance)
        .bind(transaction.previous_gas_on_hand)
        .bind(transaction.gas_on_hand_after)
        .bind(transaction.timestamp.to_rfc3339())
        .execute(&mut *db_tx)
        .await
        .context("Failed to insert ledger entry")?;

        db_tx
            .commit()
            .await
            .context("Failed to commit ledger append")?;

        transaction.sequence = sequence;
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    async fn latest_transaction_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE customer_id = ? ORDER BY sequence DESC LIMIT 1",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch latest transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    async fn list_transactions_by_route_and_date(
        &self,
        route: &str,
        date: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        self.fetch_transactions(
            "WHERE route = ? AND date = ?",
            &[route.to_string(), date.format(DATE_FORMAT).to_string()],
            "Failed to list transactions for route and date",
        )
        .await
    }

    async fn list_transactions_by_date_and_type(
        &self,
        date: NaiveDate,
        transaction_type: TransactionType,
    ) -> Result<Vec<Transaction>> {
        self.fetch_transactions(
            "WHERE date = ? AND transaction_type = ?",
            &[
                date.format(DATE_FORMAT).to_string(),
                transaction_type.as_str().to_string(),
            ],
            "Failed to list transactions for date and type",
        )
        .await
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.fetch_transactions("", &[], "Failed to list transactions")
            .await
    }
}

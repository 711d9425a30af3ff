use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

use chrono::{Local, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::domain::{
    quote_payment, quote_sale, summarize_day, total_sale_amount, Customer, Product, Quote,
    QuoteContext, SaleInput, Transaction, TransactionId, TransactionRequest, TransactionType,
    ValidationError,
};
use crate::storage::{ProjectionOutcome, ProjectionUpdate, Repository, SharedStore};

use super::{AppError, DailyReport, DailySalesTotal, Session};

/// Default number of quote-and-commit attempts when a customer changes underneath us.
pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 3;

type CustomerLocks = SyncMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Application service providing high-level operations for the route ledger.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
pub struct LedgerService {
    store: SharedStore,
    session: Session,
    commit_attempts: u32,
    customer_locks: CustomerLocks,
}

impl LedgerService {
    /// Create a new ledger service over the given store.
    pub fn new(store: SharedStore, session: Session) -> Self {
        Self {
            store,
            session,
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
            customer_locks: SyncMutex::new(HashMap::new()),
        }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, session: Session) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(Arc::new(repo), session))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, session: Session) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(Arc::new(repo), session))
    }

    /// Number of attempts `record` makes before giving up on a conflicting customer.
    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.commit_attempts = attempts.max(1);
        self
    }

    /// The active route of this session.
    pub fn route(&self) -> Result<&str, AppError> {
        self.session.route()
    }

    // ========================
    // Admin operations
    // ========================

    /// Register a customer. Customers are normally maintained outside the route app.
    pub async fn add_customer(&self, customer: Customer) -> Result<Customer, AppError> {
        if self.store.get_customer(&customer.id).await?.is_some() {
            return Err(AppError::AlreadyExists {
                kind: "Customer",
                id: customer.id,
            });
        }
        self.store.save_customer(&customer).await?;
        Ok(customer)
    }

    /// Register a product.
    pub async fn add_product(&self, product: Product) -> Result<Product, AppError> {
        if product.price <= 0 {
            return Err(ValidationError::NonPositivePrice {
                price: product.price,
            }
            .into());
        }
        if self.store.get_product(&product.id).await?.is_some() {
            return Err(AppError::AlreadyExists {
                kind: "Product",
                id: product.id,
            });
        }
        self.store.save_product(&product).await?;
        Ok(product)
    }

    /// Every customer on every route.
    pub async fn list_all_customers(&self) -> Result<Vec<Customer>, AppError> {
        Ok(self.store.list_customers().await?)
    }

    /// Every ledger entry, in ledger order.
    pub async fn list_all_transactions(&self) -> Result<Vec<Transaction>, AppError> {
        Ok(self.store.list_transactions().await?)
    }

    // ========================
    // Route lookups
    // ========================

    /// Customers of the active route, ordered by name.
    pub async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        let route = self.route()?;
        Ok(self.store.list_customers_by_route(route).await?)
    }

    /// A customer of the active route.
    pub async fn get_customer(&self, id: &str) -> Result<Customer, AppError> {
        let route = self.route()?;
        self.store
            .get_customer(id)
            .await?
            .filter(|c| c.route == route)
            .ok_or_else(|| AppError::CustomerNotFound(id.to_string()))
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        Ok(self.store.list_products().await?)
    }

    pub async fn get_product(&self, id: &str) -> Result<Product, AppError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::ProductNotFound(id.to_string()))
    }

    // ========================
    // Transactions
    // ========================

    /// Compute the ledger entry a request would produce, from current stored state.
    /// Nothing is written; this backs the live preview as well as `record`.
    ///
    /// A customer whose latest ledger entry is not yet reflected in its balance
    /// cannot be quoted (`ProjectionPending`).
    pub async fn quote(&self, request: &TransactionRequest) -> Result<Quote, AppError> {
        let route = self.route()?;

        let customer_id = request
            .customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::MissingCustomer)?;
        let customer = self.get_customer(customer_id).await?;
        self.ensure_caught_up(&customer).await?;

        let now = Utc::now();
        let date = request
            .date
            .unwrap_or_else(|| now.with_timezone(&Local).date_naive());
        let context = QuoteContext::new(route, date, now);

        let quote = match request.transaction_type {
            TransactionType::Sale => {
                let product_id = request
                    .product_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or(ValidationError::MissingProduct)?;
                let product = self.get_product(product_id).await?;
                let input = SaleInput {
                    quantity: request.sales_quantity,
                    empty_returned: request.empty_quantity,
                    custom_price: request.custom_price,
                    amount_received: request.amount_received,
                };
                quote_sale(&customer, &product, input, &context)?
            }
            TransactionType::Payment => {
                quote_payment(&customer, request.amount_received, &context)?
            }
        };

        debug!(
            customer = %customer.id,
            kind = %quote.transaction.transaction_type,
            total_balance = quote.new_balance,
            gas_on_hand = quote.new_gas_on_hand,
            "Quoted transaction"
        );
        Ok(quote)
    }

    /// Persist a quote: append the ledger entry, then update the customer.
    ///
    /// The ledger append always happens first. If it fails nothing is written
    /// (`LedgerWrite`). If the customer update fails afterwards the entry stays
    /// in the ledger and `ProjectionWrite` names it so `retry_projection` can
    /// finish the job. A quote computed against an outdated customer is
    /// rejected with `Conflict`, and a customer still missing an earlier entry
    /// with `ProjectionPending`, both before anything is written.
    pub async fn commit(&self, quote: Quote) -> Result<Transaction, AppError> {
        let route = self.route()?;
        let customer_id = quote.transaction.customer_id.clone();
        let _guard = self.lock_customer(&customer_id).await;

        let customer = self
            .store
            .get_customer(&customer_id)
            .await?
            .filter(|c| c.route == route)
            .ok_or_else(|| AppError::CustomerNotFound(customer_id.clone()))?;
        self.ensure_caught_up(&customer).await?;

        if customer.version != quote.customer_version {
            warn!(
                customer = %customer_id,
                quoted = quote.customer_version,
                current = customer.version,
                "Quote is stale"
            );
            return Err(AppError::Conflict {
                customer_id,
                expected: quote.customer_version,
                found: customer.version,
            });
        }

        let update = ProjectionUpdate::from_quote(&quote);
        let mut transaction = quote.transaction;

        if let Err(e) = self.store.append_transaction(&mut transaction).await {
            error!(customer = %customer_id, error = %e, "Ledger append failed");
            return Err(AppError::LedgerWrite(e));
        }

        let reason = match self.store.apply_projection(&update).await {
            Ok(ProjectionOutcome::Applied) | Ok(ProjectionOutcome::AlreadyApplied) => {
                info!(
                    id = %transaction.id,
                    sequence = transaction.sequence,
                    customer = %customer_id,
                    kind = %transaction.transaction_type,
                    total_balance = transaction.total_balance,
                    "Transaction recorded"
                );
                return Ok(transaction);
            }
            Ok(ProjectionOutcome::Stale) => {
                "customer record was changed by another writer".to_string()
            }
            Err(e) => format!("{:#}", e),
        };

        error!(
            id = %transaction.id,
            customer = %customer_id,
            reason = %reason,
            "Customer update failed after ledger append"
        );
        Err(AppError::ProjectionWrite {
            transaction_id: transaction.id,
            customer_id,
            reason,
        })
    }

    /// Quote and commit a request, re-quoting from fresh state when the
    /// customer changed in between. A ledger entry still missing from the
    /// customer's balance is applied first, then the request is re-quoted.
    pub async fn record(&self, request: &TransactionRequest) -> Result<Transaction, AppError> {
        let mut attempt = 1;
        loop {
            let result = match self.quote(request).await {
                Ok(quote) => self.commit(quote).await,
                Err(e) => Err(e),
            };
            match result {
                Err(AppError::Conflict { customer_id, .. }) if attempt < self.commit_attempts => {
                    warn!(customer = %customer_id, attempt, "Retrying after conflict");
                    attempt += 1;
                }
                Err(AppError::ProjectionPending {
                    transaction_id,
                    customer_id,
                }) if attempt < self.commit_attempts => {
                    warn!(
                        customer = %customer_id,
                        pending = %transaction_id,
                        attempt,
                        "Applying pending ledger entry before recording"
                    );
                    self.retry_projection(transaction_id).await?;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Re-apply the customer update for a ledger entry whose projection failed.
    ///
    /// Repeating this is harmless: once the customer reflects the entry, further
    /// calls change nothing. An entry that has since been followed by another
    /// entry for the same customer is refused.
    pub async fn retry_projection(
        &self,
        transaction_id: TransactionId,
    ) -> Result<ProjectionOutcome, AppError> {
        let transaction = self.get_transaction(transaction_id).await?;
        let _guard = self.lock_customer(&transaction.customer_id).await;
        let customer = self.get_customer(&transaction.customer_id).await?;

        if customer.reflects(transaction.id) {
            debug!(id = %transaction.id, "Customer already reflects entry");
            return Ok(ProjectionOutcome::AlreadyApplied);
        }

        let latest = self
            .store
            .latest_transaction_for_customer(&customer.id)
            .await?;
        if let Some(latest) = latest.filter(|t| t.id != transaction.id) {
            return Err(AppError::StaleProjection {
                transaction_id: transaction.id,
                latest_id: latest.id,
                customer_id: customer.id,
            });
        }

        let update = ProjectionUpdate::from_transaction(&transaction, customer.version);
        match self.store.apply_projection(&update).await {
            Ok(ProjectionOutcome::Stale) => Err(AppError::ProjectionWrite {
                transaction_id: transaction.id,
                customer_id: customer.id,
                reason: "customer record was changed by another writer".to_string(),
            }),
            Ok(outcome) => {
                info!(id = %transaction.id, customer = %customer.id, "Projection re-applied");
                Ok(outcome)
            }
            Err(e) => Err(AppError::ProjectionWrite {
                transaction_id: transaction.id,
                customer_id: customer.id,
                reason: format!("{:#}", e),
            }),
        }
    }

    /// A single ledger entry of the active route.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        let route = self.route()?;
        self.store
            .get_transaction(id)
            .await?
            .filter(|t| t.route == route)
            .ok_or_else(|| AppError::TransactionNotFound(id.to_string()))
    }

    // ========================
    // Reports
    // ========================

    /// Dashboard for the active route on `date`.
    pub async fn daily_summary(&self, date: NaiveDate) -> Result<DailyReport, AppError> {
        let route = self.route()?;
        let transactions = self
            .store
            .list_transactions_by_route_and_date(route, date)
            .await?;

        Ok(DailyReport {
            route: route.to_string(),
            date,
            totals: summarize_day(&transactions),
            transactions,
        })
    }

    /// Total sales value on `date` across all routes.
    pub async fn daily_sales_total(&self, date: NaiveDate) -> Result<DailySalesTotal, AppError> {
        self.route()?;
        let sales = self
            .store
            .list_transactions_by_date_and_type(date, TransactionType::Sale)
            .await?;

        Ok(DailySalesTotal {
            date,
            sale_count: sales.len(),
            total: total_sale_amount(&sales),
        })
    }

    /// Refuse to build on a customer whose balance lags its own ledger.
    async fn ensure_caught_up(&self, customer: &Customer) -> Result<(), AppError> {
        let latest = self
            .store
            .latest_transaction_for_customer(&customer.id)
            .await?;
        match latest.filter(|t| !customer.reflects(t.id)) {
            Some(pending) => {
                warn!(
                    customer = %customer.id,
                    pending = %pending.id,
                    "Customer balance is behind the ledger"
                );
                Err(AppError::ProjectionPending {
                    transaction_id: pending.id,
                    customer_id: customer.id.clone(),
                })
            }
            None => Ok(()),
        }
    }

    async fn lock_customer(&self, customer_id: &str) -> CustomerGuard<'_> {
        let lock = {
            let mut locks = self
                .customer_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            locks.entry(customer_id.to_string()).or_default().clone()
        };
        CustomerGuard {
            locks: &self.customer_locks,
            customer_id: customer_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn tracked_customer_locks(&self) -> usize {
        self.customer_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Holds a customer's commit lock; forgets the customer once nobody else waits on it.
struct CustomerGuard<'a> {
    locks: &'a CustomerLocks,
    customer_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for CustomerGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.customer_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.customer_id);
        }
    }
}

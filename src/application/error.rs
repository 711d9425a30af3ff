use thiserror::Error;

use crate::domain::{TransactionId, ValidationError};

#[derive(Error, Debug)]
pub enum AppError {
    /// Operator input rejected before anything was written.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// No active route; the session must be re-established.
    #[error("Route information not found: {0}")]
    Configuration(String),

    #[error("Customer not found on this route: {0}")]
    CustomerNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    /// The customer changed after the quote was computed. Nothing was written.
    #[error(
        "Customer {customer_id} changed since the quote was made (quoted version {expected}, current {found})"
    )]
    Conflict {
        customer_id: String,
        expected: i64,
        found: i64,
    },

    /// Appending to the ledger failed. Nothing was written; safe to retry.
    #[error("Ledger write failed, nothing was recorded: {0}")]
    LedgerWrite(#[source] anyhow::Error),

    /// The ledger entry is durable but the customer record was not updated.
    /// Retry the projection for `transaction_id` to bring the customer up to date.
    #[error(
        "Ledger entry {transaction_id} was recorded but the balance of customer {customer_id} was not updated: {reason}"
    )]
    ProjectionWrite {
        transaction_id: TransactionId,
        customer_id: String,
        reason: String,
    },

    /// A later ledger entry exists for the customer, so an older entry may not
    /// be projected over it.
    #[error("Ledger entry {transaction_id} is superseded by {latest_id} for customer {customer_id}")]
    StaleProjection {
        transaction_id: TransactionId,
        latest_id: TransactionId,
        customer_id: String,
    },

    /// The customer's balance does not yet include its latest ledger entry.
    /// Nothing was written; reconcile `transaction_id` before recording more.
    #[error(
        "Customer {customer_id} has ledger entry {transaction_id} not yet applied to its balance; reconcile it first"
    )]
    ProjectionPending {
        transaction_id: TransactionId,
        customer_id: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// True if resubmitting the whole transaction may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, AppError::LedgerWrite(_) | AppError::Conflict { .. })
    }

    /// The ledger entry that needs its projection retried, if any.
    pub fn pending_projection(&self) -> Option<TransactionId> {
        match self {
            AppError::ProjectionWrite { transaction_id, .. }
            | AppError::ProjectionPending { transaction_id, .. } => Some(*transaction_id),
            _ => None,
        }
    }
}

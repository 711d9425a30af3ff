use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Paise, TransactionId};

/// Domain identifier of a customer, as printed on the route sheet.
/// Distinct from whatever key the store uses internally.
pub type CustomerId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: String,
    pub address: String,
    /// Route (territory) this customer is served on
    pub route: String,
    /// Running balance in paise; positive means the customer owes money
    pub current_balance: Paise,
    /// Cylinders currently held by the customer; may be negative
    pub current_gas_on_hand: i64,
    pub last_transaction_date: Option<DateTime<Utc>>,
    /// Ledger entry the balance and gas count were last projected from
    pub last_transaction_id: Option<TransactionId>,
    /// Optimistic concurrency token, bumped on every projection write
    pub version: i64,
}

impl Customer {
    pub fn new(
        id: impl Into<CustomerId>,
        name: impl Into<String>,
        route: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: String::new(),
            address: String::new(),
            route: route.into(),
            current_balance: 0,
            current_gas_on_hand: 0,
            last_transaction_date: None,
            last_transaction_id: None,
            version: 0,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_opening_balance(mut self, balance: Paise) -> Self {
        self.current_balance = balance;
        self
    }

    pub fn with_gas_on_hand(mut self, count: i64) -> Self {
        self.current_gas_on_hand = count;
        self
    }

    pub fn snapshot(&self) -> CustomerSnapshot {
        CustomerSnapshot {
            name: self.name.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
        }
    }

    /// True if the stored projection already reflects the given ledger entry.
    pub fn reflects(&self, transaction_id: TransactionId) -> bool {
        self.last_transaction_id == Some(transaction_id)
    }
}

/// Customer details copied onto a transaction at the time it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub name: String,
    pub phone: String,
    pub address: String,
}

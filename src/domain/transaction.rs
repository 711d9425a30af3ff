use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CustomerId, CustomerSnapshot, Paise, ProductId, ProductSnapshot};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Cylinders delivered, possibly with empties collected and money received
    Sale,
    /// Money received against the running balance, nothing delivered
    Payment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Payment => "payment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sale" => Some(TransactionType::Sale),
            "payment" => Some(TransactionType::Payment),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the route ledger. Entries are immutable once appended;
/// corrections are recorded as new entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Ledger position, assigned by the store on append
    pub sequence: i64,
    /// Human-readable reference ("TBG" + UTC timestamp), not unique
    pub reference: String,
    pub transaction_type: TransactionType,
    pub customer_id: CustomerId,
    pub customer_snapshot: CustomerSnapshot,
    pub product_id: Option<ProductId>,
    pub product_snapshot: Option<ProductSnapshot>,
    /// Route's local calendar day
    pub date: NaiveDate,
    pub route: String,
    pub sales_quantity: i64,
    pub empty_quantity: i64,
    pub base_price: Paise,
    pub custom_price: Option<Paise>,
    pub effective_price: Paise,
    pub sale_amount: Paise,
    pub previous_balance: Paise,
    pub amount_received: Paise,
    pub today_credit: Paise,
    pub total_balance: Paise,
    pub previous_gas_on_hand: i64,
    pub gas_on_hand_after: i64,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn is_sale(&self) -> bool {
        self.transaction_type == TransactionType::Sale
    }

    pub fn is_custom_price(&self) -> bool {
        self.custom_price.is_some()
    }
}

/// Display reference for an entry created at `timestamp`.
/// Example: 2024-03-05T09:41:07Z -> "TBG20240305094107"
pub fn transaction_reference(timestamp: DateTime<Utc>) -> String {
    format!("TBG{}", timestamp.format("%Y%m%d%H%M%S"))
}

/// What the operator entered on the form, before anything is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub transaction_type: TransactionType,
    pub customer_id: Option<CustomerId>,
    pub product_id: Option<ProductId>,
    pub sales_quantity: i64,
    pub empty_quantity: i64,
    pub custom_price: Option<Paise>,
    pub amount_received: Paise,
    /// Ledger day; defaults to today when absent
    pub date: Option<NaiveDate>,
}

impl TransactionRequest {
    pub fn sale(
        customer_id: impl Into<CustomerId>,
        product_id: impl Into<ProductId>,
        sales_quantity: i64,
    ) -> Self {
        Self {
            transaction_type: TransactionType::Sale,
            customer_id: Some(customer_id.into()),
            product_id: Some(product_id.into()),
            sales_quantity,
            empty_quantity: 0,
            custom_price: None,
            amount_received: 0,
            date: None,
        }
    }

    pub fn payment(customer_id: impl Into<CustomerId>, amount_received: Paise) -> Self {
        Self {
            transaction_type: TransactionType::Payment,
            customer_id: Some(customer_id.into()),
            product_id: None,
            sales_quantity: 0,
            empty_quantity: 0,
            custom_price: None,
            amount_received,
            date: None,
        }
    }

    pub fn with_empties(mut self, empty_quantity: i64) -> Self {
        self.empty_quantity = empty_quantity;
        self
    }

    pub fn with_custom_price(mut self, price: Paise) -> Self {
        self.custom_price = Some(price);
        self
    }

    pub fn with_amount_received(mut self, amount: Paise) -> Self {
        self.amount_received = amount;
        self
    }

    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Switch the form to payment mode. Every sale-only field is cleared,
    /// so a payment never carries a product, quantities or a price override.
    pub fn into_payment(self) -> Self {
        Self {
            transaction_type: TransactionType::Payment,
            product_id: None,
            sales_quantity: 0,
            empty_quantity: 0,
            custom_price: None,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_transaction_type_roundtrip() {
        for tt in [TransactionType::Sale, TransactionType::Payment] {
            assert_eq!(TransactionType::from_str(tt.as_str()), Some(tt));
        }
        assert_eq!(TransactionType::from_str("SALE"), Some(TransactionType::Sale));
        assert_eq!(TransactionType::from_str("refund"), None);
    }

    #[test]
    fn test_reference_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 9, 41, 7).unwrap();
        assert_eq!(transaction_reference(ts), "TBG20240305094107");
    }

    #[test]
    fn test_into_payment_clears_sale_fields() {
        let request = TransactionRequest::sale("C-1", "P-14KG", 2)
            .with_empties(1)
            .with_custom_price(80000)
            .with_amount_received(50000)
            .into_payment();

        assert_eq!(request.transaction_type, TransactionType::Payment);
        assert_eq!(request.product_id, None);
        assert_eq!(request.sales_quantity, 0);
        assert_eq!(request.empty_quantity, 0);
        assert_eq!(request.custom_price, None);
        assert_eq!(request.amount_received, 50000);
        assert_eq!(request.customer_id.as_deref(), Some("C-1"));
    }
}

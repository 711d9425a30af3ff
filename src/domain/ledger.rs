//! Ledger transaction engine.
//!
//! Turns a customer's current state plus what the operator entered into a
//! complete ledger entry and the customer values that entry implies. Nothing
//! here touches storage; the application layer persists the result.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    transaction_reference, Customer, Paise, Product, Transaction, TransactionType,
};

/// Where and when a quote is being made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteContext {
    pub route: String,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

impl QuoteContext {
    pub fn new(route: impl Into<String>, date: NaiveDate, timestamp: DateTime<Utc>) -> Self {
        Self {
            route: route.into(),
            date,
            timestamp,
        }
    }
}

/// Sale quantities and money as entered on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleInput {
    pub quantity: i64,
    pub empty_returned: i64,
    pub custom_price: Option<Paise>,
    pub amount_received: Paise,
}

/// A fully computed, not yet persisted, ledger entry together with the
/// customer values it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub transaction: Transaction,
    pub new_balance: Paise,
    pub new_gas_on_hand: i64,
    /// Customer version the quote was computed against
    pub customer_version: i64,
}

/// Price actually charged per unit. A custom price only counts when it is
/// positive; zero or negative means "no override".
pub fn effective_price(base_price: Paise, custom_price: Option<Paise>) -> Paise {
    match custom_price {
        Some(price) if price > 0 => price,
        _ => base_price,
    }
}

/// Quote a sale of `input.quantity` units of `product` to `customer`.
///
/// Negative resulting balances or cylinder counts are legal and returned as-is.
pub fn quote_sale(
    customer: &Customer,
    product: &Product,
    input: SaleInput,
    context: &QuoteContext,
) -> Result<Quote, ValidationError> {
    if input.quantity < 1 {
        return Err(ValidationError::QuantityTooLow {
            quantity: input.quantity,
        });
    }
    if input.empty_returned < 0 {
        return Err(ValidationError::NegativeEmpties {
            empty_returned: input.empty_returned,
        });
    }
    if input.amount_received < 0 {
        return Err(ValidationError::NegativeAmountReceived {
            amount: input.amount_received,
        });
    }

    let custom_price = input.custom_price.filter(|price| *price > 0);
    let price = effective_price(product.price, custom_price);

    let sale_amount = price
        .checked_mul(input.quantity)
        .ok_or(ValidationError::AmountOverflow)?;
    let today_credit = sale_amount
        .checked_sub(input.amount_received)
        .ok_or(ValidationError::AmountOverflow)?;
    let total_balance = customer
        .current_balance
        .checked_add(today_credit)
        .ok_or(ValidationError::AmountOverflow)?;
    let gas_on_hand_after = customer
        .current_gas_on_hand
        .checked_sub(input.empty_returned)
        .and_then(|count| count.checked_add(input.quantity))
        .ok_or(ValidationError::AmountOverflow)?;

    let transaction = Transaction {
        id: Uuid::new_v4(),
        sequence: 0,
        reference: transaction_reference(context.timestamp),
        transaction_type: TransactionType::Sale,
        customer_id: customer.id.clone(),
        customer_snapshot: customer.snapshot(),
        product_id: Some(product.id.clone()),
        product_snapshot: Some(product.snapshot()),
        date: context.date,
        route: context.route.clone(),
        sales_quantity: input.quantity,
        empty_quantity: input.empty_returned,
        base_price: product.price,
        custom_price,
        effective_price: price,
        sale_amount,
        previous_balance: customer.current_balance,
        amount_received: input.amount_received,
        today_credit,
        total_balance,
        previous_gas_on_hand: customer.current_gas_on_hand,
        gas_on_hand_after,
        timestamp: context.timestamp,
    };

    Ok(Quote {
        transaction,
        new_balance: total_balance,
        new_gas_on_hand: gas_on_hand_after,
        customer_version: customer.version,
    })
}

/// Quote a payment of `amount_received` against the customer's balance.
/// Payments carry no credit and leave the cylinder count alone.
pub fn quote_payment(
    customer: &Customer,
    amount_received: Paise,
    context: &QuoteContext,
) -> Result<Quote, ValidationError> {
    if amount_received < 0 {
        return Err(ValidationError::NegativeAmountReceived {
            amount: amount_received,
        });
    }

    let total_balance = customer
        .current_balance
        .checked_sub(amount_received)
        .ok_or(ValidationError::AmountOverflow)?;

    let transaction = Transaction {
        id: Uuid::new_v4(),
        sequence: 0,
        reference: transaction_reference(context.timestamp),
        transaction_type: TransactionType::Payment,
        customer_id: customer.id.clone(),
        customer_snapshot: customer.snapshot(),
        product_id: None,
        product_snapshot: None,
        date: context.date,
        route: context.route.clone(),
        sales_quantity: 0,
        empty_quantity: 0,
        base_price: 0,
        custom_price: None,
        effective_price: 0,
        sale_amount: 0,
        previous_balance: customer.current_balance,
        amount_received,
        today_credit: 0,
        total_balance,
        previous_gas_on_hand: customer.current_gas_on_hand,
        gas_on_hand_after: customer.current_gas_on_hand,
        timestamp: context.timestamp,
    };

    Ok(Quote {
        transaction,
        new_balance: total_balance,
        new_gas_on_hand: customer.current_gas_on_hand,
        customer_version: customer.version,
    })
}

/// Totals for one route's day, as shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub transaction_count: usize,
    pub sale_count: usize,
    pub payment_count: usize,
    /// Σ sale amount over sales
    pub total_sale_value: Paise,
    /// Σ amount received over sales and payments
    pub total_received: Paise,
    /// Σ (sale amount - amount received) over sales only
    pub total_credit: Paise,
    pub cylinders_sold: i64,
    pub empties_returned: i64,
}

/// Fold a day's ledger entries into dashboard totals.
///
/// Sums saturate at the numeric limits instead of overflowing.
pub fn summarize_day(transactions: &[Transaction]) -> DailyTotals {
    transactions
        .iter()
        .fold(DailyTotals::default(), |mut totals, transaction| {
            totals.transaction_count += 1;
            totals.total_received = totals
                .total_received
                .saturating_add(transaction.amount_received);
            match transaction.transaction_type {
                TransactionType::Sale => {
                    let credit = transaction
                        .sale_amount
                        .saturating_sub(transaction.amount_received);
                    totals.sale_count += 1;
                    totals.total_sale_value =
                        totals.total_sale_value.saturating_add(transaction.sale_amount);
                    totals.total_credit = totals.total_credit.saturating_add(credit);
                    totals.cylinders_sold =
                        totals.cylinders_sold.saturating_add(transaction.sales_quantity);
                    totals.empties_returned =
                        totals.empties_returned.saturating_add(transaction.empty_quantity);
                }
                TransactionType::Payment => totals.payment_count += 1,
            }
            totals
        })
}

/// Sum of sale amounts, ignoring payments.
pub fn total_sale_amount(transactions: &[Transaction]) -> Paise {
    transactions
        .iter()
        .filter(|t| t.is_sale())
        .fold(0, |total: Paise, t| total.saturating_add(t.sale_amount))
}

/// Input rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingCustomer,
    MissingProduct,
    QuantityTooLow { quantity: i64 },
    NegativeEmpties { empty_returned: i64 },
    NegativeAmountReceived { amount: Paise },
    NonPositivePrice { price: Paise },
    AmountOverflow,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingCustomer => write!(f, "Please select a customer"),
            ValidationError::MissingProduct => write!(f, "Please select a product"),
            ValidationError::QuantityTooLow { quantity } => {
                write!(f, "Sales quantity must be at least 1 (got {})", quantity)
            }
            ValidationError::NegativeEmpties { empty_returned } => write!(
                f,
                "Empty cylinders returned cannot be negative (got {})",
                empty_returned
            ),
            ValidationError::NegativeAmountReceived { amount } => write!(
                f,
                "Amount received cannot be negative (got {})",
                super::format_paise(*amount)
            ),
            ValidationError::NonPositivePrice { price } => write!(
                f,
                "Product price must be greater than zero (got {})",
                super::format_paise(*price)
            ),
            ValidationError::AmountOverflow => write!(f, "Amount is too large"),
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn context() -> QuoteContext {
        QuoteContext::new(
            "north",
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 5, 9, 41, 7).unwrap(),
        )
    }

    fn customer(balance: Paise, gas: i64) -> Customer {
        Customer::new("C-001", "Lakshmi Stores", "north")
            .with_opening_balance(balance)
            .with_gas_on_hand(gas)
    }

    fn sale(quantity: i64, empty_returned: i64, custom_price: Option<Paise>, received: Paise) -> SaleInput {
        SaleInput {
            quantity,
            empty_returned,
            custom_price,
            amount_received: received,
        }
    }

    #[test]
    fn test_fully_paid_sale_keeps_balance() {
        let product = Product::new("P-14", "14.2kg cylinder", 100000);
        let quote = quote_sale(&customer(50000, 0), &product, sale(1, 0, None, 100000), &context())
            .unwrap();

        assert_eq!(quote.transaction.today_credit, 0);
        assert_eq!(quote.transaction.total_balance, 50000);
        assert_eq!(quote.new_balance, 50000);
    }

    #[test]
    fn test_custom_price_sale_on_credit() {
        let product = Product::new("P-14", "14.2kg cylinder", 85000);
        let quote = quote_sale(
            &customer(0, 0),
            &product,
            sale(2, 0, Some(80000), 100000),
            &context(),
        )
        .unwrap();

        let tx = &quote.transaction;
        assert_eq!(tx.effective_price, 80000);
        assert_eq!(tx.base_price, 85000);
        assert!(tx.is_custom_price());
        assert_eq!(tx.sale_amount, 160000);
        assert_eq!(tx.today_credit, 60000);
        assert_eq!(tx.total_balance, 60000);
    }

    #[test]
    fn test_zero_custom_price_falls_back_to_base() {
        let product = Product::new("P-14", "14.2kg cylinder", 85000);
        let quote =
            quote_sale(&customer(0, 0), &product, sale(1, 0, Some(0), 0), &context()).unwrap();

        assert_eq!(quote.transaction.effective_price, 85000);
        assert_eq!(quote.transaction.custom_price, None);
        assert!(!quote.transaction.is_custom_price());
    }

    #[test]
    fn test_payment_reduces_balance_only() {
        let quote = quote_payment(&customer(75000, 3), 30000, &context()).unwrap();
        let tx = &quote.transaction;

        assert_eq!(tx.transaction_type, TransactionType::Payment);
        assert_eq!(tx.total_balance, 45000);
        assert_eq!(tx.sale_amount, 0);
        assert_eq!(tx.today_credit, 0);
        assert_eq!(tx.sales_quantity, 0);
        assert_eq!(tx.product_id, None);
        assert_eq!(quote.new_gas_on_hand, 3);
    }

    #[test]
    fn test_gas_on_hand_moves_with_sale() {
        let product = Product::new("P-14", "14.2kg cylinder", 85000);
        let quote =
            quote_sale(&customer(0, 2), &product, sale(3, 1, None, 0), &context()).unwrap();

        assert_eq!(quote.new_gas_on_hand, 4);
        assert_eq!(quote.transaction.previous_gas_on_hand, 2);
        assert_eq!(quote.transaction.gas_on_hand_after, 4);
    }

    #[test]
    fn test_over_return_goes_negative() {
        let product = Product::new("P-14", "14.2kg cylinder", 85000);
        let quote =
            quote_sale(&customer(0, 0), &product, sale(1, 4, None, 0), &context()).unwrap();

        assert_eq!(quote.new_gas_on_hand, -3);
    }

    #[test]
    fn test_overpayment_makes_balance_negative() {
        let product = Product::new("P-14", "14.2kg cylinder", 85000);
        let quote =
            quote_sale(&customer(0, 0), &product, sale(1, 0, None, 100000), &context()).unwrap();

        assert_eq!(quote.new_balance, -15000);
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let product = Product::new("P-14", "14.2kg cylinder", 85000);
        let result = quote_sale(&customer(0, 1), &product, sale(0, 0, None, 0), &context());

        assert_eq!(result, Err(ValidationError::QuantityTooLow { quantity: 0 }));
    }

    #[test]
    fn test_negative_inputs_rejected() {
        let product = Product::new("P-14", "14.2kg cylinder", 85000);
        let c = customer(0, 0);

        assert!(matches!(
            quote_sale(&c, &product, sale(1, -1, None, 0), &context()),
            Err(ValidationError::NegativeEmpties { .. })
        ));
        assert!(matches!(
            quote_sale(&c, &product, sale(1, 0, None, -1), &context()),
            Err(ValidationError::NegativeAmountReceived { .. })
        ));
        assert!(matches!(
            quote_payment(&c, -500, &context()),
            Err(ValidationError::NegativeAmountReceived { .. })
        ));
    }

    #[test]
    fn test_overflow_is_rejected_not_wrapped() {
        let product = Product::new("P-X", "Bulk", i64::MAX / 2);
        let result = quote_sale(&customer(0, 0), &product, sale(3, 0, None, 0), &context());

        assert_eq!(result, Err(ValidationError::AmountOverflow));
    }

    #[test]
    fn test_quote_carries_snapshots_and_context() {
        let product = Product::new("P-14", "14.2kg cylinder", 85000);
        let mut c = customer(0, 0).with_phone("9876543210");
        c.version = 7;
        let quote = quote_sale(&c, &product, sale(1, 0, None, 0), &context()).unwrap();
        let tx = &quote.transaction;

        assert_eq!(quote.customer_version, 7);
        assert_eq!(tx.reference, "TBG20240305094107");
        assert_eq!(tx.route, "north");
        assert_eq!(tx.customer_snapshot.phone, "9876543210");
        assert_eq!(tx.product_snapshot.as_ref().unwrap().name, "14.2kg cylinder");
    }

    #[test]
    fn test_summarize_day() {
        let product = Product::new("P-14", "14.2kg cylinder", 85000);
        let c = customer(0, 0);
        let transactions = vec![
            quote_sale(&c, &product, sale(2, 1, None, 100000), &context())
                .unwrap()
                .transaction,
            quote_sale(&c, &product, sale(1, 1, Some(80000), 80000), &context())
                .unwrap()
                .transaction,
            quote_payment(&c, 20000, &context()).unwrap().transaction,
        ];

        let totals = summarize_day(&transactions);

        assert_eq!(totals.transaction_count, 3);
        assert_eq!(totals.sale_count, 2);
        assert_eq!(totals.payment_count, 1);
        assert_eq!(totals.total_sale_value, 250000);
        assert_eq!(totals.total_received, 200000);
        assert_eq!(totals.total_credit, 70000);
        assert_eq!(totals.cylinders_sold, 3);
        assert_eq!(totals.empties_returned, 2);
        assert_eq!(total_sale_amount(&transactions), 250000);
    }

    #[test]
    fn test_summarize_saturates_near_limit() {
        let product = Product::new("P-14", "14.2kg cylinder", 85000);
        let c = customer(0, 0);
        let mut big = quote_sale(&c, &product, sale(1, 0, None, 0), &context())
            .unwrap()
            .transaction;
        big.sale_amount = Paise::MAX - 10;
        big.amount_received = Paise::MAX - 10;
        let transactions = vec![big.clone(), big];

        let totals = summarize_day(&transactions);

        assert_eq!(totals.total_sale_value, Paise::MAX);
        assert_eq!(totals.total_received, Paise::MAX);
        assert_eq!(totals.total_credit, 0);
        assert_eq!(total_sale_amount(&transactions), Paise::MAX);
    }

    #[test]
    fn test_non_positive_price_message() {
        let err = ValidationError::NonPositivePrice { price: -500 };
        assert_eq!(
            err.to_string(),
            "Product price must be greater than zero (got -5.00)"
        );
    }

    #[test]
    fn test_summarize_empty_day() {
        assert_eq!(summarize_day(&[]), DailyTotals::default());
    }
}

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{format_paise, Customer, Product, Transaction};

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export the active route's transactions for `date` as CSV
    pub async fn export_transactions_csv<W: Write>(
        &self,
        writer: W,
        date: NaiveDate,
    ) -> Result<usize> {
        let report = self.service.daily_summary(date).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "sequence",
            "reference",
            "date",
            "type",
            "customer_id",
            "customer_name",
            "product",
            "sales_quantity",
            "empty_quantity",
            "price",
            "custom_price",
            "sale_amount",
            "previous_balance",
            "amount_received",
            "today_credit",
            "total_balance",
            "gas_on_hand",
            "timestamp",
        ])?;

        for t in &report.transactions {
            csv_writer.write_record([
                t.id.to_string(),
                t.sequence.to_string(),
                t.reference.clone(),
                t.date.to_string(),
                t.transaction_type.as_str().to_string(),
                t.customer_id.clone(),
                t.customer_snapshot.name.clone(),
                t.product_snapshot
                    .as_ref()
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                t.sales_quantity.to_string(),
                t.empty_quantity.to_string(),
                format_paise(t.effective_price),
                t.is_custom_price().to_string(),
                format_paise(t.sale_amount),
                format_paise(t.previous_balance),
                format_paise(t.amount_received),
                format_paise(t.today_credit),
                format_paise(t.total_balance),
                t.gas_on_hand_after.to_string(),
                t.timestamp.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(report.transactions.len())
    }

    /// Export the active route's customers with balances and gas counts as CSV
    pub async fn export_customers_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let customers = self.service.list_customers().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "name",
            "phone",
            "address",
            "route",
            "balance",
            "gas_on_hand",
            "last_transaction_date",
        ])?;

        for customer in &customers {
            csv_writer.write_record([
                customer.id.as_str(),
                customer.name.as_str(),
                customer.phone.as_str(),
                customer.address.as_str(),
                customer.route.as_str(),
                &format_paise(customer.current_balance),
                &customer.current_gas_on_hand.to_string(),
                &customer
                    .last_transaction_date
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(customers.len())
    }

    /// Export full database as JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            customers: self.service.list_all_customers().await?,
            products: self.service.list_products().await?,
            transactions: self.service.list_all_transactions().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}

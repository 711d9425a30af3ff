use anyhow::Result;
use serde::Deserialize;
use std::io::Read;

use crate::application::{AppError, LedgerService};
use crate::domain::{parse_paise, Customer, Paise, Product, ValidationError};

/// Result of an import operation
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub skip_duplicates: bool,
}

#[derive(Debug, Deserialize)]
struct CustomerRow {
    id: String,
    name: String,
    #[serde(default)]
    route: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    balance: String,
    #[serde(default)]
    gas_on_hand: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProductRow {
    id: String,
    name: String,
    price: String,
}

/// Importer for loading master data into the ledger
pub struct Importer<'a> {
    service: &'a LedgerService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Import customers from CSV.
    ///
    /// Columns: `id,name,route,phone,address,balance,gas_on_hand`. A blank
    /// route places the customer on the active route.
    pub async fn import_customers_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut result = ImportResult::default();

        for (line_num, row) in csv_reader.deserialize::<CustomerRow>().enumerate() {
            let line = line_num + 2; // header plus 1-based lines

            let row = match row {
                Ok(r) => r,
                Err(e) => {
                    result.push_error(line, None, format!("CSV parse error: {}", e));
                    continue;
                }
            };

            if row.id.trim().is_empty() {
                result.push_error(line, Some("id"), "Customer id is required".into());
                continue;
            }

            let balance = match parse_optional_amount(&row.balance) {
                Ok(b) => b,
                Err(e) => {
                    result.push_error(line, Some("balance"), format!("Invalid amount: {}", e));
                    continue;
                }
            };

            let route = if row.route.trim().is_empty() {
                match self.service.route() {
                    Ok(r) => r.to_string(),
                    Err(e) => {
                        result.push_error(line, Some("route"), e.to_string());
                        continue;
                    }
                }
            } else {
                row.route.trim().to_string()
            };

            let customer = Customer::new(row.id.trim(), row.name.trim(), route)
                .with_phone(row.phone.trim())
                .with_address(row.address.trim())
                .with_opening_balance(balance)
                .with_gas_on_hand(row.gas_on_hand.unwrap_or(0));

            if options.dry_run {
                result.imported += 1;
                continue;
            }

            match self.service.add_customer(customer).await {
                Ok(_) => result.imported += 1,
                Err(AppError::AlreadyExists { .. }) if options.skip_duplicates => {
                    result.skipped += 1
                }
                Err(e) => result.push_error(line, None, format!("Customer creation failed: {}", e)),
            }
        }

        Ok(result)
    }

    /// Import products from CSV. Columns: `id,name,price`.
    pub async fn import_products_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut result = ImportResult::default();

        for (line_num, row) in csv_reader.deserialize::<ProductRow>().enumerate() {
            let line = line_num + 2;

            let row = match row {
                Ok(r) => r,
                Err(e) => {
                    result.push_error(line, None, format!("CSV parse error: {}", e));
                    continue;
                }
            };

            if row.id.trim().is_empty() {
                result.push_error(line, Some("id"), "Product id is required".into());
                continue;
            }

            let price = match parse_paise(&row.price) {
                Ok(p) => p,
                Err(e) => {
                    result.push_error(line, Some("price"), format!("Invalid amount: {}", e));
                    continue;
                }
            };
            if price <= 0 {
                let error = ValidationError::NonPositivePrice { price };
                result.push_error(line, Some("price"), error.to_string());
                continue;
            }

            if options.dry_run {
                result.imported += 1;
                continue;
            }

            let product = Product::new(row.id.trim(), row.name.trim(), price);
            match self.service.add_product(product).await {
                Ok(_) => result.imported += 1,
                Err(AppError::AlreadyExists { .. }) if options.skip_duplicates => {
                    result.skipped += 1
                }
                Err(e) => result.push_error(line, None, format!("Product creation failed: {}", e)),
            }
        }

        Ok(result)
    }
}

impl ImportResult {
    fn push_error(&mut self, line: usize, field: Option<&str>, error: String) {
        self.errors.push(ImportError {
            line,
            field: field.map(str::to_string),
            error,
        });
    }
}

fn parse_optional_amount(s: &str) -> Result<Paise> {
    if s.trim().is_empty() {
        return Ok(0);
    }
    Ok(parse_paise(s)?)
}

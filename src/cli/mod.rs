use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{AppError, LedgerService, Session};
use crate::config::Config;
use crate::domain::{
    format_paise, parse_paise, Customer, Product, Quote, Transaction, TransactionRequest,
};

/// Cylinder Ledger - route sales and payments for gas-cylinder deliveries
#[derive(Parser)]
#[command(name = "cylinder-ledger")]
#[command(about = "Records cylinder sales and payments against a per-customer route ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides LEDGER_DB_PATH)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Active route (overrides LEDGER_ROUTE)
    #[arg(short, long, global = true)]
    pub route: Option<String>,

    /// Attempts before a conflicting transaction is given up (overrides LEDGER_COMMIT_ATTEMPTS)
    #[arg(long, global = true)]
    pub attempts: Option<u32>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Product management commands
    #[command(subcommand)]
    Product(ProductCommands),

    /// Record a cylinder sale
    Sale {
        /// Customer id
        customer: String,

        /// Product id
        #[arg(short, long)]
        product: String,

        /// Cylinders delivered
        #[arg(short, long, default_value = "1")]
        quantity: i64,

        /// Empty cylinders collected
        #[arg(short, long, default_value = "0")]
        empties: i64,

        /// Unit price override (e.g., "800.00"); zero keeps the product price
        #[arg(long)]
        price: Option<String>,

        /// Amount received from the customer
        #[arg(long, default_value = "0")]
        received: String,

        /// Route day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Show the computed entry without recording it
        #[arg(long)]
        preview: bool,
    },

    /// Record a payment against a customer's balance
    Payment {
        /// Customer id
        customer: String,

        /// Amount received (e.g., "500.00" or "500")
        amount: String,

        /// Route day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Show the computed entry without recording it
        #[arg(long)]
        preview: bool,
    },

    /// Show detailed transaction information
    Show {
        /// Transaction ID
        id: String,
    },

    /// Day's transactions and totals for the route
    Dashboard {
        /// Route day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Total sales value for a day across all routes
    Total {
        /// Day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Bring a customer up to date with a recorded transaction
    Reconcile {
        /// Transaction ID reported by a failed customer update
        id: String,
    },

    /// Export data to CSV or JSON
    Export {
        /// What to export: transactions, customers, full
        export_type: String,

        /// Route day for transactions (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import customers or products from CSV
    Import {
        /// What to import: customers, products
        import_type: String,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Validate without importing
        #[arg(long)]
        dry_run: bool,

        /// Skip records whose id already exists
        #[arg(long)]
        skip_duplicates: bool,
    },
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Register a customer
    Add {
        /// Customer id (must be unique)
        id: String,

        /// Customer name
        name: String,

        /// Phone number
        #[arg(long, default_value = "")]
        phone: String,

        /// Address
        #[arg(long, default_value = "")]
        address: String,

        /// Opening balance (e.g., "1500.00")
        #[arg(long, default_value = "0")]
        balance: String,

        /// Cylinders already held
        #[arg(long, default_value = "0")]
        gas: i64,
    },

    /// List customers on the route
    List,

    /// Show a customer's balance and cylinder count
    Show {
        /// Customer id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ProductCommands {
    /// Register a product
    Add {
        /// Product id (must be unique)
        id: String,

        /// Product name
        name: String,

        /// Unit price (e.g., "850.00")
        price: String,
    },

    /// List all products
    List,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::from_env()?.with_overrides(self.database, self.route, self.attempts)?;
        let session = Session::new(config.route.clone());

        if matches!(self.command, Commands::Init) {
            LedgerService::init(&config.database_path, session).await?;
            println!("Database initialized: {}", config.database_path);
            return Ok(());
        }

        let service = LedgerService::connect(&config.database_path, session)
            .await?
            .with_commit_attempts(config.commit_attempts);

        match self.command {
            Commands::Init => {}

            Commands::Customer(cmd) => run_customer_command(&service, cmd).await?,

            Commands::Product(cmd) => run_product_command(&service, cmd).await?,

            Commands::Sale {
                customer,
                product,
                quantity,
                empties,
                price,
                received,
                date,
                preview,
            } => {
                let mut request = TransactionRequest::sale(customer, product, quantity)
                    .with_empties(empties)
                    .with_amount_received(
                        parse_paise(&received)
                            .context("Invalid amount format. Use '500.00' or '500'")?,
                    );
                if let Some(price) = price {
                    request = request.with_custom_price(
                        parse_paise(&price).context("Invalid price format. Use '800.00'")?,
                    );
                }
                if let Some(date) = date {
                    request = request.on_date(parse_date(&date)?);
                }
                run_transaction_command(&service, request, preview).await?;
            }

            Commands::Payment {
                customer,
                amount,
                date,
                preview,
            } => {
                let amount = parse_paise(&amount)
                    .context("Invalid amount format. Use '500.00' or '500'")?;
                let mut request = TransactionRequest::payment(customer, amount);
                if let Some(date) = date {
                    request = request.on_date(parse_date(&date)?);
                }
                run_transaction_command(&service, request, preview).await?;
            }

            Commands::Show { id } => {
                let id = parse_transaction_id(&id)?;
                let transaction = service.get_transaction(id).await?;
                print_transaction(&transaction);
            }

            Commands::Dashboard { date } => {
                run_dashboard_command(&service, date_or_today(date)?).await?;
            }

            Commands::Total { date } => {
                let total = service.daily_sales_total(date_or_today(date)?).await?;
                println!(
                    "Sales on {}: {} ({} sale(s))",
                    total.date,
                    format_paise(total.total),
                    total.sale_count
                );
            }

            Commands::Reconcile { id } => {
                let id = parse_transaction_id(&id)?;
                let outcome = service.retry_projection(id).await?;
                println!("Reconciled {}: {:?}", id, outcome);
            }

            Commands::Export {
                export_type,
                date,
                output,
            } => {
                run_export_command(&service, &export_type, date, output.as_deref()).await?;
            }

            Commands::Import {
                import_type,
                input,
                dry_run,
                skip_duplicates,
            } => {
                run_import_command(
                    &service,
                    &import_type,
                    input.as_deref(),
                    dry_run,
                    skip_duplicates,
                )
                .await?;
            }
        }

        Ok(())
    }
}

async fn run_customer_command(service: &LedgerService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Add {
            id,
            name,
            phone,
            address,
            balance,
            gas,
        } => {
            let route = service.route()?.to_string();
            let balance =
                parse_paise(&balance).context("Invalid balance format. Use '1500.00'")?;
            let customer = Customer::new(id, name, route)
                .with_phone(phone)
                .with_address(address)
                .with_opening_balance(balance)
                .with_gas_on_hand(gas);
            let customer = service.add_customer(customer).await?;
            println!(
                "Added customer: {} ({}) on route {}",
                customer.name, customer.id, customer.route
            );
        }

        CustomerCommands::List => {
            let customers = service.list_customers().await?;
            if customers.is_empty() {
                println!("No customers on this route.");
                return Ok(());
            }

            println!(
                "{:<12} {:<24} {:<14} {:>12} {:>6}",
                "ID", "NAME", "PHONE", "BALANCE", "GAS"
            );
            println!("{}", "-".repeat(72));
            for c in &customers {
                println!(
                    "{:<12} {:<24} {:<14} {:>12} {:>6}",
                    truncate(&c.id, 12),
                    truncate(&c.name, 24),
                    truncate(&c.phone, 14),
                    format_paise(c.current_balance),
                    c.current_gas_on_hand
                );
            }
        }

        CustomerCommands::Show { id } => {
            let c = service.get_customer(&id).await?;
            println!("Customer: {}", c.id);
            println!("  Name:        {}", c.name);
            if !c.phone.is_empty() {
                println!("  Phone:       {}", c.phone);
            }
            if !c.address.is_empty() {
                println!("  Address:     {}", c.address);
            }
            println!("  Route:       {}", c.route);
            println!("  Balance:     {}", format_paise(c.current_balance));
            println!("  Gas on hand: {}", c.current_gas_on_hand);
            if let Some(date) = c.last_transaction_date {
                println!("  Last entry:  {}", date.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
    Ok(())
}

async fn run_product_command(service: &LedgerService, cmd: ProductCommands) -> Result<()> {
    match cmd {
        ProductCommands::Add { id, name, price } => {
            let price = parse_paise(&price).context("Invalid price format. Use '850.00'")?;
            let product = service.add_product(Product::new(id, name, price)).await?;
            println!(
                "Added product: {} ({}) at {}",
                product.name,
                product.id,
                format_paise(product.price)
            );
        }

        ProductCommands::List => {
            let products = service.list_products().await?;
            if products.is_empty() {
                println!("No products found.");
                return Ok(());
            }

            println!("{:<12} {:<30} {:>12}", "ID", "NAME", "PRICE");
            println!("{}", "-".repeat(56));
            for p in &products {
                println!(
                    "{:<12} {:<30} {:>12}",
                    truncate(&p.id, 12),
                    truncate(&p.name, 30),
                    format_paise(p.price)
                );
            }
        }
    }
    Ok(())
}

async fn run_transaction_command(
    service: &LedgerService,
    request: TransactionRequest,
    preview: bool,
) -> Result<()> {
    if preview {
        let quote = service.quote(&request).await?;
        print_quote(&quote);
        return Ok(());
    }

    match service.record(&request).await {
        Ok(transaction) => {
            println!(
                "Recorded {} {} for {}: balance {}, gas on hand {}",
                transaction.transaction_type,
                transaction.id,
                transaction.customer_snapshot.name,
                format_paise(transaction.total_balance),
                transaction.gas_on_hand_after
            );
            Ok(())
        }
        Err(e) => {
            if let Some(id) = e.pending_projection() {
                eprintln!(
                    "The transaction is recorded. Run `cylinder-ledger reconcile {}` to update the customer.",
                    id
                );
            } else if matches!(e, AppError::LedgerWrite(_)) {
                eprintln!("Nothing was recorded. It is safe to submit again.");
            }
            Err(e.into())
        }
    }
}

async fn run_dashboard_command(service: &LedgerService, date: NaiveDate) -> Result<()> {
    let report = service.daily_summary(date).await?;
    let totals = &report.totals;

    println!("Route {} on {}", report.route, report.date);
    println!();

    if report.transactions.is_empty() {
        println!("No transactions recorded.");
        return Ok(());
    }

    println!(
        "{:<8} {:<20} {:<14} {:>4} {:>4} {:>10} {:>10} {:>10} {:>12}",
        "TYPE", "CUSTOMER", "PRODUCT", "QTY", "EMPT", "AMOUNT", "RECEIVED", "CREDIT", "BALANCE"
    );
    println!("{}", "-".repeat(100));
    for t in &report.transactions {
        println!(
            "{:<8} {:<20} {:<14} {:>4} {:>4} {:>10} {:>10} {:>10} {:>12}",
            t.transaction_type,
            truncate(&t.customer_snapshot.name, 20),
            truncate(
                t.product_snapshot
                    .as_ref()
                    .map(|p| p.name.as_str())
                    .unwrap_or("-"),
                14
            ),
            t.sales_quantity,
            t.empty_quantity,
            format_paise(t.sale_amount),
            format_paise(t.amount_received),
            format_paise(t.today_credit),
            format_paise(t.total_balance)
        );
    }

    println!();
    println!(
        "Transactions: {} ({} sales, {} payments)",
        totals.transaction_count, totals.sale_count, totals.payment_count
    );
    println!("Sales value:  {}", format_paise(totals.total_sale_value));
    println!("Received:     {}", format_paise(totals.total_received));
    println!("Credit:       {}", format_paise(totals.total_credit));
    println!(
        "Cylinders:    {} sold, {} empties returned",
        totals.cylinders_sold, totals.empties_returned
    );

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    date: Option<String>,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "transactions" => {
            let count = exporter
                .export_transactions_csv(writer, date_or_today(date)?)
                .await?;
            if output.is_some() {
                eprintln!("Exported {} transactions", count);
            }
        }
        "customers" => {
            let count = exporter.export_customers_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} customers", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} customers, {} products, {} transactions",
                    snapshot.customers.len(),
                    snapshot.products.len(),
                    snapshot.transactions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: transactions, customers, full",
                export_type
            );
        }
    }

    Ok(())
}

async fn run_import_command(
    service: &LedgerService,
    import_type: &str,
    input: Option<&str>,
    dry_run: bool,
    skip_duplicates: bool,
) -> Result<()> {
    use crate::io::{ImportOptions, Importer};
    use std::fs::File;
    use std::io::{stdin, Read};

    let importer = Importer::new(service);

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let options = ImportOptions {
        dry_run,
        skip_duplicates,
    };

    let result = match import_type {
        "customers" => importer.import_customers_csv(reader, options).await?,
        "products" => importer.import_products_csv(reader, options).await?,
        _ => {
            anyhow::bail!(
                "Invalid import type '{}'. Valid types: customers, products",
                import_type
            );
        }
    };

    if dry_run {
        println!("Validation complete");
    } else {
        println!("Import complete");
    }
    println!("  Imported: {}", result.imported);
    println!("  Skipped:  {}", result.skipped);
    println!("  Errors:   {}", result.errors.len());

    if !result.errors.is_empty() {
        println!("\nErrors:");
        for error in result.errors.iter().take(10) {
            println!(
                "  Line {}: {}{}",
                error.line,
                error
                    .field
                    .as_ref()
                    .map(|f| format!("{}: ", f))
                    .unwrap_or_default(),
                error.error
            );
        }
        if result.errors.len() > 10 {
            println!("  ... and {} more errors", result.errors.len() - 10);
        }
    }

    Ok(())
}

fn print_quote(quote: &Quote) {
    println!("Preview (not recorded)");
    print_transaction(&quote.transaction);
}

fn print_transaction(t: &Transaction) {
    if t.sequence > 0 {
        println!("Transaction: {}", t.id);
        println!("  Sequence:     {}", t.sequence);
    }
    println!("  Reference:    {}", t.reference);
    println!("  Type:         {}", t.transaction_type);
    println!("  Date:         {}", t.date);
    println!("  Route:        {}", t.route);
    println!("  Customer:     {} ({})", t.customer_snapshot.name, t.customer_id);
    if let Some(product) = &t.product_snapshot {
        println!(
            "  Product:      {} at {}{}",
            product.name,
            format_paise(t.effective_price),
            if t.is_custom_price() {
                format!(" (list {})", format_paise(t.base_price))
            } else {
                String::new()
            }
        );
        println!("  Quantity:     {}", t.sales_quantity);
        println!("  Empties:      {}", t.empty_quantity);
        println!("  Sale amount:  {}", format_paise(t.sale_amount));
    }
    println!("  Previous bal: {}", format_paise(t.previous_balance));
    println!("  Received:     {}", format_paise(t.amount_received));
    if t.is_sale() {
        println!("  Credit:       {}", format_paise(t.today_credit));
    }
    println!("  Total bal:    {}", format_paise(t.total_balance));
    println!(
        "  Gas on hand:  {} -> {}",
        t.previous_gas_on_hand, t.gas_on_hand_after
    );
    println!(
        "  Recorded at:  {}",
        t.timestamp.format("%Y-%m-%d %H:%M:%S")
    );
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

fn date_or_today(date: Option<String>) -> Result<NaiveDate> {
    match date {
        Some(d) => parse_date(&d),
        None => Ok(Local::now().date_naive()),
    }
}

fn parse_transaction_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid transaction ID format (expected UUID)")
}

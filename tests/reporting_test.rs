mod common;

use anyhow::Result;
use common::{parse_date, test_service, StandardRoute, ROUTE};
use cylinder_ledger::application::{LedgerService, Session};
use cylinder_ledger::domain::TransactionRequest;

#[tokio::test]
async fn test_daily_summary_for_route() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardRoute::create(&service).await?;
    let day = parse_date("2024-03-01");

    service
        .record(
            &TransactionRequest::sale("C-001", "P-14", 2)
                .with_empties(1)
                .with_amount_received(100000)
                .on_date(day),
        )
        .await?;
    service
        .record(
            &TransactionRequest::sale("C-002", "P-19", 1)
                .with_custom_price(95000)
                .on_date(day),
        )
        .await?;
    service
        .record(&TransactionRequest::payment("C-002", 30000).on_date(day))
        .await?;
    // Another day, not included
    service
        .record(&TransactionRequest::payment("C-001", 1000).on_date(parse_date("2024-03-02")))
        .await?;

    let report = service.daily_summary(day).await?;
    assert_eq!(report.route, ROUTE);
    assert_eq!(report.transactions.len(), 3);

    let totals = &report.totals;
    assert_eq!(totals.transaction_count, 3);
    assert_eq!(totals.sale_count, 2);
    assert_eq!(totals.payment_count, 1);
    assert_eq!(totals.total_sale_value, 170000 + 95000);
    assert_eq!(totals.total_received, 100000 + 30000);
    assert_eq!(totals.total_credit, 70000 + 95000);
    assert_eq!(totals.cylinders_sold, 3);
    assert_eq!(totals.empties_returned, 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_day() -> Result<()> {
    let (service, _temp) = test_service().await?;
    StandardRoute::create(&service).await?;

    let report = service.daily_summary(parse_date("2024-01-01")).await?;
    assert!(report.transactions.is_empty());
    assert_eq!(report.totals, Default::default());

    let total = service.daily_sales_total(parse_date("2024-01-01")).await?;
    assert_eq!(total.total, 0);
    assert_eq!(total.sale_count, 0);
    Ok(())
}

#[tokio::test]
async fn test_daily_sales_total_spans_routes() -> Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db_path = db_path.to_str().unwrap();
    let day = parse_date("2024-03-01");

    let north = LedgerService::init(db_path, Session::for_route(ROUTE)).await?;
    StandardRoute::create(&north).await?;
    north
        .record(&TransactionRequest::sale("C-001", "P-14", 1).on_date(day))
        .await?;
    north
        .record(&TransactionRequest::payment("C-002", 5000).on_date(day))
        .await?;

    let south = LedgerService::connect(db_path, Session::for_route("South")).await?;
    south
        .record(&TransactionRequest::sale("C-100", "P-19", 2).on_date(day))
        .await?;

    // Route dashboards stay separate
    assert_eq!(north.daily_summary(day).await?.transactions.len(), 2);
    assert_eq!(south.daily_summary(day).await?.transactions.len(), 1);

    let total = north.daily_sales_total(day).await?;
    assert_eq!(total.sale_count, 2);
    assert_eq!(total.total, 85000 + 200000);
    Ok(())
}

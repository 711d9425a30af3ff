use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{DailyTotals, Paise, Transaction};

/// A route's day: dashboard totals plus the entries behind them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub route: String,
    pub date: NaiveDate,
    pub totals: DailyTotals,
    pub transactions: Vec<Transaction>,
}

/// Sales value for a day across every route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySalesTotal {
    pub date: NaiveDate,
    pub sale_count: usize,
    pub total: Paise,
}

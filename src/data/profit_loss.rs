use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::parse::{parse_amount, parse_date, read_records, row_context};
use crate::core::end_of_month;
use crate::error::{ModelError, Result};

/// One month of the profit & loss report. `cost` is the total, of which
/// `fixed_cost` (rent, marketing, bookkeeping, ...) and `retirement_cost` are
/// components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyFinancials {
    pub date: NaiveDate,
    pub revenue: f64,
    pub cost: f64,
    pub fixed_cost: f64,
    pub retirement_cost: f64,
}

#[derive(Debug, Deserialize)]
struct ProfitLossRecord {
    date: String,
    revenue: String,
    cost: String,
    #[serde(default)]
    fixed_cost: String,
    #[serde(default)]
    retirement_cost: String,
}

/// Monthly P&L history, sorted by month.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfitLoss {
    months: Vec<MonthlyFinancials>,
}

impl ProfitLoss {
    pub fn new(mut months: Vec<MonthlyFinancials>) -> Self {
        for month in &mut months {
            month.date = end_of_month(month.date);
        }
        months.sort_by_key(|m| m.date);
        Self { months }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let records: Vec<ProfitLossRecord> = read_records(path)?;
        let mut months = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            let context = row_context(path, row);
            months.push(MonthlyFinancials {
                date: parse_date(&record.date, &context)?,
                revenue: parse_amount(&record.revenue, &context)?,
                cost: parse_amount(&record.cost, &context)?,
                fixed_cost: parse_amount(&record.fixed_cost, &context)?,
                retirement_cost: parse_amount(&record.retirement_cost, &context)?,
            });
        }
        Ok(Self::new(months))
    }

    pub fn months(&self) -> &[MonthlyFinancials] {
        &self.months
    }

    pub fn average_fixed_cost(&self) -> Result<f64> {
        mean(self.months.iter().map(|m| m.fixed_cost)).ok_or(ModelError::EmptyHistory {
            series: "fixed cost",
        })
    }

    pub fn average_historical_cost(&self) -> Result<f64> {
        mean(self.months.iter().map(|m| m.cost)).ok_or(ModelError::EmptyHistory { series: "cost" })
    }

    pub fn ytd_revenue(&self, now: NaiveDate) -> f64 {
        self.ytd(now).map(|m| m.revenue).sum()
    }

    pub fn ytd_cost(&self, now: NaiveDate) -> f64 {
        self.ytd(now).map(|m| m.cost).sum()
    }

    fn ytd(&self, now: NaiveDate) -> impl Iterator<Item = &MonthlyFinancials> {
        self.months
            .iter()
            .filter(move |m| m.date.year() == now.year() && m.date <= now)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use super::parse::{parse_amount, parse_date, read_records, row_context};
use crate::core::end_of_month;
use crate::error::{ModelError, Result};

#[derive(Debug, Deserialize)]
struct BalanceSheetRecord {
    date: String,
    cash_in_bank: String,
}

/// Month-end cash in the bank, sorted by month.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSheet {
    cash_in_bank: Vec<(NaiveDate, f64)>,
}

impl BalanceSheet {
    pub fn new(mut cash_in_bank: Vec<(NaiveDate, f64)>) -> Self {
        for (date, _) in &mut cash_in_bank {
            *date = end_of_month(*date);
        }
        cash_in_bank.sort_by_key(|(date, _)| *date);
        Self { cash_in_bank }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let records: Vec<BalanceSheetRecord> = read_records(path)?;
        let mut rows = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            let context = row_context(path, row);
            rows.push((
                parse_date(&record.date, &context)?,
                parse_amount(&record.cash_in_bank, &context)?,
            ));
        }
        Ok(Self::new(rows))
    }

    pub fn historical_cash_in_bank(&self) -> &[(NaiveDate, f64)] {
        &self.cash_in_bank
    }

    pub fn current_cash_in_bank(&self) -> Result<f64> {
        self.cash_in_bank
            .last()
            .map(|(_, cash)| *cash)
            .ok_or(ModelError::EmptyHistory {
                series: "cash in bank",
            })
    }
}

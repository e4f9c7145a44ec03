use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::parse::{parse_amount, parse_date, read_records, row_context};
use crate::core::end_of_month;
use crate::error::{ModelError, Result};

/// An issued invoice that has not been paid yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpaidInvoice {
    pub customer: String,
    pub due_date: NaiveDate,
    pub balance: f64,
}

/// An invoice expected to be issued once project work is delivered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedInvoice {
    pub client: String,
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
struct UnpaidInvoiceRecord {
    #[serde(default)]
    customer: String,
    due_date: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct ProjectionRecord {
    #[serde(default)]
    client: String,
    date: String,
    amount: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnpaidInvoices {
    invoices: Vec<UnpaidInvoice>,
}

impl UnpaidInvoices {
    pub fn new(invoices: Vec<UnpaidInvoice>) -> Self {
        Self { invoices }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let records: Vec<UnpaidInvoiceRecord> = read_records(path)?;
        let mut invoices = Vec::with_capacity(records.len());
        for (row, record) in records.into_iter().enumerate() {
            let context = row_context(path, row);
            invoices.push(UnpaidInvoice {
                due_date: parse_date(&record.due_date, &context)?,
                balance: parse_amount(&record.balance, &context)?,
                customer: record.customer,
            });
        }
        Ok(Self::new(invoices))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.invoices.iter().map(|i| (i.due_date, i.balance))
    }

    pub fn invoices(&self) -> &[UnpaidInvoice] {
        &self.invoices
    }
}

/// Projected invoices, dated by the month they are expected to be issued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceProjections {
    projections: Vec<ProjectedInvoice>,
}

impl InvoiceProjections {
    pub fn new(mut projections: Vec<ProjectedInvoice>) -> Self {
        for projection in &mut projections {
            projection.date = end_of_month(projection.date);
        }
        Self { projections }
    }

    /// Reads a tidy `client,date,amount` sheet; blank or zero amounts are
    /// skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let records: Vec<ProjectionRecord> = read_records(path)?;
        let mut projections = Vec::with_capacity(records.len());
        for (row, record) in records.into_iter().enumerate() {
            let context = row_context(path, row);
            let amount = parse_amount(&record.amount, &context)?;
            if amount == 0.0 {
                continue;
            }
            projections.push(ProjectedInvoice {
                date: parse_date(&record.date, &context)?,
                amount,
                client: record.client,
            });
        }
        Ok(Self::new(projections))
    }

    /// All projections as `(date, amount)`, failing if any is dated at or
    /// before `now`: a projection in the past means the sheet is out of date.
    pub fn validated(&self, now: NaiveDate) -> Result<Vec<(NaiveDate, f64)>> {
        self.projections
            .iter()
            .map(|p| {
                if p.date <= now {
                    Err(ModelError::StaleProjection { date: p.date, now })
                } else {
                    Ok((p.date, p.amount))
                }
            })
            .collect()
    }

    pub fn projections(&self) -> &[ProjectedInvoice] {
        &self.projections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn stale_projection_is_a_data_integrity_error() {
        let projections = InvoiceProjections::new(vec![
            ProjectedInvoice {
                client: "acme".into(),
                date: d(2024, 5, 1),
                amount: 10.0,
            },
            ProjectedInvoice {
                client: "initech".into(),
                date: d(2024, 3, 10),
                amount: 20.0,
            },
        ]);
        let err = projections.validated(d(2024, 3, 31)).unwrap_err();
        assert!(matches!(err, ModelError::StaleProjection { .. }));
        assert!(err.is_data_integrity());
        assert!(err.to_string().contains("--today"));

        let ok = projections.validated(d(2024, 2, 29)).unwrap();
        assert_eq!(ok, vec![(d(2024, 5, 31), 10.0), (d(2024, 3, 31), 20.0)]);
    }

    #[test]
    fn load_skips_blank_projection_cells() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "client,date,amount").unwrap();
        writeln!(file, "acme,Apr 2024,\"$12,000\"").unwrap();
        writeln!(file, "acme,May 2024,").unwrap();
        let projections = InvoiceProjections::load(file.path()).unwrap();
        assert_eq!(
            projections.validated(d(2024, 1, 31)).unwrap(),
            vec![(d(2024, 4, 30), 12_000.0)]
        );
    }

    #[test]
    fn load_unpaid_invoices() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "customer,due_date,balance").unwrap();
        writeln!(file, "acme,01/15/2024,5000").unwrap();
        writeln!(file, "initech,2024-02-20,\"2,500.00\"").unwrap();
        let invoices = UnpaidInvoices::load(file.path()).unwrap();
        let rows: Vec<_> = invoices.iter().collect();
        assert_eq!(rows, vec![(d(2024, 1, 15), 5_000.0), (d(2024, 2, 20), 2_500.0)]);
    }
}

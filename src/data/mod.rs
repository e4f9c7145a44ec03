//! Read-only report data the model consumes. Everything is loaded in full up
//! front and never mutated afterwards.

mod balance_sheet;
mod invoices;
mod parse;
mod profit_loss;
mod roster;

use std::path::Path;

use tracing::info;

pub use balance_sheet::BalanceSheet;
pub use invoices::{InvoiceProjections, ProjectedInvoice, UnpaidInvoice, UnpaidInvoices};
pub use parse::{parse_amount, parse_date, parse_fraction};
pub use profit_loss::{MonthlyFinancials, ProfitLoss};
pub use roster::load_roster;

use crate::core::Person;
use crate::error::Result;

pub const PROFIT_LOSS_FILE: &str = "profit_loss.csv";
pub const BALANCE_SHEET_FILE: &str = "balance_sheet.csv";
pub const UNPAID_INVOICES_FILE: &str = "unpaid_invoices.csv";
pub const INVOICE_PROJECTIONS_FILE: &str = "invoice_projections.csv";
pub const ROSTER_FILE: &str = "roster.csv";

/// Every report the company model is built from.
#[derive(Debug, Clone, Default)]
pub struct Reports {
    pub profit_loss: ProfitLoss,
    pub balance_sheet: BalanceSheet,
    pub unpaid_invoices: UnpaidInvoices,
    pub invoice_projections: InvoiceProjections,
    pub roster: Vec<Person>,
}

impl Reports {
    /// Loads all reports from `dir`. Missing projection or unpaid-invoice
    /// files are treated as empty; the P&L, balance sheet and roster are
    /// required.
    pub fn load(dir: &Path) -> Result<Self> {
        let profit_loss = ProfitLoss::load(&dir.join(PROFIT_LOSS_FILE))?;
        let balance_sheet = BalanceSheet::load(&dir.join(BALANCE_SHEET_FILE))?;
        let roster = load_roster(&dir.join(ROSTER_FILE))?;

        let unpaid_path = dir.join(UNPAID_INVOICES_FILE);
        let unpaid_invoices = if unpaid_path.exists() {
            UnpaidInvoices::load(&unpaid_path)?
        } else {
            UnpaidInvoices::default()
        };

        let projections_path = dir.join(INVOICE_PROJECTIONS_FILE);
        let invoice_projections = if projections_path.exists() {
            InvoiceProjections::load(&projections_path)?
        } else {
            InvoiceProjections::default()
        };

        info!(
            dir = %dir.display(),
            history_months = profit_loss.months().len(),
            people = roster.len(),
            "loaded reports"
        );

        Ok(Self {
            profit_loss,
            balance_sheet,
            unpaid_invoices,
            invoice_projections,
            roster,
        })
    }
}

use chrono::NaiveDate;
use tracing::debug;

use super::dates::{end_of_last_month, month_end_in};
use super::person::Person;
use super::types::Parameters;
use crate::data::{BalanceSheet, InvoiceProjections, ProfitLoss, Reports, UnpaidInvoices};
use crate::error::{ModelError, Result};

/// Cost figures derived from the P&L history and the roster.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBasis {
    pub average_fixed_cost: f64,
    pub average_historical_cost: f64,
    /// Monthly variable cost per head, one entry per usable history month.
    pub per_person_costs: Vec<f64>,
    pub average_per_person_cost: f64,
}

/// The company being modelled: parameters, roster and report data.
#[derive(Debug, Clone)]
pub struct Company {
    params: Parameters,
    today: NaiveDate,
    people: Vec<Person>,
    profit_loss: ProfitLoss,
    balance_sheet: BalanceSheet,
    unpaid_invoices: UnpaidInvoices,
    invoice_projections: InvoiceProjections,
    cost_basis: CostBasis,
}

impl Company {
    pub fn new(params: Parameters, today: NaiveDate, reports: Reports) -> Result<Self> {
        params.validate()?;
        let Reports {
            profit_loss,
            balance_sheet,
            unpaid_invoices,
            invoice_projections,
            roster,
        } = reports;

        let cost_basis = derive_cost_basis(&params, &profit_loss, &roster)?;
        Ok(Self {
            params,
            today,
            people: roster,
            profit_loss,
            balance_sheet,
            unpaid_invoices,
            invoice_projections,
            cost_basis,
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// The last closed month; report data is complete through this date.
    pub fn now(&self) -> NaiveDate {
        end_of_last_month(self.today)
    }

    pub fn profit_loss(&self) -> &ProfitLoss {
        &self.profit_loss
    }

    pub fn balance_sheet(&self) -> &BalanceSheet {
        &self.balance_sheet
    }

    pub fn unpaid_invoices(&self) -> &UnpaidInvoices {
        &self.unpaid_invoices
    }

    pub fn invoice_projections(&self) -> &InvoiceProjections {
        &self.invoice_projections
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn add_person(&mut self, person: Person) -> Result<()> {
        self.people.push(person);
        self.cost_basis = derive_cost_basis(&self.params, &self.profit_loss, &self.people)?;
        Ok(())
    }

    pub fn iter_people(&self, date: NaiveDate) -> impl Iterator<Item = &Person> {
        self.people
            .iter()
            .filter(move |person| person.is_active_or_partner(date))
    }

    pub fn n_people(&self, date: NaiveDate) -> usize {
        self.iter_people(date).count()
    }

    pub fn n_partners(&self, date: NaiveDate) -> usize {
        self.people.iter().filter(|p| p.is_partner(date)).count()
    }

    pub fn cost_basis(&self) -> &CostBasis {
        &self.cost_basis
    }

    /// Date of relative simulation month `month` (0 = this month).
    pub fn month_date(&self, month: usize) -> NaiveDate {
        month_end_in(self.today, month)
    }

    pub fn iter_future_months(&self, n_months: usize) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..n_months).map(|month| self.month_date(month))
    }

    /// Target cash reserve. With a date, it scales with that month's
    /// headcount; without one it falls back to the average historical cost.
    pub fn cash_buffer(&self, date: Option<NaiveDate>) -> f64 {
        let basis = &self.cost_basis;
        let monthly_cost = match date {
            Some(date) => {
                basis.average_fixed_cost
                    + self.n_people(date) as f64 * basis.average_per_person_cost
            }
            None => basis.average_historical_cost,
        };
        self.params.n_months_buffer * monthly_cost
    }

    pub fn retirement_contribution(&self, date: NaiveDate) -> f64 {
        self.params.retirement_contribution * self.n_people(date) as f64
    }

    /// Share of the bonus pool `person` receives as dividends.
    pub fn fraction_dividends(&self, person: &Person) -> f64 {
        self.params.fraction_profit_for_dividends * person.ownership
    }

    /// Share of the bonus pool `person` receives as bonus, weighted by their
    /// tenure in the year of `date` relative to everyone else's.
    pub fn fraction_bonus(&self, person: &Person, date: NaiveDate) -> f64 {
        let total_tenure: f64 = self.people.iter().map(|p| p.fraction_of_year(date)).sum();
        if total_tenure <= 0.0 {
            return 0.0;
        }
        (1.0 - self.params.fraction_profit_for_dividends) * person.fraction_of_year(date)
            / total_tenure
    }

    pub fn net_fraction_of_profits(&self, person: &Person, date: NaiveDate) -> f64 {
        self.fraction_dividends(person) + self.fraction_bonus(person, date)
    }
}

fn derive_cost_basis(
    params: &Parameters,
    profit_loss: &ProfitLoss,
    people: &[Person],
) -> Result<CostBasis> {
    let average_fixed_cost = profit_loss.average_fixed_cost()?;
    let average_historical_cost = profit_loss.average_historical_cost()?;

    let months = profit_loss.months();
    let window_start = params
        .cost_history_window
        .map_or(0, |window| months.len().saturating_sub(window));

    let mut per_person_costs = Vec::with_capacity(months.len() - window_start);
    for month in &months[window_start..] {
        let headcount = people
            .iter()
            .filter(|p| p.is_active_or_partner(month.date))
            .count();
        if headcount == 0 {
            debug!(date = %month.date, "skipping history month with no active people");
            continue;
        }
        let variable_cost = month.cost - month.fixed_cost - month.retirement_cost;
        per_person_costs.push(variable_cost / headcount as f64);
    }

    if per_person_costs.is_empty() {
        return Err(ModelError::EmptyHistory {
            series: "per-person cost",
        });
    }
    let average_per_person_cost =
        per_person_costs.iter().sum::<f64>() / per_person_costs.len() as f64;

    Ok(CostBasis {
        average_fixed_cost,
        average_historical_cost,
        per_person_costs,
        average_per_person_cost,
    })
}

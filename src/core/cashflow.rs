use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::company::Company;
use super::dates::month_end_in;
use super::types::{BonusPolicy, MonthlyCash, StartingPosition};
use crate::error::{ModelError, Result};

impl Company {
    /// Walks the cash balance forward one month at a time from `start_date`.
    ///
    /// Within a month the order is fixed: quarterly tax draw, then the
    /// year-end bonus (whose expensed share is added to that month's cost),
    /// then the month's costs and revenues, then the year-to-date reset.
    /// Tax draws and dividends leave the bank without counting as costs.
    pub fn get_monthly_cash(
        &self,
        start_date: NaiveDate,
        revenues: &[f64],
        costs: &[f64],
        start: StartingPosition,
    ) -> Result<MonthlyCash> {
        if revenues.len() != costs.len() {
            return Err(ModelError::LengthMismatch {
                revenues: revenues.len(),
                costs: costs.len(),
            });
        }

        let params = self.params();
        let now = self.now();
        let mut cash = match start.cash {
            Some(cash) => cash,
            None => self.balance_sheet().current_cash_in_bank()?,
        };
        let mut ytd_revenue = start
            .ytd_revenue
            .unwrap_or_else(|| self.profit_loss().ytd_revenue(now));
        let mut ytd_cost = start
            .ytd_cost
            .unwrap_or_else(|| self.profit_loss().ytd_cost(now));
        let mut ytd_tax_draws = start.ytd_tax_draws.unwrap_or(params.ytd_tax_draws);

        let mut costs = costs.to_vec();
        let mut quarterly_taxes: BTreeMap<u32, Option<f64>> =
            params.tax_months.iter().map(|month| (*month, None)).collect();
        let mut monthly_cash = Vec::with_capacity(revenues.len());
        let mut bonus_pool = None;

        for (month, &revenue) in revenues.iter().enumerate() {
            let date = month_end_in(start_date, month);
            let calendar_month = date.month();
            let year_end = calendar_month == params.year_end_month;

            // January's draw covers Q4 of the prior year, so profit is only
            // taxed net of the draws already made against it.
            if params.is_tax_month(calendar_month) {
                let ytd_profit = (ytd_revenue - ytd_cost).max(0.0);
                let quarterly_tax = (params.tax_rate * ytd_profit - ytd_tax_draws).max(0.0);
                quarterly_taxes.insert(calendar_month, Some(quarterly_tax));
                cash -= quarterly_tax;
                ytd_tax_draws += quarterly_tax;
            }

            // The bonus share is an expense and lowers taxable profit;
            // dividends were already taxed and come straight out of the bank.
            if year_end {
                let mut eom_cash = cash + revenue - costs[month];
                if params.bonus_policy == BonusPolicy::Conservative {
                    let year_profit = (ytd_revenue + revenue - ytd_cost - costs[month]).max(0.0);
                    eom_cash -= (params.tax_rate * year_profit - ytd_tax_draws).max(0.0);
                }
                let pool = (eom_cash - self.cash_buffer(Some(date))).max(0.0);
                let f = params.fraction_profit_for_dividends;
                costs[month] += (1.0 - f) * pool;
                cash -= f * pool;
                bonus_pool = Some(pool);
            }

            cash -= costs[month];
            cash += revenue;
            ytd_cost += costs[month];
            ytd_revenue += revenue;

            if year_end {
                ytd_revenue = 0.0;
                ytd_cost = 0.0;
                ytd_tax_draws = 0.0;
            }

            monthly_cash.push(cash);
        }

        Ok(MonthlyCash {
            monthly_cash,
            bonus_pool,
            quarterly_taxes,
            costs,
        })
    }
}

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::revenue::NoiseModel;
use crate::error::{ModelError, Result};

/// Whether December's bonus pool is computed before or after setting aside
/// the January tax draw that the year's profit will trigger.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BonusPolicy {
    #[default]
    Simple,
    Conservative,
}

/// Company-wide financial parameters, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    pub tax_rate: f64,
    pub n_months_buffer: f64,
    pub fraction_profit_for_dividends: f64,
    pub line_of_credit: f64,
    /// Per-person retirement contribution paid in the year-end month.
    pub retirement_contribution: f64,
    /// Tax already drawn this calendar year before the simulation starts.
    pub ytd_tax_draws: f64,
    pub before_tax_annual_salary: f64,
    pub n_months_before_tax_bonus: f64,
    pub fraction_time_bonus: f64,
    pub cost_history_window: Option<usize>,
    pub tax_months: Vec<u32>,
    pub year_end_month: u32,
    pub bonus_policy: BonusPolicy,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            tax_rate: 0.35,
            n_months_buffer: 6.0,
            fraction_profit_for_dividends: 0.3,
            line_of_credit: 100_000.0,
            retirement_contribution: 0.0,
            ytd_tax_draws: 0.0,
            before_tax_annual_salary: 90_000.0,
            n_months_before_tax_bonus: 2.0,
            fraction_time_bonus: 1.0,
            cost_history_window: None,
            tax_months: vec![1, 4, 6, 9],
            year_end_month: 12,
            bonus_policy: BonusPolicy::Simple,
        }
    }
}

impl Parameters {
    pub fn validate(&self) -> Result<()> {
        for (name, fraction) in [
            ("tax_rate", self.tax_rate),
            (
                "fraction_profit_for_dividends",
                self.fraction_profit_for_dividends,
            ),
            ("fraction_time_bonus", self.fraction_time_bonus),
        ] {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(ModelError::invalid(name, "must be between 0 and 1"));
            }
        }

        for (name, amount) in [
            ("n_months_buffer", self.n_months_buffer),
            ("line_of_credit", self.line_of_credit),
            ("retirement_contribution", self.retirement_contribution),
            ("ytd_tax_draws", self.ytd_tax_draws),
            ("before_tax_annual_salary", self.before_tax_annual_salary),
            ("n_months_before_tax_bonus", self.n_months_before_tax_bonus),
        ] {
            if !amount.is_finite() || amount < 0.0 {
                return Err(ModelError::invalid(name, "must be a finite value >= 0"));
            }
        }

        if self.fraction_profit_for_dividends >= 1.0 && self.n_months_before_tax_bonus > 0.0 {
            return Err(ModelError::invalid(
                "fraction_profit_for_dividends",
                "must be < 1 when a before-tax bonus target is set",
            ));
        }

        if self.cost_history_window == Some(0) {
            return Err(ModelError::invalid("cost_history_window", "must be > 0"));
        }

        if self.tax_months.is_empty() {
            return Err(ModelError::invalid("tax_months", "must not be empty"));
        }
        if let Some(month) = self.tax_months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(ModelError::invalid(
                "tax_months",
                format!("{month} is not a calendar month"),
            ));
        }
        if !(1..=12).contains(&self.year_end_month) {
            return Err(ModelError::invalid(
                "year_end_month",
                "must be a calendar month (1-12)",
            ));
        }
        Ok(())
    }

    pub fn is_tax_month(&self, month: u32) -> bool {
        self.tax_months.contains(&month)
    }
}

/// Optional starting figures for the integrator; anything left `None` is
/// read from the balance sheet, the P&L, or [`Parameters::ytd_tax_draws`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StartingPosition {
    pub cash: Option<f64>,
    pub ytd_revenue: Option<f64>,
    pub ytd_cost: Option<f64>,
    pub ytd_tax_draws: Option<f64>,
}

impl StartingPosition {
    /// A clean slate at the start of a fiscal year with `cash` in the bank.
    pub fn fresh_year(cash: f64) -> Self {
        Self {
            cash: Some(cash),
            ytd_revenue: Some(0.0),
            ytd_cost: Some(0.0),
            ytd_tax_draws: Some(0.0),
        }
    }
}

/// One universe's integrated cash trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCash {
    pub monthly_cash: Vec<f64>,
    /// `None` when the horizon never reaches the year-end month.
    pub bonus_pool: Option<f64>,
    /// Tax month -> amount drawn, `None` if that month was not simulated.
    pub quarterly_taxes: BTreeMap<u32, Option<f64>>,
    /// Costs as accrued, including the bonus share expensed in the year-end
    /// month.
    pub costs: Vec<f64>,
}

/// Everything that determines a multi-universe run besides the company.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub n_months: usize,
    pub n_universes: u32,
    /// Progress events only; never changes the outputs.
    #[serde(skip)]
    pub verbose: bool,
    pub ontime_payment: bool,
    pub ontime_completion: bool,
    pub seed: u64,
    pub noise: NoiseModel,
}

impl SimulationRequest {
    pub fn new(n_months: usize, n_universes: u32, seed: u64) -> Self {
        Self {
            n_months,
            n_universes,
            verbose: false,
            ontime_payment: false,
            ontime_completion: false,
            seed,
            noise: NoiseModel::default(),
        }
    }

    /// The noise model with the on-time overrides applied.
    pub fn effective_noise(&self) -> NoiseModel {
        self.noise
            .with_overrides(self.ontime_payment, self.ontime_completion)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_months == 0 {
            return Err(ModelError::invalid("n_months", "must be > 0"));
        }
        if self.n_universes == 0 {
            return Err(ModelError::invalid("n_universes", "must be > 0"));
        }
        Ok(())
    }
}

/// Per-universe outputs collected in universe order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutputs {
    pub monthly_cash_outputs: Vec<Vec<f64>>,
    pub bonus_pool_outputs: Vec<Option<f64>>,
    pub quarterly_tax_outputs: BTreeMap<u32, Vec<Option<f64>>>,
}

impl SimulationOutputs {
    pub fn n_universes(&self) -> usize {
        self.monthly_cash_outputs.len()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub date: NaiveDate,
    pub p10_cash: f64,
    pub median_cash: f64,
    pub p90_cash: f64,
    pub cash_buffer: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusPoolSummary {
    pub probability_of_bonus: f64,
    pub p10_bonus_pool: f64,
    pub median_bonus_pool: f64,
    pub p90_bonus_pool: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxDrawSummary {
    pub month: u32,
    pub median_draw: f64,
    pub p90_draw: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub n_universes: usize,
    pub months: Vec<MonthSummary>,
    /// `None` when no universe reached the year-end month.
    pub bonus_pool: Option<BonusPoolSummary>,
    pub quarterly_taxes: Vec<TaxDrawSummary>,
}

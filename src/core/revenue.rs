use rand::Rng;
use serde::{Deserialize, Serialize};

use super::company::Company;
use super::dates::months_between;
use crate::error::Result;

/// Timing noise applied to when invoiced money actually lands. The uniform
/// bounds are rough guesses rather than measured distributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseModel {
    /// Clients rarely pay early and tend to pay late: uniform 0..=max months.
    pub max_payment_delay_months: u32,
    /// Project wrap-up can drag on, delaying the invoice: uniform 0..=max.
    pub max_completion_delay_months: u32,
    pub payment_terms_months: u32,
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self {
            max_payment_delay_months: 3,
            max_completion_delay_months: 2,
            payment_terms_months: 1,
        }
    }
}

impl NoiseModel {
    /// Collapses payment and/or completion noise to zero.
    pub fn with_overrides(mut self, ontime_payment: bool, ontime_completion: bool) -> Self {
        if ontime_payment {
            self.max_payment_delay_months = 0;
        }
        if ontime_completion {
            self.max_completion_delay_months = 0;
        }
        self
    }

    pub fn payment_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        rng.gen_range(0..=self.max_payment_delay_months) as i32
    }

    pub fn completion_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        rng.gen_range(0..=self.max_completion_delay_months) as i32
    }
}

impl Company {
    /// Draws one universe's revenue per relative month from unpaid invoices
    /// and invoice projections.
    pub fn simulate_revenues<R: Rng + ?Sized>(
        &self,
        n_months: usize,
        noise: &NoiseModel,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        let projections = self.invoice_projections().validated(self.now())?;
        let today = self.today();
        let mut revenues = vec![0.0; n_months];

        let mut book = |month: i32, amount: f64| {
            if let Ok(index) = usize::try_from(month) {
                if let Some(slot) = revenues.get_mut(index) {
                    *slot += amount;
                }
            }
        };

        // Overdue invoices are being chased, so treat them as due now.
        for (due_date, balance) in self.unpaid_invoices().iter() {
            let months_from_now = months_between(due_date, today).max(0);
            book(months_from_now + noise.payment_delay(rng), balance);
        }

        for (date, amount) in projections {
            let months_from_now = months_between(date, today);
            let month = months_from_now
                + noise.payment_terms_months as i32
                + noise.completion_delay(rng)
                + noise.payment_delay(rng);
            book(month, amount);
        }

        Ok(revenues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::company::tests::{d, flat_history};
    use crate::core::{Parameters, Person};
    use crate::data::{
        BalanceSheet, InvoiceProjections, ProjectedInvoice, Reports, UnpaidInvoice,
        UnpaidInvoices,
    };
    use crate::error::ModelError;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn company(unpaid: Vec<UnpaidInvoice>, projections: Vec<ProjectedInvoice>) -> Company {
        let reports = Reports {
            profit_loss: flat_history(1_000.0, 1_000.0, 1),
            balance_sheet: BalanceSheet::new(vec![(d(2024, 2, 29), 0.0)]),
            unpaid_invoices: UnpaidInvoices::new(unpaid),
            invoice_projections: InvoiceProjections::new(projections),
            roster: vec![Person::new("a", d(2020, 1, 1))],
        };
        Company::new(Parameters::default(), d(2024, 3, 12), reports).unwrap()
    }

    fn unpaid(due: chrono::NaiveDate, balance: f64) -> UnpaidInvoice {
        UnpaidInvoice {
            customer: "acme".into(),
            due_date: due,
            balance,
        }
    }

    fn projected(date: chrono::NaiveDate, amount: f64) -> ProjectedInvoice {
        ProjectedInvoice {
            client: "initech".into(),
            date,
            amount,
        }
    }

    #[test]
    fn ontime_overrides_place_revenue_deterministically() {
        let company = company(
            vec![
                unpaid(d(2023, 11, 15), 100.0),
                unpaid(d(2024, 3, 20), 200.0),
                unpaid(d(2024, 5, 1), 300.0),
            ],
            vec![projected(d(2024, 4, 30), 1_000.0)],
        );
        let noise = NoiseModel::default().with_overrides(true, true);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let revenues = company.simulate_revenues(6, &noise, &mut rng).unwrap();

        // Overdue and current-month invoices land in month 0, May in month 2,
        // the April projection in month 1 + 1 month of payment terms.
        assert_eq!(revenues, vec![300.0, 0.0, 1_300.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn revenue_beyond_horizon_is_dropped() {
        let company = company(
            vec![unpaid(d(2025, 1, 1), 500.0)],
            vec![projected(d(2024, 12, 1), 700.0)],
        );
        let noise = NoiseModel::default().with_overrides(true, true);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let revenues = company.simulate_revenues(3, &noise, &mut rng).unwrap();
        assert_eq!(revenues, vec![0.0; 3]);
    }

    #[test]
    fn noise_only_delays_and_never_loses_in_range_revenue() {
        let company = company(
            vec![unpaid(d(2024, 3, 1), 100.0)],
            vec![projected(d(2024, 4, 1), 50.0)],
        );
        let noise = NoiseModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..200 {
            let revenues = company.simulate_revenues(12, &noise, &mut rng).unwrap();
            assert!(revenues.iter().all(|r| *r >= 0.0));
            assert!((revenues.iter().sum::<f64>() - 150.0).abs() < 1e-9);
            // Unpaid: month 0..=3; projection: month 2..=7.
            assert!(revenues[8..].iter().all(|r| *r == 0.0));
            assert!(revenues[0] == 0.0 || revenues[0] == 100.0);
        }
    }

    #[test]
    fn stale_projection_aborts_the_draw() {
        let company = company(vec![], vec![projected(d(2024, 2, 10), 50.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = company
            .simulate_revenues(12, &NoiseModel::default(), &mut rng)
            .unwrap_err();
        assert!(matches!(err, ModelError::StaleProjection { .. }));
    }
}

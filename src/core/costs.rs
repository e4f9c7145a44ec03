use chrono::Datelike;
use rand::Rng;
use rand::seq::SliceRandom;

use super::company::Company;

impl Company {
    /// Draws one universe's costs per relative month: constant fixed cost,
    /// headcount times a resampled historical per-person cost, plus the
    /// retirement contribution in the year-end month.
    pub fn simulate_costs<R: Rng + ?Sized>(&self, n_months: usize, rng: &mut R) -> Vec<f64> {
        let basis = self.cost_basis();
        let year_end_month = self.params().year_end_month;

        self.iter_future_months(n_months)
            .map(|date| {
                // Always draw, even with nobody on staff, so rosters of
                // different sizes consume the same random stream.
                let per_person = basis
                    .per_person_costs
                    .choose(rng)
                    .copied()
                    .unwrap_or(basis.average_per_person_cost);
                let mut cost = basis.average_fixed_cost + self.n_people(date) as f64 * per_person;
                if date.month() == year_end_month {
                    cost += self.retirement_contribution(date);
                }
                cost
            })
            .collect()
    }
}

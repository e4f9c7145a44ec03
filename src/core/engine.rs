use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::info;

use super::company::Company;
use super::revenue::NoiseModel;
use super::types::{
    BonusPoolSummary, MonthSummary, MonthlyCash, SimulationOutputs, SimulationRequest,
    SimulationSummary, StartingPosition, TaxDrawSummary,
};
use crate::error::Result;

const PROGRESS_EVERY: u32 = 100;

/// Runs revenue, cost and cash integration for `n_universes` independent
/// universes. Each universe owns an RNG seeded from `(seed, universe)`, so
/// the outputs do not depend on how rayon schedules the work.
pub fn simulate_monthly_cash(
    company: &Company,
    request: &SimulationRequest,
) -> Result<SimulationOutputs> {
    request.validate()?;
    let noise = request.effective_noise();

    let universes = (0..request.n_universes)
        .into_par_iter()
        .map(|universe| {
            if request.verbose && universe % PROGRESS_EVERY == 0 {
                info!(universe, n_universes = request.n_universes, "simulating");
            }
            simulate_single_universe(company, request, &noise, universe)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut outputs = SimulationOutputs {
        monthly_cash_outputs: Vec::with_capacity(universes.len()),
        bonus_pool_outputs: Vec::with_capacity(universes.len()),
        quarterly_tax_outputs: Default::default(),
    };
    for universe in universes {
        outputs.monthly_cash_outputs.push(universe.monthly_cash);
        outputs.bonus_pool_outputs.push(universe.bonus_pool);
        for (month, draw) in universe.quarterly_taxes {
            outputs
                .quarterly_tax_outputs
                .entry(month)
                .or_default()
                .push(draw);
        }
    }

    info!(
        n_universes = request.n_universes,
        n_months = request.n_months,
        seed = request.seed,
        "simulation complete"
    );
    Ok(outputs)
}

pub fn simulate_single_universe(
    company: &Company,
    request: &SimulationRequest,
    noise: &NoiseModel,
    universe: u32,
) -> Result<MonthlyCash> {
    let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(request.seed, universe));
    let revenues = company.simulate_revenues(request.n_months, noise, &mut rng)?;
    let costs = company.simulate_costs(request.n_months, &mut rng);
    company.get_monthly_cash(
        company.month_date(0),
        &revenues,
        &costs,
        StartingPosition::default(),
    )
}

/// Reduces raw outputs to per-month cash percentiles, the bonus-pool
/// distribution and typical tax draws.
pub fn summarize(company: &Company, outputs: &SimulationOutputs) -> SimulationSummary {
    let n_universes = outputs.n_universes();
    let n_months = outputs
        .monthly_cash_outputs
        .iter()
        .map(Vec::len)
        .min()
        .unwrap_or(0);

    let months = (0..n_months)
        .map(|month| {
            let mut values: Vec<f64> = outputs
                .monthly_cash_outputs
                .iter()
                .map(|trajectory| trajectory[month])
                .collect();
            let date = company.month_date(month);
            MonthSummary {
                date,
                p10_cash: percentile(&mut values, 10.0),
                median_cash: percentile(&mut values, 50.0),
                p90_cash: percentile(&mut values, 90.0),
                cash_buffer: company.cash_buffer(Some(date)),
            }
        })
        .collect();

    let mut pools: Vec<f64> = outputs.bonus_pool_outputs.iter().flatten().copied().collect();
    let bonus_pool = if pools.is_empty() {
        None
    } else {
        let with_bonus = pools.iter().filter(|pool| **pool > 0.0).count();
        Some(BonusPoolSummary {
            probability_of_bonus: with_bonus as f64 / n_universes as f64,
            p10_bonus_pool: percentile(&mut pools, 10.0),
            median_bonus_pool: percentile(&mut pools, 50.0),
            p90_bonus_pool: percentile(&mut pools, 90.0),
        })
    };

    let quarterly_taxes = outputs
        .quarterly_tax_outputs
        .iter()
        .filter_map(|(month, draws)| {
            let mut draws: Vec<f64> = draws.iter().flatten().copied().collect();
            if draws.is_empty() {
                return None;
            }
            Some(TaxDrawSummary {
                month: *month,
                median_draw: percentile(&mut draws, 50.0),
                p90_draw: percentile(&mut draws, 90.0),
            })
        })
        .collect();

    SimulationSummary {
        n_universes,
        months,
        bonus_pool,
        quarterly_taxes,
    }
}

pub fn derive_seed(base_seed: u64, universe: u32) -> u64 {
    splitmix64(splitmix64(base_seed) ^ u64::from(universe))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Linearly interpolated percentile; sorts `values` in place.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

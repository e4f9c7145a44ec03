use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use super::company::Company;
use super::dates::{end_of_month, first_of_month, iter_end_of_months};
use super::engine::{percentile, simulate_monthly_cash};
use super::person::Person;
use super::types::{SimulationRequest, StartingPosition};
use crate::error::{ModelError, Result};

/// Bounds of the monthly revenue-per-person search.
pub const REVENUE_SEARCH_MIN: f64 = 5_000.0;
pub const REVENUE_SEARCH_MAX: f64 = 30_000.0;
const SEARCH_TOLERANCE: f64 = 0.01;
const MAX_SEARCH_ITERATIONS: u32 = 200;
const INV_PHI: f64 = 0.618_033_988_749_894_9;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSearchIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub objective: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashGoalPoint {
    pub date: NaiveDate,
    pub cash: f64,
}

/// The idealised year: flat revenue per person, average costs, and the
/// resulting cash balance month by month.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashGoal {
    pub revenue_per_person: f64,
    pub target_bonus_pool: f64,
    pub bonus_pool: f64,
    /// Starts on January 1st at the January buffer, then one point per
    /// month end.
    pub trajectory: Vec<CashGoalPoint>,
    pub iterations: Vec<GoalSearchIteration>,
}

impl CashGoal {
    /// Goal for the month containing `date`. Dates past the modelled year
    /// fall back to the year-end goal.
    pub fn goal_in(&self, date: NaiveDate) -> f64 {
        self.trajectory
            .iter()
            .rev()
            .find(|point| point.date.year() == date.year() && point.date.month() == date.month())
            .or_else(|| self.trajectory.last())
            .map_or(0.0, |point| point.cash)
    }
}

/// Seeks the monthly revenue per person that makes this year's bonus pool
/// match everyone's before-tax bonus target.
pub fn cash_goal(company: &Company) -> Result<CashGoal> {
    let params = company.params();
    let year = company.today().year();
    let january = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| ModelError::InvalidDate {
        value: year.to_string(),
        context: "cash goal year".into(),
    })?;
    let t0 = end_of_month(january);
    let t1 = end_of_month(year_end_in(january, params.year_end_month)?);
    let months: Vec<NaiveDate> = iter_end_of_months(t0, t1).collect();
    let cash0 = company.cash_buffer(Some(t0));

    let average_headcount = months
        .iter()
        .map(|date| company.n_people(*date) as f64)
        .sum::<f64>()
        / months.len().max(1) as f64;

    let basis = company.cost_basis();
    let mut costs: Vec<f64> = months
        .iter()
        .map(|date| {
            basis.average_fixed_cost + company.n_people(*date) as f64 * basis.average_per_person_cost
        })
        .collect();
    if let Some(last) = costs.last_mut() {
        *last += company.retirement_contribution(t1);
    }

    let target_bonus = params.before_tax_annual_salary / 12.0 * params.n_months_before_tax_bonus;
    let target_bonus_pool = if target_bonus > 0.0 {
        average_headcount * target_bonus / (1.0 - params.fraction_profit_for_dividends)
    } else {
        0.0
    };

    let run = |revenue_per_person: f64| {
        let revenues: Vec<f64> = months
            .iter()
            .map(|date| company.n_people(*date) as f64 * revenue_per_person)
            .collect();
        company.get_monthly_cash(t0, &revenues, &costs, StartingPosition::fresh_year(cash0))
    };
    let gap_squared = |revenue_per_person: f64| -> Result<f64> {
        let gap = run(revenue_per_person)?.bonus_pool.unwrap_or(0.0) - target_bonus_pool;
        Ok(gap * gap)
    };

    let mut iterations = Vec::new();
    let mut lo = REVENUE_SEARCH_MIN;
    let mut hi = REVENUE_SEARCH_MAX;
    let mut x1 = hi - INV_PHI * (hi - lo);
    let mut x2 = lo + INV_PHI * (hi - lo);
    let mut f1 = gap_squared(x1)?;
    let mut f2 = gap_squared(x2)?;
    let mut it = 0;
    while it < MAX_SEARCH_ITERATIONS && hi - lo > SEARCH_TOLERANCE {
        it += 1;
        if f1 <= f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - INV_PHI * (hi - lo);
            f1 = gap_squared(x1)?;
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + INV_PHI * (hi - lo);
            f2 = gap_squared(x2)?;
        }
        let (candidate_value, objective) = if f1 <= f2 { (x1, f1) } else { (x2, f2) };
        debug!(iteration = it, lo, hi, candidate_value, objective, "cash goal search");
        iterations.push(GoalSearchIteration {
            iteration: it,
            lower_bound: lo,
            upper_bound: hi,
            candidate_value,
            objective,
        });
    }
    let revenue_per_person = if f1 <= f2 { x1 } else { x2 };

    let solved = run(revenue_per_person)?;
    let mut trajectory = Vec::with_capacity(months.len() + 1);
    trajectory.push(CashGoalPoint {
        date: first_of_month(t0),
        cash: cash0,
    });
    trajectory.extend(
        months
            .iter()
            .zip(&solved.monthly_cash)
            .map(|(date, cash)| CashGoalPoint {
                date: *date,
                cash: *cash,
            }),
    );

    info!(
        revenue_per_person,
        target_bonus_pool,
        iterations = iterations.len(),
        "solved cash goal"
    );
    Ok(CashGoal {
        revenue_per_person,
        target_bonus_pool,
        bonus_pool: solved.bonus_pool.unwrap_or(0.0),
        trajectory,
        iterations,
    })
}

fn year_end_in(january: NaiveDate, year_end_month: u32) -> Result<NaiveDate> {
    january
        .with_month(year_end_month)
        .ok_or_else(|| ModelError::invalid("year_end_month", "must be a calendar month (1-12)"))
}

/// Where a universe's cash sits relative to the goal, the buffer, zero and
/// the credit line, best first.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeBucket {
    AboveGoal,
    AboveBuffer,
    AboveZero,
    WithinLineOfCredit,
    Insolvent,
}

impl OutcomeBucket {
    pub const ALL: [OutcomeBucket; 5] = [
        OutcomeBucket::AboveGoal,
        OutcomeBucket::AboveBuffer,
        OutcomeBucket::AboveZero,
        OutcomeBucket::WithinLineOfCredit,
        OutcomeBucket::Insolvent,
    ];

    pub fn classify(cash: f64, goal: f64, buffer: f64, line_of_credit: f64) -> Self {
        if cash > goal {
            OutcomeBucket::AboveGoal
        } else if cash > buffer {
            OutcomeBucket::AboveBuffer
        } else if cash > 0.0 {
            OutcomeBucket::AboveZero
        } else if cash > -line_of_credit {
            OutcomeBucket::WithinLineOfCredit
        } else {
            OutcomeBucket::Insolvent
        }
    }
}

/// Fraction of universes in each bucket; sums to 1 unless there were no
/// universes at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeDistribution {
    pub above_goal: f64,
    pub above_buffer: f64,
    pub above_zero: f64,
    pub within_line_of_credit: f64,
    pub insolvent: f64,
}

impl OutcomeDistribution {
    pub fn get(&self, bucket: OutcomeBucket) -> f64 {
        match bucket {
            OutcomeBucket::AboveGoal => self.above_goal,
            OutcomeBucket::AboveBuffer => self.above_buffer,
            OutcomeBucket::AboveZero => self.above_zero,
            OutcomeBucket::WithinLineOfCredit => self.within_line_of_credit,
            OutcomeBucket::Insolvent => self.insolvent,
        }
    }

    fn slot(&mut self, bucket: OutcomeBucket) -> &mut f64 {
        match bucket {
            OutcomeBucket::AboveGoal => &mut self.above_goal,
            OutcomeBucket::AboveBuffer => &mut self.above_buffer,
            OutcomeBucket::AboveZero => &mut self.above_zero,
            OutcomeBucket::WithinLineOfCredit => &mut self.within_line_of_credit,
            OutcomeBucket::Insolvent => &mut self.insolvent,
        }
    }
}

/// Buckets every universe's cash at relative `month` (0 = this month).
pub fn outcomes_in_month(
    company: &Company,
    month: usize,
    monthly_cash_outputs: &[Vec<f64>],
    goal: &CashGoal,
) -> OutcomeDistribution {
    let date = company.month_date(month);
    let cash_goal = goal.goal_in(date);
    let buffer = company.cash_buffer(Some(date));
    let line_of_credit = company.params().line_of_credit;

    let mut outcomes = OutcomeDistribution::default();
    let mut total = 0usize;
    for trajectory in monthly_cash_outputs {
        let Some(cash) = trajectory.get(month) else {
            continue;
        };
        *outcomes.slot(OutcomeBucket::classify(*cash, cash_goal, buffer, line_of_credit)) += 1.0;
        total += 1;
    }
    if total > 0 {
        for bucket in OutcomeBucket::ALL {
            *outcomes.slot(bucket) /= total as f64;
        }
    }
    outcomes
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthOutcomes {
    pub date: NaiveDate,
    pub outcomes: OutcomeDistribution,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HiringScenario {
    pub n_new_hires: usize,
    pub months: Vec<MonthOutcomes>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HiringRisk {
    pub revenue_per_person_goal: f64,
    pub scenarios: Vec<HiringScenario>,
}

/// Re-runs the simulation with 0..=`n_new_hires` extra people starting
/// today. Every scenario uses the same seed and is judged against the
/// current roster's cash goal.
pub fn hiring_risk(
    company: &Company,
    n_new_hires: usize,
    request: &SimulationRequest,
) -> Result<HiringRisk> {
    let goal = cash_goal(company)?;
    let mut scenario_company = company.clone();
    let mut scenarios = Vec::with_capacity(n_new_hires + 1);

    for n in 0..=n_new_hires {
        if n > 0 {
            scenario_company.add_person(Person::new(format!("new hire {n}"), company.today()))?;
        }
        let outputs = simulate_monthly_cash(&scenario_company, request)?;
        let months = (0..request.n_months)
            .map(|month| MonthOutcomes {
                date: scenario_company.month_date(month),
                outcomes: outcomes_in_month(
                    &scenario_company,
                    month,
                    &outputs.monthly_cash_outputs,
                    &goal,
                ),
            })
            .collect();
        info!(n_new_hires = n, "hiring scenario simulated");
        scenarios.push(HiringScenario {
            n_new_hires: n,
            months,
        });
    }

    Ok(HiringRisk {
        revenue_per_person_goal: goal.revenue_per_person,
        scenarios,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusAllocation {
    pub name: String,
    pub dividends: f64,
    pub time_bonus: f64,
    pub total: f64,
}

/// Splits `pool` between dividends (by ownership) and time bonus (by tenure
/// in the year of `date`). People with no share are left out.
pub fn allocate_bonus_pool(company: &Company, pool: f64, date: NaiveDate) -> Vec<BonusAllocation> {
    let fraction_time_bonus = company.params().fraction_time_bonus;
    company
        .people()
        .iter()
        .filter_map(|person| {
            let dividends = company.fraction_dividends(person) * pool;
            let time_bonus = company.fraction_bonus(person, date) * pool * fraction_time_bonus;
            if dividends <= 0.0 && time_bonus <= 0.0 {
                return None;
            }
            Some(BonusAllocation {
                name: person.name.clone(),
                dividends,
                time_bonus,
                total: dividends + time_bonus,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonBonusEstimate {
    pub name: String,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusEstimate {
    pub date: NaiveDate,
    pub probability_of_bonus: f64,
    /// Payout percentiles given that there is a bonus; empty when no
    /// universe produced one.
    pub people: Vec<PersonBonusEstimate>,
}

pub fn estimate_bonuses(
    company: &Company,
    bonus_pool_outputs: &[Option<f64>],
    date: NaiveDate,
) -> BonusEstimate {
    let pools: Vec<f64> = bonus_pool_outputs
        .iter()
        .flatten()
        .copied()
        .filter(|pool| *pool > 0.0)
        .collect();
    let probability_of_bonus = if bonus_pool_outputs.is_empty() {
        0.0
    } else {
        pools.len() as f64 / bonus_pool_outputs.len() as f64
    };

    let people = if pools.is_empty() {
        Vec::new()
    } else {
        company
            .people()
            .iter()
            .map(|person| {
                let share = company.net_fraction_of_profits(person, date);
                let mut payouts: Vec<f64> = pools.iter().map(|pool| pool * share).collect();
                PersonBonusEstimate {
                    name: person.name.clone(),
                    p5: percentile(&mut payouts, 5.0),
                    p25: percentile(&mut payouts, 25.0),
                    p50: percentile(&mut payouts, 50.0),
                    p75: percentile(&mut payouts, 75.0),
                    p95: percentile(&mut payouts, 95.0),
                }
            })
            .collect()
    };

    BonusEstimate {
        date,
        probability_of_bonus,
        people,
    }
}

/// End of the first year-end month at or after today.
pub fn next_year_end(company: &Company) -> NaiveDate {
    let year_end_month = company.params().year_end_month;
    company
        .iter_future_months(12)
        .find(|date| date.month() == year_end_month)
        .unwrap_or_else(|| company.month_date(11))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Parameters;
    use crate::core::company::tests::{company_with, d, flat_history, sample_company};
    use proptest::prelude::{any, prop_assert, proptest};

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    fn one_person_company(params: Parameters) -> Company {
        company_with(
            params,
            d(2024, 3, 5),
            vec![Person::new("solo", d(2020, 1, 1)).with_partnership(d(2020, 1, 1), 1.0)],
            flat_history(5_000.0, 5_000.0, 1),
        )
    }

    #[test]
    fn classify_uses_strict_thresholds_in_order() {
        let bucket = |cash| OutcomeBucket::classify(cash, 200.0, 100.0, 50.0);
        assert_eq!(bucket(201.0), OutcomeBucket::AboveGoal);
        assert_eq!(bucket(200.0), OutcomeBucket::AboveBuffer);
        assert_eq!(bucket(100.0), OutcomeBucket::AboveZero);
        assert_eq!(bucket(0.0), OutcomeBucket::WithinLineOfCredit);
        assert_eq!(bucket(-49.0), OutcomeBucket::WithinLineOfCredit);
        assert_eq!(bucket(-50.0), OutcomeBucket::Insolvent);
    }

    #[test]
    fn cash_goal_bonus_pool_hits_target() {
        let company = one_person_company(Parameters::default());
        let goal = cash_goal(&company).unwrap();

        // 1 person * 7.5k monthly salary * 2 months / (1 - 0.3).
        assert_approx(goal.target_bonus_pool, 15_000.0 / 0.7, 1e-6);
        assert_approx(goal.bonus_pool, goal.target_bonus_pool, 1.0);
        assert!(goal.revenue_per_person > REVENUE_SEARCH_MIN);
        assert!(goal.revenue_per_person < REVENUE_SEARCH_MAX);
        assert!(!goal.iterations.is_empty());
        assert!(
            goal.iterations
                .windows(2)
                .all(|w| w[1].upper_bound - w[1].lower_bound < w[0].upper_bound - w[0].lower_bound)
        );

        assert_eq!(goal.trajectory.len(), 13);
        assert_eq!(goal.trajectory[0].date, d(2024, 1, 1));
        // Buffer: 6 months * (5k fixed + 5k for the one person).
        assert_eq!(goal.trajectory[0].cash, 60_000.0);
        assert_eq!(goal.trajectory[12].date, d(2024, 12, 31));
        assert_eq!(goal.goal_in(d(2024, 3, 31)), goal.trajectory[3].cash);
        assert_eq!(goal.goal_in(d(2025, 2, 28)), goal.trajectory[12].cash);
    }

    #[test]
    fn unreachable_target_pins_search_to_bound() {
        let params = Parameters {
            before_tax_annual_salary: 5_000_000.0,
            ..Parameters::default()
        };
        let goal = cash_goal(&one_person_company(params)).unwrap();
        assert_approx(goal.revenue_per_person, REVENUE_SEARCH_MAX, 0.05);
        assert!(goal.bonus_pool < goal.target_bonus_pool);
    }

    #[test]
    fn year_of_losses_is_insolvent() {
        // 100k in the bank, 20k/month of costs, no revenue for a year.
        let company = company_with(
            Parameters::default(),
            d(2024, 1, 5),
            vec![Person::new("a", d(2020, 1, 1))],
            flat_history(20_000.0, 0.0, 1),
        );
        assert_eq!(company.cash_buffer(None), 120_000.0);
        let trajectory = company
            .get_monthly_cash(
                d(2024, 1, 31),
                &[0.0; 12],
                &[20_000.0; 12],
                StartingPosition::fresh_year(100_000.0),
            )
            .unwrap()
            .monthly_cash;
        assert_eq!(*trajectory.last().unwrap(), -140_000.0);

        let goal = cash_goal(&company).unwrap();
        let outcomes = outcomes_in_month(&company, 11, &[trajectory], &goal);
        assert_eq!(outcomes.insolvent, 1.0);
        assert_eq!(outcomes.get(OutcomeBucket::AboveGoal), 0.0);
    }

    #[test]
    fn outcome_fractions_are_normalised() {
        let company = sample_company(d(2024, 2, 10));
        let goal = cash_goal(&company).unwrap();
        let request = SimulationRequest::new(8, 120, 17);
        let outputs = simulate_monthly_cash(&company, &request).unwrap();
        for month in 0..request.n_months {
            let outcomes = outcomes_in_month(&company, month, &outputs.monthly_cash_outputs, &goal);
            let total: f64 = OutcomeBucket::ALL.iter().map(|b| outcomes.get(*b)).sum();
            assert_approx(total, 1.0, 1e-9);
        }
        let no_universes: Vec<Vec<f64>> = Vec::new();
        assert_eq!(
            outcomes_in_month(&company, 0, &no_universes, &goal),
            OutcomeDistribution::default()
        );
    }

    #[test]
    fn sole_owner_receives_the_whole_pool() {
        let params = Parameters {
            fraction_profit_for_dividends: 0.5,
            ..Parameters::default()
        };
        let company = one_person_company(params);
        let allocations = allocate_bonus_pool(&company, 40_000.0, d(2024, 12, 31));
        assert_eq!(
            allocations,
            vec![BonusAllocation {
                name: "solo".into(),
                dividends: 20_000.0,
                time_bonus: 20_000.0,
                total: 40_000.0,
            }]
        );
    }

    #[test]
    fn time_bonus_fraction_scales_the_bonus_share() {
        let params = Parameters {
            fraction_profit_for_dividends: 0.5,
            fraction_time_bonus: 0.5,
            ..Parameters::default()
        };
        let company = one_person_company(params);
        let allocation = &allocate_bonus_pool(&company, 40_000.0, d(2024, 12, 31))[0];
        assert_eq!(allocation.time_bonus, 10_000.0);
        assert_eq!(allocation.total, 30_000.0);
    }

    #[test]
    fn estimate_bonuses_reports_percentiles_of_positive_pools() {
        let params = Parameters {
            fraction_profit_for_dividends: 0.5,
            ..Parameters::default()
        };
        let company = one_person_company(params);
        let pools = [Some(0.0), Some(10_000.0), Some(20_000.0), None, Some(30_000.0)];
        let estimate = estimate_bonuses(&company, &pools, d(2024, 12, 31));
        assert_approx(estimate.probability_of_bonus, 0.6, 1e-12);
        let solo = &estimate.people[0];
        assert_approx(solo.p50, 20_000.0, 1e-6);
        assert_approx(solo.p5, 11_000.0, 1e-6);
        assert_approx(solo.p95, 29_000.0, 1e-6);

        let none = estimate_bonuses(&company, &[Some(0.0), None], d(2024, 12, 31));
        assert_eq!(none.probability_of_bonus, 0.0);
        assert!(none.people.is_empty());
    }

    #[test]
    fn next_year_end_is_this_december() {
        let company = sample_company(d(2024, 2, 10));
        assert_eq!(next_year_end(&company), d(2024, 12, 31));
    }

    #[test]
    fn hiring_risk_reports_one_scenario_per_headcount() {
        let company = sample_company(d(2024, 2, 10));
        let request = SimulationRequest::new(6, 60, 4);
        let risk = hiring_risk(&company, 2, &request).unwrap();
        assert_eq!(risk.scenarios.len(), 3);
        for (n, scenario) in risk.scenarios.iter().enumerate() {
            assert_eq!(scenario.n_new_hires, n);
            assert_eq!(scenario.months.len(), 6);
        }
        // The caller's company is left untouched.
        assert_eq!(company.people().len(), 2);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(8))]

        #[test]
        fn prop_more_people_never_raise_the_chance_of_beating_the_goal(seed in any::<u64>()) {
            // Feb..Nov: stop short of December, where the bonus resets cash.
            let company = sample_company(d(2024, 2, 10));
            let request = SimulationRequest::new(10, 80, seed);
            let risk = hiring_risk(&company, 2, &request).unwrap();
            for month in 0..request.n_months {
                for pair in risk.scenarios.windows(2) {
                    let fewer = pair[0].months[month].outcomes;
                    let more = pair[1].months[month].outcomes;
                    prop_assert!(more.above_goal <= fewer.above_goal + 1e-12);
                    let negative = |o: OutcomeDistribution| o.within_line_of_credit + o.insolvent;
                    prop_assert!(negative(more) + 1e-12 >= negative(fewer));
                }
            }
        }
    }
}

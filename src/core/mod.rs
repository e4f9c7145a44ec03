mod cashflow;
mod company;
mod costs;
pub mod dates;
mod engine;
mod goals;
mod person;
mod revenue;
mod types;

pub use company::{Company, CostBasis};
pub use dates::end_of_month;
pub use engine::{
    derive_seed, percentile, simulate_monthly_cash, simulate_single_universe, summarize,
};
pub use goals::{
    BonusAllocation, BonusEstimate, CashGoal, CashGoalPoint, GoalSearchIteration, HiringRisk,
    HiringScenario, MonthOutcomes, OutcomeBucket, OutcomeDistribution, PersonBonusEstimate,
    REVENUE_SEARCH_MAX, REVENUE_SEARCH_MIN, allocate_bonus_pool, cash_goal, estimate_bonuses,
    hiring_risk, next_year_end, outcomes_in_month,
};
pub use person::Person;
pub use revenue::NoiseModel;
pub use types::{
    BonusPolicy, BonusPoolSummary, MonthSummary, MonthlyCash, Parameters, SimulationOutputs,
    SimulationRequest, SimulationSummary, StartingPosition, TaxDrawSummary,
};

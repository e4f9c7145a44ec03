mod http;

use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::cache::{ResultCache, simulate_monthly_cash_cached};
use crate::config::ModelConfig;
use crate::core::dates::months_to_end_of_year;
use crate::core::{
    BonusAllocation, Company, SimulationRequest, allocate_bonus_pool, cash_goal,
    estimate_bonuses, hiring_risk, next_year_end, summarize,
};
use crate::error::{ModelError, Result};

pub use http::run_http_server;

#[derive(Parser, Debug)]
#[command(
    name = "runway",
    about = "Monte Carlo model of monthly cash in the bank, bonus pools and hiring risk"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[arg(long, global = true, help = "TOML config file; compiled defaults otherwise")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override today's date (YYYY-MM-DD)")]
    pub today: Option<NaiveDate>,
    #[arg(
        long,
        global = true,
        help = "Months to simulate; defaults to the rest of the calendar year"
    )]
    pub n_months: Option<usize>,
    #[arg(long, global = true, default_value_t = 1000)]
    pub n_universes: u32,
    #[arg(long, global = true, help = "Base seed; defaults to the config seed")]
    pub seed: Option<u64>,
    #[arg(short, long, global = true, help = "Log progress every 100 universes")]
    pub verbose: bool,
    #[arg(long, global = true, help = "Assume every client pays on time")]
    pub ontime_payment: bool,
    #[arg(long, global = true, help = "Assume every project finishes on time")]
    pub ontime_completion: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Simulate cash in the bank month by month.
    Simulate {
        #[arg(long, help = "Print every universe instead of the summary")]
        raw: bool,
    },
    /// Outcome distributions for the current roster plus up to N new hires.
    HiringRisk {
        #[arg(long, default_value_t = 1)]
        n_new_hires: usize,
    },
    /// Solve for this year's month-by-month cash goal.
    CashGoal,
    /// Per-person bonus percentiles at the next year end.
    EstimateBonuses,
    /// Split a known bonus pool for last year between everyone.
    CalculateBonus {
        #[arg(long)]
        pool_size: f64,
    },
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

/// A loaded company plus everything needed to run it.
pub struct Session {
    pub company: Company,
    pub request: SimulationRequest,
    pub cache: Box<dyn ResultCache>,
}

impl Session {
    pub fn load(args: &RunArgs) -> Result<Self> {
        let config = match &args.config {
            Some(path) => ModelConfig::load(path)?,
            None => {
                let config = ModelConfig::default();
                config.validate()?;
                config
            }
        };
        let today = args.today.unwrap_or_else(|| config.today());
        let company = config.load_company(today)?;
        let request = simulation_request(args, &config, today);
        let cache = config.result_cache();
        info!(%today, people = company.people().len(), "session ready");
        Ok(Self {
            company,
            request,
            cache,
        })
    }
}

pub fn simulation_request(args: &RunArgs, config: &ModelConfig, today: NaiveDate) -> SimulationRequest {
    SimulationRequest {
        n_months: args
            .n_months
            .unwrap_or_else(|| months_to_end_of_year(today)),
        n_universes: args.n_universes,
        verbose: args.verbose,
        ontime_payment: args.ontime_payment,
        ontime_completion: args.ontime_completion,
        seed: args.seed.unwrap_or(config.seed),
        noise: config.noise,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BonusCalculation {
    year: i32,
    pool_size: f64,
    allocations: Vec<BonusAllocation>,
}

/// Runs every subcommand except `serve` and returns its JSON result.
pub fn execute(command: &Command, session: &Session) -> Result<serde_json::Value> {
    let company = &session.company;
    let request = &session.request;
    let value = match command {
        Command::Simulate { raw } => {
            let outputs = simulate_monthly_cash_cached(company, request, session.cache.as_ref())?;
            if *raw {
                serde_json::to_value(&outputs)?
            } else {
                serde_json::to_value(summarize(company, &outputs))?
            }
        }
        Command::HiringRisk { n_new_hires } => {
            serde_json::to_value(hiring_risk(company, *n_new_hires, request)?)?
        }
        Command::CashGoal => serde_json::to_value(cash_goal(company)?)?,
        Command::EstimateBonuses => {
            let outputs = simulate_monthly_cash_cached(company, request, session.cache.as_ref())?;
            let date = next_year_end(company);
            serde_json::to_value(estimate_bonuses(company, &outputs.bonus_pool_outputs, date))?
        }
        Command::CalculateBonus { pool_size } => {
            serde_json::to_value(calculate_bonus(company, *pool_size)?)?
        }
        Command::Serve { .. } => {
            return Err(ModelError::invalid(
                "command",
                "serve runs the HTTP server and has no JSON result",
            ));
        }
    };
    Ok(value)
}

fn calculate_bonus(company: &Company, pool_size: f64) -> Result<BonusCalculation> {
    if !pool_size.is_finite() || pool_size < 0.0 {
        return Err(ModelError::invalid("pool_size", "must be a finite value >= 0"));
    }
    let year = company.today().year() - 1;
    let end_of_last_year = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(|| {
        ModelError::InvalidDate {
            value: year.to_string(),
            context: "bonus year".into(),
        }
    })?;
    Ok(BonusCalculation {
        year,
        pool_size,
        allocations: allocate_bonus_pool(company, pool_size, end_of_last_year),
    })
}

pub async fn run(cli: Cli) -> Result<()> {
    let session = Session::load(&cli.run)?;
    match cli.command {
        Command::Serve { port } => run_http_server(session, port).await,
        command => {
            let output = execute(&command, &session)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}

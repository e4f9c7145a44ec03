use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use runway::ModelError;
use runway::config::ModelConfig;
use runway::core::{
    OutcomeBucket, SimulationRequest, cash_goal, outcomes_in_month, simulate_monthly_cash,
    summarize,
};

fn write_reports(dir: &Path, projections: &str) {
    let mut profit_loss = String::from("date,revenue,cost,fixed_cost,retirement_cost\n");
    for month in 1..=12 {
        let thousands = 52 + month % 3;
        profit_loss.push_str(&format!(
            "2023-{month:02}-01,\"${thousands},000\",36000,12000,\n"
        ));
    }
    profit_loss.push_str("Jan 2024,55000,36000,12000,\n");
    profit_loss.push_str("Feb 2024,51000,36000,12000,\n");
    fs::write(dir.join("profit_loss.csv"), profit_loss).unwrap();

    fs::write(
        dir.join("balance_sheet.csv"),
        "date,cash_in_bank\n12/31/2023,\"$140,000.00\"\n02/29/2024,\"$150,500.00\"\n",
    )
    .unwrap();
    fs::write(
        dir.join("unpaid_invoices.csv"),
        "customer,due_date,balance\nacme,2024-03-10,18000\nglobex,2024-04-15,\"22,500\"\n",
    )
    .unwrap();
    fs::write(dir.join("invoice_projections.csv"), projections).unwrap();
    fs::write(
        dir.join("roster.csv"),
        "name,start_date,end_date,partner_date,ownership\n\
         ada,2018-02-01,,2020-01-01,60%\n\
         grace,2019-05-01,,2022-01-01,40%\n\
         linus,2022-09-01,,,\n",
    )
    .unwrap();
}

fn fresh_projections() -> String {
    let mut text = String::from("client,date,amount\n");
    for month in 3..=12 {
        text.push_str(&format!("acme,2024-{month:02}-28,50000\n"));
    }
    text
}

fn load_config(dir: &Path) -> ModelConfig {
    let path = dir.join("runway.toml");
    fs::write(
        &path,
        "today = \"2024-03-14\"\ndata_dir = \"data\"\nseed = 7\n\n[parameters]\nretirement_contribution = 1500\n",
    )
    .unwrap();
    ModelConfig::load(&path).unwrap()
}

#[test]
fn csv_reports_drive_a_reproducible_simulation() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir(&data).unwrap();
    write_reports(&data, &fresh_projections());

    let config = load_config(root.path());
    let today = config.today();
    assert_eq!(today, NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
    let company = config.load_company(today).unwrap();
    assert_eq!(company.people().len(), 3);

    let request = SimulationRequest::new(10, 64, config.seed);
    let first = simulate_monthly_cash(&company, &request).unwrap();
    let second = simulate_monthly_cash(&company, &request).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.monthly_cash_outputs.len(), 64);
    assert!(first.monthly_cash_outputs.iter().all(|cash| cash.len() == 10));
    assert_eq!(first.bonus_pool_outputs.len(), 64);
    assert!(
        first
            .bonus_pool_outputs
            .iter()
            .all(|pool| matches!(pool, Some(p) if *p >= 0.0))
    );

    let summary = summarize(&company, &first);
    assert_eq!(summary.months.len(), 10);
    assert_eq!(
        summary.months[0].date,
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    );
    assert!(summary.bonus_pool.is_some());
    let tax_months: Vec<u32> = summary.quarterly_taxes.iter().map(|t| t.month).collect();
    assert_eq!(tax_months, vec![4, 6, 9]);

    let goal = cash_goal(&company).unwrap();
    assert_eq!(goal.trajectory.len(), 13);
    let outcomes = outcomes_in_month(&company, 9, &first.monthly_cash_outputs, &goal);
    let total: f64 = OutcomeBucket::ALL.iter().map(|b| outcomes.get(*b)).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn past_projections_stop_the_run() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    fs::create_dir(&data).unwrap();
    let stale = format!("{}acme,2024-02-15,40000\n", fresh_projections());
    write_reports(&data, &stale);

    let config = load_config(root.path());
    let company = config.load_company(config.today()).unwrap();
    let err = simulate_monthly_cash(&company, &SimulationRequest::new(6, 8, 1)).unwrap_err();
    assert!(matches!(err, ModelError::StaleProjection { .. }));
    assert!(err.is_data_integrity());
    assert!(err.to_string().contains("--today"));
}

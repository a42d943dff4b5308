use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use debtsim_core::contract::{AmortizationSystem, Category, ContractRecord, RateIndex};
use debtsim_core::scheduler;
use debtsim_core::types::Currency;

use super::ScenarioArgs;
use crate::input;

/// Arguments for simulating a single contract
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ScheduleArgs {
    /// Path to a JSON contract file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Contract identifier
    #[arg(long)]
    pub id: Option<String>,

    /// Contract category: existing or proposed
    #[arg(long)]
    pub category: Option<String>,

    /// Free-text description
    #[arg(long, default_value = "")]
    pub description: String,

    /// Currency code (BRL, USD, ...)
    #[arg(long, default_value = "BRL")]
    pub currency: String,

    /// Original principal, contract currency
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Number of payment periods
    #[arg(long)]
    pub term: Option<u32>,

    /// Grace periods (interest-only)
    #[arg(long, default_value_t = 0)]
    pub grace: u32,

    /// Months per payment period: 1, 3, 6 or 12
    #[arg(long, default_value_t = 1)]
    pub period_months: u32,

    /// Amortization system: SAC, PRICE or INTEREST_ONLY
    #[arg(long)]
    pub system: Option<String>,

    /// Rate index: CDI, IPCA, SELIC, SOFR or FX_VARIATION
    #[arg(long)]
    pub index: Option<String>,

    /// Fixed spread over the index, as a decimal (0.02 = 2%/yr)
    #[arg(long, default_value_t = Decimal::ZERO)]
    pub spread: Decimal,

    /// Multiplier on the index (1.2 = 120% of CDI)
    #[arg(long, default_value_t = Decimal::ONE)]
    pub factor: Decimal,

    /// First reference date, YYYY-MM-DD
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    #[command(flatten)]
    pub scenario: ScenarioArgs,
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let record: ContractRecord = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let category_raw = args
            .category
            .as_deref()
            .ok_or("--category is required (or provide --input)")?;
        let category = Category::parse(category_raw).ok_or_else(|| {
            format!("Unknown category '{category_raw}' (expected existing or proposed)")
        })?;

        ContractRecord {
            id: args
                .id
                .clone()
                .ok_or("--id is required (or provide --input)")?,
            category,
            description: args.description.clone(),
            currency: Currency::parse(&args.currency),
            principal: args
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            term: args.term.ok_or("--term is required (or provide --input)")?,
            grace: args.grace,
            period_months: args.period_months,
            system: AmortizationSystem::parse(
                args.system
                    .as_deref()
                    .ok_or("--system is required (or provide --input)")?,
            ),
            index: RateIndex::parse(
                args.index
                    .as_deref()
                    .ok_or("--index is required (or provide --input)")?,
            ),
            spread: args.spread,
            index_factor: args.factor,
            start_date: args
                .start_date
                .ok_or("--start-date is required (or provide --input)")?,
        }
    };

    let scenario = args.scenario.resolve_scenario()?;
    let snapshot = args
        .scenario
        .resolve_snapshot(std::iter::once(&record.currency))?;

    let result = scheduler::simulate_contract(&record, &scenario, &snapshot)?;
    Ok(serde_json::to_value(result)?)
}

use clap::{Args, ValueEnum};
use serde_json::Value;

use debtsim_core::contract::ContractRecord;
use debtsim_core::portfolio;

use super::ScenarioArgs;
use crate::input;

/// Arguments for a full portfolio simulation
#[derive(Args)]
pub struct RunArgs {
    /// Path to the contract table: .csv, or a JSON array of contracts
    /// (reads a JSON array from stdin when omitted)
    #[arg(long)]
    pub contracts: Option<String>,

    /// Report section to print
    #[arg(long, default_value = "all")]
    pub report: ReportSection,

    #[command(flatten)]
    pub scenario: ScenarioArgs,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ReportSection {
    All,
    Summary,
    Comparison,
    Annual,
    Monthly,
    Ranking,
    Flows,
}

pub fn run_portfolio(args: RunArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let contracts = load_contracts(args.contracts.as_deref())?;
    let scenario = args.scenario.resolve_scenario()?;
    let snapshot = args
        .scenario
        .resolve_snapshot(contracts.iter().map(|c| &c.currency))?;

    let output = portfolio::run_portfolio(&contracts, &scenario, &snapshot)?;
    let mut value = serde_json::to_value(output)?;
    select_section(&mut value, &args.report);
    Ok(value)
}

fn load_contracts(path: Option<&str>) -> Result<Vec<ContractRecord>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        if path.to_lowercase().ends_with(".csv") {
            return input::csv_in::read_contracts(path);
        }
        return input::file::read_json(path);
    }
    if let Some(data) = input::stdin::read_stdin()? {
        return Ok(serde_json::from_value(data)?);
    }
    Err("--contracts is required (or pipe a JSON contract array on stdin)".into())
}

/// Replace the result envelope's report with just the requested section,
/// keeping warnings and methodology intact for the formatters.
fn select_section(value: &mut Value, section: &ReportSection) {
    let key = match section {
        ReportSection::All => return,
        ReportSection::Summary => "summaries",
        ReportSection::Comparison => "comparison",
        ReportSection::Annual => "annual_rollup",
        ReportSection::Monthly => "monthly_rollup",
        ReportSection::Ranking => "ranking",
        ReportSection::Flows => "flows",
    };
    let picked = value
        .get_mut("result")
        .and_then(|report| report.get_mut(key))
        .map(Value::take);
    if let (Some(picked), Some(result)) = (picked, value.get_mut("result")) {
        *result = picked;
    }
}

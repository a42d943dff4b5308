mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::contract::ScheduleArgs;
use commands::portfolio::RunArgs;

/// Debt portfolio cash-flow simulation
#[derive(Parser)]
#[command(
    name = "debtsim",
    version,
    about = "Debt portfolio cash-flow simulation",
    long_about = "Simulates debt contract payment schedules with decimal precision: \
                  grace periods, SAC/PRICE amortization, floating rates indexed to \
                  CDI/IPCA/SELIC/SOFR under shock scenarios, FX conversion into the \
                  reporting currency, IRR and present value, plus consolidated \
                  existing-vs-proposed portfolio reports."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a contract portfolio and print the consolidated report
    Run(RunArgs),
    /// Simulate a single contract's payment schedule
    Schedule(ScheduleArgs),
    /// List the built-in market scenarios
    Scenarios,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Run(args) => commands::portfolio::run_portfolio(args),
        Commands::Schedule(args) => commands::contract::run_schedule(args),
        Commands::Scenarios => commands::scenarios::run_scenarios(),
        Commands::Version => {
            println!("debtsim {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

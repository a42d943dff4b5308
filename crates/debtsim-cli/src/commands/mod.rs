pub mod contract;
pub mod portfolio;
pub mod scenarios;

use std::collections::BTreeMap;

use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;

use debtsim_core::market::{MarketSnapshot, StaticRates};
use debtsim_core::scenario::MarketScenario;
use debtsim_core::types::Currency;

use crate::input;

/// Scenario selection flags shared by `run` and `schedule`. A scenario file
/// wins over everything; explicit shock flags modify the chosen preset.
#[derive(Args)]
pub struct ScenarioArgs {
    /// Built-in scenario preset: base, stress, optimistic
    #[arg(long, default_value = "base")]
    pub scenario: String,

    /// Path to a YAML or JSON scenario file (overrides --scenario and shock flags)
    #[arg(long)]
    pub scenario_file: Option<String>,

    /// Name reported for a scenario assembled from shock flags
    #[arg(long)]
    pub scenario_name: Option<String>,

    /// Basis-point shift on CDI and SELIC
    #[arg(long, allow_hyphen_values = true)]
    pub cdi_shock_bps: Option<Decimal>,

    /// Basis-point shift on IPCA
    #[arg(long, allow_hyphen_values = true)]
    pub inflation_shock_bps: Option<Decimal>,

    /// Multiplicative FX shift as a decimal (0.20 = +20%)
    #[arg(long, allow_hyphen_values = true)]
    pub fx_shock_pct: Option<Decimal>,

    /// Basis-point shift added to every contract spread
    #[arg(long, allow_hyphen_values = true)]
    pub spread_shock_bps: Option<Decimal>,

    /// Path to a JSON market rates file; static fallback rates when omitted
    #[arg(long)]
    pub rates: Option<String>,
}

/// Market rates file: the four annual series plus optional FX quotes keyed
/// by currency code.
#[derive(Debug, Deserialize)]
struct RatesFile {
    cdi: Decimal,
    ipca: Decimal,
    selic: Decimal,
    sofr: Decimal,
    #[serde(default)]
    fx: BTreeMap<String, Decimal>,
}

impl ScenarioArgs {
    pub fn resolve_scenario(&self) -> Result<MarketScenario, Box<dyn std::error::Error>> {
        if let Some(ref path) = self.scenario_file {
            let scenario: MarketScenario = if path.ends_with(".yaml") || path.ends_with(".yml") {
                input::file::read_yaml(path)?
            } else {
                input::file::read_json(path)?
            };
            return Ok(scenario);
        }

        let mut scenario = MarketScenario::presets()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(&self.scenario))
            .ok_or_else(|| {
                let names: Vec<String> = MarketScenario::presets()
                    .into_iter()
                    .map(|s| s.name.to_lowercase())
                    .collect();
                format!(
                    "Unknown scenario '{}' (expected one of: {})",
                    self.scenario,
                    names.join(", ")
                )
            })?;

        if let Some(ref name) = self.scenario_name {
            scenario.name = name.clone();
        }
        if let Some(bps) = self.cdi_shock_bps {
            scenario.cdi_shock_bps = bps;
        }
        if let Some(bps) = self.inflation_shock_bps {
            scenario.inflation_shock_bps = bps;
        }
        if let Some(pct) = self.fx_shock_pct {
            scenario.fx_shock_pct = pct;
        }
        if let Some(bps) = self.spread_shock_bps {
            scenario.spread_shock_bps = bps;
        }
        Ok(scenario)
    }

    /// Build the frozen rate snapshot for a run, capturing FX for every
    /// contract currency.
    pub fn resolve_snapshot<'a>(
        &self,
        currencies: impl IntoIterator<Item = &'a Currency>,
    ) -> Result<MarketSnapshot, Box<dyn std::error::Error>> {
        let provider = match self.rates {
            Some(ref path) => {
                let rates: RatesFile = input::file::read_json(path)?;
                StaticRates {
                    cdi: rates.cdi,
                    ipca: rates.ipca,
                    selic: rates.selic,
                    sofr: rates.sofr,
                    fx: rates.fx,
                }
            }
            None => StaticRates::default(),
        };
        Ok(MarketSnapshot::capture(&provider, currencies))
    }
}

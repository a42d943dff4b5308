use serde_json::Value;

use debtsim_core::scenario::MarketScenario;

/// List the built-in scenarios and their shock channels.
pub fn run_scenarios() -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::json!({
        "scenarios": MarketScenario::presets(),
    }))
}

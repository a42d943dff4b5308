//! Market scenarios: named shock sets applied on top of the rate snapshot.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DebtSimError;
use crate::types::Rate;
use crate::DebtSimResult;

/// Basis points divisor
const BPS_DIVISOR: Decimal = dec!(10000);
/// Shock magnitudes beyond this are rejected as configuration mistakes.
const MAX_SHOCK_BPS: Decimal = dec!(10000);

/// A named set of shocks applied to reference rates, FX and spreads.
/// Constructed once per simulation run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketScenario {
    pub name: String,
    /// Basis-point shift applied to CDI and SELIC (shared channel).
    pub cdi_shock_bps: Decimal,
    /// Basis-point shift applied to IPCA.
    pub inflation_shock_bps: Decimal,
    /// Multiplicative FX shift as a decimal (0.20 = +20%), foreign currencies only.
    pub fx_shock_pct: Decimal,
    /// Basis-point shift added to every contract's spread.
    pub spread_shock_bps: Decimal,
}

impl MarketScenario {
    pub fn new(name: impl Into<String>) -> Self {
        MarketScenario {
            name: name.into(),
            cdi_shock_bps: Decimal::ZERO,
            inflation_shock_bps: Decimal::ZERO,
            fx_shock_pct: Decimal::ZERO,
            spread_shock_bps: Decimal::ZERO,
        }
    }

    /// No shocks: rates exactly as captured in the snapshot.
    pub fn base() -> Self {
        MarketScenario::new("Base")
    }

    /// Stress: +200 bps CDI/SELIC, +150 bps IPCA, +20% FX, +100 bps spread.
    pub fn stress() -> Self {
        MarketScenario {
            name: "Stress".into(),
            cdi_shock_bps: dec!(200),
            inflation_shock_bps: dec!(150),
            fx_shock_pct: dec!(0.20),
            spread_shock_bps: dec!(100),
        }
    }

    /// Optimistic: -100 bps CDI/SELIC, -50 bps IPCA, -5% FX, -50 bps spread.
    pub fn optimistic() -> Self {
        MarketScenario {
            name: "Optimistic".into(),
            cdi_shock_bps: dec!(-100),
            inflation_shock_bps: dec!(-50),
            fx_shock_pct: dec!(-0.05),
            spread_shock_bps: dec!(-50),
        }
    }

    /// The three built-in scenarios, in presentation order.
    pub fn presets() -> Vec<MarketScenario> {
        vec![
            MarketScenario::base(),
            MarketScenario::stress(),
            MarketScenario::optimistic(),
        ]
    }

    /// Reject malformed scenarios before a run starts.
    pub fn validate(&self) -> DebtSimResult<()> {
        if self.name.trim().is_empty() {
            return Err(DebtSimError::InvalidInput {
                field: "name".into(),
                reason: "Scenario name must not be empty".into(),
            });
        }
        for (field, bps) in [
            ("cdi_shock_bps", self.cdi_shock_bps),
            ("inflation_shock_bps", self.inflation_shock_bps),
            ("spread_shock_bps", self.spread_shock_bps),
        ] {
            if bps.abs() > MAX_SHOCK_BPS {
                return Err(DebtSimError::InvalidInput {
                    field: field.into(),
                    reason: format!("Shock of {bps} bps is outside ±{MAX_SHOCK_BPS}"),
                });
            }
        }
        if self.fx_shock_pct <= dec!(-1) {
            return Err(DebtSimError::InvalidInput {
                field: "fx_shock_pct".into(),
                reason: "FX shock must be greater than -100%".into(),
            });
        }
        Ok(())
    }

    pub(crate) fn cdi_shock(&self) -> Rate {
        self.cdi_shock_bps / BPS_DIVISOR
    }

    pub(crate) fn inflation_shock(&self) -> Rate {
        self.inflation_shock_bps / BPS_DIVISOR
    }

    pub(crate) fn spread_shock(&self) -> Rate {
        self.spread_shock_bps / BPS_DIVISOR
    }
}

impl Default for MarketScenario {
    fn default() -> Self {
        MarketScenario::base()
    }
}

//! Contract data model: the immutable input row of the simulation, plus the
//! closed enumerations for category, amortization system and rate index.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DebtSimError;
use crate::types::{Currency, Money, Rate};
use crate::DebtSimResult;

/// Which side of the restructuring a contract belongs to.
///
/// The original contract tables label these "Antigo" (existing) and "Novo"
/// (proposed); both spellings are accepted on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(alias = "Antigo")]
    Existing,
    #[serde(alias = "Novo")]
    Proposed,
}

impl Category {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_uppercase().as_str() {
            "EXISTING" | "ANTIGO" => Some(Category::Existing),
            "PROPOSED" | "NOVO" => Some(Category::Proposed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Existing => "Existing",
            Category::Proposed => "Proposed",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Amortization system of a contract.
///
/// Unknown names parse to `Unsupported` and are scheduled as interest-only
/// with a warning, instead of silently falling through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmortizationSystem {
    /// Constant amortization: equal principal installments, declining interest.
    Sac,
    /// Constant installment (annuity): fixed payment, rising amortization share.
    Price,
    /// Interest-only for the whole term; principal never reduces.
    InterestOnly,
    Unsupported(String),
}

impl AmortizationSystem {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_uppercase().as_str() {
            "SAC" => AmortizationSystem::Sac,
            "PRICE" => AmortizationSystem::Price,
            "INTEREST_ONLY" | "JUROS" | "BULLET" => AmortizationSystem::InterestOnly,
            other => AmortizationSystem::Unsupported(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AmortizationSystem::Sac => "SAC",
            AmortizationSystem::Price => "PRICE",
            AmortizationSystem::InterestOnly => "INTEREST_ONLY",
            AmortizationSystem::Unsupported(name) => name.as_str(),
        }
    }
}

/// Reference-rate index a contract's floating rate is tied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateIndex {
    /// Brazilian interbank deposit rate.
    Cdi,
    /// Consumer inflation index.
    Ipca,
    /// Central bank policy rate. Shares the CDI shock channel in scenarios.
    Selic,
    /// USD overnight benchmark. Unshocked.
    Sofr,
    /// Pure currency-variation contracts: base rate zero, FX applied separately.
    FxVariation,
    Unsupported(String),
}

impl RateIndex {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_uppercase().as_str() {
            "CDI" => RateIndex::Cdi,
            "IPCA" => RateIndex::Ipca,
            "SELIC" => RateIndex::Selic,
            "SOFR" => RateIndex::Sofr,
            "FX_VARIATION" | "VARIAÇÃO CAMBIAL" | "VARIACAO CAMBIAL" => RateIndex::FxVariation,
            other => RateIndex::Unsupported(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            RateIndex::Cdi => "CDI",
            RateIndex::Ipca => "IPCA",
            RateIndex::Selic => "SELIC",
            RateIndex::Sofr => "SOFR",
            RateIndex::FxVariation => "FX_VARIATION",
            RateIndex::Unsupported(name) => name.as_str(),
        }
    }
}

/// One debt contract, as read from the uploaded contract table.
///
/// `term` and `grace` are counted in payment periods of `period_months`
/// months each, so a 40-semester contract has `term = 40, period_months = 6`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: String,
    pub category: Category,
    pub description: String,
    pub currency: Currency,
    pub principal: Money,
    /// Total number of payment periods.
    pub term: u32,
    /// Leading periods paying interest only. Must not exceed `term`.
    pub grace: u32,
    /// Months per payment period: 1, 3, 6 or 12.
    pub period_months: u32,
    pub system: AmortizationSystem,
    pub index: RateIndex,
    /// Fixed spread over the index, as a decimal (0.02 = 200 bps).
    pub spread: Rate,
    /// Multiplier on the index base rate (1.1 = 110% of the index).
    pub index_factor: Decimal,
    pub start_date: NaiveDate,
}

const VALID_PERIOD_MONTHS: [u32; 4] = [1, 3, 6, 12];

/// Run-level validation. Collects every violation across the whole table and
/// reports them once, so a bad upload fails fast with all offending fields
/// named instead of one error per retry.
pub fn validate_contracts(contracts: &[ContractRecord]) -> DebtSimResult<()> {
    let mut violations: Vec<String> = Vec::new();

    for (row, contract) in contracts.iter().enumerate() {
        let who = if contract.id.trim().is_empty() {
            format!("row {row}")
        } else {
            format!("contract '{}'", contract.id)
        };

        if contract.id.trim().is_empty() {
            violations.push(format!("{who}: id must not be empty"));
        }
        if contract.principal <= Decimal::ZERO {
            violations.push(format!("{who}: principal must be positive"));
        }
        if contract.term == 0 {
            violations.push(format!("{who}: term must be at least one period"));
        }
        if contract.grace > contract.term {
            violations.push(format!(
                "{who}: grace ({}) exceeds term ({})",
                contract.grace, contract.term
            ));
        }
        if !VALID_PERIOD_MONTHS.contains(&contract.period_months) {
            violations.push(format!(
                "{who}: period_months must be one of 1, 3, 6 or 12 (got {})",
                contract.period_months
            ));
        }
        if contract.index_factor < Decimal::ZERO {
            violations.push(format!("{who}: index_factor must not be negative"));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(DebtSimError::Validation(violations))
    }
}

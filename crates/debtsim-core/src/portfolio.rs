//! Portfolio aggregator: runs the scheduler over every contract and
//! consolidates the results into the six report tables — summaries, combined
//! flows, existing/proposed comparison, annual and monthly rollups, and the
//! stress ranking.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::contract::{validate_contracts, Category, ContractRecord};
use crate::market::MarketSnapshot;
use crate::scenario::MarketScenario;
use crate::scheduler::{simulate_inner, PaymentEntry};
use crate::types::{with_metadata, ComputationOutput, Currency, Money, Rate};
use crate::DebtSimResult;

/// Per-contract totals after simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSummary {
    pub id: String,
    pub category: Category,
    pub description: String,
    pub currency: Currency,
    pub principal: Money,
    /// Sum of all payments, reporting currency.
    pub total_cost: Money,
    pub irr_pct: Rate,
    pub present_value: Money,
}

/// Row label of the three-way portfolio comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonSide {
    Existing,
    Proposed,
    Difference,
}

impl std::fmt::Display for ComparisonSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ComparisonSide::Existing => "Existing",
            ComparisonSide::Proposed => "Proposed",
            ComparisonSide::Difference => "Difference",
        };
        f.write_str(label)
    }
}

/// One row of the existing-vs-proposed comparison. The IRR column is the
/// arithmetic mean of the category's contract IRRs, and the Difference row's
/// IRR is therefore a mean-of-means — kept as the source system computed it,
/// not a blended rate from combined cash flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub side: ComparisonSide,
    pub total_cost: Money,
    pub present_value: Money,
    pub irr_pct: Rate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualRollupRow {
    pub year: i32,
    pub category: Category,
    pub payment: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRollupRow {
    pub date: NaiveDate,
    pub category: Category,
    pub payment: Money,
}

/// Contract summary joined with its single largest annual payment total,
/// sorted descending by total cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRow {
    pub id: String,
    pub category: Category,
    pub description: String,
    pub currency: Currency,
    pub principal: Money,
    pub total_cost: Money,
    pub irr_pct: Rate,
    pub present_value: Money,
    /// Largest single-year payment total ("peak").
    pub annual_peak: Money,
}

/// The six output tables of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub summaries: Vec<ContractSummary>,
    pub flows: Vec<PaymentEntry>,
    /// Always exactly three rows: Existing, Proposed, Difference.
    pub comparison: Vec<ComparisonRow>,
    pub annual_rollup: Vec<AnnualRollupRow>,
    pub monthly_rollup: Vec<MonthlyRollupRow>,
    pub ranking: Vec<RankingRow>,
}

/// Run the full portfolio simulation under one scenario and rate snapshot.
///
/// Configuration errors (invalid contracts, malformed scenario) abort the
/// run; per-contract numerical anomalies degrade to defaults and surface as
/// envelope warnings.
pub fn run_portfolio(
    contracts: &[ContractRecord],
    scenario: &MarketScenario,
    snapshot: &MarketSnapshot,
) -> DebtSimResult<ComputationOutput<PortfolioReport>> {
    let start = Instant::now();

    scenario.validate()?;
    validate_contracts(contracts)?;

    let mut warnings: Vec<String> = Vec::new();

    let mut summaries: Vec<ContractSummary> = Vec::with_capacity(contracts.len());
    let mut flows: Vec<PaymentEntry> = Vec::new();

    for record in contracts {
        let simulation = simulate_inner(record, scenario, snapshot, &mut warnings);
        summaries.push(ContractSummary {
            id: record.id.clone(),
            category: record.category,
            description: record.description.clone(),
            currency: record.currency.clone(),
            principal: record.principal,
            total_cost: simulation.total_cost,
            irr_pct: simulation.irr_pct,
            present_value: simulation.present_value,
        });
        flows.extend(simulation.schedule);
    }

    let comparison = build_comparison(&summaries);
    let annual_rollup = build_annual_rollup(&flows, &summaries);
    let monthly_rollup = build_monthly_rollup(&flows, &summaries);
    let ranking = build_ranking(&summaries, &flows);

    let report = PortfolioReport {
        summaries,
        flows,
        comparison,
        annual_rollup,
        monthly_rollup,
        ranking,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Debt portfolio simulation — per-contract schedules, existing/proposed comparison, rollups, stress ranking",
        &serde_json::json!({
            "scenario": scenario.name,
            "contracts": contracts.len(),
            "cdi": snapshot.cdi.to_string(),
            "ipca": snapshot.ipca.to_string(),
            "selic": snapshot.selic.to_string(),
            "sofr": snapshot.sofr.to_string(),
        }),
        warnings,
        elapsed,
        report,
    ))
}

/// Per-category accumulation for the comparison table.
#[derive(Default)]
struct CategoryTotals {
    total_cost: Money,
    present_value: Money,
    irr_sum: Rate,
    count: u32,
}

impl CategoryTotals {
    fn mean_irr(&self) -> Rate {
        if self.count == 0 {
            Decimal::ZERO
        } else {
            self.irr_sum / Decimal::from(self.count)
        }
    }
}

/// Exactly three rows: Existing, Proposed (zero rows when the category is
/// absent from the input), and Difference = Existing − Proposed field-wise.
fn build_comparison(summaries: &[ContractSummary]) -> Vec<ComparisonRow> {
    let mut existing = CategoryTotals::default();
    let mut proposed = CategoryTotals::default();

    for summary in summaries {
        let totals = match summary.category {
            Category::Existing => &mut existing,
            Category::Proposed => &mut proposed,
        };
        totals.total_cost += summary.total_cost;
        totals.present_value += summary.present_value;
        totals.irr_sum += summary.irr_pct;
        totals.count += 1;
    }

    let existing_row = ComparisonRow {
        side: ComparisonSide::Existing,
        total_cost: existing.total_cost,
        present_value: existing.present_value,
        irr_pct: existing.mean_irr(),
    };
    let proposed_row = ComparisonRow {
        side: ComparisonSide::Proposed,
        total_cost: proposed.total_cost,
        present_value: proposed.present_value,
        irr_pct: proposed.mean_irr(),
    };
    let difference_row = ComparisonRow {
        side: ComparisonSide::Difference,
        total_cost: existing_row.total_cost - proposed_row.total_cost,
        present_value: existing_row.present_value - proposed_row.present_value,
        irr_pct: existing_row.irr_pct - proposed_row.irr_pct,
    };

    vec![existing_row, proposed_row, difference_row]
}

fn category_index(summaries: &[ContractSummary]) -> BTreeMap<&str, Category> {
    summaries
        .iter()
        .map(|s| (s.id.as_str(), s.category))
        .collect()
}

/// Payments summed per (year, category), ordered by year then category.
fn build_annual_rollup(
    flows: &[PaymentEntry],
    summaries: &[ContractSummary],
) -> Vec<AnnualRollupRow> {
    let categories = category_index(summaries);
    let mut totals: BTreeMap<(i32, Category), Money> = BTreeMap::new();
    for entry in flows {
        if let Some(category) = categories.get(entry.contract_id.as_str()) {
            *totals.entry((entry.year, *category)).or_default() += entry.payment;
        }
    }
    totals
        .into_iter()
        .map(|((year, category), payment)| AnnualRollupRow {
            year,
            category,
            payment,
        })
        .collect()
}

/// Payments summed per (payment date, category).
fn build_monthly_rollup(
    flows: &[PaymentEntry],
    summaries: &[ContractSummary],
) -> Vec<MonthlyRollupRow> {
    let categories = category_index(summaries);
    let mut totals: BTreeMap<(NaiveDate, Category), Money> = BTreeMap::new();
    for entry in flows {
        if let Some(category) = categories.get(entry.contract_id.as_str()) {
            *totals.entry((entry.date, *category)).or_default() += entry.payment;
        }
    }
    totals
        .into_iter()
        .map(|((date, category), payment)| MonthlyRollupRow {
            date,
            category,
            payment,
        })
        .collect()
}

/// Summaries joined with each contract's annual payment peak, sorted
/// descending by total cost. Ties keep input order (stable sort).
fn build_ranking(summaries: &[ContractSummary], flows: &[PaymentEntry]) -> Vec<RankingRow> {
    let mut annual_by_contract: BTreeMap<&str, BTreeMap<i32, Money>> = BTreeMap::new();
    for entry in flows {
        *annual_by_contract
            .entry(entry.contract_id.as_str())
            .or_default()
            .entry(entry.year)
            .or_default() += entry.payment;
    }

    let mut ranking: Vec<RankingRow> = summaries
        .iter()
        .map(|summary| {
            let annual_peak = annual_by_contract
                .get(summary.id.as_str())
                .and_then(|per_year| per_year.values().max())
                .copied()
                .unwrap_or(Decimal::ZERO);
            RankingRow {
                id: summary.id.clone(),
                category: summary.category,
                description: summary.description.clone(),
                currency: summary.currency.clone(),
                principal: summary.principal,
                total_cost: summary.total_cost,
                irr_pct: summary.irr_pct,
                present_value: summary.present_value,
                annual_peak,
            }
        })
        .collect();

    ranking.sort_by(|a, b| b.total_cost.cmp(&a.total_cost));
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(id: &str, year: i32, month: u32, payment: Money) -> PaymentEntry {
        PaymentEntry {
            contract_id: id.into(),
            date: NaiveDate::from_ymd_opt(year, month, 1).unwrap(),
            year,
            payment,
            amortization: Decimal::ZERO,
            interest: Decimal::ZERO,
            balance: Decimal::ZERO,
            period_rate_pct: Decimal::ZERO,
            annual_rate_pct: Decimal::ZERO,
            index: "CDI".into(),
            spread_pct: Decimal::ZERO,
        }
    }

    fn summary(id: &str, category: Category, total_cost: Money, irr_pct: Rate) -> ContractSummary {
        ContractSummary {
            id: id.into(),
            category,
            description: format!("{id} description"),
            currency: Currency::BRL,
            principal: dec!(100),
            total_cost,
            irr_pct,
            present_value: dec!(10),
        }
    }

    #[test]
    fn test_comparison_is_always_three_rows() {
        let rows = build_comparison(&[]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].side, ComparisonSide::Existing);
        assert_eq!(rows[1].side, ComparisonSide::Proposed);
        assert_eq!(rows[2].side, ComparisonSide::Difference);
        for row in &rows {
            assert_eq!(row.total_cost, Decimal::ZERO);
            assert_eq!(row.present_value, Decimal::ZERO);
            assert_eq!(row.irr_pct, Decimal::ZERO);
        }
    }

    #[test]
    fn test_comparison_mean_irr_and_difference() {
        let summaries = vec![
            summary("A", Category::Existing, dec!(300), dec!(12)),
            summary("B", Category::Existing, dec!(200), dec!(8)),
            summary("C", Category::Proposed, dec!(400), dec!(9)),
        ];
        let rows = build_comparison(&summaries);

        assert_eq!(rows[0].total_cost, dec!(500));
        assert_eq!(rows[0].irr_pct, dec!(10)); // mean of 12 and 8
        assert_eq!(rows[1].total_cost, dec!(400));
        assert_eq!(rows[2].total_cost, dec!(100));
        assert_eq!(rows[2].irr_pct, dec!(1)); // mean-of-means difference
    }

    #[test]
    fn test_comparison_synthesizes_missing_category() {
        let summaries = vec![summary("A", Category::Existing, dec!(500), dec!(10))];
        let rows = build_comparison(&summaries);
        assert_eq!(rows[1].total_cost, Decimal::ZERO);
        assert_eq!(rows[1].irr_pct, Decimal::ZERO);
        assert_eq!(rows[2].total_cost, dec!(500));
    }

    #[test]
    fn test_annual_rollup_groups_by_year_and_category() {
        let summaries = vec![
            summary("A", Category::Existing, dec!(0), dec!(0)),
            summary("B", Category::Proposed, dec!(0), dec!(0)),
        ];
        let flows = vec![
            entry("A", 2025, 1, dec!(100)),
            entry("A", 2025, 2, dec!(100)),
            entry("A", 2026, 1, dec!(50)),
            entry("B", 2025, 1, dec!(70)),
        ];
        let rollup = build_annual_rollup(&flows, &summaries);

        assert_eq!(rollup.len(), 3);
        assert_eq!(rollup[0].year, 2025);
        assert_eq!(rollup[0].category, Category::Existing);
        assert_eq!(rollup[0].payment, dec!(200));
        assert_eq!(rollup[1].category, Category::Proposed);
        assert_eq!(rollup[1].payment, dec!(70));
        assert_eq!(rollup[2].year, 2026);
        assert_eq!(rollup[2].payment, dec!(50));
    }

    #[test]
    fn test_monthly_rollup_keys_by_exact_date() {
        let summaries = vec![summary("A", Category::Existing, dec!(0), dec!(0))];
        let flows = vec![
            entry("A", 2025, 1, dec!(10)),
            entry("A", 2025, 1, dec!(15)),
            entry("A", 2025, 2, dec!(20)),
        ];
        let rollup = build_monthly_rollup(&flows, &summaries);

        assert_eq!(rollup.len(), 2);
        assert_eq!(rollup[0].payment, dec!(25));
        assert_eq!(rollup[1].payment, dec!(20));
    }

    #[test]
    fn test_ranking_sorted_by_cost_with_annual_peak() {
        let summaries = vec![
            summary("A", Category::Existing, dec!(100), dec!(5)),
            summary("B", Category::Proposed, dec!(900), dec!(7)),
        ];
        let flows = vec![
            entry("A", 2025, 1, dec!(60)),
            entry("A", 2026, 1, dec!(40)),
            entry("B", 2025, 1, dec!(900)),
        ];
        let ranking = build_ranking(&summaries, &flows);

        assert_eq!(ranking[0].id, "B");
        assert_eq!(ranking[0].annual_peak, dec!(900));
        assert_eq!(ranking[1].id, "A");
        assert_eq!(ranking[1].annual_peak, dec!(60));
    }

    #[test]
    fn test_ranking_missing_flows_peak_is_zero() {
        let summaries = vec![summary("A", Category::Existing, dec!(100), dec!(5))];
        let ranking = build_ranking(&summaries, &[]);
        assert_eq!(ranking[0].annual_peak, Decimal::ZERO);
    }
}

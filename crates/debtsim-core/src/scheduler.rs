//! Contract scheduler: turns one contract record plus a scenario into its
//! full payment schedule with trailing IRR and present-value figures.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::contract::{validate_contracts, AmortizationSystem, ContractRecord, RateIndex};
use crate::market::MarketSnapshot;
use crate::scenario::MarketScenario;
use crate::time_value::{annual_to_period, annuity_payment, irr, npv, period_to_annual};
use crate::types::{with_metadata, ComputationOutput, Currency, Money, Rate};
use crate::DebtSimResult;

const IRR_GUESS: Decimal = dec!(0.10);
const PERCENT: Decimal = dec!(100);

/// One row of a contract's schedule. All monetary values are in the
/// reporting currency; rates are percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub contract_id: String,
    pub date: NaiveDate,
    pub year: i32,
    pub payment: Money,
    pub amortization: Money,
    pub interest: Money,
    /// Remaining principal after this period, floored at zero.
    pub balance: Money,
    pub period_rate_pct: Rate,
    pub annual_rate_pct: Rate,
    pub index: String,
    pub spread_pct: Rate,
}

/// Result of simulating a single contract under a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSimulation {
    pub schedule: Vec<PaymentEntry>,
    /// Sum of all payments, reporting currency.
    pub total_cost: Money,
    /// Annualized internal rate of return, percent. 0 on degenerate series.
    pub irr_pct: Rate,
    /// NPV of the flows discounted at the base index rate.
    pub present_value: Money,
}

/// Simulate one contract: schedule, total cost, IRR, PV.
pub fn simulate_contract(
    record: &ContractRecord,
    scenario: &MarketScenario,
    snapshot: &MarketSnapshot,
) -> DebtSimResult<ComputationOutput<ContractSimulation>> {
    let start = Instant::now();

    scenario.validate()?;
    validate_contracts(std::slice::from_ref(record))?;

    let mut warnings: Vec<String> = Vec::new();
    let simulation = simulate_inner(record, scenario, snapshot, &mut warnings);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Debt contract schedule — grace, SAC/PRICE amortization, indexed rate, IRR, PV",
        &serde_json::json!({
            "contract_id": record.id,
            "scenario": scenario.name,
            "index": record.index.label(),
            "system": record.system.label(),
            "currency": record.currency.code(),
            "principal": record.principal.to_string(),
            "term": record.term,
            "grace": record.grace,
            "period_months": record.period_months,
        }),
        warnings,
        elapsed,
        simulation,
    ))
}

/// Core of the scheduler, shared with the portfolio aggregator. Inputs are
/// assumed validated; anomalies degrade to defaults and are appended to
/// `warnings` instead of aborting.
pub(crate) fn simulate_inner(
    record: &ContractRecord,
    scenario: &MarketScenario,
    snapshot: &MarketSnapshot,
    warnings: &mut Vec<String>,
) -> ContractSimulation {
    let base_rate = resolve_base_rate(record, scenario, snapshot, warnings);
    let annual_rate = base_rate * record.index_factor + record.spread + scenario.spread_shock();

    let period_rate = match annual_to_period(annual_rate, record.period_months) {
        Ok(rate) => rate,
        Err(e) => {
            warnings.push(format!(
                "Contract '{}': cannot convert annual rate {annual_rate} to period basis ({e}); using 0",
                record.id
            ));
            Decimal::ZERO
        }
    };

    let fx = resolve_fx(record, scenario, snapshot);
    let dates = payment_dates(record.start_date, record.term, record.period_months);

    if let AmortizationSystem::Unsupported(name) = &record.system {
        warnings.push(format!(
            "Contract '{}': unsupported amortization system '{name}'; scheduled as interest-only",
            record.id
        ));
    }

    // SAC spreads the principal evenly over the non-grace periods. PRICE
    // fixes the installment once, over the same window, against the original
    // principal (interest during grace is paid, not capitalized).
    let amort_window = record.term.saturating_sub(record.grace).max(1);
    let sac_amortization = record.principal / Decimal::from(amort_window);

    let price_installment = if record.system == AmortizationSystem::Price
        && record.term > record.grace
    {
        match annuity_payment(period_rate, record.term - record.grace, record.principal) {
            Ok(pmt) => Some(pmt),
            Err(e) => {
                warnings.push(format!(
                    "Contract '{}': PRICE installment failed ({e}); scheduled as interest-only",
                    record.id
                ));
                None
            }
        }
    } else {
        None
    };

    let mut balance = record.principal;
    let mut schedule: Vec<PaymentEntry> = Vec::with_capacity(record.term as usize);

    for (i, date) in dates.iter().enumerate() {
        let interest = balance * period_rate;

        let (amortization, payment) = if (i as u32) < record.grace {
            (Decimal::ZERO, interest)
        } else {
            match &record.system {
                AmortizationSystem::Sac => (sac_amortization, sac_amortization + interest),
                AmortizationSystem::Price => match price_installment {
                    Some(pmt) => (pmt - interest, pmt),
                    None => (Decimal::ZERO, interest),
                },
                AmortizationSystem::InterestOnly | AmortizationSystem::Unsupported(_) => {
                    (Decimal::ZERO, interest)
                }
            }
        };

        balance -= amortization;
        if balance < Decimal::ZERO {
            balance = Decimal::ZERO;
        }

        schedule.push(PaymentEntry {
            contract_id: record.id.clone(),
            date: *date,
            year: date.year(),
            payment: payment * fx,
            amortization: amortization * fx,
            interest: interest * fx,
            balance: balance * fx,
            period_rate_pct: period_rate * PERCENT,
            annual_rate_pct: annual_rate * PERCENT,
            index: record.index.label().to_string(),
            spread_pct: record.spread * PERCENT,
        });
    }

    let mut flows: Vec<Money> = Vec::with_capacity(schedule.len() + 1);
    flows.push(-(record.principal * fx));
    flows.extend(schedule.iter().map(|entry| entry.payment));

    let total_cost: Money = schedule.iter().map(|entry| entry.payment).sum();
    let irr_pct = annualized_irr_pct(&record.id, &flows, record.period_months, warnings);
    let present_value = discounted_value(&record.id, &flows, base_rate, record.period_months, warnings);

    ContractSimulation {
        schedule,
        total_cost,
        irr_pct,
        present_value,
    }
}

/// Base annual rate of the contract's index, scenario shocks applied.
/// CDI and SELIC share a shock channel; SOFR is unshocked; FX-variation
/// contracts carry a zero base rate because the currency effect is applied
/// through the FX rate instead.
fn resolve_base_rate(
    record: &ContractRecord,
    scenario: &MarketScenario,
    snapshot: &MarketSnapshot,
    warnings: &mut Vec<String>,
) -> Rate {
    match &record.index {
        RateIndex::Cdi => snapshot.cdi + scenario.cdi_shock(),
        RateIndex::Selic => snapshot.selic + scenario.cdi_shock(),
        RateIndex::Ipca => snapshot.ipca + scenario.inflation_shock(),
        RateIndex::Sofr => snapshot.sofr,
        RateIndex::FxVariation => Decimal::ZERO,
        RateIndex::Unsupported(name) => {
            warnings.push(format!(
                "Contract '{}': unsupported rate index '{name}'; base rate 0 applied",
                record.id
            ));
            Decimal::ZERO
        }
    }
}

/// FX conversion rate into the reporting currency, with the scenario's
/// multiplicative shock applied to foreign currencies only.
fn resolve_fx(
    record: &ContractRecord,
    scenario: &MarketScenario,
    snapshot: &MarketSnapshot,
) -> Rate {
    if record.currency == Currency::BRL {
        return Decimal::ONE;
    }
    let mut fx = snapshot.fx_rate(&record.currency);
    if !scenario.fx_shock_pct.is_zero() {
        fx *= Decimal::ONE + scenario.fx_shock_pct;
    }
    fx
}

/// Payment calendar: one date per period, calendar-month-start stepping.
/// The start date is normalized to the first day of its month (the next
/// month's first day when mid-month), then stepped by `period_months`.
/// One parameterized routine for every period length.
fn payment_dates(start: NaiveDate, term: u32, period_months: u32) -> Vec<NaiveDate> {
    let mut current = month_start_on_or_after(start);
    let mut dates = Vec::with_capacity(term as usize);
    for _ in 0..term {
        dates.push(current);
        current = add_months(current, period_months);
    }
    dates
}

fn month_start_on_or_after(date: NaiveDate) -> NaiveDate {
    let first = first_of_month(date);
    if date.day() == 1 {
        first
    } else {
        add_months(first, 1)
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

/// Month arithmetic on first-of-month dates; day 1 exists in every month.
fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    let zero_based = date.month0() + months;
    let year = date.year() + (zero_based / 12) as i32;
    let month = zero_based % 12 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// Annualized IRR in percent. Degenerate series (too short, non-negative
/// initial flow, no positive inflow) and solver failures all yield 0.
fn annualized_irr_pct(
    contract_id: &str,
    flows: &[Money],
    period_months: u32,
    warnings: &mut Vec<String>,
) -> Rate {
    if flows.len() < 2 {
        return Decimal::ZERO;
    }
    if flows[0] >= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if flows[1..].iter().all(|f| *f <= Decimal::ZERO) {
        return Decimal::ZERO;
    }

    let periodic = match irr(flows, IRR_GUESS) {
        Ok(rate) => rate,
        Err(e) => {
            warnings.push(format!("Contract '{contract_id}': IRR failed ({e}); using 0"));
            return Decimal::ZERO;
        }
    };

    match period_to_annual(periodic, period_months) {
        Ok(annual) => annual * PERCENT,
        Err(e) => {
            warnings.push(format!(
                "Contract '{contract_id}': IRR annualization failed ({e}); using 0"
            ));
            Decimal::ZERO
        }
    }
}

/// NPV of the flows at the base index rate converted to the period basis.
fn discounted_value(
    contract_id: &str,
    flows: &[Money],
    base_annual_rate: Rate,
    period_months: u32,
    warnings: &mut Vec<String>,
) -> Money {
    let result = annual_to_period(base_annual_rate, period_months)
        .and_then(|period_rate| npv(period_rate, flows));
    match result {
        Ok(value) => value,
        Err(e) => {
            warnings.push(format!(
                "Contract '{contract_id}': present value failed ({e}); using 0"
            ));
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Category;
    use pretty_assertions::assert_eq;

    fn contract(system: AmortizationSystem) -> ContractRecord {
        ContractRecord {
            id: "C-001".into(),
            category: Category::Existing,
            description: "Test facility".into(),
            currency: Currency::BRL,
            principal: dec!(1_000_000),
            term: 12,
            grace: 0,
            period_months: 1,
            system,
            index: RateIndex::Cdi,
            spread: Decimal::ZERO,
            index_factor: Decimal::ONE,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
    }

    fn snapshot_cdi_10() -> MarketSnapshot {
        MarketSnapshot {
            cdi: dec!(0.10),
            ipca: dec!(0.045),
            selic: dec!(0.105),
            sofr: dec!(0.052),
            fx: std::collections::BTreeMap::from([("USD".to_string(), dec!(5.0))]),
        }
    }

    fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tolerance,
            "expected {expected}, got {actual} (diff {diff})"
        );
    }

    #[test]
    fn test_payment_dates_monthly_from_month_start() {
        let dates = payment_dates(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), 3, 1);
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn test_payment_dates_mid_month_start_rolls_forward() {
        let dates = payment_dates(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(), 2, 1);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(dates[1], NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    }

    #[test]
    fn test_payment_dates_semester_stepping_crosses_years() {
        let dates = payment_dates(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(), 3, 6);
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn test_sac_constant_amortization_and_zero_final_balance() {
        let record = contract(AmortizationSystem::Sac);
        let scenario = MarketScenario::base();
        let snapshot = snapshot_cdi_10();

        let mut warnings = Vec::new();
        let sim = simulate_inner(&record, &scenario, &snapshot, &mut warnings);

        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        assert_eq!(sim.schedule.len(), 12);

        let expected_amort = dec!(1_000_000) / dec!(12);
        let mut total_amort = Decimal::ZERO;
        for entry in &sim.schedule {
            assert_close(entry.amortization, expected_amort, dec!(0.0001));
            assert!(entry.balance >= Decimal::ZERO);
            total_amort += entry.amortization;
        }
        assert_close(total_amort, dec!(1_000_000), dec!(0.001));
        assert_close(sim.schedule[11].balance, Decimal::ZERO, dec!(0.001));
    }

    #[test]
    fn test_sac_worked_example_first_period() {
        // 1,000,000 / 12m / monthly SAC / CDI 10% / no spread:
        // period rate ≈ 0.797414%, first interest ≈ 7,974.14,
        // first payment ≈ 91,307.47.
        let record = contract(AmortizationSystem::Sac);
        let mut warnings = Vec::new();
        let sim = simulate_inner(
            &record,
            &MarketScenario::base(),
            &snapshot_cdi_10(),
            &mut warnings,
        );

        let first = &sim.schedule[0];
        assert_close(first.period_rate_pct, dec!(0.797414), dec!(0.00001));
        assert_close(first.interest, dec!(7974.14), dec!(0.01));
        assert_close(first.payment, dec!(91307.47), dec!(0.01));
        assert_eq!(first.annual_rate_pct, dec!(10));
    }

    #[test]
    fn test_sac_irr_recovers_contract_rate_and_pv_is_zero() {
        // Spread 0 and factor 1: the contract pays exactly the base rate, so
        // the IRR annualizes back to ~10% and NPV at the base rate is ~0.
        let record = contract(AmortizationSystem::Sac);
        let mut warnings = Vec::new();
        let sim = simulate_inner(
            &record,
            &MarketScenario::base(),
            &snapshot_cdi_10(),
            &mut warnings,
        );

        assert_close(sim.irr_pct, dec!(10), dec!(0.01));
        assert_close(sim.present_value, Decimal::ZERO, dec!(0.01));
    }

    #[test]
    fn test_price_constant_installment() {
        let record = contract(AmortizationSystem::Price);
        let mut warnings = Vec::new();
        let sim = simulate_inner(
            &record,
            &MarketScenario::base(),
            &snapshot_cdi_10(),
            &mut warnings,
        );

        let first_payment = sim.schedule[0].payment;
        for entry in &sim.schedule {
            assert_close(entry.payment, first_payment, dec!(0.000001));
        }
        assert_close(sim.schedule[11].balance, Decimal::ZERO, dec!(0.001));
    }

    #[test]
    fn test_grace_periods_pay_interest_only() {
        let mut record = contract(AmortizationSystem::Sac);
        record.grace = 3;
        let mut warnings = Vec::new();
        let sim = simulate_inner(
            &record,
            &MarketScenario::base(),
            &snapshot_cdi_10(),
            &mut warnings,
        );

        for entry in &sim.schedule[..3] {
            assert_eq!(entry.amortization, Decimal::ZERO);
            assert_eq!(entry.payment, entry.interest);
            // Balance stays at the full principal during grace.
            assert_eq!(entry.balance, dec!(1_000_000));
        }
        // Post-grace SAC window is term - grace = 9 periods.
        let expected_amort = dec!(1_000_000) / dec!(9);
        assert_close(sim.schedule[3].amortization, expected_amort, dec!(0.0001));
        assert_close(sim.schedule[11].balance, Decimal::ZERO, dec!(0.001));
    }

    #[test]
    fn test_price_with_grace_equal_to_term_is_interest_only() {
        let mut record = contract(AmortizationSystem::Price);
        record.grace = record.term;
        let mut warnings = Vec::new();
        let sim = simulate_inner(
            &record,
            &MarketScenario::base(),
            &snapshot_cdi_10(),
            &mut warnings,
        );

        for entry in &sim.schedule {
            assert_eq!(entry.amortization, Decimal::ZERO);
            assert_eq!(entry.balance, dec!(1_000_000));
        }
    }

    #[test]
    fn test_interest_only_irr_degrades_to_zero_with_warning() {
        // The flow series never repays the principal, so the IRR solver
        // diverges; the contract still simulates, with IRR 0 and a warning.
        let record = contract(AmortizationSystem::InterestOnly);
        let mut warnings = Vec::new();
        let sim = simulate_inner(
            &record,
            &MarketScenario::base(),
            &snapshot_cdi_10(),
            &mut warnings,
        );

        assert_eq!(sim.schedule.len(), 12);
        assert_eq!(sim.irr_pct, Decimal::ZERO);
        assert!(warnings.iter().any(|w| w.contains("IRR")));
    }

    #[test]
    fn test_unsupported_system_warns_and_pays_interest_only() {
        let record = contract(AmortizationSystem::Unsupported("AMERICANO".into()));
        let mut warnings = Vec::new();
        let sim = simulate_inner(
            &record,
            &MarketScenario::base(),
            &snapshot_cdi_10(),
            &mut warnings,
        );

        assert!(warnings.iter().any(|w| w.contains("AMERICANO")));
        for entry in &sim.schedule {
            assert_eq!(entry.amortization, Decimal::ZERO);
        }
    }

    #[test]
    fn test_unsupported_index_warns_and_uses_zero_base_rate() {
        let mut record = contract(AmortizationSystem::Sac);
        record.index = RateIndex::Unsupported("EURIBOR".into());
        let mut warnings = Vec::new();
        let sim = simulate_inner(
            &record,
            &MarketScenario::base(),
            &snapshot_cdi_10(),
            &mut warnings,
        );

        assert!(warnings.iter().any(|w| w.contains("EURIBOR")));
        assert_eq!(sim.schedule[0].annual_rate_pct, Decimal::ZERO);
        assert_eq!(sim.schedule[0].interest, Decimal::ZERO);
    }

    #[test]
    fn test_cdi_shock_shifts_effective_rate() {
        let record = contract(AmortizationSystem::Sac);
        let mut warnings = Vec::new();
        let sim = simulate_inner(
            &record,
            &MarketScenario::stress(),
            &snapshot_cdi_10(),
            &mut warnings,
        );

        // 10% CDI + 200 bps CDI shock + 100 bps spread shock = 13% annual.
        assert_eq!(sim.schedule[0].annual_rate_pct, dec!(13));
    }

    #[test]
    fn test_selic_shares_cdi_shock_channel_and_sofr_unshocked() {
        let mut selic_contract = contract(AmortizationSystem::Sac);
        selic_contract.index = RateIndex::Selic;
        let mut sofr_contract = contract(AmortizationSystem::Sac);
        sofr_contract.index = RateIndex::Sofr;

        let mut scenario = MarketScenario::base();
        scenario.cdi_shock_bps = dec!(300);

        let snapshot = snapshot_cdi_10();
        let mut warnings = Vec::new();

        let selic_sim = simulate_inner(&selic_contract, &scenario, &snapshot, &mut warnings);
        assert_eq!(selic_sim.schedule[0].annual_rate_pct, dec!(13.5));

        let sofr_sim = simulate_inner(&sofr_contract, &scenario, &snapshot, &mut warnings);
        assert_eq!(sofr_sim.schedule[0].annual_rate_pct, dec!(5.2));
    }

    #[test]
    fn test_fx_variation_index_has_zero_base_rate() {
        let mut record = contract(AmortizationSystem::Sac);
        record.index = RateIndex::FxVariation;
        record.spread = dec!(0.03);
        let mut warnings = Vec::new();
        let sim = simulate_inner(
            &record,
            &MarketScenario::base(),
            &snapshot_cdi_10(),
            &mut warnings,
        );

        // Effective rate is spread only.
        assert_eq!(sim.schedule[0].annual_rate_pct, dec!(3));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_foreign_currency_converts_and_fx_shock_applies() {
        let mut record = contract(AmortizationSystem::Sac);
        record.currency = Currency::USD;
        let mut scenario = MarketScenario::base();
        scenario.fx_shock_pct = dec!(0.20);

        let snapshot = snapshot_cdi_10(); // USD at 5.0
        let mut warnings = Vec::new();
        let shocked = simulate_inner(&record, &scenario, &snapshot, &mut warnings);
        let unshocked = simulate_inner(&record, &MarketScenario::base(), &snapshot, &mut warnings);

        // 5.0 * 1.2 = 6.0 vs 5.0: payments scale by exactly 1.2.
        assert_close(
            shocked.schedule[0].payment,
            unshocked.schedule[0].payment * dec!(1.2),
            dec!(0.0001),
        );
        // Initial outflow scales too, so the IRR is unchanged by FX level.
        assert_close(shocked.irr_pct, unshocked.irr_pct, dec!(0.0001));
    }

    #[test]
    fn test_fx_shock_does_not_touch_reporting_currency() {
        let record = contract(AmortizationSystem::Sac);
        let mut scenario = MarketScenario::base();
        scenario.fx_shock_pct = dec!(0.50);

        let snapshot = snapshot_cdi_10();
        let mut warnings = Vec::new();
        let shocked = simulate_inner(&record, &scenario, &snapshot, &mut warnings);
        let unshocked = simulate_inner(&record, &MarketScenario::base(), &snapshot, &mut warnings);

        assert_eq!(shocked.schedule[0].payment, unshocked.schedule[0].payment);
    }

    #[test]
    fn test_irr_degenerate_guards_return_zero() {
        let mut warnings = Vec::new();
        // Too short.
        assert_eq!(
            annualized_irr_pct("x", &[dec!(-100)], 1, &mut warnings),
            Decimal::ZERO
        );
        // Non-negative initial flow.
        assert_eq!(
            annualized_irr_pct("x", &[dec!(100), dec!(50)], 1, &mut warnings),
            Decimal::ZERO
        );
        // No positive inflow.
        assert_eq!(
            annualized_irr_pct("x", &[dec!(-100), dec!(0), dec!(-5)], 1, &mut warnings),
            Decimal::ZERO
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_simulate_contract_envelope() {
        let record = contract(AmortizationSystem::Sac);
        let output = simulate_contract(&record, &MarketScenario::base(), &snapshot_cdi_10())
            .unwrap();

        assert!(output.methodology.contains("Debt contract schedule"));
        assert_eq!(output.result.schedule.len(), 12);
        assert_eq!(output.metadata.precision, "rust_decimal_128bit");
    }

    #[test]
    fn test_simulate_contract_rejects_invalid_record() {
        let mut record = contract(AmortizationSystem::Sac);
        record.principal = Decimal::ZERO;
        let err = simulate_contract(&record, &MarketScenario::base(), &snapshot_cdi_10())
            .unwrap_err();
        assert!(matches!(err, crate::DebtSimError::Validation(_)));
    }
}

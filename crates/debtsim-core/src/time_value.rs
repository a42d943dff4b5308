//! Rate conversions and cash-flow math shared by the scheduler and the
//! portfolio aggregator.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::DebtSimError;
use crate::types::{Money, Rate};
use crate::DebtSimResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Convert an effective annual rate into the effective rate for a period of
/// `period_months` months: `(1 + annual)^(m/12) - 1`.
pub fn annual_to_period(annual: Rate, period_months: u32) -> DebtSimResult<Rate> {
    if period_months == 0 {
        return Err(DebtSimError::InvalidInput {
            field: "period_months".into(),
            reason: "Period length must be at least one month".into(),
        });
    }
    if period_months == 12 {
        return Ok(annual);
    }
    let base = Decimal::ONE + annual;
    if base <= Decimal::ZERO {
        return Err(DebtSimError::InvalidInput {
            field: "annual".into(),
            reason: "Annual rate must be greater than -100%".into(),
        });
    }
    let exponent = Decimal::from(period_months) / MONTHS_PER_YEAR;
    Ok(base.powd(exponent) - Decimal::ONE)
}

/// Convert an effective period rate back to an effective annual rate:
/// `(1 + period)^(12/m) - 1`. Used to annualize a period-basis IRR.
pub fn period_to_annual(period: Rate, period_months: u32) -> DebtSimResult<Rate> {
    if period_months == 0 {
        return Err(DebtSimError::InvalidInput {
            field: "period_months".into(),
            reason: "Period length must be at least one month".into(),
        });
    }
    if period_months == 12 {
        return Ok(period);
    }
    let base = Decimal::ONE + period;
    if base <= Decimal::ZERO {
        return Err(DebtSimError::InvalidInput {
            field: "period".into(),
            reason: "Period rate must be greater than -100%".into(),
        });
    }
    let exponent = MONTHS_PER_YEAR / Decimal::from(period_months);
    Ok(base.powd(exponent) - Decimal::ONE)
}

/// Fixed installment of a PRICE (annuity) loan: the payment that retires
/// `principal` over `periods` payments at `rate` per period.
pub fn annuity_payment(rate: Rate, periods: u32, principal: Money) -> DebtSimResult<Money> {
    if periods == 0 {
        return Err(DebtSimError::DivisionByZero {
            context: "annuity payment over zero periods".into(),
        });
    }
    let n = Decimal::from(periods);
    if rate.is_zero() {
        return Ok(principal / n);
    }
    let growth = (Decimal::ONE + rate).powd(n);
    let denominator = growth - Decimal::ONE;
    if denominator.is_zero() {
        return Err(DebtSimError::DivisionByZero {
            context: "annuity payment denominator".into(),
        });
    }
    Ok(principal * rate * growth / denominator)
}

/// Net Present Value of a series of cash flows at a per-period discount rate.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> DebtSimResult<Money> {
    if rate <= dec!(-1) {
        return Err(DebtSimError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
        }
        if discount.is_zero() {
            return Err(DebtSimError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        result += cf / discount;
    }

    Ok(result)
}

/// NPV and its derivative at `rate`, for one Newton-Raphson step. `None`
/// when the rate has diverged far enough that the discount factors underflow
/// or the quotients overflow the 128-bit decimal range — a series whose true
/// root sits below the clamp (e.g. payments that never repay the principal)
/// drives the rate there.
fn npv_with_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let mut npv_val = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        let t_dec = Decimal::from(t as i64);
        let discount = one_plus_r.checked_powd(t_dec)?;
        if discount.is_zero() {
            return None;
        }
        npv_val = npv_val.checked_add(cf.checked_div(discount)?)?;
        if t > 0 {
            let next_discount = one_plus_r.checked_powd(t_dec + Decimal::ONE)?;
            if next_discount.is_zero() {
                return None;
            }
            dnpv = dnpv.checked_sub(t_dec.checked_mul(*cf)?.checked_div(next_discount)?)?;
        }
    }

    Some((npv_val, dnpv))
}

/// Internal Rate of Return using Newton-Raphson
pub fn irr(cash_flows: &[Money], guess: Rate) -> DebtSimResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(DebtSimError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    let mut rate = guess;

    for i in 0..MAX_IRR_ITERATIONS {
        let (npv_val, dnpv) = npv_with_derivative(cash_flows, rate).ok_or_else(|| {
            DebtSimError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: i,
                last_delta: rate,
            }
        })?;

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }

        if dnpv.is_zero() {
            return Err(DebtSimError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        // The step itself can overflow when the derivative is tiny.
        rate = npv_val
            .checked_div(dnpv)
            .and_then(|step| rate.checked_sub(step))
            .ok_or_else(|| DebtSimError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: i,
                last_delta: npv_val,
            })?;

        // Guard against divergence
        if rate < dec!(-0.99) {
            rate = dec!(-0.99);
        } else if rate > dec!(100.0) {
            rate = dec!(100.0);
        }
    }

    Err(DebtSimError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        last_delta: npv_with_derivative(cash_flows, rate)
            .map(|(npv_val, _)| npv_val)
            .unwrap_or(Decimal::MAX),
    })
}

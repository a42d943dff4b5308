//! Per-run frozen view of market rates.
//!
//! Every rate a simulation needs is resolved exactly once, before the
//! per-contract loop, so all contracts in a run see the same market and
//! external calls stay bounded. The scheduler and aggregator only ever read
//! from a snapshot.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::provider::{RateProvider, RateSeries, DEFAULT_FX_RATE};
use crate::types::{Currency, Rate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub cdi: Rate,
    pub ipca: Rate,
    pub selic: Rate,
    pub sofr: Rate,
    /// FX rates keyed by currency code, reporting currency excluded.
    pub fx: BTreeMap<String, Rate>,
}

impl MarketSnapshot {
    /// Resolve all series plus the FX rates for the given currencies through
    /// the provider, once.
    pub fn capture<'a, P, I>(provider: &P, currencies: I) -> Self
    where
        P: RateProvider + ?Sized,
        I: IntoIterator<Item = &'a Currency>,
    {
        let foreign: BTreeSet<&Currency> = currencies
            .into_iter()
            .filter(|c| **c != Currency::BRL)
            .collect();

        let fx = foreign
            .into_iter()
            .map(|c| (c.code().to_string(), provider.fx_rate(c)))
            .collect();

        MarketSnapshot {
            cdi: provider.annual_rate(RateSeries::Cdi),
            ipca: provider.annual_rate(RateSeries::Ipca),
            selic: provider.annual_rate(RateSeries::Selic),
            sofr: provider.annual_rate(RateSeries::Sofr),
            fx,
        }
    }

    pub fn series(&self, series: RateSeries) -> Rate {
        match series {
            RateSeries::Cdi => self.cdi,
            RateSeries::Ipca => self.ipca,
            RateSeries::Selic => self.selic,
            RateSeries::Sofr => self.sofr,
        }
    }

    /// FX rate for a currency; 1.0 for the reporting currency, default
    /// fallback for currencies the snapshot was not captured with.
    pub fn fx_rate(&self, currency: &Currency) -> Rate {
        if *currency == Currency::BRL {
            return Decimal::ONE;
        }
        self.fx
            .get(currency.code())
            .copied()
            .unwrap_or(DEFAULT_FX_RATE)
    }
}

impl Default for MarketSnapshot {
    /// Snapshot of the static fallback rates, no FX quotes.
    fn default() -> Self {
        MarketSnapshot {
            cdi: RateSeries::Cdi.fallback(),
            ipca: RateSeries::Ipca.fallback(),
            selic: RateSeries::Selic.fallback(),
            sofr: RateSeries::Sofr.fallback(),
            fx: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::provider::StaticRates;
    use rust_decimal_macros::dec;

    #[test]
    fn test_capture_resolves_each_series_and_fx() {
        let provider = StaticRates::new(dec!(0.10), dec!(0.04), dec!(0.09), dec!(0.05))
            .with_fx(Currency::USD, dec!(5.20));

        let currencies = [Currency::BRL, Currency::USD, Currency::USD];
        let snapshot = MarketSnapshot::capture(&provider, currencies.iter());

        assert_eq!(snapshot.cdi, dec!(0.10));
        assert_eq!(snapshot.selic, dec!(0.09));
        assert_eq!(snapshot.fx_rate(&Currency::USD), dec!(5.20));
        // Reporting currency never enters the FX table.
        assert!(!snapshot.fx.contains_key("BRL"));
        assert_eq!(snapshot.fx.len(), 1);
    }

    #[test]
    fn test_fx_rate_for_uncaptured_currency_falls_back() {
        let snapshot = MarketSnapshot::default();
        assert_eq!(snapshot.fx_rate(&Currency::EUR), dec!(5.0));
        assert_eq!(snapshot.fx_rate(&Currency::BRL), Decimal::ONE);
    }

    #[test]
    fn test_default_snapshot_carries_every_fallback_series() {
        let snapshot = MarketSnapshot::default();
        for series in RateSeries::all() {
            assert_eq!(snapshot.series(series), series.fallback());
        }
    }
}

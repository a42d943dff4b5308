//! Rate providers.
//!
//! The simulator never talks to a remote source directly: it asks a
//! [`RateProvider`] for annualized rates (decimal fractions, 0.13 = 13%/yr)
//! and FX quotes. [`CachedRateProvider`] composes a fallible [`RateSource`]
//! with an injected [`RateCache`] and static fallbacks, so a run always gets
//! a valid float no matter what the remote side does.

use std::cell::RefCell;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Currency, Rate};
use crate::DebtSimResult;

/// The four annualized reference series the simulator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RateSeries {
    Cdi,
    Ipca,
    Selic,
    Sofr,
}

impl RateSeries {
    /// Static default used when neither the source nor the cache has a value.
    pub fn fallback(self) -> Rate {
        match self {
            RateSeries::Cdi => dec!(0.145),
            RateSeries::Ipca => dec!(0.045),
            RateSeries::Selic => dec!(0.105),
            RateSeries::Sofr => dec!(0.052),
        }
    }

    pub fn cache_key(self) -> &'static str {
        match self {
            RateSeries::Cdi => "CDI",
            RateSeries::Ipca => "IPCA",
            RateSeries::Selic => "SELIC",
            RateSeries::Sofr => "SOFR",
        }
    }

    pub fn all() -> [RateSeries; 4] {
        [
            RateSeries::Cdi,
            RateSeries::Ipca,
            RateSeries::Selic,
            RateSeries::Sofr,
        ]
    }
}

/// An annual series quote below 1%/yr is treated as a bad tick and replaced
/// by the fallback. The upstream series occasionally returns daily-basis
/// values in the annual slot.
const SERIES_SANITY_FLOOR: Decimal = dec!(0.01);

/// FX fallback for currencies with no source quote and no cached value.
pub(crate) const DEFAULT_FX_RATE: Decimal = dec!(5.0);

/// A remote quote source. Implementations own their transport, timeout and
/// retry policy; the core only sees `Result`.
pub trait RateSource {
    fn fetch_series(&self, series: RateSeries) -> DebtSimResult<Rate>;
    fn fetch_fx(&self, currency: &Currency) -> DebtSimResult<Rate>;
}

/// Injected key-value store for the last known good quotes. Write-on-success,
/// no eviction; the storage medium is the implementor's business.
pub trait RateCache {
    fn get(&self, key: &str) -> Option<Rate>;
    fn put(&self, key: &str, value: Rate);
}

/// In-memory [`RateCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RefCell<BTreeMap<String, Rate>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache::default()
    }
}

impl RateCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Rate> {
        self.entries.borrow().get(key).copied()
    }

    fn put(&self, key: &str, value: Rate) {
        self.entries.borrow_mut().insert(key.to_string(), value);
    }
}

/// What the simulator consumes: infallible, by series name.
pub trait RateProvider {
    /// Annualized rate for a reference series, as a decimal fraction.
    fn annual_rate(&self, series: RateSeries) -> Rate;

    /// Units of reporting currency per unit of `currency`. 1.0 for BRL.
    fn fx_rate(&self, currency: &Currency) -> Rate;
}

/// Fixed-table provider for offline runs and tests.
#[derive(Debug, Clone)]
pub struct StaticRates {
    pub cdi: Rate,
    pub ipca: Rate,
    pub selic: Rate,
    pub sofr: Rate,
    pub fx: BTreeMap<String, Rate>,
}

impl StaticRates {
    pub fn new(cdi: Rate, ipca: Rate, selic: Rate, sofr: Rate) -> Self {
        StaticRates {
            cdi,
            ipca,
            selic,
            sofr,
            fx: BTreeMap::new(),
        }
    }

    pub fn with_fx(mut self, currency: Currency, rate: Rate) -> Self {
        self.fx.insert(currency.code().to_string(), rate);
        self
    }
}

impl Default for StaticRates {
    /// Fallback values for every series, no FX quotes.
    fn default() -> Self {
        StaticRates::new(
            RateSeries::Cdi.fallback(),
            RateSeries::Ipca.fallback(),
            RateSeries::Selic.fallback(),
            RateSeries::Sofr.fallback(),
        )
    }
}

impl RateProvider for StaticRates {
    fn annual_rate(&self, series: RateSeries) -> Rate {
        match series {
            RateSeries::Cdi => self.cdi,
            RateSeries::Ipca => self.ipca,
            RateSeries::Selic => self.selic,
            RateSeries::Sofr => self.sofr,
        }
    }

    fn fx_rate(&self, currency: &Currency) -> Rate {
        if *currency == Currency::BRL {
            return Decimal::ONE;
        }
        self.fx
            .get(currency.code())
            .copied()
            .unwrap_or(DEFAULT_FX_RATE)
    }
}

/// Source → cache → static fallback.
///
/// A successful fetch overwrites the cached value; a failed fetch falls back
/// to the last cached quote, then to [`RateSeries::fallback`] /
/// [`DEFAULT_FX_RATE`].
pub struct CachedRateProvider<S: RateSource, C: RateCache> {
    source: S,
    cache: C,
}

impl<S: RateSource, C: RateCache> CachedRateProvider<S, C> {
    pub fn new(source: S, cache: C) -> Self {
        CachedRateProvider { source, cache }
    }

    fn fx_cache_key(currency: &Currency) -> String {
        format!("FX_{}", currency.code())
    }
}

impl<S: RateSource, C: RateCache> RateProvider for CachedRateProvider<S, C> {
    fn annual_rate(&self, series: RateSeries) -> Rate {
        let key = series.cache_key();
        match self.source.fetch_series(series) {
            Ok(fetched) => {
                let value = if fetched < SERIES_SANITY_FLOOR {
                    series.fallback()
                } else {
                    fetched
                };
                self.cache.put(key, value);
                value
            }
            Err(_) => self.cache.get(key).unwrap_or_else(|| series.fallback()),
        }
    }

    fn fx_rate(&self, currency: &Currency) -> Rate {
        if *currency == Currency::BRL {
            return Decimal::ONE;
        }
        let key = Self::fx_cache_key(currency);
        match self.source.fetch_fx(currency) {
            Ok(rate) => {
                self.cache.put(&key, rate);
                rate
            }
            Err(_) => self.cache.get(&key).unwrap_or(DEFAULT_FX_RATE),
        }
    }
}

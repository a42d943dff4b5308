//! Reference-rate plumbing: the provider seam the simulator consumes rates
//! through, the cache/fallback chain, and the per-run frozen snapshot.

pub mod provider;
pub mod snapshot;

pub use provider::{
    CachedRateProvider, MemoryCache, RateCache, RateProvider, RateSeries, RateSource, StaticRates,
};
pub use snapshot::MarketSnapshot;

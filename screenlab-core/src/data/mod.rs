//! Data collaborators: price and fundamentals providers, the bar cache and universes.

pub mod alphavantage;
pub mod cache;
pub mod circuit_breaker;
pub mod download;
pub mod field_map;
pub mod pacer;
pub mod provider;
pub mod universe;
pub mod yahoo;

pub use alphavantage::AlphaVantageSource;
pub use cache::{CacheMeta, CacheStatus, CoverageResult, ParquetCache};
pub use circuit_breaker::CircuitBreaker;
pub use download::{download_tickers, fetch_and_cache, is_fresh, DownloadSummary};
pub use pacer::Pacer;
pub use provider::{
    DataError, DataSource, DownloadProgress, EmptySource, FundamentalsSource, PriceProvider, StaticSource,
    StdoutProgress,
};
pub use universe::{Universe, UniverseError};
pub use yahoo::YahooProvider;

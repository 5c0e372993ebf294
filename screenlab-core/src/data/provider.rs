//! Collaborator seams: price and fundamentals providers, and their error type.
//!
//! The engine never talks to a network. Runners hand it a `PriceHistory` built
//! through `PriceProvider`, and the pipeline pulls fundamentals for technical
//! survivors through `FundamentalsSource`. Both are traits so tests and offline
//! runs can substitute in-memory sources.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{FundamentalsRecord, PriceSeries, SeriesError, Ticker};

/// Errors from providers and the cache.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s): {detail}")]
    RateLimited { retry_after_secs: u64, detail: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider refused requests (circuit breaker open)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for '{symbol}'; run `screenlab download` first")]
    NoCachedData { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

impl From<SeriesError> for DataError {
    fn from(e: SeriesError) -> Self {
        DataError::ValidationError(e.to_string())
    }
}

impl DataError {
    /// Whether the provider asked us to stop calling it.
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            DataError::RateLimited { .. } | DataError::CircuitBreakerTripped
        )
    }

    /// Whether no further call to the same source can succeed this run.
    pub fn halts_source(&self) -> bool {
        self.is_rate_limit() || matches!(self, DataError::AuthenticationRequired(_))
    }
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    Cache,
    Synthetic,
}

/// Daily price bars from an upstream source.
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Chronological bars for `ticker` in `[start, end]`.
    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries, DataError>;

    /// False while the provider is rate-limited or blocked.
    fn is_available(&self) -> bool;

    /// Provenance recorded in the cache sidecar.
    fn source(&self) -> DataSource {
        DataSource::YahooFinance
    }
}

/// Fundamentals for one ticker at a time.
///
/// `Ok(None)` means the provider has nothing usable for the ticker; the
/// scorecard reports it as unavailable. `Err` is reserved for transport and
/// rate-limit failures.
pub trait FundamentalsSource: Send + Sync {
    fn name(&self) -> &str;

    fn fundamentals(&self, ticker: &str) -> Result<Option<FundamentalsRecord>, DataError>;

    fn is_available(&self) -> bool {
        true
    }
}

/// A source with no data, used when no credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySource;

impl FundamentalsSource for EmptySource {
    fn name(&self) -> &str {
        "empty"
    }

    fn fundamentals(&self, _ticker: &str) -> Result<Option<FundamentalsRecord>, DataError> {
        Ok(None)
    }
}

/// In-memory fundamentals keyed by ticker.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    records: HashMap<Ticker, FundamentalsRecord>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, record: FundamentalsRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn insert(&mut self, record: FundamentalsRecord) {
        self.records.insert(record.ticker.clone(), record);
    }
}

impl FromIterator<FundamentalsRecord> for StaticSource {
    fn from_iter<I: IntoIterator<Item = FundamentalsRecord>>(iter: I) -> Self {
        let mut source = StaticSource::new();
        for record in iter {
            source.insert(record);
        }
        source
    }
}

impl FundamentalsSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fundamentals(&self, ticker: &str) -> Result<Option<FundamentalsRecord>, DataError> {
        Ok(self.records.get(ticker).cloned())
    }
}

/// Progress callback for multi-ticker downloads.
pub trait DownloadProgress: Send {
    fn on_start(&self, ticker: &str, index: usize, total: usize);

    fn on_complete(&self, ticker: &str, index: usize, total: usize, result: &Result<(), DataError>);

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Prints download progress to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {ticker}...", index + 1, total);
    }

    fn on_complete(&self, ticker: &str, _index: usize, _total: usize, result: &Result<(), DataError>) {
        match result {
            Ok(()) => println!("  OK: {ticker}"),
            Err(e) => println!("  FAIL: {ticker}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nDownload complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ticker: &str) -> FundamentalsRecord {
        FundamentalsRecord {
            ticker: ticker.into(),
            quarters: vec![],
            stockholder_equity: None,
            debt_to_equity: None,
            reported_roe: None,
        }
    }

    #[test]
    fn static_source_returns_known_tickers_only() {
        let source: StaticSource = vec![record("AAPL"), record("MSFT")].into_iter().collect();
        assert!(source.fundamentals("AAPL").unwrap().is_some());
        assert!(source.fundamentals("TSLA").unwrap().is_none());
    }

    #[test]
    fn empty_source_has_nothing() {
        assert!(EmptySource.fundamentals("AAPL").unwrap().is_none());
    }

    #[test]
    fn rate_limit_classification() {
        let limited = DataError::RateLimited {
            retry_after_secs: 60,
            detail: "API call frequency".into(),
        };
        assert!(limited.is_rate_limit());
        assert!(DataError::CircuitBreakerTripped.is_rate_limit());
        assert!(!DataError::Other("x".into()).is_rate_limit());
    }

    #[test]
    fn rejected_credentials_halt_the_source() {
        let auth = DataError::AuthenticationRequired("HTTP 401 Unauthorized".into());
        assert!(auth.halts_source());
        assert!(!auth.is_rate_limit());
        assert!(DataError::CircuitBreakerTripped.halts_source());
        assert!(!DataError::NetworkUnreachable("timeout".into()).halts_source());
    }
}

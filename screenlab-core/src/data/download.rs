//! Download orchestrator — fetches price history for many tickers into the cache.

use chrono::{Duration, NaiveDate};
use tracing::warn;

use super::cache::{CoverageResult, ParquetCache};
use super::provider::{DataError, DownloadProgress, PriceProvider};
use crate::domain::PriceSeries;

/// Weekends and holidays mean a cache rarely matches a calendar range exactly.
const EDGE_TOLERANCE_DAYS: i64 = 4;

/// Whether the cached bars for `ticker` are good enough for `[start, end]`.
pub fn is_fresh(cache: &ParquetCache, ticker: &str, start: NaiveDate, end: NaiveDate) -> bool {
    match cache.covers_range(ticker, start, end) {
        CoverageResult::FullyCovered => true,
        CoverageResult::NotCached => false,
        CoverageResult::PartiallyCovered {
            cached_start,
            cached_end,
        } => {
            let tolerance = Duration::days(EDGE_TOLERANCE_DAYS);
            cached_start <= start + tolerance && cached_end >= end - tolerance
        }
    }
}

/// Fetch one ticker and write it through to the cache.
///
/// A cache write failure is logged, not returned: the fetched series is still usable.
pub fn fetch_and_cache(
    provider: &dyn PriceProvider,
    cache: &ParquetCache,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceSeries, DataError> {
    let series = provider.fetch(ticker, start, end)?;
    if let Err(e) = cache.write(&series, provider.source()) {
        warn!(ticker, error = %e, "failed to cache price series");
    }
    Ok(series)
}

/// Download every ticker, skipping fresh cache entries unless `force` is set.
pub fn download_tickers(
    provider: &dyn PriceProvider,
    cache: &ParquetCache,
    tickers: &[&str],
    start: NaiveDate,
    end: NaiveDate,
    force: bool,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = tickers.len();
    let mut succeeded = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, ticker) in tickers.iter().enumerate() {
        progress.on_start(ticker, i, total);

        if !force && is_fresh(cache, ticker, start, end) {
            progress.on_complete(ticker, i, total, &Ok(()));
            succeeded += 1;
            continue;
        }

        let result = fetch_and_cache(provider, cache, ticker, start, end).map(|_| ());
        progress.on_complete(ticker, i, total, &result);
        match result {
            Ok(()) => succeeded += 1,
            Err(e) => errors.push((ticker.to_string(), e)),
        }

        if !provider.is_available() {
            for rest in &tickers[i + 1..] {
                errors.push((rest.to_string(), DataError::CircuitBreakerTripped));
            }
            break;
        }
    }

    progress.on_batch_complete(succeeded, errors.len(), total);
    DownloadSummary {
        total,
        succeeded,
        failed: errors.len(),
        errors,
    }
}

#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::DataSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Quiet;

    impl DownloadProgress for Quiet {
        fn on_start(&self, _: &str, _: usize, _: usize) {}
        fn on_complete(&self, _: &str, _: usize, _: usize, _: &Result<(), DataError>) {}
        fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
    }

    /// Serves flat series, fails on "BAD", goes unavailable after `limit` calls.
    struct Fake {
        calls: AtomicUsize,
        limit: usize,
    }

    impl Fake {
        fn new(limit: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                limit,
            }
        }
    }

    impl PriceProvider for Fake {
        fn name(&self) -> &str {
            "fake"
        }

        fn source(&self) -> DataSource {
            DataSource::Synthetic
        }

        fn fetch(&self, ticker: &str, start: NaiveDate, _end: NaiveDate) -> Result<PriceSeries, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if ticker == "BAD" {
                return Err(DataError::SymbolNotFound { symbol: ticker.into() });
            }
            Ok(PriceSeries::from_closes(ticker, start, &[10.0; 30]))
        }

        fn is_available(&self) -> bool {
            self.calls.load(Ordering::SeqCst) < self.limit
        }
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn downloads_and_skips_fresh_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let provider = Fake::new(usize::MAX);

        let first = download_tickers(&provider, &cache, &["A", "BAD"], d(1, 1), d(1, 30), false, &Quiet);
        assert_eq!((first.succeeded, first.failed), (1, 1));
        assert_eq!(cache.get_meta("A").unwrap().source, DataSource::Synthetic);

        let second = download_tickers(&provider, &cache, &["A"], d(1, 1), d(1, 30), false, &Quiet);
        assert!(second.all_succeeded());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stops_when_provider_becomes_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let provider = Fake::new(1);

        let summary = download_tickers(&provider, &cache, &["A", "B", "C"], d(1, 1), d(1, 30), true, &Quiet);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert!(summary.errors.iter().all(|(_, e)| e.is_rate_limit()));
    }

    #[test]
    fn freshness_tolerates_weekend_edges() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache
            .write(&PriceSeries::from_closes("A", d(1, 2), &[10.0; 10]), DataSource::Cache)
            .unwrap();
        // Cached 01-02..01-11; requested 01-01..01-13.
        assert!(is_fresh(&cache, "A", d(1, 1), d(1, 13)));
        assert!(!is_fresh(&cache, "A", d(1, 1), d(2, 13)));
        assert!(!is_fresh(&cache, "B", d(1, 1), d(1, 13)));
    }
}

//! Price history assembly for a screen run.
//!
//! For every ticker in universe order:
//! 1. A fresh cache entry is used as-is (any cache entry when offline)
//! 2. Otherwise the provider is asked, and the download is written to the cache
//! 3. A stale cache entry is used if the download fails
//! 4. With `synthetic` set, a deterministic random walk is generated (tagged)
//! 5. Otherwise the ticker is skipped with a warning
//!
//! Whatever the source, only bars dated within `start..=end` are kept, so a
//! cache holding later bars never leaks them into an earlier screen date.
//!
//! Skipping is not fatal: the screen ranks whatever loaded. Only a run where
//! nothing at all loaded is an error.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use thiserror::Error;
use tracing::{info, warn};

use screenlab_core::data::{
    fetch_and_cache, is_fresh, DataError, DataSource, DownloadProgress, ParquetCache, PriceProvider,
};
use screenlab_core::domain::{DatasetHash, PriceHistory, PriceSeries, Ticker};
use screenlab_core::fingerprint::dataset_hash;
use screenlab_core::synthetic;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no price data could be loaded for any of {requested} tickers (offline: {offline}; use --synthetic for synthetic data)")]
    NothingLoaded { requested: usize, offline: bool },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Never make network requests.
    pub offline: bool,
    /// Generate synthetic bars when real data is unavailable.
    pub synthetic: bool,
    /// Re-download even if the cache is fresh.
    pub force: bool,
}

impl LoadOptions {
    /// `lookback_days` calendar days ending at `end`.
    pub fn ending(end: NaiveDate, lookback_days: i64) -> Self {
        Self {
            start: end - Duration::days(lookback_days),
            end,
            offline: false,
            synthetic: false,
            force: false,
        }
    }
}

#[derive(Debug)]
pub struct LoadedData {
    pub history: PriceHistory,
    pub sources: BTreeMap<Ticker, DataSource>,
    /// Tickers that could not be loaded, with the last error seen.
    pub skipped: Vec<(Ticker, String)>,
    pub dataset_hash: DatasetHash,
    pub has_synthetic: bool,
}

/// Load price history for `tickers`, keeping their order.
pub fn load_history(
    tickers: &[&str],
    cache: &ParquetCache,
    provider: Option<&dyn PriceProvider>,
    progress: Option<&dyn DownloadProgress>,
    opts: &LoadOptions,
) -> Result<LoadedData, LoadError> {
    let total = tickers.len();
    let mut history = PriceHistory::new();
    let mut sources = BTreeMap::new();
    let mut skipped = Vec::new();

    for (i, &ticker) in tickers.iter().enumerate() {
        if let Some(p) = progress {
            p.on_start(ticker, i, total);
        }
        match load_one(ticker, cache, provider, opts) {
            Ok((series, source)) => {
                if let Some(p) = progress {
                    p.on_complete(ticker, i, total, &Ok(()));
                }
                history.insert(series);
                sources.insert(ticker.to_string(), source);
            }
            Err(e) => {
                warn!(ticker, error = %e, "skipping ticker with no usable price data");
                let reason = e.to_string();
                if let Some(p) = progress {
                    p.on_complete(ticker, i, total, &Err(e));
                }
                skipped.push((ticker.to_string(), reason));
            }
        }
    }

    if let Some(p) = progress {
        p.on_batch_complete(history.len(), skipped.len(), total);
    }
    if history.is_empty() && total > 0 {
        return Err(LoadError::NothingLoaded {
            requested: total,
            offline: opts.offline,
        });
    }

    let has_synthetic = sources.values().any(|s| *s == DataSource::Synthetic);
    if has_synthetic {
        warn!("results include synthetic price data and are tagged as synthetic");
    }
    info!(loaded = history.len(), skipped = skipped.len(), "price history assembled");

    Ok(LoadedData {
        dataset_hash: dataset_hash(&history),
        history,
        sources,
        skipped,
        has_synthetic,
    })
}

fn load_one(
    ticker: &str,
    cache: &ParquetCache,
    provider: Option<&dyn PriceProvider>,
    opts: &LoadOptions,
) -> Result<(PriceSeries, DataSource), DataError> {
    let use_cache_as_is = opts.offline || (!opts.force && is_fresh(cache, ticker, opts.start, opts.end));
    if use_cache_as_is {
        if let Some(hit) = load_cached(cache, ticker, opts) {
            return Ok(hit);
        }
    }

    let mut last_error = DataError::NoCachedData {
        symbol: ticker.to_string(),
    };

    if !opts.offline {
        match provider {
            Some(p) if p.is_available() => match fetch_and_cache(p, cache, ticker, opts.start, opts.end) {
                Ok(series) => return Ok((series.clipped(opts.start, opts.end), p.source())),
                Err(e) => last_error = e,
            },
            Some(_) => last_error = DataError::CircuitBreakerTripped,
            None => {}
        }
        if let Some(hit) = load_cached(cache, ticker, opts) {
            warn!(ticker, "download failed, using stale cache");
            return Ok(hit);
        }
    }

    if opts.synthetic {
        let series = synthetic::random_walk(ticker, opts.start, opts.end)?;
        return Ok((series.clipped(opts.start, opts.end), DataSource::Synthetic));
    }
    Err(last_error)
}

/// Cached bars within the requested window. A cache holding nothing inside
/// the window counts as a miss.
fn load_cached(cache: &ParquetCache, ticker: &str, opts: &LoadOptions) -> Option<(PriceSeries, DataSource)> {
    let series = cache.load(ticker).ok()?.clipped(opts.start, opts.end);
    if series.is_empty() {
        return None;
    }
    Some((series, cached_source(cache, ticker)))
}

/// Cached synthetic bars stay tagged synthetic.
fn cached_source(cache: &ParquetCache, ticker: &str) -> DataSource {
    match cache.get_meta(ticker).map(|m| m.source) {
        Some(DataSource::Synthetic) => DataSource::Synthetic,
        _ => DataSource::Cache,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn opts() -> LoadOptions {
        LoadOptions {
            start: d(2023, 1, 2),
            end: d(2024, 12, 31),
            offline: false,
            synthetic: false,
            force: false,
        }
    }

    /// Serves synthetic walks for every ticker except "DEAD".
    struct Walks {
        calls: AtomicUsize,
    }

    impl PriceProvider for Walks {
        fn name(&self) -> &str {
            "walks"
        }

        fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if ticker == "DEAD" {
                return Err(DataError::SymbolNotFound { symbol: ticker.into() });
            }
            Ok(synthetic::random_walk(ticker, start, end)?)
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[test]
    fn downloads_once_then_reads_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let provider = Walks {
            calls: AtomicUsize::new(0),
        };

        let first = load_history(&["AAPL", "DEAD"], &cache, Some(&provider), None, &opts()).unwrap();
        assert_eq!(first.history.tickers(), vec!["AAPL"]);
        assert_eq!(first.skipped.len(), 1);
        assert_eq!(first.sources["AAPL"], DataSource::YahooFinance);

        let second = load_history(&["AAPL"], &cache, Some(&provider), None, &opts()).unwrap();
        assert_eq!(second.sources["AAPL"], DataSource::Cache);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(first.history.get("AAPL"), second.history.get("AAPL"));
    }

    #[test]
    fn offline_without_cache_fails_unless_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let offline = LoadOptions {
            offline: true,
            ..opts()
        };
        let err = load_history(&["AAPL"], &cache, None, None, &offline).unwrap_err();
        assert!(matches!(err, LoadError::NothingLoaded { requested: 1, offline: true }));

        let synthetic = LoadOptions {
            synthetic: true,
            ..offline
        };
        let loaded = load_history(&["AAPL", "MSFT"], &cache, None, None, &synthetic).unwrap();
        assert!(loaded.has_synthetic);
        assert_eq!(loaded.history.tickers(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn cached_synthetic_bars_stay_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let series = synthetic::random_walk("AAPL", d(2023, 1, 2), d(2024, 12, 31)).unwrap();
        cache.write(&series, DataSource::Synthetic).unwrap();
        let offline = LoadOptions {
            offline: true,
            ..opts()
        };
        let loaded = load_history(&["AAPL"], &cache, None, None, &offline).unwrap();
        assert_eq!(loaded.sources["AAPL"], DataSource::Synthetic);
        assert!(loaded.has_synthetic);
    }

    #[test]
    fn cached_bars_after_the_end_date_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let series = synthetic::random_walk("AAPL", d(2022, 1, 3), d(2025, 6, 30)).unwrap();
        cache.write(&series, DataSource::YahooFinance).unwrap();

        let window = LoadOptions {
            offline: true,
            ..LoadOptions::ending(d(2024, 6, 3), 730)
        };
        let loaded = load_history(&["AAPL"], &cache, None, None, &window).unwrap();
        let aapl = loaded.history.get("AAPL").unwrap();
        assert!(aapl.last_date().unwrap() <= window.end);
        assert!(aapl.first_date().unwrap() >= window.start);
        assert!(aapl.len() < series.len());

        // The same window loads the same bars however far the cache extends.
        let shorter = ParquetCache::new(dir.path().join("short"));
        shorter
            .write(&series.clone().clipped(d(2022, 1, 3), d(2024, 6, 3)), DataSource::YahooFinance)
            .unwrap();
        let again = load_history(&["AAPL"], &shorter, None, None, &window).unwrap();
        assert_eq!(again.history.get("AAPL"), Some(aapl));
        assert_eq!(again.dataset_hash, loaded.dataset_hash);
    }

    #[test]
    fn cache_entirely_outside_the_window_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let series = synthetic::random_walk("AAPL", d(2020, 1, 2), d(2020, 12, 31)).unwrap();
        cache.write(&series, DataSource::YahooFinance).unwrap();
        let offline = LoadOptions {
            offline: true,
            ..opts()
        };
        let err = load_history(&["AAPL"], &cache, None, None, &offline).unwrap_err();
        assert!(matches!(err, LoadError::NothingLoaded { requested: 1, .. }));
    }

    #[test]
    fn empty_universe_loads_nothing_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let loaded = load_history(&[], &cache, None, None, &opts()).unwrap();
        assert!(loaded.history.is_empty());
    }

    #[test]
    fn lookback_window_ends_at_end_date() {
        let o = LoadOptions::ending(d(2025, 1, 1), 730);
        assert_eq!(o.start, d(2023, 1, 2));
    }
}

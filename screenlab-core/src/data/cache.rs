//! Parquet price cache with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/ticker={TICKER}/bars.parquet` plus a `meta.json` sidecar
//! (date range, bar count, BLAKE3 hash of the bars, provenance, write time).
//!
//! Writes are atomic (`.tmp` then rename). A file that fails to load or validate
//! is renamed to `bars.parquet.quarantined` and reported as not cached, so the
//! next run downloads a fresh copy. Only input bars are cached, never results.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::provider::{DataError, DataSource};
use crate::domain::{Bar, PriceSeries};

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: NaiveDateTime,
}

/// How well the cache covers a requested date range.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub ticker: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: Option<usize>,
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn ticker_dir(&self, ticker: &str) -> PathBuf {
        self.cache_dir.join(format!("ticker={ticker}"))
    }

    fn bars_path(&self, ticker: &str) -> PathBuf {
        self.ticker_dir(ticker).join("bars.parquet")
    }

    fn meta_path(&self, ticker: &str) -> PathBuf {
        self.ticker_dir(ticker).join("meta.json")
    }

    /// Replace the cached bars for a ticker.
    pub fn write(&self, series: &PriceSeries, source: DataSource) -> Result<CacheMeta, DataError> {
        let (Some(start_date), Some(end_date)) = (series.first_date(), series.last_date()) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };
        let ticker = series.ticker();
        fs::create_dir_all(self.ticker_dir(ticker))
            .map_err(|e| DataError::CacheError(format!("create dir: {e}")))?;

        let mut df = bars_to_dataframe(series.bars())?;
        let path = self.bars_path(ticker);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let hash_input = serde_json::to_vec(series.bars())
            .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
        let meta = CacheMeta {
            ticker: ticker.to_string(),
            start_date,
            end_date,
            bar_count: series.len(),
            data_hash: blake3::hash(&hash_input).to_hex().to_string(),
            source,
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(ticker), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        debug!(ticker, bars = series.len(), "cached price series");
        Ok(meta)
    }

    /// Load the cached series for a ticker.
    pub fn load(&self, ticker: &str) -> Result<PriceSeries, DataError> {
        let path = self.bars_path(ticker);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                symbol: ticker.to_string(),
            });
        }
        match load_and_validate(ticker, &path) {
            Ok(series) => Ok(series),
            Err(e) => {
                warn!(ticker, path = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(&path, path.with_extension("parquet.quarantined"));
                let _ = fs::remove_file(self.meta_path(ticker));
                Err(DataError::NoCachedData {
                    symbol: ticker.to_string(),
                })
            }
        }
    }

    pub fn get_meta(&self, ticker: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(ticker)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn status(&self, tickers: &[&str]) -> Vec<CacheStatus> {
        tickers
            .iter()
            .map(|ticker| {
                let meta = self.get_meta(ticker);
                CacheStatus {
                    ticker: ticker.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                }
            })
            .collect()
    }

    /// Whether the cached range spans `[start, end]`.
    ///
    /// `end` is compared leniently by callers (markets close on weekends), so this
    /// only reports what the sidecar says.
    pub fn covers_range(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> CoverageResult {
        match self.get_meta(ticker) {
            None => CoverageResult::NotCached,
            Some(meta) if meta.start_date <= start && meta.end_date >= end => CoverageResult::FullyCovered,
            Some(meta) => CoverageResult::PartiallyCovered {
                cached_start: meta.start_date,
                cached_end: meta.end_date,
            },
        }
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    DateTime::UNIX_EPOCH.date_naive()
}

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars.iter().map(|b| (b.date - epoch()).num_days() as i32).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file = fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate(ticker: &str, path: &Path) -> Result<PriceSeries, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }
    for name in COLUMNS {
        if df.column(name).is_err() {
            return Err(DataError::ValidationError(format!("missing column '{name}'")));
        }
    }

    let bars = dataframe_to_bars(&df)?;
    Ok(PriceSeries::new(ticker, bars)?)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let column = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column '{name}': {e}")))
    };
    let typed = |name: &str, e: PolarsError| DataError::ParquetError(format!("{name} column type: {e}"));

    let date_ca = column("date")?.date().map_err(|e| typed("date", e))?;
    let open_ca = column("open")?.f64().map_err(|e| typed("open", e))?;
    let high_ca = column("high")?.f64().map_err(|e| typed("high", e))?;
    let low_ca = column("low")?.f64().map_err(|e| typed("low", e))?;
    let close_ca = column("close")?.f64().map_err(|e| typed("close", e))?;
    let vol_ca = column("volume")?.u64().map_err(|e| typed("volume", e))?;

    let epoch = epoch();
    (0..df.height())
        .map(|i| {
            let days = date_ca
                .get(i)
                .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
            Ok(Bar {
                date: epoch + chrono::Duration::days(days as i64),
                open: open_ca.get(i).unwrap_or(f64::NAN),
                high: high_ca.get(i).unwrap_or(f64::NAN),
                low: low_ca.get(i).unwrap_or(f64::NAN),
                close: close_ca.get(i).unwrap_or(f64::NAN),
                volume: vol_ca.get(i).unwrap_or(0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sample() -> PriceSeries {
        PriceSeries::new(
            "SPY",
            vec![
                Bar {
                    date: d(2),
                    open: 100.0,
                    high: 102.0,
                    low: 99.0,
                    close: 101.0,
                    volume: 1000,
                },
                Bar {
                    date: d(3),
                    open: 101.0,
                    high: 103.0,
                    low: 100.0,
                    close: 102.0,
                    volume: 1100,
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write(&sample(), DataSource::YahooFinance).unwrap();

        let loaded = cache.load("SPY").unwrap();
        assert_eq!(loaded, sample());
        assert!(dir.path().join("ticker=SPY").join("bars.parquet").exists());
    }

    #[test]
    fn meta_sidecar_describes_the_bars() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let written = cache.write(&sample(), DataSource::YahooFinance).unwrap();

        let meta = cache.get_meta("SPY").unwrap();
        assert_eq!(meta, written);
        assert_eq!(meta.bar_count, 2);
        assert_eq!((meta.start_date, meta.end_date), (d(2), d(3)));
        assert_eq!(meta.source, DataSource::YahooFinance);
    }

    #[test]
    fn missing_ticker_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(matches!(cache.load("QQQ"), Err(DataError::NoCachedData { .. })));
        assert_eq!(cache.covers_range("QQQ", d(2), d(3)), CoverageResult::NotCached);
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write(&sample(), DataSource::Cache).unwrap();
        let path = dir.path().join("ticker=SPY").join("bars.parquet");
        fs::write(&path, b"not parquet").unwrap();

        assert!(matches!(cache.load("SPY"), Err(DataError::NoCachedData { .. })));
        assert!(!path.exists());
        assert!(path.with_extension("parquet.quarantined").exists());
        assert!(cache.get_meta("SPY").is_none());
    }

    #[test]
    fn coverage_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write(&sample(), DataSource::YahooFinance).unwrap();

        assert_eq!(cache.covers_range("SPY", d(2), d(3)), CoverageResult::FullyCovered);
        assert_eq!(
            cache.covers_range("SPY", d(1), d(3)),
            CoverageResult::PartiallyCovered {
                cached_start: d(2),
                cached_end: d(3)
            }
        );
        let status = cache.status(&["SPY", "QQQ"]);
        assert!(status[0].cached);
        assert!(!status[1].cached);
    }
}

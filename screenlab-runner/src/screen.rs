//! Screen runner — wires data loading, the pipeline and the report together.
//!
//! Two entry points:
//! - `run_screen()`: loads price history (cache, provider, synthetic), then screens. Used by the CLI.
//! - `screen_loaded()`: screens already-loaded data. Used by tests and benchmarks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use screenlab_core::config::ConfigError;
use screenlab_core::data::{DownloadProgress, FundamentalsSource, ParquetCache, PriceProvider, UniverseError};
use screenlab_core::domain::{DatasetHash, ResultFingerprint, RsRating, ScreenResult, Ticker};
use screenlab_core::reporter::ScreenReporter;
use screenlab_core::{ScreeningPipeline, StageSummary};

use crate::config::RunnerConfig;
use crate::data_loader::{load_history, LoadError, LoadOptions, LoadedData};
use crate::report::ReportError;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("universe error: {0}")]
    Universe(#[from] UniverseError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("fingerprint error: {0}")]
    Fingerprint(#[from] serde_json::Error),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete record of one screen run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenReport {
    pub schema_version: u32,
    /// BLAKE3 over the dataset hash and the effective config.
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub universe_size: usize,
    pub loaded: usize,
    pub skipped: Vec<(Ticker, String)>,
    pub ratings: BTreeMap<Ticker, RsRating>,
    pub technical_survivors: Vec<Ticker>,
    /// Tickers that passed both stages, in universe order.
    pub results: Vec<ScreenResult>,
    pub stage_summaries: Vec<StageSummary>,
    pub fundamentals_source: String,
    pub fundamentals_halted: bool,
    pub dataset_hash: DatasetHash,
    pub result_fingerprint: ResultFingerprint,
    pub has_synthetic: bool,
}

impl ScreenReport {
    pub fn tickers(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.ticker.as_str()).collect()
    }
}

/// Everything `run_screen` needs besides the tickers.
pub struct ScreenSession<'a> {
    pub config: &'a RunnerConfig,
    pub cache: &'a ParquetCache,
    pub prices: Option<&'a dyn PriceProvider>,
    pub fundamentals: &'a dyn FundamentalsSource,
    pub progress: Option<&'a dyn DownloadProgress>,
}

/// Load price history for `tickers` and screen it.
pub fn run_screen(
    session: &ScreenSession<'_>,
    tickers: &[&str],
    opts: &LoadOptions,
    reporter: &dyn ScreenReporter,
) -> Result<ScreenReport, RunError> {
    session.config.validate()?;
    let started_at = Utc::now();
    let loaded = load_history(tickers, session.cache, session.prices, session.progress, opts)?;
    screen_loaded(session.config, tickers.len(), loaded, session.fundamentals, reporter, started_at)
}

/// Screen data that is already in memory.
pub fn screen_loaded(
    config: &RunnerConfig,
    universe_size: usize,
    loaded: LoadedData,
    fundamentals: &dyn FundamentalsSource,
    reporter: &dyn ScreenReporter,
    started_at: DateTime<Utc>,
) -> Result<ScreenReport, RunError> {
    let screen_config = config.screen_config();
    let pipeline = ScreeningPipeline::new(&screen_config);
    let outcome = pipeline.run(&loaded.history, fundamentals, reporter);

    let mut id_hasher = blake3::Hasher::new();
    id_hasher.update(loaded.dataset_hash.0.as_bytes());
    id_hasher.update(&serde_json::to_vec(&screen_config)?);
    let result_fingerprint = outcome.fingerprint()?;

    info!(
        qualifiers = outcome.results.len(),
        survivors = outcome.technical_survivors.len(),
        fingerprint = %result_fingerprint.short(),
        "screen complete"
    );

    Ok(ScreenReport {
        schema_version: SCHEMA_VERSION,
        id: id_hasher.finalize().to_hex().to_string(),
        started_at,
        finished_at: Utc::now(),
        universe_size,
        loaded: loaded.history.len(),
        skipped: loaded.skipped,
        ratings: outcome.ratings.iter().map(|(t, r)| (t.to_string(), r)).collect(),
        technical_survivors: outcome.technical_survivors,
        results: outcome.results,
        stage_summaries: outcome.summaries,
        fundamentals_source: fundamentals.name().to_string(),
        fundamentals_halted: outcome.fundamentals_halted,
        dataset_hash: loaded.dataset_hash,
        result_fingerprint,
        has_synthetic: loaded.has_synthetic,
    })
}

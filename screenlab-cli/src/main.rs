//! screenlab CLI — screen, download, universe and cache commands.
//!
//! Commands:
//! - `screen` — load price history, run both stages, write README and artifacts
//! - `download` — fetch price history from Yahoo Finance and cache as Parquet
//! - `universe` — print the built-in universe as TOML
//! - `cache status` — report cached range and bar count per ticker

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use screenlab_core::data::{
    download_tickers, AlphaVantageSource, CircuitBreaker, EmptySource, FundamentalsSource, Pacer,
    ParquetCache, PriceProvider, StdoutProgress, Universe, YahooProvider,
};
use screenlab_core::TracingReporter;
use screenlab_runner::{
    run_screen, update_readme, write_artifacts, LoadOptions, RunnerConfig, ScreenReport, ScreenSession,
};

use logging::LogFormat;

const API_KEY_VAR: &str = "ALPHAVANTAGE_API_KEY";

#[derive(Parser)]
#[command(name = "screenlab", about = "screenlab CLI — Minervini-style stock screener")]
struct Cli {
    /// Base log level when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the technical and fundamental stages over the universe.
    Screen {
        /// Runner config TOML. Defaults apply when absent.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Universe TOML. Overrides `[run].universe`.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Screen date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Offline mode: cache only, no network access.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Use synthetic data as fallback.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Re-download price history even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// README to update with the results section.
        #[arg(long)]
        readme: Option<PathBuf>,

        /// Overrides `[run].cache_dir`.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Overrides `[run].output_dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Download price history and cache as Parquet.
    Download {
        /// Tickers to download. Defaults to the universe.
        tickers: Vec<String>,

        /// Universe TOML used when no tickers are given.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Start date (YYYY-MM-DD). Defaults to two years before the end.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Force re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        #[arg(long, default_value = "data/cache")]
        cache_dir: PathBuf,
    },
    /// Print the built-in universe as TOML.
    Universe,
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached date range and bar count per universe ticker.
    Status {
        #[arg(long)]
        universe: Option<PathBuf>,

        #[arg(long, default_value = "data/cache")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Screen {
            config,
            universe,
            end,
            offline,
            synthetic,
            force,
            readme,
            cache_dir,
            output_dir,
        } => run_screen_cmd(ScreenArgs {
            config,
            universe,
            end,
            offline,
            synthetic,
            force,
            readme,
            cache_dir,
            output_dir,
        }),
        Commands::Download {
            tickers,
            universe,
            start,
            end,
            force,
            cache_dir,
        } => run_download(tickers, universe, start, end, force, &cache_dir),
        Commands::Universe => {
            print!("{}", Universe::default_us().to_toml()?);
            Ok(())
        }
        Commands::Cache {
            action: CacheAction::Status { universe, cache_dir },
        } => run_cache_status(universe.as_deref(), &cache_dir),
    }
}

struct ScreenArgs {
    config: Option<PathBuf>,
    universe: Option<PathBuf>,
    end: Option<String>,
    offline: bool,
    synthetic: bool,
    force: bool,
    readme: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn end_date(end: Option<&str>) -> Result<NaiveDate> {
    match end {
        Some(s) => parse_date(s),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn load_universe(path: Option<&Path>) -> Result<Universe> {
    match path {
        Some(p) => Universe::from_file(p).with_context(|| format!("loading universe {}", p.display())),
        None => Ok(Universe::default_us()),
    }
}

fn fundamentals_source(config: &RunnerConfig, offline: bool) -> Result<Box<dyn FundamentalsSource>> {
    if offline {
        warn!("offline mode: fundamentals unavailable, no ticker can pass the fundamental stage");
        return Ok(Box::new(EmptySource));
    }
    match std::env::var(API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => {
            let pacer = Arc::new(Pacer::new(config.run.pacing()));
            let breaker = Arc::new(CircuitBreaker::default_provider());
            Ok(Box::new(AlphaVantageSource::new(key.trim(), pacer, breaker)?))
        }
        _ => {
            warn!("{API_KEY_VAR} not set: fundamentals unavailable, no ticker can pass the fundamental stage");
            Ok(Box::new(EmptySource))
        }
    }
}

fn run_screen_cmd(args: ScreenArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))?,
        None => RunnerConfig::default(),
    };
    if let Some(dir) = args.cache_dir {
        config.run.cache_dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.run.output_dir = dir;
    }
    config.validate()?;

    let universe_path = args.universe.or_else(|| config.run.universe.clone());
    let universe = load_universe(universe_path.as_deref())?;
    let tickers = universe.all_tickers();
    info!(tickers = tickers.len(), sectors = universe.sector_names().len(), "universe loaded");

    let opts = LoadOptions {
        offline: args.offline,
        synthetic: args.synthetic,
        force: args.force,
        ..LoadOptions::ending(end_date(args.end.as_deref())?, config.run.lookback_days)
    };

    let cache = ParquetCache::new(&config.run.cache_dir);
    let yahoo = if args.offline {
        None
    } else {
        Some(YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))?)
    };
    let fundamentals = fundamentals_source(&config, args.offline)?;

    let session = ScreenSession {
        config: &config,
        cache: &cache,
        prices: yahoo.as_ref().map(|p| p as &dyn PriceProvider),
        fundamentals: fundamentals.as_ref(),
        progress: None,
    };
    let report = run_screen(&session, &tickers, &opts, &TracingReporter)?;

    print_summary(&report);

    if let Some(readme) = &args.readme {
        update_readme(readme, &report)?;
        println!("README updated: {}", readme.display());
    }
    let paths = write_artifacts(&config.run.output_dir, &report)?;
    println!("Artifacts saved to: {}", config.run.output_dir.display());
    info!(json = %paths.json.display(), csv = %paths.csv.display(), "artifacts written");

    Ok(())
}

fn run_download(
    tickers: Vec<String>,
    universe: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    force: bool,
    cache_dir: &Path,
) -> Result<()> {
    let end_date = end_date(end.as_deref())?;
    let start_date = match start {
        Some(s) => parse_date(&s)?,
        None => LoadOptions::ending(end_date, RunnerConfig::default().run.lookback_days).start,
    };

    let tickers: Vec<String> = if tickers.is_empty() {
        load_universe(universe.as_deref())?
            .all_tickers()
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        tickers.iter().map(|t| t.to_uppercase()).collect()
    };
    let ticker_refs: Vec<&str> = tickers.iter().map(String::as_str).collect();

    let cache = ParquetCache::new(cache_dir);
    let provider = YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))?;

    println!(
        "Downloading {} ticker(s) from {start_date} to {end_date}",
        ticker_refs.len()
    );
    let summary = download_tickers(&provider, &cache, &ticker_refs, start_date, end_date, force, &StdoutProgress);

    if !summary.all_succeeded() {
        for (ticker, err) in &summary.errors {
            warn!(ticker = %ticker, error = %err, "download failed");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_cache_status(universe: Option<&Path>, cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }
    let universe = load_universe(universe)?;
    let cache = ParquetCache::new(cache_dir);
    let rows = cache.status(&universe.all_tickers());
    let cached = rows.iter().filter(|r| r.cached).count();

    println!("Cache: {}", cache_dir.display());
    println!("Cached: {cached}/{}", rows.len());
    println!();
    println!("{:<8} {:<25} {:>10}", "Ticker", "Date Range", "Bars");
    println!("{}", "-".repeat(45));
    for row in &rows {
        let range = match (row.start_date, row.end_date) {
            (Some(s), Some(e)) => format!("{s} to {e}"),
            _ => "(not cached)".to_string(),
        };
        let bars = row.bar_count.map(|n| n.to_string()).unwrap_or_else(|| "-".into());
        println!("{:<8} {:<25} {:>10}", row.ticker, range, bars);
    }
    Ok(())
}

fn print_summary(report: &ScreenReport) {
    println!();
    println!("=== Screen Result ===");
    println!("Universe:       {} ({} loaded)", report.universe_size, report.loaded);
    for (ticker, reason) in &report.skipped {
        println!("Skipped:        {ticker}: {reason}");
    }
    for stage in &report.stage_summaries {
        println!("{:<15} {}/{} passed", format!("{}:", stage.stage), stage.passed, stage.input);
    }
    println!("Fundamentals:   {}", report.fundamentals_source);
    if report.fundamentals_halted {
        println!("WARNING: fundamentals provider halted (rate limit or rejected key)");
    }
    println!();
    if report.results.is_empty() {
        println!("No stocks passed the screen.");
    } else {
        println!("{:<8} {:>4} {:>10} {:>10}", "Ticker", "RS", "Price", "Off High");
        for r in &report.results {
            println!(
                "{:<8} {:>4} {:>10.2} {:>9.2}%",
                r.ticker, r.technical.rs_rating, r.technical.price, r.technical.pct_off_high
            );
        }
    }
    if report.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!("Fingerprint:    {}", report.result_fingerprint.short());
    println!();
}

//! Screen thresholds — named configuration with documented defaults.
//!
//! Every field has a default, so a TOML file only needs to name the thresholds
//! it overrides:
//!
//! ```toml
//! [trend]
//! min_rs_rating = 80
//!
//! [scorecard]
//! min_eps_growth = 30.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::domain::RsRating;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// All thresholds and windows used by the screening engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScreenConfig {
    /// Evaluate technical-stage tickers on the rayon pool.
    pub parallel: bool,
    pub rs: RsConfig,
    pub trend: TrendConfig,
    pub vcp: VcpConfig,
    pub scorecard: ScorecardConfig,
}

/// A momentum horizon: offset in trading periods and its weight in the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Horizon {
    pub periods: usize,
    pub weight: f64,
}

/// Relative strength rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsConfig {
    /// Tickers with fewer bars are excluded from ranking (default 252).
    pub min_history: usize,
    /// Weighted return horizons (default 63/126/189/252 at 0.4/0.2/0.2/0.2).
    pub horizons: Vec<Horizon>,
}

impl Default for RsConfig {
    fn default() -> Self {
        Self {
            min_history: 252,
            horizons: vec![
                Horizon { periods: 63, weight: 0.4 },
                Horizon { periods: 126, weight: 0.2 },
                Horizon { periods: 189, weight: 0.2 },
                Horizon { periods: 252, weight: 0.2 },
            ],
        }
    }
}

/// Trend template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Minimum bars before a ticker is evaluated (default 250).
    pub min_history: usize,
    pub sma_fast: usize,
    pub sma_mid: usize,
    pub sma_slow: usize,
    /// How far back the slow average is compared to confirm it is rising (default 21).
    pub slow_slope_lookback: usize,
    /// Window for the 52-week high/low (default 252).
    pub range_window: usize,
    /// Price must be at least this multiple of the 52-week low (default 1.30).
    pub min_above_low: f64,
    /// Price must be at least this fraction of the 52-week high (default 0.75).
    pub min_of_high: f64,
    pub min_rs_rating: RsRating,
    /// Require a volatility contraction pattern before accepting (default true).
    pub require_vcp: bool,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_history: 250,
            sma_fast: 50,
            sma_mid: 150,
            sma_slow: 200,
            slow_slope_lookback: 21,
            range_window: 252,
            min_above_low: 1.30,
            min_of_high: 0.75,
            min_rs_rating: 70,
            require_vcp: true,
        }
    }
}

/// Volatility contraction pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcpConfig {
    /// Trailing bars examined (default 126).
    pub window: usize,
    /// Latest close must be at least this fraction of the window high (default 0.85).
    pub proximity: f64,
    /// Second-half volatility must be at most this fraction of the first half (default 0.75).
    pub contraction: f64,
    /// Bars in the tight recent range (default 10).
    pub tight_window: usize,
    /// Maximum `(max - min) / mean` over the tight range (default 0.05).
    pub tight_range: f64,
}

impl Default for VcpConfig {
    fn default() -> Self {
        Self {
            window: 126,
            proximity: 0.85,
            contraction: 0.75,
            tight_window: 10,
            tight_range: 0.05,
        }
    }
}

/// Fundamental scorecard. Percent thresholds are in percent units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorecardConfig {
    /// Minimum quarterly reports (default 6).
    pub min_quarters: usize,
    /// Debt/equity must be strictly inside (0, max) (default 0.5).
    pub max_debt_to_equity: f64,
    /// ROE must exceed this, percent (default 15).
    pub min_roe: f64,
    /// Year-over-year sales growth must exceed this, percent (default 20).
    pub min_sales_growth: f64,
    /// Year-over-year EPS growth must exceed this, percent (default 25).
    pub min_eps_growth: f64,
    /// Growth assigned when the year-ago EPS base is zero or negative (default 100).
    pub eps_saturation: f64,
}

impl Default for ScorecardConfig {
    fn default() -> Self {
        Self {
            min_quarters: 6,
            max_debt_to_equity: 0.5,
            min_roe: 15.0,
            min_sales_growth: 20.0,
            min_eps_growth: 25.0,
            eps_saturation: 100.0,
        }
    }
}

impl ScreenConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ScreenConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check windows and thresholds for values the evaluators cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.rs.horizons.is_empty() {
            return invalid("rs.horizons must not be empty");
        }
        if let Some(h) = self.rs.horizons.iter().find(|h| h.periods == 0) {
            return Err(ConfigError::Invalid(format!(
                "rs horizon with weight {} has zero periods",
                h.weight
            )));
        }
        let longest = self.rs.horizons.iter().map(|h| h.periods).max().unwrap_or(0);
        if self.rs.min_history < longest {
            return Err(ConfigError::Invalid(format!(
                "rs.min_history {} is shorter than the longest horizon {longest}",
                self.rs.min_history
            )));
        }

        let t = &self.trend;
        if t.sma_fast == 0 || t.sma_fast >= t.sma_mid || t.sma_mid >= t.sma_slow {
            return invalid("trend SMA periods must satisfy 0 < fast < mid < slow");
        }
        if t.min_history < t.sma_slow + t.slow_slope_lookback {
            return invalid("trend.min_history must cover sma_slow + slow_slope_lookback");
        }
        if t.range_window == 0 || t.slow_slope_lookback == 0 {
            return invalid("trend windows must be positive");
        }
        if t.min_rs_rating > 99 {
            return invalid("trend.min_rs_rating must be at most 99");
        }

        let v = &self.vcp;
        if v.window < 4 || v.tight_window == 0 || v.tight_window > v.window {
            return invalid("vcp windows must satisfy 0 < tight_window <= window and window >= 4");
        }

        if self.scorecard.min_quarters < 6 {
            return invalid("scorecard.min_quarters must be at least 6");
        }

        Ok(())
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(format!("serialize: {e}")))
    }
}

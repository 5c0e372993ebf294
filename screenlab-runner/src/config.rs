//! Runner configuration: where data lives and how a run is paced.
//!
//! One TOML file drives a run. `[run]` holds runner settings; `[screen]` is the
//! core `ScreenConfig` and may name only the thresholds it overrides.
//!
//! ```toml
//! [run]
//! lookback_days = 730
//! pacing_secs = 13
//! cache_dir = "data/cache"
//! output_dir = "output"
//!
//! [screen.trend]
//! min_rs_rating = 80
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use screenlab_core::config::{ConfigError, ScreenConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunnerConfig {
    pub run: RunSettings,
    pub screen: ScreenConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Calendar days of price history to load (default 730, about two years).
    pub lookback_days: i64,
    /// Evaluate the technical stage on the rayon pool. Overrides `[screen].parallel`
    /// when set.
    pub parallel: Option<bool>,
    /// Minimum seconds between fundamentals calls (default 13).
    pub pacing_secs: u64,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Universe TOML; the built-in universe is used when absent.
    pub universe: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            lookback_days: 730,
            parallel: None,
            pacing_secs: 13,
            cache_dir: PathBuf::from("data/cache"),
            output_dir: PathBuf::from("output"),
            universe: None,
        }
    }
}

impl RunSettings {
    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }
}

impl RunnerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // The slowest indicator needs a year of sessions plus the slope lookback.
        if self.run.lookback_days < 365 {
            return Err(ConfigError::Invalid(format!(
                "run.lookback_days must be at least 365, got {}",
                self.run.lookback_days
            )));
        }
        self.screen.validate()
    }

    /// The screen thresholds with runner overrides applied.
    pub fn screen_config(&self) -> ScreenConfig {
        ScreenConfig {
            parallel: self.run.parallel.unwrap_or(self.screen.parallel),
            ..self.screen.clone()
        }
    }
}

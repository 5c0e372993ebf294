//! Universe configuration — sector-organized ticker lists.
//!
//! Stored as TOML, one array of tickers per sector:
//!
//! ```toml
//! [sectors]
//! Technology = ["AAPL", "MSFT"]
//! Healthcare = ["LLY"]
//! ```
//!
//! Universe order is sector name order, then listing order within a sector.
//! That order is the tie-break order for RS ratings, so it must be stable.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_US: [&str; 8] = ["AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "TSLA", "COST", "LLY"];

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    /// A universe with every ticker in one unnamed sector, keeping the given order.
    pub fn from_tickers<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sectors = BTreeMap::new();
        sectors.insert("All".to_string(), tickers.into_iter().map(Into::into).collect());
        Self { sectors }
    }

    /// Every ticker in universe order, first occurrence wins.
    pub fn all_tickers(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.sectors
            .values()
            .flat_map(|tickers| tickers.iter().map(String::as_str))
            .filter(|t| seen.insert(*t))
            .collect()
    }

    pub fn sector_tickers(&self, sector: &str) -> Option<&[String]> {
        self.sectors.get(sector).map(Vec::as_slice)
    }

    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.keys().map(String::as_str).collect()
    }

    /// Distinct tickers.
    pub fn ticker_count(&self) -> usize {
        self.all_tickers().len()
    }

    /// The stock list the screener has always shipped with, in its listing order.
    ///
    /// One sector, so the listing order is the universe order.
    pub fn default_us() -> Self {
        Self::from_tickers(DEFAULT_US)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_universe_keeps_listing_order() {
        let u = Universe::default_us();
        assert_eq!(
            u.all_tickers(),
            vec!["AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "TSLA", "COST", "LLY"]
        );
        assert_eq!(u.sector_names(), vec!["All"]);
    }

    #[test]
    fn toml_roundtrip() {
        let u = Universe::default_us();
        let parsed = Universe::from_toml(&u.to_toml().unwrap()).unwrap();
        assert_eq!(u, parsed);
    }

    #[test]
    fn order_is_sector_then_listing_without_duplicates() {
        let u = Universe::from_toml(
            r#"
            [sectors]
            Tech = ["MSFT", "AAPL"]
            Auto = ["TSLA", "MSFT"]
            "#,
        )
        .unwrap();
        assert_eq!(u.all_tickers(), vec!["TSLA", "MSFT", "AAPL"]);
        assert_eq!(u.ticker_count(), 3);
    }

    #[test]
    fn from_tickers_keeps_order() {
        let u = Universe::from_tickers(["B", "A", "B"]);
        assert_eq!(u.all_tickers(), vec!["B", "A"]);
    }

    #[test]
    fn sector_lookup() {
        let u = Universe::from_toml(
            r#"
            [sectors]
            Technology = ["AAPL", "MSFT"]
            Healthcare = ["LLY"]
            "#,
        )
        .unwrap();
        assert_eq!(u.sector_tickers("Healthcare").unwrap(), ["LLY".to_string()]);
        assert!(u.sector_tickers("Energy").is_none());
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        assert!(matches!(Universe::from_toml("sectors = 3"), Err(UniverseError::Parse(_))));
    }
}

//! Relative Strength rating — percentile rank of weighted multi-horizon momentum.
//!
//! score = Σ weight·r(periods), where r(periods) is the simple return from the close
//! `periods` observations back to the latest close. Scores are ranked across the
//! whole universe, so ratings only mean something inside the cohort they came from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RsConfig;
use crate::domain::{PriceHistory, PriceSeries, RsRating, Ticker};
use crate::error::ScreenError;
use crate::stats;

/// Ratings keyed by ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RsRatings {
    ratings: BTreeMap<Ticker, RsRating>,
}

impl RsRatings {
    pub fn get(&self, ticker: &str) -> Option<RsRating> {
        self.ratings.get(ticker).copied()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.ratings.contains_key(ticker)
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, RsRating)> {
        self.ratings.iter().map(|(t, &r)| (t.as_str(), r))
    }
}

impl FromIterator<(Ticker, RsRating)> for RsRatings {
    fn from_iter<I: IntoIterator<Item = (Ticker, RsRating)>>(iter: I) -> Self {
        Self {
            ratings: iter.into_iter().collect(),
        }
    }
}

/// Convert a rank position (0 = best) into a rating in [1, 99].
///
/// `round(100 * (count - rank) / count)`, clamped.
pub fn percentile_rating(rank: usize, count: usize) -> RsRating {
    stats::percentile_rank(rank, count).round().clamp(1.0, 99.0) as RsRating
}

pub struct RsRatingCalculator {
    config: RsConfig,
}

impl RsRatingCalculator {
    pub fn new(config: RsConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RsConfig::default())
    }

    /// Weighted momentum score for one series.
    pub fn score(&self, series: &PriceSeries) -> Result<f64, ScreenError> {
        if series.len() < self.config.min_history {
            return Err(ScreenError::insufficient(
                self.config.min_history,
                series.len(),
            ));
        }
        let closes = series.closes();
        let mut score = 0.0;
        for horizon in &self.config.horizons {
            score += horizon.weight * stats::return_over(&closes, horizon.periods)?;
        }
        if !score.is_finite() {
            return Err(ScreenError::computation("momentum score is not finite"));
        }
        Ok(score)
    }

    /// Rate every eligible ticker in the universe.
    ///
    /// Tickers that are too short or fail at any horizon are left out; the rest are
    /// still ranked. Equal scores keep universe order. An empty result means no
    /// ticker could be scored.
    pub fn rate(&self, history: &PriceHistory) -> RsRatings {
        let mut scores: Vec<(&str, f64)> = Vec::with_capacity(history.len());
        for series in history.iter() {
            match self.score(series) {
                Ok(score) => scores.push((series.ticker(), score)),
                Err(e) => debug!(ticker = series.ticker(), error = %e, "excluded from RS ranking"),
            }
        }

        if scores.is_empty() {
            info!("no RS scores could be calculated");
            return RsRatings::default();
        }

        scores.sort_by(|a, b| b.1.total_cmp(&a.1));

        let count = scores.len();
        let ratings: RsRatings = scores
            .iter()
            .enumerate()
            .map(|(rank, (ticker, _))| (ticker.to_string(), percentile_rating(rank, count)))
            .collect();

        info!(rated = ratings.len(), universe = history.len(), "calculated RS ratings");
        ratings
    }
}

//! Volatility contraction pattern — price near its highs while volatility dries up.
//!
//! Over the trailing window:
//! 1. latest close ≥ `proximity` × window high;
//! 2. std-dev of daily returns in the second half ≤ `contraction` × the first half;
//! 3. `(max - min) / mean` of the last `tight_window` closes ≤ `tight_range`.
//!
//! Returns are computed over the whole window and split at the midpoint, so the
//! first half holds `(window - 1) / 2` returns and the second half the rest.

use tracing::debug;

use crate::config::VcpConfig;
use crate::domain::PriceSeries;
use crate::error::ScreenError;
use crate::stats;

/// Measurements behind a VCP verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VcpReading {
    pub latest: f64,
    pub window_high: f64,
    pub early_volatility: f64,
    pub late_volatility: f64,
    pub tight_range: f64,
}

pub struct VcpDetector {
    config: VcpConfig,
}

impl VcpDetector {
    pub fn new(config: VcpConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(VcpConfig::default())
    }

    /// Verdict for one series. Short or degenerate series are never a match.
    pub fn detect(&self, series: &PriceSeries) -> bool {
        match self.measure(series) {
            Ok(reading) => {
                let matched = self.matches(&reading);
                if matched {
                    debug!(
                        ticker = series.ticker(),
                        early_vol = reading.early_volatility,
                        late_vol = reading.late_volatility,
                        tight_range = reading.tight_range,
                        "volatility contraction pattern detected"
                    );
                }
                matched
            }
            Err(e) => {
                debug!(ticker = series.ticker(), error = %e, "VCP not evaluable");
                false
            }
        }
    }

    /// Compute the readings the verdict is based on.
    pub fn measure(&self, series: &PriceSeries) -> Result<VcpReading, ScreenError> {
        let c = &self.config;
        if series.len() < c.window {
            return Err(ScreenError::insufficient(c.window, series.len()));
        }
        let closes = series.closes();
        let window = stats::tail(&closes, c.window);

        let latest = stats::value_at_offset(window, 1)?;
        let window_high = stats::max(window)?;

        let returns = stats::pct_returns(window)?;
        let mid = returns.len() / 2;
        let early_volatility = stats::std_dev(&returns[..mid])?;
        let late_volatility = stats::std_dev(&returns[mid..])?;
        if early_volatility <= 0.0 {
            return Err(ScreenError::computation("first-half volatility is zero"));
        }

        let recent = stats::tail(window, c.tight_window);
        let recent_mean = stats::mean(recent)?;
        if recent_mean <= 0.0 {
            return Err(ScreenError::computation("recent mean close is not positive"));
        }
        let tight_range = (stats::max(recent)? - stats::min(recent)?) / recent_mean;

        Ok(VcpReading {
            latest,
            window_high,
            early_volatility,
            late_volatility,
            tight_range,
        })
    }

    fn matches(&self, r: &VcpReading) -> bool {
        let c = &self.config;
        r.latest >= c.proximity * r.window_high
            && r.late_volatility <= c.contraction * r.early_volatility
            && r.tight_range <= c.tight_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> PriceSeries {
        PriceSeries::from_closes("V", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), closes)
    }

    /// Swings of ±`early` in the first half, ±`late` in the second, ending flat near the high.
    fn contracting(n: usize, early: f64, late: f64) -> Vec<f64> {
        let mut closes = Vec::with_capacity(n);
        for i in 0..n {
            let amp = if i < n / 2 { early } else { late };
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            closes.push(100.0 * (1.0 + sign * amp));
        }
        // Settle the last ten bars into a tight band just under the high.
        let top = 100.0 * (1.0 + early);
        for c in closes.iter_mut().skip(n - 10) {
            *c = top * 0.97;
        }
        closes
    }

    #[test]
    fn short_series_is_never_a_match() {
        let closes = contracting(125, 0.05, 0.01);
        assert!(!VcpDetector::with_defaults().detect(&series(&closes)));
    }

    #[test]
    fn contracting_volatility_near_highs_matches() {
        let closes = contracting(126, 0.05, 0.01);
        let detector = VcpDetector::with_defaults();
        let reading = detector.measure(&series(&closes)).unwrap();
        assert!(reading.late_volatility < reading.early_volatility * 0.75);
        assert!(reading.tight_range <= 0.05);
        assert!(detector.detect(&series(&closes)));
    }

    #[test]
    fn expanding_volatility_does_not_match() {
        let closes = contracting(126, 0.01, 0.05);
        assert!(!VcpDetector::with_defaults().detect(&series(&closes)));
    }

    #[test]
    fn flat_series_is_degenerate() {
        let closes = vec![100.0; 200];
        let detector = VcpDetector::with_defaults();
        assert!(matches!(
            detector.measure(&series(&closes)),
            Err(ScreenError::Computation(_))
        ));
        assert!(!detector.detect(&series(&closes)));
    }

    #[test]
    fn zero_price_is_degenerate() {
        let mut closes = contracting(130, 0.05, 0.01);
        closes[60] = 0.0;
        assert!(!VcpDetector::with_defaults().detect(&series(&closes)));
    }

    #[test]
    fn far_below_high_does_not_match() {
        let mut closes = contracting(126, 0.05, 0.01);
        for c in closes.iter_mut().skip(116) {
            *c = 80.0;
        }
        assert!(!VcpDetector::with_defaults().detect(&series(&closes)));
    }
}

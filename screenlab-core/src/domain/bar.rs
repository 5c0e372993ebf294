//! Daily price bar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV observation, as delivered by the price provider.
///
/// The screen only reads closes; the other fields are kept so the cache and
/// fingerprints cover what was actually downloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// A bar whose open, high and low all equal `close`.
    pub fn at_close(date: NaiveDate, close: f64, volume: u64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    /// Provider rows with a missing price come through as NaN.
    pub fn is_void(&self) -> bool {
        [self.open, self.high, self.low, self.close].iter().any(|v| v.is_nan())
    }

    /// Positive prices with the high and low bracketing open and close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() || self.close <= 0.0 || self.open <= 0.0 {
            return false;
        }
        let body_top = self.open.max(self.close);
        let body_bottom = self.open.min(self.close);
        self.high >= body_top && self.low <= body_bottom
    }
}

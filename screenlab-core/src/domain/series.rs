//! Price series and the universe-wide price history.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Bar, Ticker};

/// Errors raised while assembling a price series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("{ticker}: bar at {date} is not after {previous}")]
    NonChronological {
        ticker: Ticker,
        previous: NaiveDate,
        date: NaiveDate,
    },
}

/// Chronologically ordered bars for one ticker.
///
/// Dates are strictly increasing. Missing sessions are simply absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    ticker: Ticker,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series, rejecting bars that are not strictly increasing by date.
    pub fn new(ticker: impl Into<Ticker>, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        let ticker = ticker.into();
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::NonChronological {
                    ticker,
                    previous: pair[0].date,
                    date: pair[1].date,
                });
            }
        }
        Ok(Self { ticker, bars })
    }

    /// Build a series from closes alone, one bar per calendar day from `start`.
    ///
    /// Open/high/low mirror the close. Used by synthetic data and tests.
    pub fn from_closes(ticker: impl Into<Ticker>, start: NaiveDate, closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar::at_close(start + chrono::Duration::days(i as i64), close, 1_000))
            .collect();
        Self {
            ticker: ticker.into(),
            bars,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Close prices in chronological order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// The bars dated within `start..=end`.
    pub fn clipped(self, start: NaiveDate, end: NaiveDate) -> Self {
        let bars = self
            .bars
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect();
        Self {
            ticker: self.ticker,
            bars,
        }
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

/// Price series for a universe, kept in universe order.
///
/// Tickers without data are absent. Iteration order is insertion order, which
/// callers set to the universe order so results stay reproducible.
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    series: Vec<PriceSeries>,
    index: HashMap<Ticker, usize>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series. A second series for the same ticker replaces the first
    /// in place, keeping its original position.
    pub fn insert(&mut self, series: PriceSeries) {
        match self.index.get(series.ticker()) {
            Some(&i) => self.series[i] = series,
            None => {
                self.index.insert(series.ticker.clone(), self.series.len());
                self.series.push(series);
            }
        }
    }

    pub fn get(&self, ticker: &str) -> Option<&PriceSeries> {
        self.index.get(ticker).map(|&i| &self.series[i])
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.index.contains_key(ticker)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceSeries> {
        self.series.iter()
    }

    pub fn as_slice(&self) -> &[PriceSeries] {
        &self.series
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.ticker()).collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl FromIterator<PriceSeries> for PriceHistory {
    fn from_iter<I: IntoIterator<Item = PriceSeries>>(iter: I) -> Self {
        let mut history = PriceHistory::new();
        for series in iter {
            history.insert(series);
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> Bar {
        Bar::at_close(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), close, 100)
    }

    #[test]
    fn accepts_strictly_increasing_dates() {
        let series = PriceSeries::new("AAPL", vec![bar(2, 10.0), bar(3, 11.0), bar(5, 12.0)]).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn rejects_out_of_order_bars() {
        let err = PriceSeries::new("AAPL", vec![bar(3, 10.0), bar(2, 11.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::NonChronological { .. }));
    }

    #[test]
    fn rejects_duplicate_dates() {
        assert!(PriceSeries::new("AAPL", vec![bar(2, 10.0), bar(2, 11.0)]).is_err());
    }

    #[test]
    fn clipping_keeps_only_the_requested_dates() {
        let series = PriceSeries::new("AAPL", vec![bar(2, 10.0), bar(3, 11.0), bar(5, 12.0), bar(8, 13.0)]).unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let clipped = series.clipped(d(3), d(5));
        assert_eq!(clipped.ticker(), "AAPL");
        assert_eq!(clipped.closes(), vec![11.0, 12.0]);
    }

    #[test]
    fn history_keeps_insertion_order_and_replaces_in_place() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut history = PriceHistory::new();
        history.insert(PriceSeries::from_closes("MSFT", start, &[1.0]));
        history.insert(PriceSeries::from_closes("AAPL", start, &[2.0]));
        history.insert(PriceSeries::from_closes("MSFT", start, &[3.0, 4.0]));

        assert_eq!(history.tickers(), vec!["MSFT", "AAPL"]);
        assert_eq!(history.get("MSFT").unwrap().len(), 2);
        assert!(!history.contains("GOOGL"));
    }
}

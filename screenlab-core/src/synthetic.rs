//! Deterministic synthetic price series.
//!
//! Seeds are derived from the ticker with BLAKE3, so the same ticker always gets
//! the same series regardless of how many others are generated or in what order.
//! Used for `--synthetic` runs, tests and benchmarks; results built on these
//! series are tagged as synthetic by the runner.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Bar, PriceSeries, SeriesError};

/// Deterministic seed for `ticker` under `master_seed`.
pub fn seed_for(master_seed: u64, ticker: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&master_seed.to_le_bytes());
    hasher.update(ticker.as_bytes());
    let hash = hasher.finalize();
    let mut first = [0u8; 8];
    first.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(first)
}

/// Weekdays from `start` (inclusive) through `end` (inclusive).
pub fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(current);
        }
        current += Duration::days(1);
    }
    days
}

/// Random walk from 100 with a per-ticker drift, one bar per weekday in `[start, end]`.
pub fn random_walk(ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries, SeriesError> {
    let mut rng = StdRng::seed_from_u64(seed_for(0, ticker));
    let drift: f64 = rng.gen_range(-0.001..0.002);

    let mut price = 100.0_f64;
    let bars = trading_days(start, end)
        .into_iter()
        .map(|date| {
            let daily_return = drift + rng.gen_range(-0.02..0.02);
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000..5_000_000u64);
            price = close;
            Bar {
                date,
                open,
                high,
                low,
                close,
                volume,
            }
        })
        .collect();

    PriceSeries::new(ticker, bars)
}

/// Closes of a textbook leader: a steady advance into a base whose swings
/// shrink from ±4% to ±1%, finishing with ten flat closes near the high.
///
/// Passes the default trend template and VCP check for `n >= 260`.
pub fn leader_closes(n: usize) -> Vec<f64> {
    let base_len = 126.min(n);
    let trend_len = n - base_len;
    let mut closes: Vec<f64> = (0..trend_len)
        .map(|i| 50.0 * 1.004f64.powi(i as i32))
        .collect();
    let top = closes.last().copied().unwrap_or(50.0);
    for i in 0..base_len {
        let amp = if i < base_len / 2 { 0.04 } else { 0.01 };
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        closes.push(top * (1.0 + 0.0008 * i as f64) * (1.0 + sign * amp));
    }
    if n > 10 {
        let settle = closes[n - 11];
        for c in closes.iter_mut().skip(n - 10) {
            *c = settle;
        }
    }
    closes
}

/// A leader series on consecutive calendar days.
pub fn leader(ticker: &str, start: NaiveDate, n: usize) -> PriceSeries {
    PriceSeries::from_closes(ticker, start, &leader_closes(n))
}

/// A constant-price series.
pub fn flat(ticker: &str, start: NaiveDate, n: usize, price: f64) -> PriceSeries {
    PriceSeries::from_closes(ticker, start, &vec![price; n])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn same_ticker_same_series() {
        let a = random_walk("SPY", d(2023, 1, 2), d(2024, 12, 31)).unwrap();
        let b = random_walk("SPY", d(2023, 1, 2), d(2024, 12, 31)).unwrap();
        assert_eq!(a, b);
        let other = random_walk("QQQ", d(2023, 1, 2), d(2024, 12, 31)).unwrap();
        assert_ne!(a.closes(), other.closes());
    }

    #[test]
    fn skips_weekends() {
        // 2024-01-06 is a Saturday.
        let days = trading_days(d(2024, 1, 5), d(2024, 1, 8));
        assert_eq!(days, vec![d(2024, 1, 5), d(2024, 1, 8)]);
    }

    #[test]
    fn bars_are_sane() {
        let series = random_walk("AAPL", d(2024, 1, 1), d(2024, 6, 30)).unwrap();
        assert!(series.bars().iter().all(|b| b.is_sane()));
    }

    #[test]
    fn seeds_depend_on_master_and_ticker() {
        assert_eq!(seed_for(1, "A"), seed_for(1, "A"));
        assert_ne!(seed_for(1, "A"), seed_for(2, "A"));
        assert_ne!(seed_for(1, "A"), seed_for(1, "B"));
    }

    #[test]
    fn leader_has_requested_length() {
        assert_eq!(leader_closes(400).len(), 400);
        assert_eq!(leader_closes(50).len(), 50);
    }
}

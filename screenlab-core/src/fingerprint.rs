//! Run fingerprinting — deterministic identification of inputs and outputs.
//!
//! - `dataset_hash`: content hash of a `PriceHistory` (ticker order, dates, OHLCV).
//! - `result_fingerprint`: hash of the results' canonical JSON, so idempotence of
//!   a run can be checked by comparing two hex strings.

use crate::domain::{DatasetHash, PriceHistory, ResultFingerprint, ScreenResult};

/// Hash every bar in universe order.
pub fn dataset_hash(history: &PriceHistory) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for series in history.iter() {
        hasher.update(series.ticker().as_bytes());
        hasher.update(&[0]);
        for bar in series.bars() {
            hasher.update(bar.date.to_string().as_bytes());
            for v in [bar.open, bar.high, bar.low, bar.close] {
                hasher.update(&v.to_le_bytes());
            }
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

/// Hash of the serialized result set.
pub fn result_fingerprint(results: &[ScreenResult]) -> Result<ResultFingerprint, serde_json::Error> {
    let json = serde_json::to_vec(results)?;
    Ok(ResultFingerprint::from_bytes(&json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PriceSeries, TechnicalMetrics};
    use chrono::NaiveDate;

    fn history(closes: &[f64]) -> PriceHistory {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        std::iter::once(PriceSeries::from_closes("A", start, closes)).collect()
    }

    #[test]
    fn dataset_hash_tracks_content() {
        assert_eq!(dataset_hash(&history(&[1.0, 2.0])), dataset_hash(&history(&[1.0, 2.0])));
        assert_ne!(dataset_hash(&history(&[1.0, 2.0])), dataset_hash(&history(&[1.0, 2.5])));
    }

    #[test]
    fn result_fingerprint_is_stable() {
        let results = vec![ScreenResult::technical(
            "NVDA",
            TechnicalMetrics {
                rs_rating: 97,
                price: 130.0,
                sma50: 120.0,
                sma150: 110.0,
                sma200: 100.0,
                high_52w: 135.0,
                low_52w: 60.0,
                pct_off_high: 3.7,
            },
        )];
        let a = result_fingerprint(&results).unwrap();
        let b = result_fingerprint(&results.clone()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, result_fingerprint(&[]).unwrap());
    }
}

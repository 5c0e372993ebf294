//! Trend template — stacked moving averages, position in the 52-week range,
//! RS strength, then a volatility contraction check.
//!
//! Every criterion is evaluated so a rejection names all of them, not just the
//! first that failed.

use rayon::prelude::*;

use crate::config::{ScreenConfig, TrendConfig, VcpConfig};
use crate::domain::{
    FailureReason, PriceHistory, PriceSeries, Rejection, RsRating, ScreenResult, Stage,
    TechnicalMetrics,
};
use crate::error::ScreenError;
use crate::reporter::ScreenReporter;
use crate::rs_rating::RsRatings;
use crate::stats;
use crate::vcp::VcpDetector;

/// Outcome for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub enum TrendVerdict {
    Pass(ScreenResult),
    Fail(Rejection),
}

/// Template measurements for one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendReading {
    pub price: f64,
    pub sma_fast: f64,
    pub sma_mid: f64,
    pub sma_slow: f64,
    pub sma_slow_earlier: f64,
    pub high: f64,
    pub low: f64,
}

pub struct TrendTemplateEvaluator {
    config: TrendConfig,
    vcp: VcpDetector,
    parallel: bool,
}

impl TrendTemplateEvaluator {
    pub fn new(config: TrendConfig, vcp: VcpConfig) -> Self {
        Self {
            config,
            vcp: VcpDetector::new(vcp),
            parallel: false,
        }
    }

    pub fn from_config(config: &ScreenConfig) -> Self {
        Self::new(config.trend.clone(), config.vcp.clone()).with_parallel(config.parallel)
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Evaluate the universe, returning survivors in universe order.
    ///
    /// Rejections go to `reporter`. Parallel and sequential runs report and
    /// return the same things in the same order.
    pub fn evaluate(
        &self,
        history: &PriceHistory,
        ratings: &RsRatings,
        reporter: &dyn ScreenReporter,
    ) -> Vec<ScreenResult> {
        let evaluate_one = |series: &PriceSeries| {
            self.evaluate_ticker(series, ratings.get(series.ticker()))
        };
        let verdicts: Vec<TrendVerdict> = if self.parallel {
            history.as_slice().par_iter().map(evaluate_one).collect()
        } else {
            history.iter().map(evaluate_one).collect()
        };

        let mut survivors = Vec::new();
        for verdict in verdicts {
            match verdict {
                TrendVerdict::Pass(result) => {
                    reporter.passed(Stage::Technical, &result);
                    survivors.push(result);
                }
                TrendVerdict::Fail(rejection) => reporter.rejected(&rejection),
            }
        }
        survivors
    }

    /// Evaluate one ticker against every criterion.
    pub fn evaluate_ticker(&self, series: &PriceSeries, rating: Option<RsRating>) -> TrendVerdict {
        let c = &self.config;
        let reject = |reasons| TrendVerdict::Fail(Rejection::new(series.ticker(), Stage::Technical, reasons));

        let mut gate = Vec::new();
        if series.len() < c.min_history {
            gate.push(FailureReason::InsufficientHistory {
                required: c.min_history,
                available: series.len(),
            });
        }
        if rating.is_none() {
            gate.push(FailureReason::MissingRsRating);
        }
        let rating = match rating {
            Some(rating) if gate.is_empty() => rating,
            _ => return reject(gate),
        };

        let reading = match self.measure(series) {
            Ok(reading) => reading,
            Err(e) => {
                return reject(vec![FailureReason::Computation {
                    detail: e.to_string(),
                }])
            }
        };

        let mut reasons = self.failed_criteria(&reading, rating);
        if c.require_vcp && !self.vcp.detect(series) {
            reasons.push(FailureReason::NoVolatilityContraction);
        }
        if !reasons.is_empty() {
            return reject(reasons);
        }

        TrendVerdict::Pass(ScreenResult::technical(
            series.ticker(),
            TechnicalMetrics {
                rs_rating: rating,
                price: reading.price,
                sma50: reading.sma_fast,
                sma150: reading.sma_mid,
                sma200: reading.sma_slow,
                high_52w: reading.high,
                low_52w: reading.low,
                pct_off_high: stats::round_to((reading.high - reading.price) / reading.high * 100.0, 2),
            },
        ))
    }

    /// Moving averages and range for a series long enough to be evaluated.
    pub fn measure(&self, series: &PriceSeries) -> Result<TrendReading, ScreenError> {
        let c = &self.config;
        let closes = series.closes();

        let price = stats::value_at_offset(&closes, 1)?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ScreenError::computation(format!("latest close {price} is not usable")));
        }
        let sma_fast = stats::trailing_mean(&closes, c.sma_fast)?;
        let sma_mid = stats::trailing_mean(&closes, c.sma_mid)?;
        let sma_slow = stats::trailing_mean(&closes, c.sma_slow)?;

        // Slow average ending `slow_slope_lookback` observations back (offset convention).
        let earlier_end = closes
            .len()
            .checked_sub(c.slow_slope_lookback.saturating_sub(1))
            .ok_or_else(|| ScreenError::insufficient(c.slow_slope_lookback, closes.len()))?;
        let sma_slow_earlier = stats::trailing_mean(&closes[..earlier_end], c.sma_slow)?;

        let range = stats::tail(&closes, c.range_window);
        let high = stats::max(range)?;
        let low = stats::min(range)?;

        Ok(TrendReading {
            price,
            sma_fast,
            sma_mid,
            sma_slow,
            sma_slow_earlier,
            high,
            low,
        })
    }

    fn failed_criteria(&self, r: &TrendReading, rating: RsRating) -> Vec<FailureReason> {
        let c = &self.config;
        let mut reasons = Vec::new();

        for (period, sma) in [(c.sma_fast, r.sma_fast), (c.sma_mid, r.sma_mid), (c.sma_slow, r.sma_slow)] {
            if r.price <= sma {
                reasons.push(FailureReason::PriceNotAboveSma {
                    period,
                    price: r.price,
                    sma,
                });
            }
        }
        if r.sma_mid <= r.sma_slow {
            reasons.push(FailureReason::SmaNotStacked {
                fast: c.sma_mid,
                slow: c.sma_slow,
                fast_value: r.sma_mid,
                slow_value: r.sma_slow,
            });
        }
        if r.sma_fast <= r.sma_mid {
            reasons.push(FailureReason::SmaNotStacked {
                fast: c.sma_fast,
                slow: c.sma_mid,
                fast_value: r.sma_fast,
                slow_value: r.sma_mid,
            });
        }
        if r.sma_slow <= r.sma_slow_earlier {
            reasons.push(FailureReason::LongAverageNotRising {
                today: r.sma_slow,
                earlier: r.sma_slow_earlier,
            });
        }
        if r.price < c.min_above_low * r.low {
            reasons.push(FailureReason::TooCloseToLow {
                price: r.price,
                low: r.low,
                min_multiple: c.min_above_low,
            });
        }
        if r.price < c.min_of_high * r.high {
            reasons.push(FailureReason::TooFarFromHigh {
                price: r.price,
                high: r.high,
                min_fraction: c.min_of_high,
            });
        }
        if rating < c.min_rs_rating {
            reasons.push(FailureReason::RsRatingTooLow {
                rating,
                min: c.min_rs_rating,
            });
        }
        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use crate::stats::assert_approx;
    use crate::synthetic::leader_closes;
    use chrono::NaiveDate;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
    }

    fn evaluator() -> TrendTemplateEvaluator {
        TrendTemplateEvaluator::new(TrendConfig::default(), VcpConfig::default())
    }

    #[test]
    fn flat_series_fails_trend_criteria() {
        let series = PriceSeries::from_closes("X", start(), &vec![100.0; 300]);
        let TrendVerdict::Fail(rejection) = evaluator().evaluate_ticker(&series, Some(99)) else {
            panic!("flat series must not pass");
        };
        assert!(rejection.has_reason(|r| matches!(r, FailureReason::PriceNotAboveSma { period: 50, .. })));
        assert!(rejection.has_reason(|r| matches!(r, FailureReason::LongAverageNotRising { .. })));
        assert!(rejection.has_reason(|r| matches!(r, FailureReason::TooCloseToLow { .. })));
        assert!(rejection.has_reason(|r| matches!(r, FailureReason::NoVolatilityContraction)));
    }

    #[test]
    fn short_history_and_missing_rating_are_both_named() {
        let series = PriceSeries::from_closes("S", start(), &vec![100.0; 249]);
        let TrendVerdict::Fail(rejection) = evaluator().evaluate_ticker(&series, None) else {
            panic!("short series must not pass");
        };
        assert_eq!(
            rejection.reasons,
            vec![
                FailureReason::InsufficientHistory {
                    required: 250,
                    available: 249
                },
                FailureReason::MissingRsRating,
            ]
        );
    }

    #[test]
    fn uptrend_with_base_passes() {
        let series = PriceSeries::from_closes("LEAD", start(), &leader_closes(400));
        match evaluator().evaluate_ticker(&series, Some(90)) {
            TrendVerdict::Pass(result) => {
                assert!(result.technical_pass);
                assert_eq!(result.rs_rating(), 90);
                let m = &result.technical;
                assert!(m.price > m.sma50 && m.sma50 > m.sma150 && m.sma150 > m.sma200);
                assert!(m.pct_off_high >= 0.0);
            }
            TrendVerdict::Fail(r) => panic!("expected pass, got {}", r.summary()),
        }
    }

    #[test]
    fn low_rs_rating_alone_rejects() {
        let series = PriceSeries::from_closes("LEAD", start(), &leader_closes(400));
        let TrendVerdict::Fail(rejection) = evaluator().evaluate_ticker(&series, Some(69)) else {
            panic!("RS 69 must not pass");
        };
        assert_eq!(
            rejection.reasons,
            vec![FailureReason::RsRatingTooLow { rating: 69, min: 70 }]
        );
    }

    #[test]
    fn vcp_requirement_can_be_disabled() {
        // Straight uptrend: every template criterion holds, but the last ten bars span >5%.
        let closes: Vec<f64> = (0..300).map(|i| 50.0 * (1.006f64).powi(i)).collect();
        let series = PriceSeries::from_closes("UP", start(), &closes);
        assert!(matches!(
            evaluator().evaluate_ticker(&series, Some(80)),
            TrendVerdict::Fail(_)
        ));

        let relaxed = TrendConfig {
            require_vcp: false,
            ..TrendConfig::default()
        };
        let lenient = TrendTemplateEvaluator::new(relaxed, VcpConfig::default());
        assert!(matches!(
            lenient.evaluate_ticker(&series, Some(80)),
            TrendVerdict::Pass(_)
        ));
    }

    #[test]
    fn slow_average_earlier_ends_lookback_bars_back() {
        let closes: Vec<f64> = (1..=260).map(f64::from).collect();
        let series = PriceSeries::from_closes("L", start(), &closes);
        let reading = evaluator().measure(&series).unwrap();
        // Today's SMA200 covers 61..=260; the one ending at index len-21 covers 41..=240.
        assert_approx(reading.sma_slow, 160.5, 1e-9);
        assert_approx(reading.sma_slow_earlier, 140.5, 1e-9);
        assert_eq!(reading.high, 260.0);
        assert_eq!(reading.low, 9.0);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let history: PriceHistory = vec![
            PriceSeries::from_closes("FLAT", start(), &vec![100.0; 300]),
            PriceSeries::from_closes("LEAD", start(), &leader_closes(400)),
            PriceSeries::from_closes("SHORT", start(), &vec![100.0; 10]),
        ]
        .into_iter()
        .collect();
        let ratings: RsRatings = [("LEAD".to_string(), 95u8), ("FLAT".to_string(), 50u8)]
            .into_iter()
            .collect();

        let seq_reporter = CollectingReporter::new();
        let par_reporter = CollectingReporter::new();
        let seq = evaluator().evaluate(&history, &ratings, &seq_reporter);
        let par = evaluator()
            .with_parallel(true)
            .evaluate(&history, &ratings, &par_reporter);

        assert_eq!(seq, par);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq[0].ticker, "LEAD");
        assert_eq!(seq_reporter.rejections(), par_reporter.rejections());
        let rejected: Vec<_> = seq_reporter.rejections().into_iter().map(|r| r.ticker).collect();
        assert_eq!(rejected, vec!["FLAT", "SHORT"]);
    }

    #[test]
    fn degenerate_series_is_isolated_from_the_leader() {
        let mut zero_last = vec![100.0; 300];
        zero_last[299] = 0.0;
        let mut nan_in_window = vec![100.0; 300];
        nan_in_window[280] = f64::NAN;
        let history: PriceHistory = vec![
            PriceSeries::from_closes("ZERO", start(), &zero_last),
            PriceSeries::from_closes("LEAD", start(), &leader_closes(400)),
            PriceSeries::from_closes("GAP", start(), &nan_in_window),
        ]
        .into_iter()
        .collect();
        let ratings: RsRatings = [
            ("ZERO".to_string(), 90u8),
            ("LEAD".to_string(), 95u8),
            ("GAP".to_string(), 80u8),
        ]
        .into_iter()
        .collect();

        for parallel in [false, true] {
            let reporter = CollectingReporter::new();
            let survivors = evaluator()
                .with_parallel(parallel)
                .evaluate(&history, &ratings, &reporter);
            let tickers: Vec<_> = survivors.iter().map(|r| r.ticker.as_str()).collect();
            assert_eq!(tickers, vec!["LEAD"]);

            let rejected: Vec<_> = reporter.rejections().into_iter().map(|r| r.ticker).collect();
            assert_eq!(rejected, vec!["ZERO", "GAP"]);
            for ticker in ["ZERO", "GAP"] {
                let rejection = reporter.rejection_for(ticker).unwrap();
                assert_eq!(rejection.stage, Stage::Technical);
                assert!(matches!(
                    rejection.reasons.as_slice(),
                    [FailureReason::Computation { .. }]
                ));
            }
        }
    }
}

//! Screen outcomes: passing records and named rejection reasons.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RsRating, Ticker};

/// Pipeline stage that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Technical,
    Fundamental,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Technical => write!(f, "technical"),
            Stage::Fundamental => write!(f, "fundamental"),
        }
    }
}

/// Metrics computed by the trend template for a passing ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalMetrics {
    pub rs_rating: RsRating,
    pub price: f64,
    pub sma50: f64,
    pub sma150: f64,
    pub sma200: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    /// Distance below the 52-week high, in percent.
    pub pct_off_high: f64,
}

/// Metrics computed by the fundamental scorecard, rounded for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalMetrics {
    pub roe: f64,
    pub debt_to_equity: f64,
    pub sales_growth_now: f64,
    pub sales_growth_prev: f64,
    pub eps_growth_now: f64,
    pub eps_growth_prev: f64,
    pub npm_now: f64,
    pub npm_prev: f64,
}

/// Per-ticker screen record.
///
/// Created by the technical stage for survivors; the fundamental stage fills in
/// `fundamental` and flips `fundamental_pass` for tickers that pass the scorecard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenResult {
    pub ticker: Ticker,
    pub technical_pass: bool,
    pub fundamental_pass: bool,
    pub technical: TechnicalMetrics,
    pub fundamental: Option<FundamentalMetrics>,
}

impl ScreenResult {
    pub fn technical(ticker: impl Into<Ticker>, metrics: TechnicalMetrics) -> Self {
        Self {
            ticker: ticker.into(),
            technical_pass: true,
            fundamental_pass: false,
            technical: metrics,
            fundamental: None,
        }
    }

    /// Attach scorecard metrics, marking the fundamental stage as passed.
    pub fn with_fundamentals(mut self, metrics: FundamentalMetrics) -> Self {
        self.fundamental_pass = true;
        self.fundamental = Some(metrics);
        self
    }

    pub fn rs_rating(&self) -> RsRating {
        self.technical.rs_rating
    }
}

/// A named criterion that a ticker failed, with the value that failed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "criterion", rename_all = "snake_case")]
pub enum FailureReason {
    InsufficientHistory { required: usize, available: usize },
    MissingRsRating,
    PriceNotAboveSma { period: usize, price: f64, sma: f64 },
    SmaNotStacked { fast: usize, slow: usize, fast_value: f64, slow_value: f64 },
    LongAverageNotRising { today: f64, earlier: f64 },
    TooCloseToLow { price: f64, low: f64, min_multiple: f64 },
    TooFarFromHigh { price: f64, high: f64, min_fraction: f64 },
    RsRatingTooLow { rating: RsRating, min: RsRating },
    NoVolatilityContraction,
    FundamentalsUnavailable,
    InsufficientQuarters { required: usize, available: usize },
    Leverage { debt_to_equity: Option<f64>, max: f64 },
    Roe { roe: Option<f64>, min: f64 },
    SalesGrowth { growth: f64, min: f64 },
    SalesAcceleration { now: f64, prev: f64 },
    EpsGrowth { growth: f64, min: f64 },
    EpsAcceleration { now: f64, prev: f64 },
    MarginExpansion { now: f64, prev: f64 },
    Computation { detail: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FailureReason::*;
        match self {
            InsufficientHistory {
                required,
                available,
            } => write!(f, "insufficient price history ({available} < {required} periods)"),
            MissingRsRating => write!(f, "no RS rating"),
            PriceNotAboveSma { period, price, sma } => {
                write!(f, "price {price:.2} not above SMA{period} {sma:.2}")
            }
            SmaNotStacked {
                fast,
                slow,
                fast_value,
                slow_value,
            } => write!(
                f,
                "SMA{fast} {fast_value:.2} not above SMA{slow} {slow_value:.2}"
            ),
            LongAverageNotRising { today, earlier } => {
                write!(f, "SMA200 not rising ({today:.2} <= {earlier:.2})")
            }
            TooCloseToLow {
                price,
                low,
                min_multiple,
            } => write!(
                f,
                "price {price:.2} below {min_multiple:.2}x 52-week low {low:.2}"
            ),
            TooFarFromHigh {
                price,
                high,
                min_fraction,
            } => write!(
                f,
                "price {price:.2} below {min_fraction:.2}x 52-week high {high:.2}"
            ),
            RsRatingTooLow { rating, min } => write!(f, "RS rating {rating} < {min}"),
            NoVolatilityContraction => write!(f, "no volatility contraction pattern"),
            FundamentalsUnavailable => write!(f, "fundamentals unavailable"),
            InsufficientQuarters {
                required,
                available,
            } => write!(
                f,
                "insufficient quarterly history ({available} < {required} quarters)"
            ),
            Leverage {
                debt_to_equity: Some(de),
                max,
            } => write!(f, "D/E={de:.2} outside (0, {max})"),
            Leverage {
                debt_to_equity: None,
                ..
            } => write!(f, "D/E unavailable"),
            Roe { roe: Some(roe), min } => write!(f, "ROE={roe:.2}% <= {min}%"),
            Roe { roe: None, .. } => write!(f, "ROE unavailable"),
            SalesGrowth { growth, min } => write!(f, "sales growth {growth:.1}% <= {min}%"),
            SalesAcceleration { now, prev } => {
                write!(f, "sales not accelerating ({now:.1}% <= {prev:.1}%)")
            }
            EpsGrowth { growth, min } => write!(f, "EPS growth {growth:.1}% <= {min}%"),
            EpsAcceleration { now, prev } => {
                write!(f, "EPS not accelerating ({now:.1}% <= {prev:.1}%)")
            }
            MarginExpansion { now, prev } => {
                write!(f, "net margin not expanding ({now:.4} <= {prev:.4})")
            }
            Computation { detail } => write!(f, "computation error: {detail}"),
        }
    }
}

/// A ticker dropped by a stage, with every criterion it failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub ticker: Ticker,
    pub stage: Stage,
    pub reasons: Vec<FailureReason>,
}

impl Rejection {
    pub fn new(ticker: impl Into<Ticker>, stage: Stage, reasons: Vec<FailureReason>) -> Self {
        Self {
            ticker: ticker.into(),
            stage,
            reasons,
        }
    }

    /// Reasons joined into one line for logs.
    pub fn summary(&self) -> String {
        self.reasons
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn has_reason(&self, pred: impl Fn(&FailureReason) -> bool) -> bool {
        self.reasons.iter().any(pred)
    }
}

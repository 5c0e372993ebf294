//! Domain types for screenlab

pub mod bar;
pub mod fundamentals;
pub mod ids;
pub mod result;
pub mod series;

pub use bar::Bar;
pub use fundamentals::{FundamentalsRecord, QuarterlyReport};
pub use ids::{DatasetHash, ResultFingerprint};
pub use result::{FailureReason, FundamentalMetrics, Rejection, ScreenResult, Stage, TechnicalMetrics};
pub use series::{PriceHistory, PriceSeries, SeriesError};

/// Ticker type alias
pub type Ticker = String;

/// Percentile momentum rating in [1, 99], relative to the cohort it was ranked in.
pub type RsRating = u8;

//! screenlab core — momentum ratings, trend template, VCP and fundamental scorecard.
//!
//! This crate contains the screening engine:
//! - Domain types (bars, price series, fundamentals, results, rejections)
//! - Cross-sectional RS rating over the whole universe
//! - Trend template evaluation with a volatility-contraction check
//! - Fundamental scorecard for technical survivors
//! - The two-stage pipeline that wires them together
//! - Data collaborators (providers, cache, universe) behind traits
//!
//! Nothing here decides where data comes from; runners build a `PriceHistory`
//! and hand it to `ScreeningPipeline::run` with a `FundamentalsSource`.

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod reporter;
pub mod rs_rating;
pub mod scorecard;
pub mod stats;
pub mod synthetic;
pub mod trend_template;
pub mod vcp;

pub use config::{ConfigError, ScreenConfig};
pub use error::ScreenError;
pub use pipeline::{PipelineOutcome, PipelineState, ScreeningPipeline, StageSummary};
pub use reporter::{ScreenReporter, TracingReporter};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the runner shares across rayon workers is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::PriceHistory>();
        require_sync::<domain::PriceHistory>();
        require_send::<domain::FundamentalsRecord>();
        require_sync::<domain::FundamentalsRecord>();
        require_send::<domain::ScreenResult>();
        require_sync::<domain::ScreenResult>();
        require_send::<domain::Rejection>();
        require_sync::<domain::Rejection>();

        // Engine types
        require_send::<rs_rating::RsRatingCalculator>();
        require_sync::<rs_rating::RsRatingCalculator>();
        require_send::<rs_rating::RsRatings>();
        require_sync::<rs_rating::RsRatings>();
        require_send::<trend_template::TrendTemplateEvaluator>();
        require_sync::<trend_template::TrendTemplateEvaluator>();
        require_send::<vcp::VcpDetector>();
        require_sync::<vcp::VcpDetector>();
        require_send::<scorecard::FundamentalScorecardEvaluator>();
        require_sync::<scorecard::FundamentalScorecardEvaluator>();
        require_send::<pipeline::ScreeningPipeline>();
        require_sync::<pipeline::ScreeningPipeline>();
        require_send::<pipeline::PipelineOutcome>();
        require_sync::<pipeline::PipelineOutcome>();

        // Collaborators
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
        require_send::<data::Pacer>();
        require_sync::<data::Pacer>();
        require_send::<reporter::CollectingReporter>();
        require_sync::<reporter::CollectingReporter>();
    }

    /// The evaluators only ever see prices: fundamentals enter through the pipeline.
    #[test]
    fn trend_template_takes_no_fundamentals() {
        fn _check(
            evaluator: &trend_template::TrendTemplateEvaluator,
            series: &domain::PriceSeries,
        ) -> trend_template::TrendVerdict {
            evaluator.evaluate_ticker(series, None)
        }
    }

    #[test]
    fn reporter_is_object_safe() {
        fn _check(reporter: &dyn ScreenReporter, rejection: &domain::Rejection) {
            reporter.rejected(rejection);
        }
    }
}

//! Screening pipeline — `Idle → TechnicalStage → FundamentalStage → Done`.
//!
//! The technical stage ranks the whole universe (a full barrier) and runs the
//! trend template. The fundamental stage pulls records for survivors only, one at
//! a time, and always completes: a source that rate-limits us or rejects our
//! credentials stops being called and the remaining survivors are reported as
//! unavailable.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ScreenConfig;
use crate::data::provider::FundamentalsSource;
use crate::domain::{PriceHistory, ResultFingerprint, ScreenResult, Stage, Ticker};
use crate::error::ScreenError;
use crate::fingerprint;
use crate::reporter::ScreenReporter;
use crate::rs_rating::{RsRatingCalculator, RsRatings};
use crate::scorecard::FundamentalScorecardEvaluator;
use crate::trend_template::TrendTemplateEvaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    TechnicalStage,
    FundamentalStage,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::TechnicalStage => "technical",
            PipelineState::FundamentalStage => "fundamental",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Funnel counts for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub input: usize,
    pub passed: usize,
}

impl StageSummary {
    pub fn new(stage: Stage, input: usize, passed: usize) -> Self {
        Self {
            stage,
            input,
            passed,
        }
    }

    pub fn eliminated(&self) -> usize {
        self.input.saturating_sub(self.passed)
    }

    /// Share of the input dropped by this stage, in percent.
    pub fn elimination_rate(&self) -> f64 {
        if self.input == 0 {
            0.0
        } else {
            self.eliminated() as f64 / self.input as f64 * 100.0
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// Tickers that passed both stages, in universe order.
    pub results: Vec<ScreenResult>,
    pub ratings: RsRatings,
    /// Tickers that survived the technical stage, in universe order.
    pub technical_survivors: Vec<Ticker>,
    pub summaries: Vec<StageSummary>,
    pub visited: Vec<PipelineState>,
    /// No ticker could be RS-rated.
    pub universe_empty: bool,
    /// The fundamentals source rate-limited us or rejected our credentials partway through.
    pub fundamentals_halted: bool,
}

impl PipelineOutcome {
    pub fn fingerprint(&self) -> Result<ResultFingerprint, serde_json::Error> {
        fingerprint::result_fingerprint(&self.results)
    }

    pub fn summary(&self, stage: Stage) -> Option<&StageSummary> {
        self.summaries.iter().find(|s| s.stage == stage)
    }
}

pub struct ScreeningPipeline {
    rs: RsRatingCalculator,
    trend: TrendTemplateEvaluator,
    scorecard: FundamentalScorecardEvaluator,
}

impl ScreeningPipeline {
    pub fn new(config: &ScreenConfig) -> Self {
        Self {
            rs: RsRatingCalculator::new(config.rs.clone()),
            trend: TrendTemplateEvaluator::from_config(config),
            scorecard: FundamentalScorecardEvaluator::from_config(config),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&ScreenConfig::default())
    }

    /// Run both stages over `history`.
    pub fn run(
        &self,
        history: &PriceHistory,
        source: &dyn FundamentalsSource,
        reporter: &dyn ScreenReporter,
    ) -> PipelineOutcome {
        let mut outcome = PipelineOutcome {
            results: Vec::new(),
            ratings: RsRatings::default(),
            technical_survivors: Vec::new(),
            summaries: Vec::new(),
            visited: vec![PipelineState::Idle],
            universe_empty: false,
            fundamentals_halted: false,
        };

        outcome.visited.push(PipelineState::TechnicalStage);
        info!(universe = history.len(), "technical stage started");
        outcome.ratings = self.rs.rate(history);
        if outcome.ratings.is_empty() {
            info!("{}", ScreenError::UniverseEmpty);
            outcome.universe_empty = true;
            self.finish_stage(&mut outcome, StageSummary::new(Stage::Technical, history.len(), 0), reporter);
            outcome.visited.push(PipelineState::Done);
            return outcome;
        }

        let survivors = self.trend.evaluate(history, &outcome.ratings, reporter);
        outcome.technical_survivors = survivors.iter().map(|r| r.ticker.clone()).collect();
        self.finish_stage(
            &mut outcome,
            StageSummary::new(Stage::Technical, history.len(), survivors.len()),
            reporter,
        );
        if survivors.is_empty() {
            info!("no technical survivors, skipping fundamentals");
            outcome.visited.push(PipelineState::Done);
            return outcome;
        }

        outcome.visited.push(PipelineState::FundamentalStage);
        info!(survivors = survivors.len(), source = source.name(), "fundamental stage started");
        let input = survivors.len();
        for survivor in survivors {
            let record = if outcome.fundamentals_halted {
                None
            } else {
                match source.fundamentals(&survivor.ticker) {
                    Ok(record) => record,
                    Err(e) if e.halts_source() => {
                        warn!(ticker = %survivor.ticker, error = %e, "fundamentals source halted");
                        outcome.fundamentals_halted = true;
                        None
                    }
                    Err(e) => {
                        warn!(ticker = %survivor.ticker, error = %e, "fundamentals fetch failed");
                        None
                    }
                }
            };

            match self.scorecard.evaluate(survivor, record.as_ref()) {
                Ok(result) => {
                    reporter.passed(Stage::Fundamental, &result);
                    outcome.results.push(result);
                }
                Err(rejection) => reporter.rejected(&rejection),
            }
        }
        let passed = outcome.results.len();
        self.finish_stage(&mut outcome, StageSummary::new(Stage::Fundamental, input, passed), reporter);

        outcome.visited.push(PipelineState::Done);
        info!(qualifiers = outcome.results.len(), "screen complete");
        outcome
    }

    fn finish_stage(&self, outcome: &mut PipelineOutcome, summary: StageSummary, reporter: &dyn ScreenReporter) {
        reporter.stage_complete(&summary);
        outcome.summaries.push(summary);
    }
}

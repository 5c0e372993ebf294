//! Injectable sink for per-ticker verdicts and stage summaries.
//!
//! Evaluators call the reporter sequentially in universe order after a stage has
//! collected its verdicts, so a collecting reporter sees a deterministic sequence.

use std::sync::Mutex;

use tracing::{debug, info};

use crate::domain::{Rejection, ScreenResult, Stage};
use crate::pipeline::StageSummary;

pub trait ScreenReporter: Send + Sync {
    /// A ticker survived `stage`.
    fn passed(&self, stage: Stage, result: &ScreenResult);

    /// A ticker was dropped, with every criterion it failed.
    fn rejected(&self, rejection: &Rejection);

    /// A stage finished.
    fn stage_complete(&self, _summary: &StageSummary) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ScreenReporter for NullReporter {
    fn passed(&self, _stage: Stage, _result: &ScreenResult) {}
    fn rejected(&self, _rejection: &Rejection) {}
}

/// Emits `tracing` events: passes at info, rejections at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ScreenReporter for TracingReporter {
    fn passed(&self, stage: Stage, result: &ScreenResult) {
        info!(
            %stage,
            ticker = %result.ticker,
            rs = result.rs_rating(),
            "passed"
        );
    }

    fn rejected(&self, rejection: &Rejection) {
        debug!(
            stage = %rejection.stage,
            ticker = %rejection.ticker,
            reasons = %rejection.summary(),
            "rejected"
        );
    }

    fn stage_complete(&self, summary: &StageSummary) {
        info!(
            stage = %summary.stage,
            input = summary.input,
            passed = summary.passed,
            eliminated = summary.eliminated(),
            "stage complete"
        );
    }
}

/// Keeps everything it is told, for tests and report rendering.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Collected>,
}

#[derive(Debug, Default, Clone)]
pub struct Collected {
    pub passes: Vec<(Stage, String)>,
    pub rejections: Vec<Rejection>,
    pub summaries: Vec<StageSummary>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn collected(&self) -> Collected {
        self.lock().clone()
    }

    pub fn rejections(&self) -> Vec<Rejection> {
        self.lock().rejections.clone()
    }

    /// The rejection recorded for `ticker`, if any.
    pub fn rejection_for(&self, ticker: &str) -> Option<Rejection> {
        self.lock()
            .rejections
            .iter()
            .find(|r| r.ticker == ticker)
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collected> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ScreenReporter for CollectingReporter {
    fn passed(&self, stage: Stage, result: &ScreenResult) {
        self.lock().passes.push((stage, result.ticker.clone()));
    }

    fn rejected(&self, rejection: &Rejection) {
        self.lock().rejections.push(rejection.clone());
    }

    fn stage_complete(&self, summary: &StageSummary) {
        self.lock().summaries.push(summary.clone());
    }
}

/// Forwards every event to two reporters.
pub struct TeeReporter<'a> {
    first: &'a dyn ScreenReporter,
    second: &'a dyn ScreenReporter,
}

impl<'a> TeeReporter<'a> {
    pub fn new(first: &'a dyn ScreenReporter, second: &'a dyn ScreenReporter) -> Self {
        Self { first, second }
    }
}

impl ScreenReporter for TeeReporter<'_> {
    fn passed(&self, stage: Stage, result: &ScreenResult) {
        self.first.passed(stage, result);
        self.second.passed(stage, result);
    }

    fn rejected(&self, rejection: &Rejection) {
        self.first.rejected(rejection);
        self.second.rejected(rejection);
    }

    fn stage_complete(&self, summary: &StageSummary) {
        self.first.stage_complete(summary);
        self.second.stage_complete(summary);
    }
}

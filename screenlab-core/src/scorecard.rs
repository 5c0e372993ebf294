//! Fundamental scorecard — leverage, profitability, growth and acceleration.
//!
//! Seven checks, all required:
//! `leverage`, `roe`, `sales`, `sales_accel`, `eps`, `eps_accel`, `margin`.
//! Growth is year-over-year on quarterly data: quarter 0 against quarter 4 for the
//! current reading, quarter 1 against quarter 5 for the prior one. Net income
//! stands in for EPS.

use crate::config::{ScorecardConfig, ScreenConfig};
use crate::domain::{
    FailureReason, FundamentalMetrics, FundamentalsRecord, Rejection, ScreenResult, Stage,
};
use crate::error::ScreenError;
use crate::stats::round_to;

/// Unrounded scorecard inputs for one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorecardReading {
    pub roe: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub sales_growth_now: f64,
    pub sales_growth_prev: f64,
    pub eps_growth_now: f64,
    pub eps_growth_prev: f64,
    pub npm_now: f64,
    pub npm_prev: f64,
}

pub struct FundamentalScorecardEvaluator {
    config: ScorecardConfig,
}

impl FundamentalScorecardEvaluator {
    pub fn new(config: ScorecardConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &ScreenConfig) -> Self {
        Self::new(config.scorecard.clone())
    }

    /// Score a technical survivor. `None` means the record could not be obtained.
    pub fn evaluate(
        &self,
        survivor: ScreenResult,
        record: Option<&FundamentalsRecord>,
    ) -> Result<ScreenResult, Rejection> {
        let ticker = survivor.ticker.clone();
        let reject = |reasons| Rejection::new(ticker, Stage::Fundamental, reasons);
        let Some(record) = record else {
            return Err(reject(vec![FailureReason::FundamentalsUnavailable]));
        };
        match self.score(record) {
            Ok(metrics) => Ok(survivor.with_fundamentals(metrics)),
            Err(reasons) => Err(reject(reasons)),
        }
    }

    /// Apply every check, returning rounded metrics or the list of failed checks.
    pub fn score(&self, record: &FundamentalsRecord) -> Result<FundamentalMetrics, Vec<FailureReason>> {
        let c = &self.config;
        let reading = self.measure(record).map_err(|e| match e {
            ScreenError::DataInsufficient {
                required,
                available,
            } => vec![FailureReason::InsufficientQuarters {
                required,
                available,
            }],
            other => vec![FailureReason::Computation {
                detail: other.to_string(),
            }],
        })?;

        let mut reasons = Vec::new();
        let leverage_ok = matches!(reading.debt_to_equity, Some(de) if de > 0.0 && de < c.max_debt_to_equity);
        if !leverage_ok {
            reasons.push(FailureReason::Leverage {
                debt_to_equity: reading.debt_to_equity,
                max: c.max_debt_to_equity,
            });
        }
        if !matches!(reading.roe, Some(roe) if roe > c.min_roe) {
            reasons.push(FailureReason::Roe {
                roe: reading.roe,
                min: c.min_roe,
            });
        }
        if reading.sales_growth_now <= c.min_sales_growth {
            reasons.push(FailureReason::SalesGrowth {
                growth: reading.sales_growth_now,
                min: c.min_sales_growth,
            });
        }
        if reading.sales_growth_now <= reading.sales_growth_prev {
            reasons.push(FailureReason::SalesAcceleration {
                now: reading.sales_growth_now,
                prev: reading.sales_growth_prev,
            });
        }
        if reading.eps_growth_now <= c.min_eps_growth {
            reasons.push(FailureReason::EpsGrowth {
                growth: reading.eps_growth_now,
                min: c.min_eps_growth,
            });
        }
        if reading.eps_growth_now <= reading.eps_growth_prev {
            reasons.push(FailureReason::EpsAcceleration {
                now: reading.eps_growth_now,
                prev: reading.eps_growth_prev,
            });
        }
        if reading.npm_now <= reading.npm_prev {
            reasons.push(FailureReason::MarginExpansion {
                now: reading.npm_now,
                prev: reading.npm_prev,
            });
        }

        if !reasons.is_empty() {
            return Err(reasons);
        }
        Ok(FundamentalMetrics {
            roe: round_to(reading.roe.unwrap_or_default(), 2),
            debt_to_equity: round_to(reading.debt_to_equity.unwrap_or_default(), 2),
            sales_growth_now: round_to(reading.sales_growth_now, 1),
            sales_growth_prev: round_to(reading.sales_growth_prev, 1),
            eps_growth_now: round_to(reading.eps_growth_now, 1),
            eps_growth_prev: round_to(reading.eps_growth_prev, 1),
            npm_now: round_to(reading.npm_now, 4),
            npm_prev: round_to(reading.npm_prev, 4),
        })
    }

    /// Compute the raw inputs. Fewer than `min_quarters` reports is `DataInsufficient`.
    pub fn measure(&self, record: &FundamentalsRecord) -> Result<ScorecardReading, ScreenError> {
        let quarters = record.quarter_count();
        if quarters < self.config.min_quarters {
            return Err(ScreenError::insufficient(self.config.min_quarters, quarters));
        }
        let rev = |i: usize| record.revenue(i).ok_or_else(|| ScreenError::insufficient(i + 1, quarters));
        let ni = |i: usize| record.net_income(i).ok_or_else(|| ScreenError::insufficient(i + 1, quarters));

        let roe = match (record.ttm_net_income(), record.stockholder_equity) {
            (Some(ttm), Some(equity)) if equity > 0.0 => Some(ttm / equity * 100.0).filter(|r| r.is_finite()),
            _ => None,
        };

        Ok(ScorecardReading {
            roe,
            debt_to_equity: record.debt_to_equity.filter(|de| de.is_finite()),
            sales_growth_now: sales_growth(rev(0)?, rev(4)?)?,
            sales_growth_prev: sales_growth(rev(1)?, rev(5)?)?,
            eps_growth_now: self.eps_growth(ni(0)?, ni(4)?)?,
            eps_growth_prev: self.eps_growth(ni(1)?, ni(5)?)?,
            npm_now: net_margin(ni(0)?, rev(0)?),
            npm_prev: net_margin(ni(1)?, rev(1)?),
        })
    }

    /// YoY net income growth in percent, saturating when the base is not positive.
    fn eps_growth(&self, current: f64, year_ago: f64) -> Result<f64, ScreenError> {
        if !current.is_finite() || !year_ago.is_finite() {
            return Err(ScreenError::computation("net income is not finite"));
        }
        if year_ago <= 0.0 {
            let s = self.config.eps_saturation;
            return Ok(if current > 0.0 { s } else { -s });
        }
        Ok((current / year_ago - 1.0) * 100.0)
    }
}

/// YoY revenue growth in percent. A non-positive base cannot be compared.
fn sales_growth(current: f64, year_ago: f64) -> Result<f64, ScreenError> {
    if year_ago.is_nan() || year_ago <= 0.0 {
        return Err(ScreenError::computation(format!(
            "year-ago revenue {year_ago} is not a usable growth base"
        )));
    }
    let growth = (current / year_ago - 1.0) * 100.0;
    if !growth.is_finite() {
        return Err(ScreenError::computation("sales growth is not finite"));
    }
    Ok(growth)
}

fn net_margin(net_income: f64, revenue: f64) -> f64 {
    if revenue > 0.0 && net_income.is_finite() {
        net_income / revenue
    } else {
        0.0
    }
}

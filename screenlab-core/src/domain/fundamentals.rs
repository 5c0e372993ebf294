//! Canonical fundamentals snapshot consumed by the scorecard.
//!
//! Provider adapters (see `data::field_map`) normalize whatever field names a
//! provider uses into this shape, so the scorecard never branches on naming.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Ticker;

/// One fiscal quarter of income-statement data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyReport {
    pub fiscal_date_ending: NaiveDate,
    pub revenue: f64,
    /// Net income, used as the EPS proxy.
    pub net_income: f64,
}

/// Per-ticker fundamentals snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub ticker: Ticker,
    /// Quarterly reports, newest first.
    pub quarters: Vec<QuarterlyReport>,
    /// Stockholder equity from the latest balance sheet.
    pub stockholder_equity: Option<f64>,
    /// Total debt divided by stockholder equity.
    pub debt_to_equity: Option<f64>,
    /// Provider-reported trailing ROE, informational only.
    pub reported_roe: Option<f64>,
}

impl FundamentalsRecord {
    pub fn quarter_count(&self) -> usize {
        self.quarters.len()
    }

    /// Revenue of the quarter `offset` quarters back (0 = latest).
    pub fn revenue(&self, offset: usize) -> Option<f64> {
        self.quarters.get(offset).map(|q| q.revenue)
    }

    /// Net income of the quarter `offset` quarters back (0 = latest).
    pub fn net_income(&self, offset: usize) -> Option<f64> {
        self.quarters.get(offset).map(|q| q.net_income)
    }

    /// Sum of net income over the latest four quarters.
    pub fn ttm_net_income(&self) -> Option<f64> {
        if self.quarters.len() < 4 {
            return None;
        }
        Some(self.quarters[..4].iter().map(|q| q.net_income).sum())
    }
}

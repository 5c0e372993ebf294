//! Provider field normalization.
//!
//! Fundamentals providers disagree on labels (and change them between API
//! versions), so every canonical field is looked up through a list of candidate
//! labels. Values arrive as JSON strings; `"None"`, `"-"` and empty strings are
//! treated as missing rather than zero.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::domain::{FundamentalsRecord, QuarterlyReport};

pub const REVENUE: &[&str] = &["totalRevenue", "revenue", "Revenue"];
pub const NET_INCOME: &[&str] = &["netIncome", "netIncomeFromContinuingOperations", "NetIncome"];
pub const EQUITY: &[&str] = &[
    "totalShareholderEquity",
    "totalStockholdersEquity",
    "stockholdersEquity",
];
pub const TOTAL_DEBT: &[&str] = &["shortLongTermDebtTotal", "totalDebt"];
pub const LONG_TERM_DEBT: &[&str] = &["longTermDebt", "longTermDebtNoncurrent"];
pub const SHORT_TERM_DEBT: &[&str] = &["shortTermDebt", "currentDebt"];
pub const OVERVIEW_DEBT_TO_EQUITY: &[&str] = &["DebtToEquityRatio", "DebtToEquity"];
pub const OVERVIEW_ROE: &[&str] = &["ReturnOnEquityTTM"];

/// Parse a provider value as a finite number.
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.trim() {
            "" | "None" | "none" | "null" | "-" | "N/A" => None,
            s => s.parse::<f64>().ok(),
        },
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// First candidate label with a usable value.
pub fn first_number(fields: &Map<String, Value>, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .find_map(|label| fields.get(*label).and_then(parse_number))
}

fn reports<'a>(payload: &'a Value, key: &str) -> Vec<&'a Map<String, Value>> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

fn quarter(fields: &Map<String, Value>) -> Option<QuarterlyReport> {
    let fiscal_date_ending = fields
        .get("fiscalDateEnding")
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())?;
    Some(QuarterlyReport {
        fiscal_date_ending,
        revenue: first_number(fields, REVENUE)?,
        net_income: first_number(fields, NET_INCOME)?,
    })
}

/// Quarterly income reports, newest first.
///
/// Stops at the first incomplete quarter: skipping it would shift every older
/// quarter and break the year-over-year offsets.
pub fn quarters(income: &Value) -> Vec<QuarterlyReport> {
    let mut parsed: Vec<QuarterlyReport> = reports(income, "quarterlyReports")
        .into_iter()
        .map_while(quarter)
        .collect();
    parsed.sort_by(|a, b| b.fiscal_date_ending.cmp(&a.fiscal_date_ending));
    parsed.dedup_by_key(|q| q.fiscal_date_ending);
    parsed
}

/// Total debt from a balance sheet: the combined field, else long + short term.
pub fn total_debt(balance: &Map<String, Value>) -> Option<f64> {
    first_number(balance, TOTAL_DEBT).or_else(|| {
        match (
            first_number(balance, LONG_TERM_DEBT),
            first_number(balance, SHORT_TERM_DEBT),
        ) {
            (None, None) => None,
            (long, short) => Some(long.unwrap_or(0.0) + short.unwrap_or(0.0)),
        }
    })
}

/// Build a canonical record from the three provider payloads.
///
/// Returns `None` when the income statement has no usable quarters.
pub fn normalize(ticker: &str, income: &Value, balance: &Value, overview: &Value) -> Option<FundamentalsRecord> {
    let quarters = quarters(income);
    if quarters.is_empty() {
        return None;
    }

    let latest_balance = reports(balance, "quarterlyReports").into_iter().next();
    let stockholder_equity = latest_balance.and_then(|b| first_number(b, EQUITY));
    let overview_fields = overview.as_object();

    let debt_to_equity = match (latest_balance.and_then(total_debt), stockholder_equity) {
        (Some(debt), Some(equity)) if equity > 0.0 => Some(debt / equity),
        _ => overview_fields.and_then(|o| first_number(o, OVERVIEW_DEBT_TO_EQUITY)),
    };

    Some(FundamentalsRecord {
        ticker: ticker.to_string(),
        quarters,
        stockholder_equity,
        debt_to_equity,
        reported_roe: overview_fields.and_then(|o| first_number(o, OVERVIEW_ROE)),
    })
}

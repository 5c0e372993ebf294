//! Alpha Vantage fundamentals source.
//!
//! Three calls per ticker (OVERVIEW, INCOME_STATEMENT, BALANCE_SHEET), each
//! spaced by the shared `Pacer`. The API answers HTTP 200 for most failures, so
//! the payload itself is classified: a `Note`/`Information` body is a rate limit,
//! an `Error Message` body means the ticker has no data.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::field_map;
use super::pacer::Pacer;
use super::provider::{DataError, FundamentalsSource};
use crate::domain::FundamentalsRecord;

pub const BASE_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantageSource {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    pacer: Arc<Pacer>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl AlphaVantageSource {
    pub fn new(
        api_key: impl Into<String>,
        pacer: Arc<Pacer>,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            pacer,
            circuit_breaker,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One paced API call. `Ok(None)` when the API reports no data.
    fn call(&self, function: &str, ticker: &str) -> Result<Option<Value>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }
        self.pacer.wait();
        debug!(function, ticker, "fundamentals request");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("function", function), ("symbol", ticker), ("apikey", self.api_key.as_str())])
            .send()
            .map_err(|e| {
                self.circuit_breaker.record_failure();
                DataError::NetworkUnreachable(e.to_string())
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            self.circuit_breaker.record_failure();
            return Err(DataError::RateLimited {
                retry_after_secs: 60,
                detail: format!("HTTP 429 for {function} {ticker}"),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            self.circuit_breaker.trip();
            return Err(DataError::AuthenticationRequired(format!("HTTP {status}")));
        }
        if !status.is_success() {
            self.circuit_breaker.record_failure();
            return Err(DataError::Other(format!("HTTP {status} for {function} {ticker}")));
        }

        let payload: Value = resp
            .json()
            .map_err(|e| DataError::ResponseFormatChanged(format!("{function} {ticker}: {e}")))?;
        self.circuit_breaker.record_success();
        classify(function, ticker, payload)
    }
}

/// Sort an API payload into data, no data, or rate limit.
pub fn classify(function: &str, ticker: &str, payload: Value) -> Result<Option<Value>, DataError> {
    let Some(fields) = payload.as_object() else {
        return Err(DataError::ResponseFormatChanged(format!(
            "{function} {ticker}: payload is not an object"
        )));
    };
    for key in ["Note", "Information"] {
        if let Some(message) = fields.get(key).and_then(Value::as_str) {
            return Err(DataError::RateLimited {
                retry_after_secs: 60,
                detail: message.to_string(),
            });
        }
    }
    if let Some(message) = fields.get("Error Message").and_then(Value::as_str) {
        warn!(function, ticker, message, "provider returned an error payload");
        return Ok(None);
    }
    if fields.is_empty() {
        return Ok(None);
    }
    Ok(Some(payload))
}

impl FundamentalsSource for AlphaVantageSource {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    fn fundamentals(&self, ticker: &str) -> Result<Option<FundamentalsRecord>, DataError> {
        let overview = self.call("OVERVIEW", ticker)?.unwrap_or(Value::Null);
        let Some(income) = self.call("INCOME_STATEMENT", ticker)? else {
            return Ok(None);
        };
        let balance = self.call("BALANCE_SHEET", ticker)?.unwrap_or(Value::Null);
        Ok(field_map::normalize(ticker, &income, &balance, &overview))
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

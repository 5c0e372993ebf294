//! Yahoo Finance price provider.
//!
//! Fetches daily bars from the v8 chart API with retries, exponential backoff
//! and the shared circuit breaker. Prices are split/dividend adjusted: when the
//! response carries `adjclose`, every OHLC field is scaled by `adjclose / close`.
//!
//! Yahoo has no official API and changes its format without notice; a parse
//! failure surfaces as `ResponseFormatChanged` so runners can fall back to cache.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, PriceProvider};
use crate::domain::{Bar, PriceSeries};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{ticker}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    fn parse_response(ticker: &str, resp: ChartResponse) -> Result<PriceSeries, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            },
            Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;
        let timestamps = data
            .timestamp
            .ok_or_else(|| DataError::ResponseFormatChanged("no timestamps".into()))?;
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

            let field = |v: &[Option<f64>]| v.get(i).copied().flatten();
            let Some(close) = field(&quote.close) else {
                // Holidays and halted sessions come back as null rows.
                continue;
            };
            let factor = adj_closes
                .as_deref()
                .and_then(|v| field(v))
                .filter(|adj| close > 0.0 && adj.is_finite())
                .map_or(1.0, |adj| adj / close);
            let scaled = |v: Option<f64>| v.unwrap_or(close) * factor;

            let bar = Bar {
                date,
                open: scaled(field(&quote.open)),
                high: scaled(field(&quote.high)),
                low: scaled(field(&quote.low)),
                close: close * factor,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            };
            if bar.is_void() {
                continue;
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }
        Ok(PriceSeries::new(ticker, bars)?)
    }

    fn fetch_with_retry(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = Self::chart_url(ticker, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(ticker, attempt, ?delay, "retrying price request");
                std::thread::sleep(delay);
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                warn!(ticker, "price provider returned 403, opening circuit breaker");
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                    detail: format!("HTTP 429 for {ticker}"),
                });
                continue;
            }
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(
                    "Yahoo Finance requires authentication".into(),
                ));
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: ticker.to_string(),
                });
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {ticker}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {ticker}: {e}"))
            })?;
            let series = Self::parse_response(ticker, chart)?;
            self.circuit_breaker.record_success();
            return Ok(series);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries, DataError> {
        self.fetch_with_retry(ticker, start, end)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<PriceSeries, DataError> {
        let resp: ChartResponse = serde_json::from_str(json).unwrap();
        YahooProvider::parse_response("AAPL", resp)
    }

    // 2024-01-02, 2024-01-03, 2024-01-04 at 14:30 UTC, delivered out of order.
    const TS: [i64; 3] = [1_704_205_800, 1_704_378_600, 1_704_292_200];

    #[test]
    fn parses_sorts_and_adjusts() {
        let json = format!(
            r#"{{"chart":{{"result":[{{
                "timestamp":[{},{},{}],
                "indicators":{{
                    "quote":[{{"open":[10.0,12.0,11.0],"high":[11.0,13.0,12.0],
                               "low":[9.0,11.0,10.0],"close":[10.0,12.0,11.0],
                               "volume":[100,300,200]}}],
                    "adjclose":[{{"adjclose":[5.0,6.0,5.5]}}]
                }}
            }}],"error":null}}}}"#,
            TS[0], TS[1], TS[2]
        );
        let series = parse(&json).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![5.0, 5.5, 6.0]);
        assert_eq!(series.bars()[0].high, 5.5);
        assert_eq!(series.bars()[2].volume, 300);
    }

    #[test]
    fn null_rows_are_skipped() {
        let json = format!(
            r#"{{"chart":{{"result":[{{
                "timestamp":[{},{}],
                "indicators":{{"quote":[{{"open":[null,1.0],"high":[null,1.0],
                    "low":[null,1.0],"close":[null,1.0],"volume":[null,10]}}]}}
            }}],"error":null}}}}"#,
            TS[0], TS[2]
        );
        let series = parse(&json).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.closes(), vec![1.0]);
    }

    #[test]
    fn not_found_maps_to_symbol_error() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        assert!(matches!(parse(json), Err(DataError::SymbolNotFound { .. })));
    }
}

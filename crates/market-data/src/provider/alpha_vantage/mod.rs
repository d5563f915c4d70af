//! Alpha Vantage market data source implementation.
//!
//! Talks to a single HTTP endpoint with a `function` discriminator:
//! - Latest quotes via GLOBAL_QUOTE
//! - Symbol search via SYMBOL_SEARCH
//! - Daily bars via TIME_SERIES_DAILY
//! - Intraday samples via TIME_SERIES_INTRADAY
//!
//! Responses key their fields with ordinal names ("01. symbol"). The free
//! tier is limited to 5 API calls per minute, and throttling shows up two
//! ways: an HTTP 429, or a textual call-frequency notice embedded in an
//! otherwise-200 payload. Both are classified as `RateLimited`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::ProviderError;
use crate::models::{DailyBar, IntradayPoint, Quote, SymbolMatch};
use crate::provider::MarketDataSource;

const BASE_URL: &str = "https://www.alphavantage.co/query";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Alpha Vantage market data source.
pub struct AlphaVantage {
    client: Client,
    base_url: String,
    api_key: String,
}

// ============================================================================
// Response structures
// ============================================================================

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<RawGlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

impl RawGlobalQuote {
    /// The API reports unknown symbols as `"Global Quote": {}`.
    fn is_empty(&self) -> bool {
        self.symbol.is_none()
            && self.price.is_none()
            && self.volume.is_none()
            && self.latest_trading_day.is_none()
            && self.change.is_none()
            && self.change_percent.is_none()
    }
}

/// SYMBOL_SEARCH response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "bestMatches")]
    best_matches: Option<Vec<RawSymbolMatch>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSymbolMatch {
    #[serde(rename = "1. symbol")]
    symbol: Option<String>,
    #[serde(rename = "2. name")]
    name: Option<String>,
    #[serde(rename = "3. type")]
    kind: Option<String>,
    #[serde(rename = "4. region")]
    region: Option<String>,
}

/// TIME_SERIES_DAILY response
#[derive(Debug, Deserialize)]
struct DailySeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, RawDailyBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDailyBar {
    #[serde(rename = "1. open")]
    open: Option<String>,
    #[serde(rename = "2. high")]
    high: Option<String>,
    #[serde(rename = "3. low")]
    low: Option<String>,
    #[serde(rename = "4. close")]
    close: Option<String>,
    #[serde(rename = "5. volume")]
    volume: Option<String>,
}

/// TIME_SERIES_INTRADAY response (5-minute interval)
#[derive(Debug, Deserialize)]
struct IntradayResponse {
    #[serde(rename = "Time Series (5min)")]
    time_series: Option<HashMap<String, RawIntradayBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIntradayBar {
    #[serde(rename = "4. close")]
    close: Option<String>,
}

// ============================================================================
// AlphaVantage implementation
// ============================================================================

impl AlphaVantage {
    /// Create a new source with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Override the endpoint URL (used by tests and proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Make a request against the endpoint and return the raw payload.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, ProviderError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params)
            .map_err(|e| ProviderError::InvalidData(format!("failed to build request URL: {e}")))?;

        debug!(
            "provider request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Transport(e)
            }
        })?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        let response = response.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Classify API-level anomalies in an otherwise-200 payload.
    ///
    /// A "Note" or "Information" field mentioning call frequency is the
    /// provider's throttle signal and must never be mistaken for malformed
    /// data; an "Error Message" field is.
    fn check_api_error(
        error_message: &Option<String>,
        note: &Option<String>,
        information: &Option<String>,
    ) -> Result<(), ProviderError> {
        if let Some(msg) = error_message {
            return Err(ProviderError::InvalidData(msg.clone()));
        }

        for notice in [note, information].into_iter().flatten() {
            if notice.contains("API call frequency") || notice.contains("rate limit") {
                return Err(ProviderError::RateLimited);
            }
            warn!("provider notice: {}", notice);
        }

        Ok(())
    }

    /// Parse a numeric field, coercing missing or malformed values to zero.
    fn parse_decimal(field: Option<&str>) -> Decimal {
        field
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(Decimal::ZERO)
    }

    /// Like [`parse_decimal`](Self::parse_decimal), stripping a trailing `%`.
    fn parse_percent(field: Option<&str>) -> Decimal {
        field
            .and_then(|s| s.trim().trim_end_matches('%').parse().ok())
            .unwrap_or(Decimal::ZERO)
    }

    fn parse_volume(field: Option<&str>) -> u64 {
        field.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
    }

    /// Parse a YYYY-MM-DD trading day, falling back to the fetch time.
    fn parse_trading_day(field: Option<&str>, fetched_at: DateTime<Utc>) -> DateTime<Utc> {
        field
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|dt| Utc.from_local_datetime(&dt).single())
            .unwrap_or(fetched_at)
    }

    /// Decode a GLOBAL_QUOTE payload into a [`Quote`].
    ///
    /// Individual missing or non-numeric fields coerce to zero; absence of
    /// the quote object entirely is `InvalidData`.
    fn quote_from_payload(
        symbol: &str,
        payload: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Quote, ProviderError> {
        let response: GlobalQuoteResponse = serde_json::from_str(payload)
            .map_err(|e| ProviderError::InvalidData(format!("failed to parse quote response: {e}")))?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let raw = response
            .global_quote
            .filter(|quote| !quote.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidData(format!("no quote data for symbol: {symbol}"))
            })?;

        Ok(Quote {
            symbol: raw
                .symbol
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| symbol.to_string()),
            price: Self::parse_decimal(raw.price.as_deref()),
            change: Self::parse_decimal(raw.change.as_deref()),
            change_percent: Self::parse_percent(raw.change_percent.as_deref()),
            volume: Self::parse_volume(raw.volume.as_deref()),
            last_updated: Self::parse_trading_day(raw.latest_trading_day.as_deref(), fetched_at),
        })
    }

    /// Decode a SYMBOL_SEARCH payload. A response without `bestMatches` is
    /// a valid empty result, not an error.
    fn matches_from_payload(payload: &str) -> Result<Vec<SymbolMatch>, ProviderError> {
        let response: SearchResponse = serde_json::from_str(payload).map_err(|e| {
            ProviderError::InvalidData(format!("failed to parse search response: {e}"))
        })?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        Ok(response
            .best_matches
            .unwrap_or_default()
            .into_iter()
            .map(|m| SymbolMatch {
                symbol: m.symbol.unwrap_or_default(),
                name: m.name.unwrap_or_default(),
                kind: m.kind.unwrap_or_default(),
                region: m.region.unwrap_or_default(),
            })
            .collect())
    }

    /// Decode a TIME_SERIES_DAILY payload into ascending bars.
    fn daily_from_payload(symbol: &str, payload: &str) -> Result<Vec<DailyBar>, ProviderError> {
        let response: DailySeriesResponse = serde_json::from_str(payload).map_err(|e| {
            ProviderError::InvalidData(format!("failed to parse daily series response: {e}"))
        })?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let series = response.time_series.ok_or_else(|| {
            ProviderError::InvalidData(format!("no daily series for symbol: {symbol}"))
        })?;

        let mut bars: Vec<DailyBar> = series
            .into_iter()
            .filter_map(|(date, raw)| {
                let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
                Some(DailyBar {
                    date,
                    open: Self::parse_decimal(raw.open.as_deref()),
                    high: Self::parse_decimal(raw.high.as_deref()),
                    low: Self::parse_decimal(raw.low.as_deref()),
                    close: Self::parse_decimal(raw.close.as_deref()),
                    volume: Self::parse_volume(raw.volume.as_deref()),
                })
            })
            .collect();

        bars.sort_by_key(|bar| bar.date);
        Ok(bars)
    }

    /// Decode a TIME_SERIES_INTRADAY payload into ascending samples.
    fn intraday_from_payload(
        symbol: &str,
        payload: &str,
    ) -> Result<Vec<IntradayPoint>, ProviderError> {
        let response: IntradayResponse = serde_json::from_str(payload).map_err(|e| {
            ProviderError::InvalidData(format!("failed to parse intraday response: {e}"))
        })?;

        Self::check_api_error(
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let series = response.time_series.ok_or_else(|| {
            ProviderError::InvalidData(format!("no intraday series for symbol: {symbol}"))
        })?;

        let mut points: Vec<IntradayPoint> = series
            .into_iter()
            .filter_map(|(timestamp, raw)| {
                let timestamp =
                    NaiveDateTime::parse_from_str(timestamp.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
                Some(IntradayPoint {
                    timestamp,
                    price: Self::parse_decimal(raw.close.as_deref()),
                })
            })
            .collect();

        points.sort_by_key(|point| point.timestamp);
        Ok(points)
    }
}

// ============================================================================
// MarketDataSource trait implementation
// ============================================================================

#[async_trait]
impl MarketDataSource for AlphaVantage {
    async fn global_quote(&self, symbol: &str) -> Result<Quote, ProviderError> {
        let params = [("function", "GLOBAL_QUOTE"), ("symbol", symbol)];

        let payload = self.fetch(&params).await?;
        let quote = Self::quote_from_payload(symbol, &payload, Utc::now())?;

        debug!("fetched quote for {}: {}", quote.symbol, quote.price);
        Ok(quote)
    }

    async fn symbol_search(&self, query: &str) -> Result<Vec<SymbolMatch>, ProviderError> {
        let params = [("function", "SYMBOL_SEARCH"), ("keywords", query)];

        let payload = self.fetch(&params).await?;
        let matches = Self::matches_from_payload(&payload)?;

        debug!("search '{}' matched {} symbols", query, matches.len());
        Ok(matches)
    }

    async fn daily_series(&self, symbol: &str) -> Result<Vec<DailyBar>, ProviderError> {
        let params = [
            ("function", "TIME_SERIES_DAILY"),
            ("symbol", symbol),
            ("outputsize", "compact"),
        ];

        let payload = self.fetch(&params).await?;
        let bars = Self::daily_from_payload(symbol, &payload)?;

        debug!("fetched {} daily bars for {}", bars.len(), symbol);
        Ok(bars)
    }

    async fn intraday_series(&self, symbol: &str) -> Result<Vec<IntradayPoint>, ProviderError> {
        let params = [
            ("function", "TIME_SERIES_INTRADAY"),
            ("symbol", symbol),
            ("interval", "5min"),
        ];

        let payload = self.fetch(&params).await?;
        let points = Self::intraday_from_payload(symbol, &payload)?;

        debug!("fetched {} intraday samples for {}", points.len(), symbol);
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_from_payload_parses_all_fields() {
        let payload = r#"{
            "Global Quote": {
                "01. symbol": "AAPL",
                "05. price": "175.50",
                "06. volume": "48291504",
                "07. latest trading day": "2024-01-15",
                "09. change": "2.30",
                "10. change percent": "1.33%"
            }
        }"#;

        let quote = AlphaVantage::quote_from_payload("AAPL", payload, Utc::now()).unwrap();

        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.price, dec!(175.50));
        assert_eq!(quote.change, dec!(2.30));
        assert_eq!(quote.change_percent, dec!(1.33));
        assert_eq!(quote.volume, 48291504);
        assert_eq!(quote.last_updated.date_naive().to_string(), "2024-01-15");
    }

    #[test]
    fn test_quote_from_payload_coerces_missing_fields_to_zero() {
        let payload = r#"{
            "Global Quote": {
                "01. symbol": "AAPL",
                "05. price": "not-a-number"
            }
        }"#;

        let fetched_at = Utc::now();
        let quote = AlphaVantage::quote_from_payload("AAPL", payload, fetched_at).unwrap();

        assert_eq!(quote.price, Decimal::ZERO);
        assert_eq!(quote.change, Decimal::ZERO);
        assert_eq!(quote.change_percent, Decimal::ZERO);
        assert_eq!(quote.volume, 0);
        // No trading day in the payload: stamped with the fetch time.
        assert_eq!(quote.last_updated, fetched_at);
    }

    #[test]
    fn test_quote_from_payload_empty_object_is_invalid_data() {
        let payload = r#"{"Global Quote": {}}"#;

        let result = AlphaVantage::quote_from_payload("NOPE", payload, Utc::now());
        assert!(matches!(result, Err(ProviderError::InvalidData(_))));
    }

    #[test]
    fn test_quote_from_payload_missing_object_is_invalid_data() {
        let result = AlphaVantage::quote_from_payload("NOPE", "{}", Utc::now());
        assert!(matches!(result, Err(ProviderError::InvalidData(_))));
    }

    #[test]
    fn test_call_frequency_note_is_rate_limited_not_invalid_data() {
        let payload = r#"{
            "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute and 500 calls per day."
        }"#;

        let result = AlphaVantage::quote_from_payload("AAPL", payload, Utc::now());
        assert!(matches!(result, Err(ProviderError::RateLimited)));
    }

    #[test]
    fn test_information_rate_limit_notice_is_rate_limited() {
        let payload = r#"{
            "Information": "You have exceeded the rate limit for your API key."
        }"#;

        let result = AlphaVantage::quote_from_payload("AAPL", payload, Utc::now());
        assert!(matches!(result, Err(ProviderError::RateLimited)));
    }

    #[test]
    fn test_error_message_is_invalid_data() {
        let payload = r#"{
            "Error Message": "Invalid API call. Please retry or visit the documentation."
        }"#;

        let result = AlphaVantage::quote_from_payload("AAPL", payload, Utc::now());
        assert!(matches!(result, Err(ProviderError::InvalidData(_))));
    }

    #[test]
    fn test_quote_symbol_falls_back_to_requested() {
        let payload = r#"{
            "Global Quote": {
                "05. price": "10.00"
            }
        }"#;

        let quote = AlphaVantage::quote_from_payload("TSLA", payload, Utc::now()).unwrap();
        assert_eq!(quote.symbol, "TSLA");
    }

    #[test]
    fn test_matches_from_payload_maps_fields() {
        let payload = r#"{
            "bestMatches": [
                {
                    "1. symbol": "AAPL",
                    "2. name": "Apple Inc",
                    "3. type": "Equity",
                    "4. region": "United States"
                },
                {
                    "1. symbol": "APLE",
                    "2. name": "Apple Hospitality REIT Inc",
                    "3. type": "Equity",
                    "4. region": "United States"
                }
            ]
        }"#;

        let matches = AlphaVantage::matches_from_payload(payload).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].symbol, "AAPL");
        assert_eq!(matches[0].name, "Apple Inc");
        assert_eq!(matches[0].kind, "Equity");
        assert_eq!(matches[0].region, "United States");
    }

    #[test]
    fn test_matches_from_payload_without_matches_is_empty() {
        let matches = AlphaVantage::matches_from_payload("{}").unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_daily_from_payload_sorts_ascending_and_coerces() {
        let payload = r#"{
            "Time Series (Daily)": {
                "2024-01-16": {
                    "1. open": "176.00",
                    "2. high": "178.20",
                    "3. low": "175.10",
                    "4. close": "177.40",
                    "5. volume": "51234000"
                },
                "2024-01-15": {
                    "1. open": "173.00",
                    "2. high": "176.00",
                    "3. low": "172.50",
                    "4. close": "175.50",
                    "5. volume": "bad"
                }
            }
        }"#;

        let bars = AlphaVantage::daily_from_payload("AAPL", payload).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date.to_string(), "2024-01-15");
        assert_eq!(bars[0].close, dec!(175.50));
        assert_eq!(bars[0].volume, 0);
        assert_eq!(bars[1].date.to_string(), "2024-01-16");
        assert_eq!(bars[1].volume, 51234000);
    }

    #[test]
    fn test_daily_from_payload_missing_series_is_invalid_data() {
        let result = AlphaVantage::daily_from_payload("AAPL", "{}");
        assert!(matches!(result, Err(ProviderError::InvalidData(_))));
    }

    #[test]
    fn test_intraday_from_payload_sorts_ascending() {
        let payload = r#"{
            "Time Series (5min)": {
                "2024-01-15 16:00:00": {"4. close": "175.50"},
                "2024-01-15 15:55:00": {"4. close": "175.20"}
            }
        }"#;

        let points = AlphaVantage::intraday_from_payload("AAPL", payload).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].price, dec!(175.20));
        assert_eq!(points[1].price, dec!(175.50));
        assert!(points[0].timestamp < points[1].timestamp);
    }

    #[test]
    fn test_parse_percent_strips_sign() {
        assert_eq!(AlphaVantage::parse_percent(Some("1.33%")), dec!(1.33));
        assert_eq!(AlphaVantage::parse_percent(Some("-0.50%")), dec!(-0.50));
        assert_eq!(AlphaVantage::parse_percent(Some("garbage")), Decimal::ZERO);
        assert_eq!(AlphaVantage::parse_percent(None), Decimal::ZERO);
    }

    #[test]
    fn test_parse_trading_day_falls_back_to_fetch_time() {
        let fetched_at = Utc::now();
        assert_eq!(
            AlphaVantage::parse_trading_day(Some("not-a-date"), fetched_at),
            fetched_at
        );
        assert_eq!(AlphaVantage::parse_trading_day(None, fetched_at), fetched_at);

        let parsed = AlphaVantage::parse_trading_day(Some("2024-01-15"), fetched_at);
        assert_eq!(parsed.date_naive().to_string(), "2024-01-15");
    }
}

//! Consumer-facing quote client.
//!
//! Every provider round trip is admitted through the shared [`RateGate`].
//! `get_quote` is total: provider failures of any class (throttling,
//! malformed payloads, transport errors) are absorbed into the degrade
//! chain — live data, then the durable cache, then a zero-valued
//! placeholder — so callers always receive a renderable [`Quote`]. The
//! sequence operations surface failures as an empty result instead, since a
//! partial or absent list is a valid consumer state.

use std::sync::Arc;

use chrono::Utc;
use log::{error, warn};

use crate::gate::RateGate;
use crate::models::{DailyBar, IntradayPoint, NewsArticle, Quote, SymbolMatch};
use crate::provider::{AlphaVantage, MarketDataSource};
use crate::store::QuoteStore;

/// Durable cache key for a symbol.
fn cache_key(symbol: &str) -> String {
    format!("quote_{symbol}")
}

/// Rate-limited, cache-backed market data client.
pub struct QuoteClient {
    source: Arc<dyn MarketDataSource>,
    store: Arc<QuoteStore>,
    gate: RateGate,
}

impl QuoteClient {
    /// Client over the Alpha Vantage endpoint with the free-tier rate gate.
    pub fn new(api_key: impl Into<String>, store: Arc<QuoteStore>) -> Self {
        Self::with_source(Arc::new(AlphaVantage::new(api_key)), store, RateGate::new())
    }

    /// Client over an explicit source and gate.
    pub fn with_source(
        source: Arc<dyn MarketDataSource>,
        store: Arc<QuoteStore>,
        gate: RateGate,
    ) -> Self {
        Self {
            source,
            store,
            gate,
        }
    }

    /// Fetch the latest quote for a symbol.
    ///
    /// Never fails from the caller's point of view: on any provider failure
    /// the last successfully cached quote is returned, and with no cached
    /// entry a zero-valued placeholder stamped with the fetch time. The
    /// failure itself is only logged.
    pub async fn get_quote(&self, symbol: &str) -> Quote {
        let symbol = symbol.trim().to_uppercase();

        let source = Arc::clone(&self.source);
        let requested = symbol.clone();
        let outcome = self
            .gate
            .admit(move || async move { source.global_quote(&requested).await })
            .await;

        match outcome {
            Ok(quote) => {
                self.persist(&quote);
                quote
            }
            Err(err) => {
                error!("quote fetch for {} failed: {}", symbol, err);
                self.fallback(&symbol)
            }
        }
    }

    /// Search for symbols matching a free-text query.
    ///
    /// Returns an empty list on any failure.
    pub async fn search_stocks(&self, query: &str) -> Vec<SymbolMatch> {
        let source = Arc::clone(&self.source);
        let keywords = query.to_string();
        let outcome = self
            .gate
            .admit(move || async move { source.symbol_search(&keywords).await })
            .await;

        outcome.unwrap_or_else(|err| {
            error!("symbol search '{}' failed: {}", query, err);
            Vec::new()
        })
    }

    /// Fetch recent daily bars for a symbol, ascending by date.
    ///
    /// Returns an empty list on any failure.
    pub async fn get_daily_prices(&self, symbol: &str) -> Vec<DailyBar> {
        let symbol = symbol.trim().to_uppercase();

        let source = Arc::clone(&self.source);
        let requested = symbol.clone();
        let outcome = self
            .gate
            .admit(move || async move { source.daily_series(&requested).await })
            .await;

        outcome.unwrap_or_else(|err| {
            error!("daily series fetch for {} failed: {}", symbol, err);
            Vec::new()
        })
    }

    /// Fetch recent intraday samples for a symbol, ascending by timestamp.
    ///
    /// Returns an empty list on any failure.
    pub async fn get_intraday(&self, symbol: &str) -> Vec<IntradayPoint> {
        let symbol = symbol.trim().to_uppercase();

        let source = Arc::clone(&self.source);
        let requested = symbol.clone();
        let outcome = self
            .gate
            .admit(move || async move { source.intraday_series(&requested).await })
            .await;

        outcome.unwrap_or_else(|err| {
            error!("intraday fetch for {} failed: {}", symbol, err);
            Vec::new()
        })
    }

    /// Editorial news feed. Currently a fixed payload; does not consume
    /// rate budget.
    pub fn get_news(&self) -> Vec<NewsArticle> {
        let published_at = Utc::now();
        vec![
            NewsArticle {
                title: "Market Rally Continues as Tech Stocks Surge".to_string(),
                url: "https://example.com/news/1".to_string(),
                source: "Financial Times".to_string(),
                summary: "Technology stocks led the market higher as investors...".to_string(),
                image: "https://images.unsplash.com/photo-1611974789855-9c2a0a7236a3?auto=format&fit=crop&q=80&w=500".to_string(),
                published_at,
            },
            NewsArticle {
                title: "Federal Reserve Signals Potential Rate Cut".to_string(),
                url: "https://example.com/news/2".to_string(),
                source: "Bloomberg".to_string(),
                summary: "The Federal Reserve indicated it might consider rate cuts...".to_string(),
                image: "https://images.unsplash.com/photo-1526304640581-d334cdbbf45e?auto=format&fit=crop&q=80&w=500".to_string(),
                published_at,
            },
        ]
    }

    /// Write a freshly fetched quote to the durable cache.
    ///
    /// Cache failures are logged, never surfaced: losing a cache write only
    /// narrows the degrade chain, it does not invalidate the live result.
    fn persist(&self, quote: &Quote) {
        match serde_json::to_string(quote) {
            Ok(raw) => {
                if let Err(err) = self.store.set(&cache_key(&quote.symbol), &raw) {
                    warn!("cache write for {} failed: {}", quote.symbol, err);
                }
            }
            Err(err) => {
                warn!("cache serialization for {} failed: {}", quote.symbol, err);
            }
        }
    }

    /// Degrade chain after a failed fetch: cached quote, else placeholder.
    fn fallback(&self, symbol: &str) -> Quote {
        match self.cached(symbol) {
            Some(quote) => quote,
            None => Quote::placeholder(symbol, Utc::now()),
        }
    }

    /// Read the last-known-good quote from the durable cache.
    fn cached(&self, symbol: &str) -> Option<Quote> {
        let raw = match self.store.get(&cache_key(symbol)) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!("cache read for {} failed: {}", symbol, err);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(quote) => Some(quote),
            Err(err) => {
                warn!("corrupt cache entry for {}: {}", symbol, err);
                None
            }
        }
    }
}

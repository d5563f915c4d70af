//! Market data source trait definition.

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::models::{DailyBar, IntradayPoint, Quote, SymbolMatch};

/// Trait for upstream market data sources.
///
/// Implementations perform one provider round trip per call and classify
/// failures into [`ProviderError`] variants; throttling must surface as
/// [`ProviderError::RateLimited`], never as malformed data.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the latest quote for a symbol.
    async fn global_quote(&self, symbol: &str) -> Result<Quote, ProviderError>;

    /// Search for symbols matching a free-text query.
    async fn symbol_search(&self, query: &str) -> Result<Vec<SymbolMatch>, ProviderError>;

    /// Fetch recent daily OHLCV bars, ascending by date.
    async fn daily_series(&self, symbol: &str) -> Result<Vec<DailyBar>, ProviderError>;

    /// Fetch recent intraday samples, ascending by timestamp.
    async fn intraday_series(&self, symbol: &str) -> Result<Vec<IntradayPoint>, ProviderError>;
}

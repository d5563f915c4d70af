//! Error types for the market data crate.
//!
//! This module provides:
//! - [`ProviderError`]: failures while fetching or decoding provider data
//! - [`StoreError`]: failures of the durable quote cache

use thiserror::Error;

/// Errors that can occur while fetching market data from the provider.
///
/// None of these variants reach callers of `QuoteClient::get_quote` — they
/// are absorbed into the degrade chain (durable cache, then a zero-valued
/// placeholder). Sequence operations surface them as an empty result.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider throttled the request, either via HTTP 429 or a
    /// textual call-frequency notice embedded in a 200 payload.
    #[error("provider rate limit exceeded")]
    RateLimited,

    /// The payload was missing the expected structure (e.g. no quote
    /// object at all). Distinct from throttling.
    #[error("invalid payload: {0}")]
    InvalidData(String),

    /// The request to the provider timed out.
    #[error("request timed out")]
    Timeout,

    /// A network or HTTP failure other than 429.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request was queued behind the rate ceiling and its resolution
    /// channel was dropped before it could be dispatched.
    #[error("request dropped before dispatch")]
    Dropped,
}

/// Errors from the durable key-value quote store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_not_invalid_data() {
        let error = ProviderError::RateLimited;
        assert!(!matches!(error, ProviderError::InvalidData(_)));
    }

    #[test]
    fn test_error_display() {
        let error = ProviderError::RateLimited;
        assert_eq!(format!("{}", error), "provider rate limit exceeded");

        let error = ProviderError::InvalidData("no quote object".to_string());
        assert_eq!(format!("{}", error), "invalid payload: no quote object");

        let error = ProviderError::Dropped;
        assert_eq!(format!("{}", error), "request dropped before dispatch");
    }
}

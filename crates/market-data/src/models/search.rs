//! Search result models for symbol lookup.

use serde::{Deserialize, Serialize};

/// Result from a ticker/symbol search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolMatch {
    /// Symbol/ticker (e.g. "AAPL")
    pub symbol: String,

    /// Display name (e.g. "Apple Inc")
    pub name: String,

    /// Asset kind as reported by the provider (e.g. "Equity", "ETF")
    pub kind: String,

    /// Market region (e.g. "United States")
    pub region: String,
}

impl SymbolMatch {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            kind: kind.into(),
            region: region.into(),
        }
    }
}

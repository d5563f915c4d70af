use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest market quote for a single symbol.
///
/// Invariant: `price >= 0`. When the provider returns no usable payload and
/// no cached entry exists, the record is synthesized with all numeric fields
/// zeroed ([`Quote::placeholder`]) — consumers always receive a structurally
/// valid value, never an absent one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Uppercase ticker (e.g. "AAPL")
    pub symbol: String,

    /// Current price
    pub price: Decimal,

    /// Absolute change since the previous close
    pub change: Decimal,

    /// Percent change since the previous close, without the `%` sign
    pub change_percent: Decimal,

    /// Trading volume
    pub volume: u64,

    /// Latest trading day reported by the provider, or the fetch time
    /// for synthesized records
    pub last_updated: DateTime<Utc>,
}

impl Quote {
    /// Zero-valued quote for a symbol the provider could not serve.
    ///
    /// This is the terminal state of the degrade chain.
    pub fn placeholder(symbol: impl Into<String>, as_of: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price: Decimal::ZERO,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            volume: 0,
            last_updated: as_of,
        }
    }
}

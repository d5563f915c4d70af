//! Historical price series models.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One trading day of OHLCV data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

/// One intraday sample (close of a 5-minute bin).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntradayPoint {
    pub timestamp: NaiveDateTime,
    pub price: Decimal,
}

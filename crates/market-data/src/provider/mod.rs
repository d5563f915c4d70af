//! Market data source abstraction and implementations.
//!
//! This module contains:
//! - The `MarketDataSource` trait the quote client talks through
//! - The Alpha Vantage implementation of that trait
//!
//! The client never constructs HTTP requests itself; it admits source calls
//! through the rate gate and interprets their results. Tests substitute a
//! scripted source behind the same trait.

mod traits;

pub mod alpha_vantage;

pub use alpha_vantage::AlphaVantage;
pub use traits::MarketDataSource;

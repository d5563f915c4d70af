//! Papertrade Market Data Crate
//!
//! This crate fetches third-party market quotes under a strict external
//! rate limit, keeps a bounded set of symbols refreshed in the background,
//! and degrades gracefully to cached or placeholder data when the upstream
//! provider is unavailable or throttled.
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |  PollScheduler   | --> |   QuoteClient    |  (total get_quote, degrade chain)
//! +------------------+     +------------------+
//!         |                        |
//!         v                        v
//! +------------------+     +------------------+
//! |    QuoteTable    |     |     RateGate     |  (5 calls / 60 s, FIFO queue)
//! +------------------+     +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |   AlphaVantage   |  (HTTP provider)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    QuoteStore    |  (durable last-known-good)
//!                          +------------------+
//! ```
//!
//! The consuming application layer depends only on [`QuoteClient`]
//! (`get_quote`, `search_stocks`, `get_daily_prices`, `get_intraday`,
//! `get_news`) and [`PollScheduler`] (`start`/`stop`), reading refreshed
//! quotes from the scheduler's [`QuoteTable`].
//!
//! # Degrade chain
//!
//! `get_quote` never fails: live data, else the last successfully cached
//! quote (persisted in SQLite across restarts), else a zero-valued
//! placeholder. The only visible sign of degradation is a stale or
//! zero-valued quote plus a logged error.

pub mod client;
pub mod errors;
pub mod gate;
pub mod models;
pub mod provider;
pub mod scheduler;
pub mod store;

// Re-export all public types from models
pub use models::{DailyBar, IntradayPoint, NewsArticle, Quote, SymbolMatch};

// Re-export component types
pub use client::QuoteClient;
pub use errors::{ProviderError, StoreError};
pub use gate::RateGate;
pub use provider::{AlphaVantage, MarketDataSource};
pub use scheduler::{PollScheduler, QuoteTable};
pub use store::QuoteStore;

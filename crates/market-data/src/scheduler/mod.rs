//! Staggered background refresh for tracked symbols.
//!
//! `start` launches one driver task: an immediate refresh batch, then a new
//! batch every poll interval until `stop`. Within a batch, per-symbol
//! fetches are spaced a fixed delay apart so a batch never bursts past the
//! rate gate ceiling (5 symbols at a 12 s stagger span most of a 60 s
//! window). Results land in a shared [`QuoteTable`] that consumers read.
//!
//! `stop` cancels only the driver. Fetches already dispatched keep running
//! and still update the table — a bounded staleness window, not a
//! correctness problem, since every write is a whole-quote refresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration};

use crate::client::QuoteClient;
use crate::models::Quote;

/// How often each tracked symbol is refreshed.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Spacing between per-symbol fetches within one batch.
const STAGGER_DELAY: Duration = Duration::from_secs(12);

/// Shared symbol → latest-quote map.
///
/// Clones share the same storage. Writes are last-writer-wins per symbol,
/// which is safe because a quote write is always a whole-record refresh.
#[derive(Clone, Default)]
pub struct QuoteTable {
    inner: Arc<RwLock<HashMap<String, Quote>>>,
}

impl QuoteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest quote for a symbol, if one has been recorded.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        let map = self.inner.read().unwrap_or_else(|poisoned| {
            warn!("quote table lock was poisoned, recovering");
            poisoned.into_inner()
        });
        map.get(symbol).cloned()
    }

    /// Record a quote under its own symbol.
    pub fn insert(&self, quote: Quote) {
        let mut map = self.inner.write().unwrap_or_else(|poisoned| {
            warn!("quote table lock was poisoned, recovering");
            poisoned.into_inner()
        });
        map.insert(quote.symbol.clone(), quote);
    }

    /// Copy of the whole table.
    pub fn snapshot(&self) -> HashMap<String, Quote> {
        let map = self.inner.read().unwrap_or_else(|poisoned| {
            warn!("quote table lock was poisoned, recovering");
            poisoned.into_inner()
        });
        map.clone()
    }

    pub fn len(&self) -> usize {
        let map = self.inner.read().unwrap_or_else(|poisoned| {
            warn!("quote table lock was poisoned, recovering");
            poisoned.into_inner()
        });
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Background polling driver with an explicit start/stop lifecycle.
///
/// At most one driver is live per scheduler: `start` while running cancels
/// the previous driver before arming a new one, so restarts never leave an
/// orphaned timer behind.
pub struct PollScheduler {
    client: Arc<QuoteClient>,
    table: QuoteTable,
    driver: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
    stagger: Duration,
}

impl PollScheduler {
    /// Scheduler with the production cadence (60 s poll, 12 s stagger).
    pub fn new(client: Arc<QuoteClient>) -> Self {
        Self::with_timing(client, POLL_INTERVAL, STAGGER_DELAY)
    }

    /// Scheduler with a custom cadence.
    pub fn with_timing(client: Arc<QuoteClient>, poll_interval: Duration, stagger: Duration) -> Self {
        Self {
            client,
            table: QuoteTable::new(),
            driver: Mutex::new(None),
            poll_interval,
            stagger,
        }
    }

    /// Handle to the table the driver writes into.
    pub fn table(&self) -> QuoteTable {
        self.table.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock_driver()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    fn lock_driver(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.driver.lock().unwrap_or_else(|poisoned| {
            warn!("scheduler lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Begin polling the given symbols.
    ///
    /// Symbols are normalized to uppercase and de-duplicated, preserving
    /// order. Must be called from within a tokio runtime. Restart is
    /// idempotent: a live driver is cancelled first.
    pub fn start<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tracked: Vec<String> = Vec::new();
        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if !symbol.is_empty() && !tracked.contains(&symbol) {
                tracked.push(symbol);
            }
        }

        let client = Arc::clone(&self.client);
        let table = self.table.clone();
        let stagger = self.stagger;
        let poll_interval = self.poll_interval;

        let mut driver = self.lock_driver();
        if let Some(handle) = driver.take() {
            handle.abort();
        }

        *driver = Some(tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            loop {
                // First tick fires immediately; later ones every interval.
                ticker.tick().await;
                debug!("refreshing {} tracked symbols", tracked.len());

                for (index, symbol) in tracked.iter().enumerate() {
                    if index > 0 {
                        sleep(stagger).await;
                    }

                    let client = Arc::clone(&client);
                    let table = table.clone();
                    let symbol = symbol.clone();
                    tokio::spawn(async move {
                        let quote = client.get_quote(&symbol).await;
                        table.insert(quote);
                    });
                }
            }
        }));
    }

    /// Stop polling. No-op when already stopped.
    ///
    /// Cancels the recurring driver only: fetches already dispatched run to
    /// completion and still update the table.
    pub fn stop(&self) {
        let mut driver = self.lock_driver();
        if let Some(handle) = driver.take() {
            handle.abort();
            debug!("polling stopped");
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

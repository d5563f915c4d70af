//! Rolling-window FIFO rate gate for provider requests.
//!
//! The upstream provider enforces a hard quota (5 calls per minute on the
//! free tier). Every outbound request is admitted through a single gate that
//! maintains a rolling window: requests with headroom execute immediately,
//! the rest are parked in a FIFO queue and dispatched as headroom frees up.
//!
//! The gate never fails on its own — it only delays. Task failures propagate
//! to the caller unchanged. Queued tasks are drained greedily after each
//! dispatched task completes, re-entering the same admission logic (window
//! reset, headroom check, counter increment) rather than bypassing it.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};

use crate::errors::ProviderError;

/// Provider ceiling: calls permitted per window.
const MAX_CALLS_PER_WINDOW: u32 = 5;

/// Rolling window duration.
const WINDOW_DURATION: Duration = Duration::from_secs(60);

/// A parked request: runs the task and resolves its caller's channel.
type QueuedJob = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Mutable window state. All transitions happen inside one critical section
/// so two concurrent admissions can never both observe headroom past the
/// ceiling.
struct GateState {
    window_start: Instant,
    calls_issued: u32,
    queue: VecDeque<QueuedJob>,
}

/// Outcome of the admission critical section.
enum Admission<F, T> {
    /// Headroom available: run the task in the caller's context.
    Dispatch(F),
    /// Window saturated: the task was parked, wait on its channel.
    Parked(oneshot::Receiver<Result<T, ProviderError>>),
}

/// Cloneable handle to the shared rate gate.
///
/// Clones share the same window and queue; the client and the background
/// scheduler compete for the same budget.
#[derive(Clone)]
pub struct RateGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    state: Mutex<GateState>,
    max_calls: u32,
    window: Duration,
}

impl RateGate {
    /// Gate with the provider's free-tier limits (5 calls / 60 s).
    pub fn new() -> Self {
        Self::with_limits(MAX_CALLS_PER_WINDOW, WINDOW_DURATION)
    }

    /// Gate with custom limits.
    pub fn with_limits(max_calls: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(GateInner {
                state: Mutex::new(GateState {
                    window_start: Instant::now(),
                    calls_issued: 0,
                    queue: VecDeque::new(),
                }),
                max_calls,
                window,
            }),
        }
    }

    /// Lock the gate state, recovering from poison if necessary.
    ///
    /// The worst case after recovery is a slightly miscounted window, which
    /// the provider-side throttle detection still catches.
    fn lock_state(&self) -> MutexGuard<'_, GateState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| {
            warn!("rate gate mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Admit a provider task through the rate gate.
    ///
    /// If the rolling window has expired, the counter resets and the window
    /// restarts. With headroom, the task executes immediately and — once it
    /// completes — the queue is drained while headroom remains. Against a
    /// saturated window the task is parked at the tail of the FIFO and this
    /// future resolves when the queued task eventually runs.
    ///
    /// Resolution order among parked tasks matches arrival order. No ordering
    /// is guaranteed between immediately-admitted tasks and parked ones.
    pub async fn admit<T, F, Fut>(&self, task: F) -> Result<T, ProviderError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    {
        let admission = {
            let mut state = self.lock_state();
            let now = Instant::now();

            if now.duration_since(state.window_start) >= self.inner.window {
                state.calls_issued = 0;
                state.window_start = now;
            }

            if state.calls_issued < self.inner.max_calls {
                state.calls_issued += 1;
                state.window_start = now;
                Admission::Dispatch(task)
            } else {
                debug!(
                    "rate gate saturated, parking request (queue depth {})",
                    state.queue.len() + 1
                );
                let (tx, rx) = oneshot::channel();
                let job: QueuedJob = Box::new(move || {
                    Box::pin(async move {
                        let _ = tx.send(task().await);
                    })
                });
                state.queue.push_back(job);
                Admission::Parked(rx)
            }
        };

        match admission {
            Admission::Dispatch(task) => {
                let result = task().await;
                self.drain();
                result
            }
            Admission::Parked(rx) => rx.await.unwrap_or(Err(ProviderError::Dropped)),
        }
    }

    /// Dispatch the next queued task if the window has headroom.
    ///
    /// Runs the same admission logic as [`admit`](Self::admit): an expired
    /// window resets the counter first, and dispatching consumes a slot.
    /// Each dispatched task drains again on completion, so the queue empties
    /// as fast as the ceiling allows.
    fn drain(&self) {
        let job = {
            let mut state = self.lock_state();
            if state.queue.is_empty() {
                return;
            }

            let now = Instant::now();
            if now.duration_since(state.window_start) >= self.inner.window {
                state.calls_issued = 0;
                state.window_start = now;
            }

            if state.calls_issued < self.inner.max_calls {
                state.calls_issued += 1;
                state.window_start = now;
                state.queue.pop_front()
            } else {
                None
            }
        };

        if let Some(job) = job {
            let gate = self.clone();
            tokio::spawn(async move {
                job().await;
                gate.drain();
            });
        }
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}

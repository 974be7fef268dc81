//! Debounce and throttle controllers.
//!
//! Both controllers own their pending timer as a tokio task. `cancel()` aborts
//! it, `dispose()` aborts it and refuses further invocations, and dropping a
//! controller disposes it, so no scheduled work outlives its owner.
//!
//! Invocation must happen inside a tokio runtime; timers are `tokio::time`
//! based and therefore follow a paused test clock.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::error::{Result, TelemetryError};

type Operation<A> = Arc<dyn Fn(A) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current()
        .map_err(|_| TelemetryError::config("rate controllers require a tokio runtime"))
}

fn abort_pending(pending: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = pending.take() {
        handle.abort();
    }
}

// ============================================================================
// Debounce
// ============================================================================

#[derive(Default)]
struct DebounceState {
    pending: Option<JoinHandle<()>>,
    disposed: bool,
}

/// Runs the wrapped operation once input stops arriving for `delay`.
///
/// Every `invoke` cancels the pending execution and schedules a new one with
/// the latest arguments.
pub struct Debouncer<A> {
    op: Operation<A>,
    delay: Duration,
    state: Mutex<DebounceState>,
}

impl<A: Send + 'static> Debouncer<A> {
    pub fn new<F>(op: F, delay: Duration) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            op: Arc::new(op),
            delay,
            state: Mutex::new(DebounceState::default()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule an execution `delay` from now, replacing any pending one.
    pub fn invoke(&self, args: A) -> Result<()> {
        let runtime = current_runtime()?;
        let mut state = lock(&self.state);
        if state.disposed {
            return Err(TelemetryError::Disposed {
                controller: "Debouncer",
            });
        }

        abort_pending(&mut state.pending);

        let op = Arc::clone(&self.op);
        let deadline = Instant::now() + self.delay;
        state.pending = Some(runtime.spawn(async move {
            sleep_until(deadline).await;
            op(args);
        }));
        Ok(())
    }

    /// Drop the pending execution, if any. The controller stays usable.
    pub fn cancel(&self) {
        abort_pending(&mut lock(&self.state).pending);
    }

    /// Cancel and reject all further invocations.
    pub fn dispose(&self) {
        let mut state = lock(&self.state);
        abort_pending(&mut state.pending);
        state.disposed = true;
    }

    /// Whether an execution is scheduled and has not yet run.
    pub fn is_pending(&self) -> bool {
        lock(&self.state)
            .pending
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }
}

impl<A> Drop for Debouncer<A> {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        abort_pending(&mut state.pending);
        state.disposed = true;
    }
}

// ============================================================================
// Throttle
// ============================================================================

#[derive(Default)]
struct ThrottleState {
    last_run: Option<Instant>,
    pending: Option<JoinHandle<()>>,
    disposed: bool,
}

/// Runs the wrapped operation at most once per `interval`, leading and trailing.
///
/// The first call (or any call a full interval after the last execution) runs
/// immediately. Calls inside the interval replace a single deferred execution
/// that fires when the interval completes, carrying the latest arguments.
pub struct Throttler<A> {
    op: Operation<A>,
    interval: Duration,
    state: Arc<Mutex<ThrottleState>>,
}

impl<A: Send + 'static> Throttler<A> {
    pub fn new<F>(op: F, interval: Duration) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            op: Arc::new(op),
            interval,
            state: Arc::new(Mutex::new(ThrottleState::default())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn invoke(&self, args: A) -> Result<()> {
        let runtime = current_runtime()?;
        let mut state = lock(&self.state);
        if state.disposed {
            return Err(TelemetryError::Disposed {
                controller: "Throttler",
            });
        }

        let now = Instant::now();
        let previous = state.last_run;
        let last_run = match previous {
            Some(last) if now.saturating_duration_since(last) < self.interval => last,
            _ => {
                // Leading edge: nothing ran within the interval
                abort_pending(&mut state.pending);
                state.last_run = Some(now);
                drop(state);
                (self.op)(args);
                return Ok(());
            }
        };

        abort_pending(&mut state.pending);

        let deadline = last_run + self.interval;
        debug!(
            "[Throttler] deferring execution by {:?}",
            deadline.saturating_duration_since(now)
        );

        let op = Arc::clone(&self.op);
        let shared = Arc::clone(&self.state);
        let interval = self.interval;
        state.pending = Some(runtime.spawn(async move {
            sleep_until(deadline).await;
            {
                let mut state = lock(&shared);
                let now = Instant::now();
                let due = state
                    .last_run
                    .map_or(true, |last| now.saturating_duration_since(last) >= interval);
                if state.disposed || !due {
                    return;
                }
                state.last_run = Some(now);
            }
            op(args);
        }));
        Ok(())
    }

    /// Drop the deferred execution, if any. The interval bookkeeping is kept.
    pub fn cancel(&self) {
        abort_pending(&mut lock(&self.state).pending);
    }

    /// Cancel and reject all further invocations.
    pub fn dispose(&self) {
        let mut state = lock(&self.state);
        abort_pending(&mut state.pending);
        state.disposed = true;
    }

    /// Whether a trailing execution is scheduled and has not yet run.
    pub fn is_pending(&self) -> bool {
        lock(&self.state)
            .pending
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }
}

impl<A> Drop for Throttler<A> {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        abort_pending(&mut state.pending);
        state.disposed = true;
    }
}

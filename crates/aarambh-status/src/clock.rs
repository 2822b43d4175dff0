//! Injectable time source
//!
//! Cache expiry, response-time measurement, request timeouts, retry backoff
//! and poll timestamps read time through [`Clock`] so they can be driven
//! deterministically in tests.

use chrono::{DateTime, TimeZone, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Boxed sleep future returned by [`Clock::sleep`] and [`Clock::deadline`]
pub type Sleep = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Monotonic time source
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u64;

    /// Wall-clock time, used to stamp completed polls
    fn now_utc(&self) -> DateTime<Utc>;

    /// Suspend for `duration`
    fn sleep(&self, duration: Duration) -> Sleep;

    /// Resolve once `duration` has passed on this clock, without moving it
    ///
    /// Used for timeouts, where the race against another future must not
    /// itself advance time.
    fn deadline(&self, duration: Duration) -> Sleep;
}

/// Clock backed by the tokio timer
///
/// Honors paused tokio time (`#[tokio::test(start_paused = true)]`).
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        duration_ms(self.origin.elapsed())
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        Box::pin(tokio::time::sleep(duration))
    }

    fn deadline(&self, duration: Duration) -> Sleep {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[derive(Debug, Default)]
struct ManualState {
    now_ms: AtomicU64,
    sleeps: Mutex<Vec<Duration>>,
    advanced: Notify,
}

/// Manually driven clock
///
/// `sleep` completes immediately after advancing virtual time by the
/// requested duration; every requested duration is recorded. `deadline`
/// futures resolve only when virtual time reaches them. Wall-clock time is
/// the Unix epoch plus virtual time.
#[derive(Debug, Default)]
pub struct ManualClock {
    state: Arc<ManualState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `ms`
    pub fn starting_at(ms: u64) -> Self {
        let clock = Self::new();
        clock.state.now_ms.store(ms, Ordering::SeqCst);
        clock
    }

    /// Move virtual time forward, saturating at `u64::MAX`
    pub fn advance(&self, duration: Duration) {
        let step = duration_ms(duration);
        let _ = self
            .state
            .now_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(step))
            });
        self.state.advanced.notify_waiters();
    }

    /// Durations passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.state.now_ms.load(Ordering::SeqCst)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        let ms = i64::try_from(self.now_ms()).unwrap_or(i64::MAX);
        Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) -> Sleep {
        self.state
            .sleeps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(duration);
        self.advance(duration);
        Box::pin(std::future::ready(()))
    }

    fn deadline(&self, duration: Duration) -> Sleep {
        let state = Arc::clone(&self.state);
        let target = self.now_ms().saturating_add(duration_ms(duration));

        Box::pin(async move {
            loop {
                // Registered before the check so an advance in between is not missed
                let advanced = state.advanced.notified();
                if state.now_ms.load(Ordering::SeqCst) >= target {
                    return;
                }
                advanced.await;
            }
        })
    }
}

//! Monotonic elapsed-time accounting and jittered backoff (spec §4.8).
//!
//! All timeout/retry bookkeeping goes through [`Deadline`] rather than
//! `SystemTime`, so a clock jump never shortens or lengthens an in-flight
//! call's effective budget.

use crate::errors::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// A fixed point in time, captured once at `Request::init()` and consulted
/// on every retry/poll iteration.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn starting_now(timeout: Duration) -> Self {
        Deadline {
            start: Instant::now(),
            timeout,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True iff `elapsed + extra` would exceed the deadline's timeout —
    /// the executor's "would this attempt blow the budget" check.
    pub fn would_exceed(&self, extra: Duration) -> bool {
        self.elapsed().saturating_add(extra) > self.timeout
    }
}

/// A process-wide, concurrency-safe source of jitter in `[0, bound_ms)`.
///
/// The teacher driver has no RNG dependency; rather than pull one in for a
/// single uniform draw, this uses a splitmix64-style counter seeded from the
/// monotonic clock, which is good enough for backoff jitter (not a
/// security-sensitive use).
pub struct Jitter {
    state: AtomicU64,
}

impl Jitter {
    pub const fn new() -> Self {
        Jitter {
            state: AtomicU64::new(0x9E3779B97F4A7C15),
        }
    }

    /// Returns a value uniformly distributed over `[0, bound_ms)`
    /// milliseconds. `bound_ms == 0` always returns `Duration::ZERO`.
    pub fn next_delay(&self, bound: Duration) -> Duration {
        let bound_ms = bound.as_millis() as u64;
        if bound_ms == 0 {
            return Duration::ZERO;
        }
        let seed = Instant::now().elapsed().as_nanos() as u64;
        let mut x = self
            .state
            .fetch_add(seed.wrapping_mul(0x2545F4914F6CDD1D) | 1, Ordering::Relaxed);
        x ^= x >> 30;
        x = x.wrapping_mul(0xBF58476D1CE4E5B9);
        x ^= x >> 27;
        x = x.wrapping_mul(0x94D049BB133111EB);
        x ^= x >> 31;
        Duration::from_millis(x % bound_ms)
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide jitter source, analogous to the teacher's shared
/// connection-pool/registry singletons.
pub static JITTER: Jitter = Jitter::new();

/// Sleeps for `delay`, honoring cancellation (spec §5 "Cancellation": "The
/// signal is checked on entry and honored during each suspension"). Every
/// inter-retry and inter-poll sleep in the core goes through this.
pub async fn sleep_cancellable(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_would_exceed() {
        let d = Deadline::starting_now(Duration::from_millis(100));
        assert!(!d.would_exceed(Duration::from_millis(1)));
        assert!(d.would_exceed(Duration::from_secs(10)));
    }

    #[test]
    fn jitter_is_bounded() {
        for _ in 0..1000 {
            let d = JITTER.next_delay(Duration::from_millis(50));
            assert!(d < Duration::from_millis(50));
        }
    }

    #[test]
    fn jitter_zero_bound_is_zero() {
        assert_eq!(JITTER.next_delay(Duration::ZERO), Duration::ZERO);
    }
}

//! Per-table rate limiting seam (spec §1 non-goal: "rate-limiting
//! (token-bucket governor around the execute loop)").
//!
//! Spec §5: "The rate limiter (external collaborator) maintains per-table
//! token buckets; the executor consults it around the transport call."

use std::time::Duration;

/// Consulted by the executor immediately before and after a transport call,
/// when the handle was configured with one (spec §5).
pub trait RateLimiter: Send + Sync {
    /// Blocks (conceptually — implementations may return a wait duration
    /// for the caller to sleep) until `units` of capacity are available for
    /// `table_name`. Returning `Duration::ZERO` means proceed immediately.
    fn acquire(&self, table_name: &str, units: u32) -> Duration;

    /// Records units actually consumed, which may differ from what was
    /// requested once the server's own accounting is known.
    fn consume(&self, table_name: &str, units: u32);
}

/// A limiter that never throttles, used when no limiter is configured.
#[derive(Debug, Default)]
pub struct NoRateLimiter;

impl RateLimiter for NoRateLimiter {
    fn acquire(&self, _table_name: &str, _units: u32) -> Duration {
        Duration::ZERO
    }

    fn consume(&self, _table_name: &str, _units: u32) {}
}

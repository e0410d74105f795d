//! Per-operation option structs (spec §3 "Options").
//!
//! Every field is optional; resolution precedence is per-call options >
//! handle defaults (from [`crate::Config`]) > a fixed system default,
//! applied at the point each option is actually needed rather than eagerly
//! merged into one struct — the way `neo4rs::config::Config` layers its own
//! builder defaults under explicit per-call overrides.

use crate::client::NosqlHandle;
use crate::request::RequestBase;
use std::time::Duration;

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(500);

/// Fields shared by every per-call options struct: a timeout override and a
/// compartment/namespace override. Neither is required; both fall back to
/// the handle's configured defaults.
#[derive(Debug, Clone, Default)]
pub struct CommonOptions {
    pub timeout: Option<Duration>,
    pub compartment_or_namespace: Option<String>,
}

impl CommonOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn compartment_or_namespace(mut self, value: impl Into<String>) -> Self {
        self.compartment_or_namespace = Some(value.into());
        self
    }

    /// Builds a fresh [`RequestBase`] with the per-call override (if any)
    /// layered over the handle's configured request timeout (spec §3
    /// "Options" precedence: per-call > handle defaults > system default).
    pub(crate) fn request_base(&self, client: &NosqlHandle) -> RequestBase {
        self.request_base_with_default(client, client.config().request_timeout())
    }

    /// Same as [`Self::request_base`], but layers over the handle's
    /// configured *table* request timeout instead — used by DDL-ish
    /// operations (`TableDdl`, `Admin`) whose server-side turnaround is
    /// typically slower (spec §6.3, DESIGN.md).
    pub(crate) fn ddl_request_base(&self, client: &NosqlHandle) -> RequestBase {
        self.request_base_with_default(client, client.config().table_request_timeout())
    }

    fn request_base_with_default(&self, client: &NosqlHandle, default_timeout: Duration) -> RequestBase {
        RequestBase {
            configured_timeout: self.timeout,
            default_timeout: Some(default_timeout),
            compartment_or_namespace: self
                .compartment_or_namespace
                .clone()
                .or_else(|| client.config().compartment_or_namespace().map(String::from)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableDdlOptions {
    pub common: CommonOptions,
}

#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub common: CommonOptions,
}

#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub common: CommonOptions,
    pub return_existing: bool,
    pub ttl: Option<Duration>,
    pub identity_cache_size: Option<i32>,
}

impl PutOptions {
    pub fn return_existing(mut self, value: bool) -> Self {
        self.return_existing = value;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub common: CommonOptions,
    pub return_existing: bool,
}

impl DeleteOptions {
    pub fn return_existing(mut self, value: bool) -> Self {
        self.return_existing = value;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteRangeOptions {
    pub common: CommonOptions,
    pub continuation_key: Option<Vec<u8>>,
    pub max_write_kb: Option<i32>,
}

impl DeleteRangeOptions {
    pub fn max_write_kb(mut self, value: i32) -> Self {
        self.max_write_kb = Some(value);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListTablesOptions {
    pub common: CommonOptions,
    pub from_index: i32,
    pub limit: Option<i32>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GetTableUsageOptions {
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
    pub limit: Option<i32>,
    pub start_index: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplicaOptions {
    pub read_units: Option<i32>,
    pub write_units: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub common: CommonOptions,
    pub max_read_kb: Option<i32>,
    pub max_write_kb: Option<i32>,
    pub number_limit: Option<i32>,
}

/// Governs a DDL completion poll (spec §4.5): the overall budget and the
/// interval between polls. Both fall back to a fixed system default, since
/// there is no handle-level "default poll cadence" concept in spec §6.3.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollOptions {
    pub timeout: Option<Duration>,
    pub delay: Option<Duration>,
}

impl PollOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_POLL_TIMEOUT)
    }

    pub fn poll_delay(&self) -> Duration {
        self.delay.unwrap_or(DEFAULT_POLL_DELAY)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdminOptions {
    pub poll: PollOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_options_fall_back_to_system_defaults() {
        let options = PollOptions::default();
        assert_eq!(options.poll_timeout(), DEFAULT_POLL_TIMEOUT);
        assert_eq!(options.poll_delay(), DEFAULT_POLL_DELAY);
    }

    #[test]
    fn poll_options_per_call_override_wins() {
        let options = PollOptions::default().timeout(Duration::from_secs(5));
        assert_eq!(options.poll_timeout(), Duration::from_secs(5));
    }

    fn handle_with_timeouts(request_timeout: Duration, table_request_timeout: Duration) -> NosqlHandle {
        let config = crate::Config::builder()
            .endpoint("https://example.com")
            .unwrap()
            .request_timeout(request_timeout)
            .table_request_timeout(table_request_timeout)
            .build()
            .unwrap();
        NosqlHandle::builder(config).build()
    }

    #[test]
    fn request_base_falls_back_to_handle_configured_timeout() {
        let client = handle_with_timeouts(Duration::from_secs(7), Duration::from_secs(30));
        let base = CommonOptions::default().request_base(&client);
        assert_eq!(base.configured_timeout, None);
        assert_eq!(base.default_timeout, Some(Duration::from_secs(7)));
    }

    #[test]
    fn per_call_timeout_override_beats_handle_default() {
        let client = handle_with_timeouts(Duration::from_secs(7), Duration::from_secs(30));
        let options = CommonOptions::default().timeout(Duration::from_secs(2));
        let base = options.request_base(&client);
        assert_eq!(base.configured_timeout, Some(Duration::from_secs(2)));
        assert_eq!(base.default_timeout, Some(Duration::from_secs(7)));
    }

    #[test]
    fn ddl_request_base_uses_table_request_timeout() {
        let client = handle_with_timeouts(Duration::from_secs(7), Duration::from_secs(30));
        let base = CommonOptions::default().ddl_request_base(&client);
        assert_eq!(base.default_timeout, Some(Duration::from_secs(30)));
    }
}

//! Typed request taxonomy (spec §3, §4.1, §9 "Typed request hierarchy").
//!
//! The source models request kinds through deep inheritance plus a
//! per-row generic parameter; per spec §9 Design Notes this driver instead
//! uses one tagged-union enum with a shared base record, the way
//! `neo4rs::messages::BoltRequest` is one opcode-tagged enum rather than a
//! class hierarchy.

pub mod admin;
pub mod query;
pub mod row;
pub mod table;

use crate::errors::Error;
use crate::protocol::ProtocolVersion;
use crate::time::Deadline;
use crate::wire::OpCode;
use std::time::Duration;

/// Fields shared by every request variant (spec §3 "Request" invariants).
/// Mutated only by the executor, on its own thread of control; a `Request`
/// is never shared across concurrent executions.
#[derive(Debug, Default)]
pub struct RequestBase {
    /// Per-call timeout override; falls back to a per-operation default in
    /// `init()` if unset.
    pub configured_timeout: Option<Duration>,
    /// Handle-level default timeout (from [`crate::Config`]), consulted when
    /// no per-call override is set; falls back to a hardcoded system
    /// default if the handle has none either (spec §3 "Options" precedence:
    /// per-call > handle defaults > system defaults).
    pub default_timeout: Option<Duration>,
    pub compartment_or_namespace: Option<String>,
    pub retry_count: u32,
    pub exceptions: Vec<Error>,
    /// The protocol version this request was last serialized with; compared
    /// against the handle's current version to detect a concurrent
    /// downgrade (spec §4.2 "Cross-request interaction").
    pub protocol_version: Option<ProtocolVersion>,
    pub deadline: Option<Deadline>,
    /// Whether the topology has moved on since this request's last
    /// successful attempt (set by request-specific `apply_result` hooks);
    /// unused by the base executor loop but threaded through for callers
    /// that do their own topology-aware routing.
    pub topology_seqno: i32,
}

impl RequestBase {
    /// Captures the wall-clock start and effective timeout (spec §4.2 step
    /// 2). Idempotent: a request polled or retried multiple times keeps its
    /// first deadline. Resolution precedence: per-call `configured_timeout`
    /// > handle-level `default_timeout` > the caller-supplied system
    /// default (spec §3 "Options").
    pub fn init(&mut self, system_default: Duration) -> Deadline {
        let timeout = self
            .configured_timeout
            .or(self.default_timeout)
            .unwrap_or(system_default);
        *self.deadline.get_or_insert_with(|| Deadline::starting_now(timeout))
    }

    pub fn remaining_timeout(&self) -> Duration {
        self.deadline.map(|d| d.remaining()).unwrap_or(Duration::ZERO)
    }

    /// Records a failed attempt. Consecutive "security-info-not-ready"
    /// exceptions fold into one entry so a long stall doesn't grow the list
    /// without bound (spec §3, §7).
    pub fn add_exception(&mut self, exception: Error) {
        let is_security_info_not_ready = matches!(
            &exception,
            Error::Service(e) if e.code.is_security_info_not_ready()
        );
        if is_security_info_not_ready {
            if let Some(Error::Service(last)) = self.exceptions.last() {
                if last.code.is_security_info_not_ready() {
                    *self.exceptions.last_mut().unwrap() = exception;
                    return;
                }
            }
        }
        self.exceptions.push(exception);
    }

    pub fn last_exception(&self) -> Option<&Error> {
        self.exceptions.last()
    }

    pub fn prior_exception(&self) -> Option<&Error> {
        let len = self.exceptions.len();
        len.checked_sub(2).map(|i| &self.exceptions[i])
    }
}

/// A typed request, one variant per wire opcode (spec §6.1). Shared fields
/// live in each variant's embedded [`RequestBase`]; operation-specific
/// fields are the variant's own.
#[derive(Debug)]
pub enum Request {
    TableDdl(table::TableDdlRequest),
    GetTable(table::GetTableRequest),
    GetIndexes(table::GetIndexesRequest),
    ListTables(table::ListTablesRequest),
    GetTableUsage(table::GetTableUsageRequest),
    AddReplica(table::AddReplicaRequest),
    DropReplica(table::DropReplicaRequest),
    GetReplicaStats(table::GetReplicaStatsRequest),
    Get(row::GetRequest),
    Put(row::PutRequest),
    Delete(row::DeleteRequest),
    DeleteRange(row::DeleteRangeRequest),
    WriteMany(row::WriteManyRequest),
    Prepare(query::PrepareRequest),
    Query(query::QueryRequest),
    Admin(admin::AdminRequest),
    GetAdminStatus(admin::GetAdminStatusRequest),
}

impl Request {
    pub fn opcode(&self) -> OpCode {
        match self {
            Request::TableDdl(_) => OpCode::TableRequest,
            Request::GetTable(_) => OpCode::GetTable,
            Request::GetIndexes(_) => OpCode::GetIndexes,
            Request::ListTables(_) => OpCode::ListTables,
            Request::GetTableUsage(_) => OpCode::GetTableUsage,
            Request::AddReplica(_) => OpCode::AddReplica,
            Request::DropReplica(_) => OpCode::DropReplica,
            Request::GetReplicaStats(_) => OpCode::GetReplicaStats,
            Request::Get(_) => OpCode::Get,
            Request::Put(_) => OpCode::Put,
            Request::Delete(_) => OpCode::Delete,
            Request::DeleteRange(_) => OpCode::DeleteRange,
            Request::WriteMany(_) => OpCode::WriteMany,
            Request::Prepare(_) => OpCode::Prepare,
            Request::Query(_) => OpCode::Query,
            Request::Admin(_) => OpCode::Admin,
            Request::GetAdminStatus(_) => OpCode::GetAdminStatus,
        }
    }

    pub fn base(&self) -> &RequestBase {
        match self {
            Request::TableDdl(r) => &r.base,
            Request::GetTable(r) => &r.base,
            Request::GetIndexes(r) => &r.base,
            Request::ListTables(r) => &r.base,
            Request::GetTableUsage(r) => &r.base,
            Request::AddReplica(r) => &r.base,
            Request::DropReplica(r) => &r.base,
            Request::GetReplicaStats(r) => &r.base,
            Request::Get(r) => &r.base,
            Request::Put(r) => &r.base,
            Request::Delete(r) => &r.base,
            Request::DeleteRange(r) => &r.base,
            Request::WriteMany(r) => &r.base,
            Request::Prepare(r) => &r.base,
            Request::Query(r) => &r.base,
            Request::Admin(r) => &r.base,
            Request::GetAdminStatus(r) => &r.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut RequestBase {
        match self {
            Request::TableDdl(r) => &mut r.base,
            Request::GetTable(r) => &mut r.base,
            Request::GetIndexes(r) => &mut r.base,
            Request::ListTables(r) => &mut r.base,
            Request::GetTableUsage(r) => &mut r.base,
            Request::AddReplica(r) => &mut r.base,
            Request::DropReplica(r) => &mut r.base,
            Request::GetReplicaStats(r) => &mut r.base,
            Request::Get(r) => &mut r.base,
            Request::Put(r) => &mut r.base,
            Request::Delete(r) => &mut r.base,
            Request::DeleteRange(r) => &mut r.base,
            Request::WriteMany(r) => &mut r.base,
            Request::Prepare(r) => &mut r.base,
            Request::Query(r) => &mut r.base,
            Request::Admin(r) => &mut r.base,
            Request::GetAdminStatus(r) => &mut r.base,
        }
    }

    /// Fails fast before any network I/O (spec §4.2 step 1).
    pub fn validate(&self) -> crate::errors::Result<()> {
        match self {
            Request::TableDdl(r) => r.validate(),
            Request::GetTable(r) => r.validate(),
            Request::GetIndexes(r) => r.validate(),
            Request::ListTables(r) => r.validate(),
            Request::GetTableUsage(r) => r.validate(),
            Request::AddReplica(r) => r.validate(),
            Request::DropReplica(r) => r.validate(),
            Request::GetReplicaStats(r) => r.validate(),
            Request::Get(r) => r.validate(),
            Request::Put(r) => r.validate(),
            Request::Delete(r) => r.validate(),
            Request::DeleteRange(r) => r.validate(),
            Request::WriteMany(r) => r.validate(),
            Request::Prepare(r) => r.validate(),
            Request::Query(r) => r.validate(),
            Request::Admin(r) => r.validate(),
            Request::GetAdminStatus(r) => r.validate(),
        }
    }

    /// The default timeout used when no per-call timeout was configured.
    /// DDL operations default longer than row operations, matching their
    /// typically slower server-side turnaround.
    pub fn default_timeout(&self) -> Duration {
        match self {
            Request::TableDdl(_) | Request::Admin(_) => table::DEFAULT_POLL_REQUEST_TIMEOUT * 2,
            _ => Duration::from_secs(5),
        }
    }

    pub fn init(&mut self) -> Deadline {
        let timeout = self.default_timeout();
        self.base_mut().init(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorCode, ServiceError};

    #[test]
    fn validate_rejects_empty_table_name() {
        let req = Request::GetTable(table::GetTableRequest::default());
        assert!(req.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_put_value() {
        let req = Request::Put(row::PutRequest {
            table_name: "t".into(),
            ..Default::default()
        });
        assert!(req.validate().is_err());
    }

    #[test]
    fn query_validate_requires_exactly_one_of_statement_or_prepared() {
        let req = query::QueryRequest::default();
        assert!(req.validate().is_err());
    }

    #[test]
    fn add_exception_folds_consecutive_security_info_not_ready() {
        let mut base = RequestBase::default();
        base.add_exception(Error::Service(ServiceError::new(
            ErrorCode::SecurityInfoNotReady,
            "not ready",
        )));
        base.add_exception(Error::Service(ServiceError::new(
            ErrorCode::SecurityInfoNotReady,
            "still not ready",
        )));
        assert_eq!(base.exceptions.len(), 1);

        base.add_exception(Error::Service(ServiceError::new(
            ErrorCode::ReadThrottling,
            "throttled",
        )));
        assert_eq!(base.exceptions.len(), 2);
    }

    #[test]
    fn init_is_idempotent() {
        let mut base = RequestBase::default();
        let first = base.init(Duration::from_secs(5));
        let second = base.init(Duration::from_secs(99));
        assert_eq!(first.timeout(), second.timeout());
    }

    #[test]
    fn init_prefers_per_call_over_handle_default_over_system_default() {
        let mut base = RequestBase {
            default_timeout: Some(Duration::from_secs(20)),
            ..Default::default()
        };
        let deadline = base.init(Duration::from_secs(5));
        assert_eq!(deadline.timeout(), Duration::from_secs(20));

        let mut base = RequestBase {
            configured_timeout: Some(Duration::from_secs(2)),
            default_timeout: Some(Duration::from_secs(20)),
            ..Default::default()
        };
        let deadline = base.init(Duration::from_secs(5));
        assert_eq!(deadline.timeout(), Duration::from_secs(2));

        let mut base = RequestBase::default();
        let deadline = base.init(Duration::from_secs(5));
        assert_eq!(deadline.timeout(), Duration::from_secs(5));
    }
}

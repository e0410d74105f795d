//! User-facing client handle (spec §4.1).
//!
//! Grounded on `neo4rs::graph::Graph`: a thread-safe, cloneable handle owning
//! configuration and a pool-equivalent collaborator, exposing grouped async
//! operations that each build a request and delegate to a shared execution
//! path. Here the execution path is the [`crate::executor`] loop rather than
//! `backoff::future::retry_notify`, and the pool-equivalent is the
//! [`crate::transport::Transport`] seam plus the handle-scoped
//! [`crate::protocol::ProtocolHandler`].

use crate::auth::{Authenticator, FixedAuthenticator};
use crate::errors::{Error, Result};
use crate::executor;
use crate::iterator::{DeleteRangeIterator, ListTablesIterator, QueryIterator};
use crate::options::{
    AdminOptions, DeleteOptions, DeleteRangeOptions, GetOptions, GetTableUsageOptions,
    ListTablesOptions, PollOptions, PutOptions, QueryOptions, ReplicaOptions, TableDdlOptions,
};
use crate::protocol::ProtocolHandler;
use crate::rate_limiter::{NoRateLimiter, RateLimiter};
use crate::request::admin::{AdminRequest, GetAdminStatusRequest};
use crate::request::query::{PrepareRequest, QueryRequest};
use crate::request::row::{
    DeleteOption, DeleteRangeRequest, DeleteRequest, GetRequest, PutOption, PutRequest,
    WriteManyRequest, WriteOperation,
};
use crate::request::table::{
    AddReplicaRequest, DropReplicaRequest, GetIndexesRequest, GetReplicaStatsRequest,
    GetTableRequest, GetTableUsageRequest, ListTablesRequest, TableDdlRequest,
};
use crate::request::{Request, RequestBase};
use crate::result::{
    AdminResult, AdminState, ExecResult, GetResult, IndexInfo, OperationId, PreparedStatement,
    QueryResult, ReplicaStatsResult, RowVersion, TableLimits, TableResult, TableState,
    TableUsageResult, WriteManyResult, WriteResult,
};
use crate::result::Row;
use crate::retry::{DefaultRetryPolicy, RetryPolicy};
use crate::serializer::{Codec, DefaultCodec};
use crate::transport::{Transport, UnconfiguredTransport};
use crate::waiter;
use crate::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Inner {
    config: Config,
    protocol: ProtocolHandler,
    transport: Arc<dyn Transport>,
    authenticator: Arc<dyn Authenticator>,
    rate_limiter: Arc<dyn RateLimiter>,
    retry_policy: Arc<dyn RetryPolicy>,
    codec: Arc<dyn Codec>,
    disposed: AtomicBool,
}

/// A handle to the database service. Cloning is cheap: internal resources
/// are reference-counted and shared, the way `neo4rs::Graph` is `Clone`
/// (spec §5 "the handle is safe for concurrent use").
///
/// Requests never own the handle; the handle is threaded explicitly through
/// the executor/waiter/iterator call paths instead (spec §9 "Cyclic
/// references"), so there is no `Request -> Client` back-reference to break.
#[derive(Clone)]
pub struct NosqlHandle {
    inner: Arc<Inner>,
}

/// Builds a [`NosqlHandle`] with pluggable collaborators. The production
/// collaborators (HTTP transport, IAM/password signing, token-bucket rate
/// limiting) are named non-goals of this core (spec §1); this builder lets a
/// caller supply them, or fall back to a transport that always fails and a
/// no-op rate limiter, which is enough to exercise the core against a mock.
pub struct NosqlHandleBuilder {
    config: Config,
    transport: Arc<dyn Transport>,
    authenticator: Arc<dyn Authenticator>,
    rate_limiter: Arc<dyn RateLimiter>,
    retry_policy: Arc<dyn RetryPolicy>,
    codec: Arc<dyn Codec>,
}

impl NosqlHandleBuilder {
    pub fn new(config: Config) -> Self {
        NosqlHandleBuilder {
            config,
            transport: Arc::new(UnconfiguredTransport),
            authenticator: Arc::new(FixedAuthenticator::new("")),
            rate_limiter: Arc::new(NoRateLimiter),
            retry_policy: Arc::new(DefaultRetryPolicy::default()),
            codec: Arc::new(DefaultCodec),
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn retry_policy(mut self, retry_policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn build(self) -> NosqlHandle {
        NosqlHandle {
            inner: Arc::new(Inner {
                config: self.config,
                protocol: ProtocolHandler::new(),
                transport: self.transport,
                authenticator: self.authenticator,
                rate_limiter: self.rate_limiter,
                retry_policy: self.retry_policy,
                codec: self.codec,
                disposed: AtomicBool::new(false),
            }),
        }
    }
}

impl NosqlHandle {
    pub fn builder(config: Config) -> NosqlHandleBuilder {
        NosqlHandleBuilder::new(config)
    }

    pub(crate) fn config(&self) -> &Config {
        &self.inner.config
    }

    pub(crate) fn protocol(&self) -> &ProtocolHandler {
        &self.inner.protocol
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub(crate) fn authenticator(&self) -> &dyn Authenticator {
        self.inner.authenticator.as_ref()
    }

    pub(crate) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.inner.rate_limiter.as_ref()
    }

    pub(crate) fn retry_policy(&self) -> &dyn RetryPolicy {
        self.inner.retry_policy.as_ref()
    }

    pub(crate) fn codec(&self) -> &dyn Codec {
        self.inner.codec.as_ref()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Releases the transport and marks the handle disposed. Idempotent; a
    /// second call is a no-op (spec §5 "Dispose releases them exactly
    /// once"). Subsequent operations fail with [`Error::Disposed`].
    pub async fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::AcqRel) {
            self.inner.transport.dispose().await;
        }
    }

    // ---- Table lifecycle -------------------------------------------------

    /// Issues a DDL statement (`CREATE TABLE`, `DROP TABLE`, `ALTER TABLE`,
    /// tagging, limit change) and returns immediately with the table's
    /// state as of acceptance; the operation itself completes
    /// asynchronously server-side (spec §4.1, GLOSSARY "DDL operation").
    pub async fn table_ddl(
        &self,
        statement: impl Into<String>,
        limits: Option<TableLimits>,
        options: TableDdlOptions,
        cancel: &CancellationToken,
    ) -> Result<TableResult> {
        self.require_not_disposed()?;
        let mut request = Request::TableDdl(TableDdlRequest {
            statement: statement.into(),
            limits,
            table_name: None,
            compartment_id: None,
            base: options.common.ddl_request_base(self),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::TableDdl(result) => Ok(result),
            _ => unreachable!("TableDdl request always yields ExecResult::TableDdl"),
        }
    }

    /// Issues a DDL statement and polls until the table reaches `target`
    /// state (spec §4.1 "poll for a target state", §4.5).
    pub async fn table_ddl_and_wait(
        &self,
        statement: impl Into<String>,
        limits: Option<TableLimits>,
        target: TableState,
        options: TableDdlOptions,
        poll: PollOptions,
        cancel: &CancellationToken,
    ) -> Result<TableResult> {
        let initial = self
            .table_ddl(statement, limits, options, cancel)
            .await?;
        waiter::wait_for_table_state(
            self,
            &initial.name,
            initial.operation_id.clone(),
            target,
            poll.poll_timeout(),
            poll.poll_delay(),
            cancel,
        )
        .await
    }

    pub async fn get_table(
        &self,
        table_name: impl Into<String>,
        operation_id: Option<OperationId>,
        cancel: &CancellationToken,
    ) -> Result<TableResult> {
        self.require_not_disposed()?;
        let mut request = Request::GetTable(GetTableRequest {
            table_name: table_name.into(),
            operation_id,
            base: Default::default(),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::GetTable(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    /// Polls an already-issued table operation to completion without
    /// re-issuing the DDL (spec §4.1 "poll for a target state").
    pub async fn wait_for_table_state(
        &self,
        table_name: impl Into<String>,
        target: TableState,
        poll: PollOptions,
        cancel: &CancellationToken,
    ) -> Result<TableResult> {
        waiter::wait_for_table_state(
            self,
            &table_name.into(),
            None,
            target,
            poll.poll_timeout(),
            poll.poll_delay(),
            cancel,
        )
        .await
    }

    pub async fn get_indexes(
        &self,
        table_name: impl Into<String>,
        index_name: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Vec<IndexInfo>> {
        self.require_not_disposed()?;
        let mut request = Request::GetIndexes(GetIndexesRequest {
            table_name: table_name.into(),
            index_name,
            base: Default::default(),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::GetIndexes(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    /// Returns a lazy, restartable paged sequence of table names (spec
    /// §4.1 "list tables (paged)", §4.6).
    pub fn list_tables(&self, options: ListTablesOptions) -> ListTablesIterator<'_> {
        ListTablesIterator::new(self, options)
    }

    pub async fn add_replica(
        &self,
        table_name: impl Into<String>,
        replica_region: impl Into<String>,
        options: ReplicaOptions,
        cancel: &CancellationToken,
    ) -> Result<TableResult> {
        self.require_not_disposed()?;
        let mut request = Request::AddReplica(AddReplicaRequest {
            table_name: table_name.into(),
            replica_region: replica_region.into(),
            read_units: options.read_units,
            write_units: options.write_units,
            base: Default::default(),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::AddReplica(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    pub async fn drop_replica(
        &self,
        table_name: impl Into<String>,
        replica_region: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<TableResult> {
        self.require_not_disposed()?;
        let mut request = Request::DropReplica(DropReplicaRequest {
            table_name: table_name.into(),
            replica_region: replica_region.into(),
            base: Default::default(),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::DropReplica(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    pub async fn get_replica_stats(
        &self,
        table_name: impl Into<String>,
        replica_region: Option<String>,
        start_time_ms: Option<i64>,
        limit: Option<i32>,
        cancel: &CancellationToken,
    ) -> Result<ReplicaStatsResult> {
        self.require_not_disposed()?;
        let mut request = Request::GetReplicaStats(GetReplicaStatsRequest {
            table_name: table_name.into(),
            replica_region,
            start_time_ms,
            limit,
            base: Default::default(),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::GetReplicaStats(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    // ---- Row I/O -----------------------------------------------------

    pub async fn get(
        &self,
        table_name: impl Into<String>,
        key: Row,
        options: GetOptions,
        cancel: &CancellationToken,
    ) -> Result<GetResult> {
        self.require_not_disposed()?;
        let mut request = Request::Get(GetRequest {
            table_name: table_name.into(),
            key,
            base: options.common.request_base(self),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::Get(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    async fn put_internal(
        &self,
        table_name: String,
        value: Row,
        option: PutOption,
        options: PutOptions,
        cancel: &CancellationToken,
    ) -> Result<WriteResult> {
        self.require_not_disposed()?;
        let mut request = Request::Put(PutRequest {
            table_name,
            value,
            option,
            return_existing: options.return_existing,
            ttl: options.ttl,
            identity_cache_size: options.identity_cache_size,
            base: options.common.request_base(self),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::Put(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    pub async fn put(
        &self,
        table_name: impl Into<String>,
        value: Row,
        options: PutOptions,
        cancel: &CancellationToken,
    ) -> Result<WriteResult> {
        self.put_internal(table_name.into(), value, PutOption::Always, options, cancel)
            .await
    }

    pub async fn put_if_absent(
        &self,
        table_name: impl Into<String>,
        value: Row,
        options: PutOptions,
        cancel: &CancellationToken,
    ) -> Result<WriteResult> {
        self.put_internal(table_name.into(), value, PutOption::IfAbsent, options, cancel)
            .await
    }

    pub async fn put_if_present(
        &self,
        table_name: impl Into<String>,
        value: Row,
        options: PutOptions,
        cancel: &CancellationToken,
    ) -> Result<WriteResult> {
        self.put_internal(table_name.into(), value, PutOption::IfPresent, options, cancel)
            .await
    }

    pub async fn put_if_version(
        &self,
        table_name: impl Into<String>,
        value: Row,
        version: RowVersion,
        options: PutOptions,
        cancel: &CancellationToken,
    ) -> Result<WriteResult> {
        self.put_internal(
            table_name.into(),
            value,
            PutOption::IfVersion(version),
            options,
            cancel,
        )
        .await
    }

    async fn delete_internal(
        &self,
        table_name: String,
        key: Row,
        option: DeleteOption,
        options: DeleteOptions,
        cancel: &CancellationToken,
    ) -> Result<WriteResult> {
        self.require_not_disposed()?;
        let mut request = Request::Delete(DeleteRequest {
            table_name,
            key,
            option,
            return_existing: options.return_existing,
            base: options.common.request_base(self),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::Delete(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    pub async fn delete(
        &self,
        table_name: impl Into<String>,
        key: Row,
        options: DeleteOptions,
        cancel: &CancellationToken,
    ) -> Result<WriteResult> {
        self.delete_internal(table_name.into(), key, DeleteOption::Unconditional, options, cancel)
            .await
    }

    pub async fn delete_if_version(
        &self,
        table_name: impl Into<String>,
        key: Row,
        version: RowVersion,
        options: DeleteOptions,
        cancel: &CancellationToken,
    ) -> Result<WriteResult> {
        self.delete_internal(
            table_name.into(),
            key,
            DeleteOption::IfVersion(version),
            options,
            cancel,
        )
        .await
    }

    /// Single-shot delete-range: one server round trip, possibly leaving a
    /// continuation key for the caller to resume manually (spec §4.1
    /// "delete-range (atomic single-shot and paged)").
    pub async fn delete_range(
        &self,
        table_name: impl Into<String>,
        partial_key: Row,
        options: DeleteRangeOptions,
        cancel: &CancellationToken,
    ) -> Result<crate::result::DeleteRangeResult> {
        self.require_not_disposed()?;
        let mut request = Request::DeleteRange(DeleteRangeRequest {
            table_name: table_name.into(),
            partial_key,
            continuation_key: options.continuation_key.clone(),
            max_write_kb: options.max_write_kb,
            base: options.common.request_base(self),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::DeleteRange(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    /// Returns a lazy, restartable paged sequence over a delete-range
    /// operation (spec §4.1, §4.6).
    pub fn delete_range_paged(
        &self,
        table_name: impl Into<String>,
        partial_key: Row,
        options: DeleteRangeOptions,
    ) -> DeleteRangeIterator<'_> {
        DeleteRangeIterator::new(self, table_name.into(), partial_key, options)
    }

    // ---- Batch ---------------------------------------------------------

    pub async fn write_many(
        &self,
        table_name: impl Into<String>,
        operations: Vec<WriteOperation>,
        cancel: &CancellationToken,
    ) -> Result<WriteManyResult> {
        self.require_not_disposed()?;
        let mut request = Request::WriteMany(WriteManyRequest {
            table_name: table_name.into(),
            operations,
            base: Default::default(),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::WriteMany(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    /// Convenience batch of homogeneous unconditional puts (spec §4.1
    /// "put-many").
    pub async fn put_many(
        &self,
        table_name: impl Into<String>,
        values: Vec<Row>,
        cancel: &CancellationToken,
    ) -> Result<WriteManyResult> {
        let ops = values
            .into_iter()
            .map(|value| WriteOperation::Put {
                value,
                option: PutOption::Always,
                abort_if_unsuccessful: false,
            })
            .collect();
        self.write_many(table_name, ops, cancel).await
    }

    /// Convenience batch of homogeneous unconditional deletes (spec §4.1
    /// "delete-many").
    pub async fn delete_many(
        &self,
        table_name: impl Into<String>,
        keys: Vec<Row>,
        cancel: &CancellationToken,
    ) -> Result<WriteManyResult> {
        let ops = keys
            .into_iter()
            .map(|key| WriteOperation::Delete {
                key,
                option: DeleteOption::Unconditional,
                abort_if_unsuccessful: false,
            })
            .collect();
        self.write_many(table_name, ops, cancel).await
    }

    // ---- Query -----------------------------------------------------------

    pub async fn prepare(
        &self,
        statement: impl Into<String>,
        get_query_plan: bool,
        cancel: &CancellationToken,
    ) -> Result<PreparedStatement> {
        self.require_not_disposed()?;
        let mut request = Request::Prepare(PrepareRequest {
            statement: statement.into(),
            get_query_plan,
            base: Default::default(),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::Prepare(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    /// Executes one page of a query (spec §4.1 "execute (single-shot...)").
    /// The raw single-shot surface: for a never-before-prepared query the
    /// first call may return an empty row set plus a continuation key
    /// carrying the newly prepared statement (spec §4.6/§8) — callers that
    /// want that chained automatically should use [`Self::query`] instead.
    pub async fn execute_query(
        &self,
        request: QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<QueryResult> {
        self.require_not_disposed()?;
        let mut request = Request::Query(request);
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::Query(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    /// Returns a lazy, restartable paged sequence over a query (spec §4.1
    /// "execute ... paged as lazy sequence", §4.6). Handles the
    /// prepare-then-resume dance for not-yet-prepared statements
    /// internally; pages surfaced to the caller always carry rows (or are
    /// the single terminal empty page).
    pub fn query(&self, statement: impl Into<String>, options: QueryOptions) -> QueryIterator<'_> {
        QueryIterator::new(self, statement.into(), options)
    }

    // ---- Usage / stats ---------------------------------------------------

    pub async fn get_table_usage(
        &self,
        table_name: impl Into<String>,
        options: GetTableUsageOptions,
        cancel: &CancellationToken,
    ) -> Result<TableUsageResult> {
        self.require_not_disposed()?;
        let mut request = Request::GetTableUsage(GetTableUsageRequest {
            table_name: table_name.into(),
            start_time_ms: options.start_time_ms,
            end_time_ms: options.end_time_ms,
            limit: options.limit,
            start_index: options.start_index,
            base: Default::default(),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::GetTableUsage(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    // ---- Admin DDL ---------------------------------------------------------

    pub async fn admin(
        &self,
        statement: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<AdminResult> {
        self.require_not_disposed()?;
        let mut request = Request::Admin(AdminRequest {
            statement: statement.into(),
            base: RequestBase {
                default_timeout: Some(self.config().table_request_timeout()),
                ..Default::default()
            },
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::Admin(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    pub async fn admin_and_wait(
        &self,
        statement: impl Into<String>,
        options: AdminOptions,
        cancel: &CancellationToken,
    ) -> Result<AdminResult> {
        let initial = self.admin(statement, cancel).await?;
        if initial.state == AdminState::Complete {
            return Ok(initial);
        }
        waiter::wait_for_admin_completion(
            self,
            initial.operation_id.clone(),
            options.poll.poll_timeout(),
            options.poll.poll_delay(),
            cancel,
        )
        .await
    }

    pub async fn get_admin_status(
        &self,
        operation_id: Option<OperationId>,
        cancel: &CancellationToken,
    ) -> Result<AdminResult> {
        self.require_not_disposed()?;
        let mut request = Request::GetAdminStatus(GetAdminStatusRequest {
            operation_id,
            base: Default::default(),
        });
        match executor::execute(self, &mut request, cancel).await? {
            ExecResult::GetAdminStatus(result) => Ok(result),
            _ => unreachable!(),
        }
    }

    /// Lists namespaces by issuing `SHOW AS JSON NAMESPACES` and parsing the
    /// admin-JSON output (spec §4.1 "list namespaces/users/roles (derived
    /// from admin SHOW … AS JSON)"). The JSON parsing engine itself is not
    /// this crate's concern generally (spec §1 non-goal), but this one
    /// fixed shape is simple enough to read inline.
    #[cfg(feature = "json")]
    pub async fn list_namespaces(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.list_admin_strings("SHOW AS JSON NAMESPACES", "namespaces", cancel)
            .await
    }

    #[cfg(feature = "json")]
    pub async fn list_users(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.list_admin_strings("SHOW AS JSON USERS", "users", cancel).await
    }

    #[cfg(feature = "json")]
    pub async fn list_roles(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.list_admin_strings("SHOW AS JSON ROLES", "roles", cancel).await
    }

    #[cfg(feature = "json")]
    async fn list_admin_strings(
        &self,
        statement: &str,
        field: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let result = self.admin(statement, cancel).await?;
        let output = result
            .output
            .ok_or_else(|| Error::BadProtocol("admin JSON output missing".into()))?;
        let value: serde_json::Value = serde_json::from_str(&output)?;
        let items = value
            .get(field)
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::BadProtocol(format!("admin JSON missing '{field}' array")))?;
        items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::BadProtocol(format!("non-string entry in '{field}'")))
            })
            .collect()
    }

    fn require_not_disposed(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::Disposed)
        } else {
            Ok(())
        }
    }
}

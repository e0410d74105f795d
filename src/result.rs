//! Per-operation result types and the value types they carry (spec §3).
//!
//! Grounded on `neo4rs::row::Row`/`neo4rs::summary`: results are plain value
//! types returned to the caller, independent of the request that produced
//! them; the executor may additionally mutate the originating request (to
//! install a prepared statement, say) after a result is deserialized.

use std::collections::BTreeMap;
use std::time::Duration;

/// A single field value within a row. Only the variants the core needs to
/// move opaquely between wire and caller; full type richness (e.g. map,
/// array, timestamp precision) is a transport/serializer concern.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i32),
    Long(i64),
    Double(f64),
    String(String),
    Boolean(bool),
    Binary(Vec<u8>),
    Null,
}

/// A row is a map from column name to value. Opaque to the core beyond
/// that: schema interpretation is the caller's concern.
pub type Row = BTreeMap<String, FieldValue>;

/// Opaque optimistic-concurrency token (spec GLOSSARY "Row version").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowVersion(pub Vec<u8>);

/// Server-reported read/write units charged for an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumedCapacity {
    pub read_units: i32,
    pub read_kb: i32,
    pub write_units: i32,
    pub write_kb: i32,
}

/// Result of get/put/delete variants that may echo back the row they
/// replaced (spec §8 scenario 2: conditional put-if-version failure).
#[derive(Debug, Clone, Default)]
pub struct WriteResult {
    pub success: bool,
    pub version: Option<RowVersion>,
    pub existing_row: Option<Row>,
    pub existing_version: Option<RowVersion>,
    pub consumed: ConsumedCapacity,
}

#[derive(Debug, Clone, Default)]
pub struct GetResult {
    pub row: Option<Row>,
    pub version: Option<RowVersion>,
    pub expiration: Option<Duration>,
    pub consumed: ConsumedCapacity,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteRangeResult {
    pub deleted_count: i32,
    pub continuation_key: Option<Vec<u8>>,
    pub consumed: ConsumedCapacity,
}

/// Outcome of one sub-operation within a `WriteMany` batch.
#[derive(Debug, Clone, Default)]
pub struct WriteOperationResult {
    pub success: bool,
    pub version: Option<RowVersion>,
    pub existing_row: Option<Row>,
    pub existing_version: Option<RowVersion>,
}

#[derive(Debug, Clone, Default)]
pub struct WriteManyResult {
    pub results: Vec<WriteOperationResult>,
    pub consumed: ConsumedCapacity,
}

/// Table state machine (spec §3). States form a lattice the waiter
/// converges on a target member of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Creating,
    Updating,
    Active,
    Dropping,
    Dropped,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableLimits {
    pub read_units: i32,
    pub write_units: i32,
    pub storage_gb: i32,
}

/// Opaque handle to an asynchronous DDL operation in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationId(pub String);

#[derive(Debug, Clone)]
pub struct TableResult {
    pub name: String,
    pub state: TableState,
    pub schema: Option<String>,
    pub limits: Option<TableLimits>,
    pub operation_id: Option<OperationId>,
    pub compartment_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminState {
    InProgress,
    Complete,
}

#[derive(Debug, Clone)]
pub struct AdminResult {
    pub state: AdminState,
    pub operation_id: Option<OperationId>,
    /// Raw admin-JSON output for `SHOW ... AS JSON` statements, parsed by
    /// the caller per spec §6.1 ("unparseable admin-JSON outputs are fatal
    /// bad-protocol errors" — parsing itself, when attempted, happens at
    /// this boundary, not here).
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListTablesResult {
    pub names: Vec<String>,
    pub next_index: i32,
}

#[derive(Debug, Clone, Default)]
pub struct TableUsageResult {
    pub records: Vec<TableUsageRecord>,
    pub next_start_index: i32,
}

#[derive(Debug, Clone)]
pub struct TableUsageRecord {
    pub read_units: i32,
    pub write_units: i32,
    pub storage_gb: i32,
    pub read_throttle_count: i32,
    pub write_throttle_count: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ReplicaStatsResult {
    pub table_name: String,
    pub stats: BTreeMap<String, Vec<ReplicaStatsRecord>>,
    pub next_start_index: i32,
}

#[derive(Debug, Clone)]
pub struct ReplicaStatsRecord {
    pub replica_lag_ms: i64,
}

/// Placeholder for the driver-side reduced query-plan runtime (spec §1
/// non-goal: "query-plan execution for advanced aggregation/sort"). The
/// core only ever stores and forwards this opaquely.
///
/// Note for whoever implements the real runtime: the source's
/// collect-aggregator counts memory against each element but uses the
/// *parent* value's total size for every element, which looks like a bug.
/// Count per-element size instead.
#[derive(Debug, Clone, Default)]
pub struct DriverPlanRuntime {
    _private: (),
}

/// Opaque server-issued handle for a parsed SQL query (spec §3).
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    pub statement_text: String,
    pub table_name: Option<String>,
    pub operation_code: i32,
    pub topology_seqno: i32,
    pub plan: Option<DriverPlanRuntime>,
}

/// Cursor for paged query results (spec §3). For advanced queries the
/// in-flight plan runtime travels with the key so later pages resume it.
#[derive(Debug, Clone, Default)]
pub struct QueryContinuationKey {
    pub server_token: Option<Vec<u8>>,
    pub plan_runtime: Option<DriverPlanRuntime>,
    pub prepared: Option<PreparedStatement>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub continuation_key: Option<QueryContinuationKey>,
    pub prepared_statement: Option<PreparedStatement>,
    pub consumed: ConsumedCapacity,
}

#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: String,
    pub fields: Vec<String>,
}

/// The executor's return value, one variant per [`crate::request::Request`]
/// variant. The caller downcasts via the accessor matching the request it
/// issued; the executor itself never needs to know the concrete shape.
#[derive(Debug, Clone)]
pub enum ExecResult {
    TableDdl(TableResult),
    GetTable(TableResult),
    GetIndexes(Vec<IndexInfo>),
    ListTables(ListTablesResult),
    GetTableUsage(TableUsageResult),
    AddReplica(TableResult),
    DropReplica(TableResult),
    GetReplicaStats(ReplicaStatsResult),
    Get(GetResult),
    Put(WriteResult),
    Delete(WriteResult),
    DeleteRange(DeleteRangeResult),
    WriteMany(WriteManyResult),
    Prepare(PreparedStatement),
    Query(QueryResult),
    Admin(AdminResult),
    GetAdminStatus(AdminResult),
}

//! Table lifecycle requests (spec §4.1 "Table lifecycle").

use super::RequestBase;
use crate::errors::{Error, Result};
use crate::result::{OperationId, TableLimits};
use std::time::Duration;

/// Default per-attempt timeout used while polling for DDL completion,
/// overridden by the overall poll timeout when that is smaller (spec §4.5).
pub const DEFAULT_POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
pub struct TableDdlRequest {
    pub base: RequestBase,
    pub statement: String,
    pub limits: Option<TableLimits>,
    pub table_name: Option<String>,
    pub compartment_id: Option<String>,
}

impl TableDdlRequest {
    pub fn validate(&self) -> Result<()> {
        if self.statement.trim().is_empty() {
            return Err(Error::IllegalArgument(
                "table DDL statement must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct GetTableRequest {
    pub base: RequestBase,
    pub table_name: String,
    /// When set, the server reports progress of this specific operation
    /// rather than the table's current state.
    pub operation_id: Option<OperationId>,
}

impl GetTableRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)
    }
}

#[derive(Debug, Default)]
pub struct ListTablesRequest {
    pub base: RequestBase,
    pub from_index: i32,
    pub limit: Option<i32>,
    pub namespace: Option<String>,
}

impl ListTablesRequest {
    pub fn validate(&self) -> Result<()> {
        if self.from_index < 0 {
            return Err(Error::IllegalArgument(
                "fromIndex must not be negative".into(),
            ));
        }
        if matches!(self.limit, Some(l) if l < 0) {
            return Err(Error::IllegalArgument("limit must not be negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct GetIndexesRequest {
    pub base: RequestBase,
    pub table_name: String,
    pub index_name: Option<String>,
}

impl GetIndexesRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)
    }
}

#[derive(Debug, Default)]
pub struct GetTableUsageRequest {
    pub base: RequestBase,
    pub table_name: String,
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
    pub limit: Option<i32>,
    pub start_index: Option<i32>,
}

impl GetTableUsageRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)
    }
}

#[derive(Debug, Default)]
pub struct AddReplicaRequest {
    pub base: RequestBase,
    pub table_name: String,
    pub replica_region: String,
    pub read_units: Option<i32>,
    pub write_units: Option<i32>,
}

impl AddReplicaRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)?;
        if self.replica_region.trim().is_empty() {
            return Err(Error::IllegalArgument(
                "replica region must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DropReplicaRequest {
    pub base: RequestBase,
    pub table_name: String,
    pub replica_region: String,
}

impl DropReplicaRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)?;
        if self.replica_region.trim().is_empty() {
            return Err(Error::IllegalArgument(
                "replica region must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct GetReplicaStatsRequest {
    pub base: RequestBase,
    pub table_name: String,
    pub replica_region: Option<String>,
    pub start_time_ms: Option<i64>,
    pub limit: Option<i32>,
}

impl GetReplicaStatsRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)
    }
}

pub(super) fn require_table_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::IllegalArgument("table name must not be empty".into()));
    }
    Ok(())
}

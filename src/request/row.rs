//! Row I/O and batch requests (spec §4.1 "Row I/O", "Batch").

use super::table::require_table_name;
use super::RequestBase;
use crate::errors::{Error, Result};
use crate::result::{Row, RowVersion};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct GetRequest {
    pub base: RequestBase,
    pub table_name: String,
    pub key: Row,
}

impl GetRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)?;
        require_nonempty_key(&self.key)
    }
}

/// Put condition, spec §4.1: "unconditional, if-absent, if-present,
/// if-version".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PutOption {
    #[default]
    Always,
    IfAbsent,
    IfPresent,
    IfVersion(RowVersion),
}

#[derive(Debug, Default)]
pub struct PutRequest {
    pub base: RequestBase,
    pub table_name: String,
    pub value: Row,
    pub option: PutOption,
    pub return_existing: bool,
    pub ttl: Option<Duration>,
    pub identity_cache_size: Option<i32>,
}

impl PutRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)?;
        if self.value.is_empty() {
            return Err(Error::IllegalArgument("put value must not be empty".into()));
        }
        Ok(())
    }
}

/// Delete condition, spec §4.1: "unconditional, if-version".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeleteOption {
    #[default]
    Unconditional,
    IfVersion(RowVersion),
}

#[derive(Debug, Default)]
pub struct DeleteRequest {
    pub base: RequestBase,
    pub table_name: String,
    pub key: Row,
    pub option: DeleteOption,
    pub return_existing: bool,
}

impl DeleteRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)?;
        require_nonempty_key(&self.key)
    }
}

#[derive(Debug, Default)]
pub struct DeleteRangeRequest {
    pub base: RequestBase,
    pub table_name: String,
    /// Partial primary key — must share the table's shard key (spec
    /// GLOSSARY "Shard key"); enforcement lives server-side.
    pub partial_key: Row,
    pub continuation_key: Option<Vec<u8>>,
    pub max_write_kb: Option<i32>,
}

impl DeleteRangeRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)?;
        require_nonempty_key(&self.partial_key)
    }
}

/// One sub-operation of a `WriteMany` batch (spec §4.1 "Batch").
#[derive(Debug, Clone)]
pub enum WriteOperation {
    Put {
        value: Row,
        option: PutOption,
        abort_if_unsuccessful: bool,
    },
    Delete {
        key: Row,
        option: DeleteOption,
        abort_if_unsuccessful: bool,
    },
}

#[derive(Debug, Default)]
pub struct WriteManyRequest {
    pub base: RequestBase,
    pub table_name: String,
    /// All rows in the batch must share a shard key (spec GLOSSARY); the
    /// core validates only that the batch is non-empty, leaving key-prefix
    /// agreement to the server.
    pub operations: Vec<WriteOperation>,
}

impl WriteManyRequest {
    pub fn validate(&self) -> Result<()> {
        require_table_name(&self.table_name)?;
        if self.operations.is_empty() {
            return Err(Error::IllegalArgument(
                "writeMany requires at least one operation".into(),
            ));
        }
        Ok(())
    }
}

fn require_nonempty_key(key: &Row) -> Result<()> {
    if key.is_empty() {
        return Err(Error::IllegalArgument("key must not be empty".into()));
    }
    Ok(())
}

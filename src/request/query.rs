//! Query preparation and execution requests (spec §4.1 "Query").

use super::RequestBase;
use crate::errors::{Error, Result};
use crate::result::{FieldValue, PreparedStatement, QueryContinuationKey};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct PrepareRequest {
    pub base: RequestBase,
    pub statement: String,
    /// If true, ask the server to include the human-readable query plan
    /// (diagnostic only, never consumed by the core).
    pub get_query_plan: bool,
}

impl PrepareRequest {
    pub fn validate(&self) -> Result<()> {
        if self.statement.trim().is_empty() {
            return Err(Error::IllegalArgument(
                "query statement must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct QueryRequest {
    pub base: RequestBase,
    /// Exactly one of `statement` or `prepared_statement` must be set.
    pub statement: Option<String>,
    pub prepared_statement: Option<PreparedStatement>,
    pub continuation_key: Option<QueryContinuationKey>,
    pub max_read_kb: Option<i32>,
    pub max_write_kb: Option<i32>,
    pub number_limit: Option<i32>,
    pub variables: BTreeMap<String, FieldValue>,
}

impl QueryRequest {
    pub fn validate(&self) -> Result<()> {
        match (&self.statement, &self.prepared_statement) {
            (None, None) => Err(Error::IllegalArgument(
                "query requires a statement or a prepared statement".into(),
            )),
            (Some(_), Some(_)) => Err(Error::IllegalArgument(
                "query must not set both statement and prepared statement".into(),
            )),
            _ => Ok(()),
        }
    }

    /// True on the very first page of a not-yet-prepared query: the server
    /// will return the prepared statement with no rows, and the iterator
    /// must immediately follow up with another page (spec §4.6/§8).
    pub fn needs_prepare(&self) -> bool {
        self.prepared_statement.is_none() && self.continuation_key.is_none()
    }
}

//! Administrative DDL requests (spec §4.1 "Admin DDL").

use super::RequestBase;
use crate::errors::{Error, Result};
use crate::result::OperationId;

#[derive(Debug, Default)]
pub struct AdminRequest {
    pub base: RequestBase,
    pub statement: String,
}

impl AdminRequest {
    pub fn validate(&self) -> Result<()> {
        if self.statement.trim().is_empty() {
            return Err(Error::IllegalArgument(
                "admin statement must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct GetAdminStatusRequest {
    pub base: RequestBase,
    pub operation_id: Option<OperationId>,
}

impl GetAdminStatusRequest {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

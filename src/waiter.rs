//! DDL completion polling (spec §4.5).
//!
//! Polls `GetTable`/`GetAdminStatus` on an interval, bounded by an overall
//! poll timeout layered on top of the executor's own per-attempt retry
//! loop. Grounded on the same request-then-sleep-then-retry shape as
//! [`crate::executor::execute`], one level up.

use crate::client::NosqlHandle;
use crate::errors::{Error, Result};
use crate::executor;
use crate::request::table::{GetTableRequest, DEFAULT_POLL_REQUEST_TIMEOUT};
use crate::request::admin::GetAdminStatusRequest;
use crate::request::{Request, RequestBase};
use crate::result::{AdminResult, AdminState, ExecResult, OperationId, TableResult, TableState};
use crate::time::{sleep_cancellable, Deadline};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Polls `GetTable` until `target` is reached (spec §4.5).
///
/// Special case: while the table's state has never been observed as
/// anything but `UNKNOWN` (a freshly-started operation not yet visible to
/// the server that answers this poll), a `table-not-found` response is
/// swallowed and polling continues. Once any non-`UNKNOWN` state has been
/// seen, a later `table-not-found` is real. Polling for `DROPPED` always
/// treats `table-not-found` as success, regardless of that history.
pub async fn wait_for_table_state(
    client: &NosqlHandle,
    table_name: &str,
    operation_id: Option<OperationId>,
    target: TableState,
    poll_timeout: Duration,
    poll_delay: Duration,
    cancel: &CancellationToken,
) -> Result<TableResult> {
    let deadline = Deadline::starting_now(poll_timeout);
    let per_attempt_timeout = DEFAULT_POLL_REQUEST_TIMEOUT.min(poll_timeout);
    let mut saw_non_unknown = false;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut request = Request::GetTable(GetTableRequest {
            table_name: table_name.to_string(),
            operation_id: operation_id.clone(),
            base: RequestBase {
                configured_timeout: Some(per_attempt_timeout),
                ..Default::default()
            },
        });

        match executor::execute(client, &mut request, cancel).await {
            Ok(ExecResult::GetTable(result)) => {
                if result.state != TableState::Unknown {
                    saw_non_unknown = true;
                }
                if result.state == target {
                    return Ok(result);
                }
            }
            Ok(_) => unreachable!("GetTable request always yields ExecResult::GetTable"),
            Err(Error::Service(e)) if e.code.is_table_not_found() => {
                if target == TableState::Dropped {
                    return Ok(TableResult {
                        name: table_name.to_string(),
                        state: TableState::Dropped,
                        schema: None,
                        limits: None,
                        operation_id: None,
                        compartment_id: None,
                    });
                }
                if !saw_non_unknown {
                    // Freshly-started operation not yet visible to the
                    // server answering this poll: swallow and keep polling.
                } else {
                    return Err(Error::Service(e));
                }
            }
            Err(e) => return Err(e),
        }

        let remaining = deadline.remaining();
        if remaining.is_zero() || deadline.would_exceed(poll_delay) {
            return Err(Error::Timeout {
                elapsed: deadline.elapsed(),
                retries: 0,
                cause: None,
            });
        }
        sleep_cancellable(poll_delay.min(remaining), cancel).await?;
    }
}

/// Polls `GetAdminStatus` until the operation reports `COMPLETE` (spec
/// §4.5).
pub async fn wait_for_admin_completion(
    client: &NosqlHandle,
    operation_id: Option<OperationId>,
    poll_timeout: Duration,
    poll_delay: Duration,
    cancel: &CancellationToken,
) -> Result<AdminResult> {
    let deadline = Deadline::starting_now(poll_timeout);
    let per_attempt_timeout = DEFAULT_POLL_REQUEST_TIMEOUT.min(poll_timeout);

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut request = Request::GetAdminStatus(GetAdminStatusRequest {
            operation_id: operation_id.clone(),
            base: RequestBase {
                configured_timeout: Some(per_attempt_timeout),
                ..Default::default()
            },
        });

        match executor::execute(client, &mut request, cancel).await? {
            ExecResult::GetAdminStatus(result) => {
                if result.state == AdminState::Complete {
                    return Ok(result);
                }
            }
            _ => unreachable!("GetAdminStatus request always yields ExecResult::GetAdminStatus"),
        }

        let remaining = deadline.remaining();
        if remaining.is_zero() || deadline.would_exceed(poll_delay) {
            return Err(Error::Timeout {
                elapsed: deadline.elapsed(),
                retries: 0,
                cause: None,
            });
        }
        sleep_cancellable(poll_delay.min(remaining), cancel).await?;
    }
}

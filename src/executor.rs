//! Request execution loop (spec §4.2).
//!
//! Grounded on `neo4rs::graph::Graph::impl_run_on`/`impl_execute_on`: a loop
//! that serializes, sends, and on failure asks a retry policy for a
//! decision, sleeping between attempts. Protocol version fallback and
//! cumulative deadline truncation are this driver's own additions layered
//! on top of that shape (the teacher has neither).

use crate::client::NosqlHandle;
use crate::errors::{Error, Result};
use crate::protocol::{ProtocolVersion, QueryVersion, SerialVersion};
use crate::request::Request;
use crate::result::ExecResult;
use crate::retry::{log_level_for_delay, Decision, RetryContext};
use crate::time::sleep_cancellable;
use tokio_util::sync::CancellationToken;

/// Drives `request` to completion against `client`: validate, then loop
/// snapshot-protocol / serialize / send / deserialize, handling protocol
/// fallback and the retry policy's decisions, until success, a
/// non-retryable failure, cancellation, or cumulative timeout.
pub async fn execute(
    client: &NosqlHandle,
    request: &mut Request,
    cancel: &CancellationToken,
) -> Result<ExecResult> {
    if client.is_disposed() {
        return Err(Error::Disposed);
    }
    request.validate()?;
    let deadline = request.init();

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let protocol = client.protocol().current();
        request.base_mut().protocol_version = Some(protocol);

        let table = table_name_of(request).map(str::to_string);
        if let Some(table) = &table {
            let wait = client.rate_limiter().acquire(table, 1);
            if !wait.is_zero() {
                sleep_cancellable(wait, cancel).await?;
            }
        }

        // Looked up so a stale/expired credential is refreshed before the
        // attempt; the production transport attaches it out of band.
        client.authenticator().auth_string().await?;

        let outcome = attempt(client, request, protocol).await;

        match outcome {
            Ok(result) => {
                if let Some(table) = &table {
                    if let Some(units) = consumed_units(&result) {
                        client.rate_limiter().consume(table, units);
                    }
                }
                apply_result(request, &result);
                return Ok(result);
            }
            Err(e) if matches!(e, Error::UnsupportedProtocol | Error::UnsupportedQueryVersion) => {
                if client.config().disable_protocol_fallback() {
                    return Err(e);
                }
                let fell_back = match &e {
                    Error::UnsupportedProtocol => {
                        client.protocol().decrement_serial_version(protocol.serial)
                    }
                    Error::UnsupportedQueryVersion => {
                        client.protocol().decrement_query_version(protocol.query)
                    }
                    _ => unreachable!(),
                };
                if fell_back {
                    // Does not count against the retry budget (spec §4.2 step 4).
                    continue;
                }
                request.base_mut().add_exception(e);
                return Err(Error::FallbackExhausted);
            }
            Err(e) => {
                request.base_mut().add_exception(e.clone());

                let ctx = RetryContext {
                    last_exception: request.base().last_exception().unwrap(),
                    prior_exception: request.base().prior_exception(),
                    retry_count: request.base().retry_count,
                    remaining_timeout: request.base().remaining_timeout(),
                };

                match client.retry_policy().decide(&ctx) {
                    Decision::Fail => return Err(e),
                    Decision::Retry { delay } => {
                        if deadline.would_exceed(delay) {
                            return Err(e.into_timeout(deadline.elapsed(), request.base().retry_count));
                        }
                        log::log!(
                            log_level_for_delay(delay),
                            "retrying request after {delay:?} (attempt {}): {e}",
                            request.base().retry_count + 1
                        );
                        sleep_cancellable(delay, cancel).await?;
                        request.base_mut().retry_count += 1;
                    }
                }
            }
        }
    }
}

async fn attempt(
    client: &NosqlHandle,
    request: &Request,
    protocol: ProtocolVersion,
) -> Result<ExecResult> {
    let body = client.codec().serialize(request, protocol)?;
    let opcode = request.opcode() as u8;
    let response = client.transport().send(opcode, body).await?;
    client.codec().deserialize(request, protocol, response)
}

/// Side effects the executor applies to the request itself after a
/// successful deserialize (spec §3 "the executor may also mutate the
/// originating request after deserialization"). Paged iterators build a
/// fresh request per page and track their own cursor instead, so this
/// matters chiefly for callers that reuse a single `PrepareRequest`/
/// `QueryRequest` across repeated single-shot calls.
fn apply_result(request: &mut Request, result: &ExecResult) {
    if let (Request::Query(r), ExecResult::Query(res)) = (request, result) {
        if r.prepared_statement.is_none() {
            if let Some(prepared) = res.prepared_statement.clone() {
                r.prepared_statement = Some(prepared);
            }
        }
    }
}

fn table_name_of(request: &Request) -> Option<&str> {
    match request {
        Request::Get(r) => Some(&r.table_name),
        Request::Put(r) => Some(&r.table_name),
        Request::Delete(r) => Some(&r.table_name),
        Request::DeleteRange(r) => Some(&r.table_name),
        Request::WriteMany(r) => Some(&r.table_name),
        Request::GetIndexes(r) => Some(&r.table_name),
        Request::GetTableUsage(r) => Some(&r.table_name),
        _ => None,
    }
}

fn consumed_units(result: &ExecResult) -> Option<u32> {
    let capacity = match result {
        ExecResult::Get(r) => r.consumed,
        ExecResult::Put(r) => r.consumed,
        ExecResult::Delete(r) => r.consumed,
        ExecResult::DeleteRange(r) => r.consumed,
        ExecResult::WriteMany(r) => r.consumed,
        ExecResult::Query(r) => r.consumed,
        _ => return None,
    };
    Some((capacity.read_units + capacity.write_units).max(0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FixedAuthenticator;
    use crate::rate_limiter::NoRateLimiter;
    use crate::request::row::GetRequest;
    use crate::request::table::GetTableRequest;
    use crate::retry::{DefaultRetryPolicy, NoRetryPolicy};
    use crate::serializer::{Codec, DefaultCodec};
    use crate::transport::Transport;
    use crate::Config;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_config() -> Config {
        Config::builder()
            .endpoint("https://example.com")
            .unwrap()
            .build()
            .unwrap()
    }

    /// A transport whose `send` outcome is scripted per call index.
    struct ScriptedTransport {
        calls: AtomicU32,
        script: Vec<Result<Bytes>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _opcode: u8, _body: Bytes) -> Result<Bytes> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.script
                .get(i)
                .cloned()
                .unwrap_or_else(|| Err(Error::IllegalArgument("script exhausted".into())))
        }

        async fn dispose(&self) {}
    }

    fn handle_with(script: Vec<Result<Bytes>>, retry: Arc<dyn crate::retry::RetryPolicy>) -> NosqlHandle {
        NosqlHandle::builder(test_config())
            .transport(Arc::new(ScriptedTransport {
                calls: AtomicU32::new(0),
                script,
            }))
            .authenticator(Arc::new(FixedAuthenticator::new("token")))
            .rate_limiter(Arc::new(NoRateLimiter))
            .retry_policy(retry)
            .codec(Arc::new(DefaultCodec))
            .build()
    }

    fn get_table_request(name: &str) -> Request {
        Request::GetTable(GetTableRequest {
            table_name: name.to_string(),
            operation_id: None,
            base: Default::default(),
        })
    }

    #[tokio::test]
    async fn validate_failure_never_reaches_transport() {
        let client = handle_with(vec![], Arc::new(NoRetryPolicy));
        let mut request = Request::Get(GetRequest::default());
        let cancel = CancellationToken::new();
        let err = execute(&client, &mut request, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::IllegalArgument(_)));
    }

    #[tokio::test]
    async fn cancellation_checked_on_entry() {
        let client = handle_with(vec![], Arc::new(NoRetryPolicy));
        let mut request = get_table_request("t");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = execute(&client, &mut request, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn retry_exhaustion_under_throttling_ends_with_correct_retry_count() {
        // Scenario 4: maxRetryAttempts=3, throttling every attempt. Service
        // errors are transport-level (never wire-encoded as a success
        // body), so a transport that always returns one is enough to drive
        // the executor's retry bookkeeping.
        struct AlwaysThrottled;
        #[async_trait]
        impl Transport for AlwaysThrottled {
            async fn send(&self, _opcode: u8, _body: Bytes) -> Result<Bytes> {
                Err(Error::Service(crate::errors::ServiceError::new(
                    crate::errors::ErrorCode::ReadThrottling,
                    "throttled",
                )))
            }
            async fn dispose(&self) {}
        }

        let client = NosqlHandle::builder(test_config())
            .transport(Arc::new(AlwaysThrottled))
            .authenticator(Arc::new(FixedAuthenticator::new("token")))
            .rate_limiter(Arc::new(NoRateLimiter))
            .retry_policy(Arc::new(DefaultRetryPolicy {
                max_retry_attempts: 3,
                base_delay: Duration::from_millis(1),
                ..Default::default()
            }))
            .codec(Arc::new(DefaultCodec))
            .build();

        let mut request = get_table_request("t");
        let cancel = CancellationToken::new();
        let err = execute(&client, &mut request, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Service(e) if e.code.is_throttling()));
        assert_eq!(request.base().retry_count, 3);
    }

    #[tokio::test]
    async fn deadline_truncation_raises_timeout_chaining_last_exception() {
        struct AlwaysThrottled;
        #[async_trait]
        impl Transport for AlwaysThrottled {
            async fn send(&self, _opcode: u8, _body: Bytes) -> Result<Bytes> {
                Err(Error::Service(crate::errors::ServiceError::new(
                    crate::errors::ErrorCode::ReadThrottling,
                    "throttled",
                )))
            }
            async fn dispose(&self) {}
        }

        let client = NosqlHandle::builder(test_config())
            .transport(Arc::new(AlwaysThrottled))
            .authenticator(Arc::new(FixedAuthenticator::new("token")))
            .rate_limiter(Arc::new(NoRateLimiter))
            .retry_policy(Arc::new(DefaultRetryPolicy {
                max_retry_attempts: 1000,
                base_delay: Duration::from_millis(50),
                ..Default::default()
            }))
            .codec(Arc::new(DefaultCodec))
            .build();

        let mut request = Request::GetTable(GetTableRequest {
            table_name: "t".into(),
            operation_id: None,
            base: crate::request::RequestBase {
                configured_timeout: Some(Duration::from_millis(10)),
                ..Default::default()
            },
        });
        let cancel = CancellationToken::new();
        let err = execute(&client, &mut request, &cancel).await.unwrap_err();
        match err {
            Error::Timeout { cause, .. } => {
                assert!(matches!(cause.as_deref(), Some(Error::Service(_))));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn protocol_fallback_does_not_count_as_retry() {
        struct FallbackOnceTransport {
            calls: AtomicU32,
        }
        #[async_trait]
        impl Transport for FallbackOnceTransport {
            async fn send(&self, _opcode: u8, _body: Bytes) -> Result<Bytes> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::UnsupportedProtocol)
                } else {
                    let codec = DefaultCodec;
                    let protocol = ProtocolVersion {
                        serial: SerialVersion::V3,
                        query: QueryVersion::V4,
                    };
                    let req = GetTableRequest {
                        table_name: "t".into(),
                        operation_id: None,
                        base: Default::default(),
                    };
                    let wrapped = Request::GetTable(req);
                    codec.serialize(&wrapped, protocol)?;
                    // Build a minimal valid GetTable response body: state
                    // tag, name, no schema/limits/operation_id/compartment.
                    use bytes::BytesMut;
                    use crate::wire;
                    let mut out = BytesMut::new();
                    out.extend_from_slice(&[2]); // ACTIVE
                    wire::put_string(&mut out, "t");
                    wire::put_optional_string(&mut out, None);
                    wire::put_bool(&mut out, false);
                    wire::put_optional_string(&mut out, None);
                    wire::put_optional_string(&mut out, None);
                    Ok(out.freeze())
                }
            }
            async fn dispose(&self) {}
        }

        let client = NosqlHandle::builder(test_config())
            .transport(Arc::new(FallbackOnceTransport {
                calls: AtomicU32::new(0),
            }))
            .authenticator(Arc::new(FixedAuthenticator::new("token")))
            .rate_limiter(Arc::new(NoRateLimiter))
            .retry_policy(Arc::new(DefaultRetryPolicy::default()))
            .codec(Arc::new(DefaultCodec))
            .build();

        let mut request = get_table_request("t");
        let cancel = CancellationToken::new();
        let result = execute(&client, &mut request, &cancel).await.unwrap();
        assert!(matches!(result, ExecResult::GetTable(_)));
        assert_eq!(request.base().retry_count, 0);
    }
}

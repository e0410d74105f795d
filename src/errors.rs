//! The error taxonomy of the driver core.
//!
//! Every failure surfaced by the executor, retry policy, protocol handler,
//! DDL waiter, or paged iterators is one of the variants below. Kinds are
//! stable; messages are not part of the contract.

use std::sync::Arc;
use std::time::Duration;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while driving a request through the core.
///
/// `Clone` so a terminal failure can both be recorded on the request's
/// exception list (spec §3) and returned to the caller. Sources that are
/// not themselves `Clone` (`io::Error`, `serde_json::Error`) are wrapped in
/// `Arc` rather than dropped from the `#[source]` chain.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Failed fast before any I/O. Never retried.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// The handle (or a resource it owns) has been disposed.
    #[error("handle has been disposed")]
    Disposed,

    /// The overall operation deadline was exceeded across retries/polling.
    #[error("request timed out after {elapsed:?} and {retries} retries")]
    Timeout {
        elapsed: Duration,
        retries: u32,
        #[source]
        cause: Option<Box<Error>>,
    },

    /// Cancellation was explicitly requested.
    #[error("operation was cancelled")]
    Cancelled,

    /// The peer returned a malformed or out-of-range field. Fatal.
    #[error("bad protocol: {0}")]
    BadProtocol(String),

    /// The server does not support the wire-protocol version used.
    #[error("unsupported protocol version")]
    UnsupportedProtocol,

    /// The server does not support the query-plan version used.
    #[error("unsupported query version")]
    UnsupportedQueryVersion,

    /// Version fallback was attempted but no older encoding remains.
    #[error("protocol version fallback exhausted")]
    FallbackExhausted,

    /// A service-side error reported by the server, with its own taxonomy.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A transport-level error, classified as retryable or not by the
    /// transport collaborator itself.
    #[error("network error (retryable={retryable}): {message}")]
    Network { retryable: bool, message: String },

    #[error("an IO error occurred: {0}")]
    Io(#[from] IoError),

    #[error("invalid URI: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[cfg(feature = "json")]
    #[error("invalid JSON configuration: {0}")]
    InvalidJson(#[from] JsonError),
}

/// `std::io::Error` wrapped in `Arc` so [`Error`] can be `Clone`.
#[derive(Debug, Clone, thiserror::Error)]
#[error(transparent)]
pub struct IoError(#[from] Arc<std::io::Error>);

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError(Arc::new(e))
    }
}

/// `serde_json::Error` wrapped in `Arc` so [`Error`] can be `Clone`.
#[cfg(feature = "json")]
#[derive(Debug, Clone, thiserror::Error)]
#[error(transparent)]
pub struct JsonError(#[from] Arc<serde_json::Error>);

#[cfg(feature = "json")]
impl From<serde_json::Error> for JsonError {
    fn from(e: serde_json::Error) -> Self {
        JsonError(Arc::new(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(IoError::from(e))
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidJson(JsonError::from(e))
    }
}

impl Error {
    /// Wraps `self` as the cause of a timeout error, given elapsed time and
    /// retry count. Used by the executor when `elapsed + delay > timeout`.
    pub fn into_timeout(self, elapsed: Duration, retries: u32) -> Error {
        Error::Timeout {
            elapsed,
            retries,
            cause: Some(Box::new(self)),
        }
    }

    pub fn is_bad_protocol(&self) -> bool {
        matches!(self, Error::BadProtocol(_))
    }
}

/// A service-reported error, classified into the taxonomy the retry policy
/// consults (spec §7). Mirrors the server's numeric error code plus a
/// human-readable message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("service error {code:?}: {message}")]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ServiceError {
            code,
            message: message.into(),
        }
    }
}

/// Server-side error codes, grouped by the retry-relevant kind the policy
/// dispatches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Superset of read/write throttling.
    ReadThrottling,
    WriteThrottling,
    /// Control-plane (DDL) throttling: table creation/limit-change rate.
    ControlOperationThrottling,
    /// The server's security subsystem has not finished initializing.
    SecurityInfoNotReady,
    /// Credentials rejected or expired.
    InvalidAuthorization,
    /// Non-retryable: named table does not exist.
    TableNotFound,
    /// Non-retryable: schema validation failure.
    IllegalState,
    /// Non-retryable: a resource (table, index) already exists.
    TableExists,
    IndexExists,
    IndexNotFound,
    /// Non-retryable: a configured limit (size, throughput) was exceeded.
    ResourceExists,
    ResourceLimitExceeded,
    /// Any other server error not specifically classified above.
    Unknown,
}

impl ErrorCode {
    /// True for the "retryable NoSQL exception" superset of spec §7
    /// (throttling, security-info-not-ready, invalid-authorization).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ReadThrottling
                | ErrorCode::WriteThrottling
                | ErrorCode::ControlOperationThrottling
                | ErrorCode::SecurityInfoNotReady
                | ErrorCode::InvalidAuthorization
        )
    }

    pub fn is_throttling(&self) -> bool {
        matches!(
            self,
            ErrorCode::ReadThrottling | ErrorCode::WriteThrottling
        )
    }

    pub fn is_control_op_throttling(&self) -> bool {
        matches!(self, ErrorCode::ControlOperationThrottling)
    }

    pub fn is_security_info_not_ready(&self) -> bool {
        matches!(self, ErrorCode::SecurityInfoNotReady)
    }

    pub fn is_invalid_authorization(&self) -> bool {
        matches!(self, ErrorCode::InvalidAuthorization)
    }

    pub fn is_table_not_found(&self) -> bool {
        matches!(self, ErrorCode::TableNotFound)
    }
}

//! Core request-execution engine for a managed NoSQL database client driver.
//!
//! This crate is the part of such a driver that is transport-agnostic: a
//! typed request taxonomy, a retry policy, protocol version negotiation and
//! fallback, DDL completion polling, paged result iterators, and the wire
//! codec tying them together. It does not ship a production HTTP transport,
//! request signing, or rate limiting implementation — those are traits a
//! caller supplies (see [`transport`], [`auth`], [`rate_limiter`]).
//!
//! The entry point is [`NosqlHandle`], built from a [`Config`] via
//! [`NosqlHandle::builder`].

mod auth;
mod client;
mod codec;
mod config;
mod errors;
mod executor;
mod iterator;
mod options;
mod protocol;
mod rate_limiter;
mod region;
mod request;
mod result;
mod retry;
mod serializer;
mod time;
mod transport;
mod waiter;
mod wire;

pub use crate::auth::{Authenticator, FixedAuthenticator};
pub use crate::client::{NosqlHandle, NosqlHandleBuilder};
pub use crate::config::{Config, ConfigBuilder, Endpoint, ServiceType};
pub use crate::errors::{Error, ErrorCode, Result, ServiceError};
pub use crate::iterator::{DeleteRangeIterator, ListTablesIterator, QueryIterator};
pub use crate::options::{
    AdminOptions, CommonOptions, DeleteOptions, DeleteRangeOptions, GetOptions,
    GetTableUsageOptions, ListTablesOptions, PollOptions, PutOptions, QueryOptions,
    ReplicaOptions, TableDdlOptions,
};
pub use crate::rate_limiter::{NoRateLimiter, RateLimiter};
pub use crate::region::{lookup as lookup_region, Region};
pub use crate::request::row::{DeleteOption, PutOption, WriteOperation};
pub use crate::result::{
    AdminResult, AdminState, ConsumedCapacity, DeleteRangeResult, DriverPlanRuntime, ExecResult,
    FieldValue, GetResult, IndexInfo, ListTablesResult, OperationId, PreparedStatement,
    QueryContinuationKey, QueryResult, ReplicaStatsRecord, ReplicaStatsResult, Row, RowVersion,
    TableLimits, TableResult, TableState, TableUsageRecord, TableUsageResult, WriteManyResult,
    WriteOperationResult, WriteResult,
};
pub use crate::retry::{
    log_level_for_delay, DefaultRetryPolicy, Decision, NoRetryPolicy, RetryContext, RetryPolicy,
};
pub use crate::serializer::{Codec, DefaultCodec};
pub use crate::transport::{Transport, UnconfiguredTransport};

pub use tokio_util::sync::CancellationToken;

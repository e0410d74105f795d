//! The HTTP transport seam (spec §1 non-goal: "the concrete HTTP transport,
//! TLS/socket tuning").
//!
//! The core depends on this trait but never implements the production
//! version of it, the way `neo4rs::pool::{ConnectionManager, create_pool}`
//! is the shape a connection pool plugs into without the core owning pool
//! policy itself.

use crate::errors::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// One request/response round trip over the wire. Implementations own
/// connection pooling, TLS configuration, and socket tuning; none of that
/// is this crate's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, opcode: u8, body: Bytes) -> Result<Bytes>;

    /// Releases any resources held by this transport. Called once from
    /// `Client::dispose` (spec §5 "Resource lifecycle").
    async fn dispose(&self);
}

/// A transport that always fails, useful as a default before a real one is
/// configured, and in unit tests that never reach the network.
#[derive(Debug, Default)]
pub struct UnconfiguredTransport;

#[async_trait]
impl Transport for UnconfiguredTransport {
    async fn send(&self, _opcode: u8, _body: Bytes) -> Result<Bytes> {
        Err(crate::errors::Error::IllegalArgument(
            "no transport configured".into(),
        ))
    }

    async fn dispose(&self) {}
}

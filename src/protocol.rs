//! Protocol version negotiation and fallback (spec §3 "ProtocolHandler
//! state", §4.4, §5).
//!
//! The handle's one piece of shared mutable state: `(serial_version,
//! query_version, serializer)`, guarded by a single mutex, the way
//! `neo4rs::routing::connection_registry::ConnectionRegistry` guards its
//! handle-scoped tables for concurrent callers.

use std::sync::Mutex;

/// Wire-serializer family. Two generations: the newest and one fallback.
/// `decrement_serial_version` walks a serializer down through its own
/// internal minor versions first, then swaps families entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialVersion {
    /// Newest encoding (e.g. V4 on the wire).
    V4,
    V3,
    /// Oldest fallback family this driver still understands.
    V2,
}

impl SerialVersion {
    fn step_down(self) -> Option<SerialVersion> {
        match self {
            SerialVersion::V4 => Some(SerialVersion::V3),
            SerialVersion::V3 => Some(SerialVersion::V2),
            SerialVersion::V2 => None,
        }
    }

    /// The query-plan version this serializer family supports at most.
    pub fn max_query_version(self) -> QueryVersion {
        match self {
            SerialVersion::V4 | SerialVersion::V3 => QueryVersion::V4,
            SerialVersion::V2 => QueryVersion::V3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryVersion {
    V3,
    V4,
}

/// A version pair snapshotted onto a `Request` when it is (re-)serialized.
/// Any request's captured version is always `<=` the handle's current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub serial: SerialVersion,
    pub query: QueryVersion,
}

struct State {
    serial: SerialVersion,
    query: QueryVersion,
}

/// Handle-scoped, mutex-guarded protocol state. Readers take a snapshot
/// under the lock; the fallback path takes the lock only for the brief
/// decrement operation — no suspension point is ever reached while held.
pub struct ProtocolHandler {
    state: Mutex<State>,
}

impl ProtocolHandler {
    pub fn new() -> Self {
        ProtocolHandler {
            state: Mutex::new(State {
                serial: SerialVersion::V4,
                query: QueryVersion::V4,
            }),
        }
    }

    /// Snapshots the current version pair. Called by the executor before
    /// each serialize step.
    pub fn current(&self) -> ProtocolVersion {
        let state = self.state.lock().unwrap();
        ProtocolVersion {
            serial: state.serial,
            query: state.query,
        }
    }

    /// True iff `captured` no longer matches the handle's current version —
    /// used to detect that a concurrent downgrade already happened.
    pub fn has_protocol_changed(&self, captured: ProtocolVersion) -> bool {
        self.current() != captured
    }

    /// Attempts to downgrade the serial version, given the version `used`
    /// by the attempt that just failed. Spec §4.4:
    ///
    /// - If `current != used`, a concurrent thread already moved on: return
    ///   `true` without decrementing again, so the caller retries with the
    ///   handle's now-current version.
    /// - Otherwise step the serializer down one family member; if the
    ///   family is exhausted, there is no further fallback here (this
    ///   driver models serializer-internal minor steps and family swaps as
    ///   one linear chain, unlike the two-stage original) and `false` is
    ///   returned.
    pub fn decrement_serial_version(&self, used: SerialVersion) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.serial != used {
            return true;
        }
        match state.serial.step_down() {
            Some(next) => {
                state.serial = next;
                state.query = state.query.min(next.max_query_version());
                true
            }
            None => false,
        }
    }

    /// Attempts to downgrade the query-plan version, given the version
    /// `used` by the attempt that just failed. Spec §4.4.
    pub fn decrement_query_version(&self, used: QueryVersion) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.query != used {
            return true;
        }
        if state.query == QueryVersion::V4 {
            state.query = QueryVersion::V3;
            true
        } else {
            false
        }
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}

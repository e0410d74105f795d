//! Wire protocol primitives (spec §6.1).
//!
//! Every serialized request starts with a single-byte opcode, then a common
//! header, then opcode-specific fields. Strings are length-prefixed UTF-8;
//! integers use the packed sortable codec of [`crate::codec`]; booleans are
//! single bytes. Mirrors the shape of `neo4rs::messages`/`neo4rs::bolt`
//! (opcode-tagged request/response enums over a shared byte buffer), with a
//! format of this crate's own devising rather than Bolt PackStream.

use crate::codec;
use crate::errors::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};

/// One byte identifying the request kind, written first in every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    TableRequest = 0,
    GetTable = 1,
    GetTableUsage = 2,
    GetIndexes = 3,
    ListTables = 4,
    Prepare = 5,
    Query = 6,
    Put = 7,
    Get = 8,
    Delete = 9,
    DeleteRange = 10,
    WriteMany = 11,
    Admin = 12,
    GetAdminStatus = 13,
    AddReplica = 14,
    DropReplica = 15,
    GetReplicaStats = 16,
}

impl OpCode {
    pub fn from_byte(b: u8) -> Result<OpCode> {
        use OpCode::*;
        Ok(match b {
            0 => TableRequest,
            1 => GetTable,
            2 => GetTableUsage,
            3 => GetIndexes,
            4 => ListTables,
            5 => Prepare,
            6 => Query,
            7 => Put,
            8 => Get,
            9 => Delete,
            10 => DeleteRange,
            11 => WriteMany,
            12 => Admin,
            13 => GetAdminStatus,
            14 => AddReplica,
            15 => DropReplica,
            16 => GetReplicaStats,
            other => return Err(Error::BadProtocol(format!("unknown opcode {other}"))),
        })
    }
}

/// Fields common to every request, written immediately after the opcode.
#[derive(Debug, Clone, Default)]
pub struct RequestHeader {
    pub timeout_ms: u32,
    /// Compartment id (cloud) or namespace (on-prem) — same wire slot.
    pub compartment_or_namespace: Option<String>,
    pub topology_seqno: i32,
    /// Hash of the auth content, used by the server to detect stale tokens.
    pub auth_content_hash: Option<Vec<u8>>,
}

pub fn put_opcode(out: &mut BytesMut, op: OpCode) {
    out.put_u8(op as u8);
}

pub fn put_header(out: &mut BytesMut, header: &RequestHeader) {
    codec::encode_i32(header.timeout_ms as i32, out);
    put_optional_string(out, header.compartment_or_namespace.as_deref());
    codec::encode_i32(header.topology_seqno, out);
    put_optional_bytes(out, header.auth_content_hash.as_deref());
}

pub fn put_string(out: &mut BytesMut, s: &str) {
    let bytes = s.as_bytes();
    codec::encode_i32(bytes.len() as i32, out);
    out.put_slice(bytes);
}

pub fn put_optional_string(out: &mut BytesMut, s: Option<&str>) {
    match s {
        Some(s) => {
            out.put_u8(1);
            put_string(out, s);
        }
        None => out.put_u8(0),
    }
}

pub fn put_bytes(out: &mut BytesMut, b: &[u8]) {
    codec::encode_i32(b.len() as i32, out);
    out.put_slice(b);
}

pub fn put_optional_bytes(out: &mut BytesMut, b: Option<&[u8]>) {
    match b {
        Some(b) => {
            out.put_u8(1);
            put_bytes(out, b);
        }
        None => out.put_u8(0),
    }
}

pub fn put_bool(out: &mut BytesMut, v: bool) {
    out.put_u8(if v { 1 } else { 0 });
}

/// Reads a length-prefixed UTF-8 string. A negative length is `bad-protocol`
/// (spec §6.1, §7).
pub fn get_string(buf: &mut impl Buf) -> Result<String> {
    let len = get_i32(buf)?;
    if len < 0 {
        return Err(Error::BadProtocol(format!(
            "received invalid string length field: {len}"
        )));
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(Error::BadProtocol("truncated string field".into()));
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes)
        .map_err(|e| Error::BadProtocol(format!("invalid UTF-8 in string field: {e}")))
}

pub fn get_optional_string(buf: &mut impl Buf) -> Result<Option<String>> {
    if get_bool(buf)? {
        Ok(Some(get_string(buf)?))
    } else {
        Ok(None)
    }
}

pub fn get_bool(buf: &mut impl Buf) -> Result<bool> {
    if !buf.has_remaining() {
        return Err(Error::BadProtocol("truncated bool field".into()));
    }
    Ok(buf.get_u8() != 0)
}

/// Reads a packed int32 off the front of a `Buf`. `Buf` doesn't expose its
/// backing slice uniformly, so this copies a bounded probe window; the
/// packed codec itself never needs more than 5 bytes for an int32.
pub fn get_i32(buf: &mut impl Buf) -> Result<i32> {
    let probe_len = buf.remaining().min(codec::max_i32_len());
    let mut probe = vec![0u8; probe_len];
    let chunk = buf.chunk();
    let from_chunk = chunk.len().min(probe_len);
    probe[..from_chunk].copy_from_slice(&chunk[..from_chunk]);
    let (value, consumed) = codec::decode_i32(&probe)?;
    buf.advance(consumed);
    Ok(value)
}

pub fn get_i64(buf: &mut impl Buf) -> Result<i64> {
    let probe_len = buf.remaining().min(codec::max_i64_len());
    let mut probe = vec![0u8; probe_len];
    let chunk = buf.chunk();
    let from_chunk = chunk.len().min(probe_len);
    probe[..from_chunk].copy_from_slice(&chunk[..from_chunk]);
    let (value, consumed) = codec::decode_i64(&probe)?;
    buf.advance(consumed);
    Ok(value)
}

/// Reads a count field that must be non-negative (spec §6.1 ListTables
/// example: "int32 count (≥ 0 required; negative ⇒ bad-protocol)").
pub fn get_count(buf: &mut impl Buf, field_name: &str) -> Result<usize> {
    let count = get_i32(buf)?;
    if count < 0 {
        return Err(Error::BadProtocol(format!(
            "received invalid {field_name} field count: {count}"
        )));
    }
    Ok(count as usize)
}

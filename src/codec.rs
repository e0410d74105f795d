//! Packed sorted integer codec (spec §4.7).
//!
//! A bijective, byte-order-preserving varint encoding of signed 32 and
//! 64-bit integers, used as a primitive by the wire format wherever field
//! order must match numeric order (e.g. keys).

use bytes::{BufMut, BytesMut};

const MAX_I32_BYTES: usize = 5;
const MAX_I64_BYTES: usize = 9;

/// Encodes a signed 32-bit integer, appending at most 5 bytes to `out`.
pub fn encode_i32(value: i32, out: &mut BytesMut) {
    encode_i64(value as i64, out)
}

/// Encodes a signed 64-bit integer, appending at most 9 bytes to `out`.
pub fn encode_i64(value: i64, out: &mut BytesMut) {
    if (-119..=120).contains(&value) {
        out.put_u8((value + 127) as u8);
        return;
    }

    if value < -119 {
        let adjusted = (value + 119) as u64;
        let bytes = adjusted.to_be_bytes();
        let run_len = significant_len_negative(&bytes);
        out.put_u8(0x08 - run_len as u8);
        out.put_slice(&bytes[bytes.len() - run_len..]);
    } else {
        let adjusted = (value - 121) as u64;
        let bytes = adjusted.to_be_bytes();
        let run_len = significant_len_positive(&bytes);
        out.put_u8(0xF7 + run_len as u8);
        out.put_slice(&bytes[bytes.len() - run_len..]);
    }
}

/// A byte is significant (for a negative adjusted value) iff the
/// accumulated high bits up to and including it are not all `0xFF`.
fn significant_len_negative(bytes: &[u8; 8]) -> usize {
    let mut len = bytes.len();
    while len > 1 && bytes[bytes.len() - len] == 0xFF {
        len -= 1;
    }
    len
}

/// A byte is significant (for a positive adjusted value) iff the
/// accumulated high bits up to and including it are not all zero.
fn significant_len_positive(bytes: &[u8; 8]) -> usize {
    let mut len = bytes.len();
    while len > 1 && bytes[bytes.len() - len] == 0x00 {
        len -= 1;
    }
    len
}

/// Decodes a signed 32-bit integer from the front of `buf`, returning the
/// value and the number of bytes consumed.
pub fn decode_i32(buf: &[u8]) -> crate::errors::Result<(i32, usize)> {
    let (v, n) = decode_i64(buf)?;
    let v = i32::try_from(v)
        .map_err(|_| crate::errors::Error::BadProtocol("packed int32 out of range".into()))?;
    Ok((v, n))
}

/// Decodes a signed 64-bit integer from the front of `buf`, returning the
/// value and the number of bytes consumed.
pub fn decode_i64(buf: &[u8]) -> crate::errors::Result<(i64, usize)> {
    let b1 = *buf
        .first()
        .ok_or_else(|| crate::errors::Error::BadProtocol("packed int: empty buffer".into()))?;

    if b1 < 0x08 {
        let run_len = (0x08 - b1) as usize;
        if buf.len() < 1 + run_len {
            return Err(crate::errors::Error::BadProtocol(
                "packed int: truncated negative run".into(),
            ));
        }
        let mut bytes = [0xFFu8; 8];
        bytes[8 - run_len..].copy_from_slice(&buf[1..1 + run_len]);
        let adjusted = u64::from_be_bytes(bytes) as i64;
        Ok((adjusted - 119, 1 + run_len))
    } else if b1 > 0xF7 {
        let run_len = (b1 - 0xF7) as usize;
        if buf.len() < 1 + run_len {
            return Err(crate::errors::Error::BadProtocol(
                "packed int: truncated positive run".into(),
            ));
        }
        let mut bytes = [0u8; 8];
        bytes[8 - run_len..].copy_from_slice(&buf[1..1 + run_len]);
        let adjusted = u64::from_be_bytes(bytes) as i64;
        Ok((adjusted + 121, 1 + run_len))
    } else {
        Ok((b1 as i64 - 127, 1))
    }
}

/// Maximum bytes a packed int32 can occupy.
pub const fn max_i32_len() -> usize {
    MAX_I32_BYTES
}

/// Maximum bytes a packed int64 can occupy.
pub const fn max_i64_len() -> usize {
    MAX_I64_BYTES
}

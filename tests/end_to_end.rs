//! Black-box scenarios driven purely through the public API against a
//! scripted mock transport (spec §8 "End-to-end scenarios").

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use oraclenosql_driver_core::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn test_config() -> Config {
    Config::builder()
        .endpoint("https://example.com")
        .unwrap()
        .build()
        .unwrap()
}

fn put_string(out: &mut BytesMut, s: &str) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&i32_packed(bytes.len() as i32));
    out.extend_from_slice(bytes);
}

fn i32_packed(value: i32) -> Vec<u8> {
    // Mirrors the crate's packed sortable int codec for the single-byte
    // fast path this test suite's small values always land in.
    assert!((-119..=120).contains(&value));
    vec![(value + 127) as u8]
}

fn bool_byte(b: bool) -> u8 {
    if b {
        1
    } else {
        0
    }
}

fn encode_write_result(success: bool) -> Bytes {
    let mut out = BytesMut::new();
    out.extend_from_slice(&[bool_byte(success)]);
    out.extend_from_slice(&[0]); // no version
    out.extend_from_slice(&[0]); // no existing row
    out.extend_from_slice(&[0]); // no existing version
    out.extend_from_slice(&i32_packed(0)); // consumed x4
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.freeze()
}

fn encode_write_result_with_version(success: bool, version: &[u8]) -> Bytes {
    let mut out = BytesMut::new();
    out.extend_from_slice(&[bool_byte(success)]);
    out.extend_from_slice(&[1]); // has version
    out.extend_from_slice(&i32_packed(version.len() as i32));
    out.extend_from_slice(version);
    out.extend_from_slice(&[0]); // no existing row
    out.extend_from_slice(&[0]); // no existing version
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.freeze()
}

fn encode_get_result(row: Option<(i32, &str)>) -> Bytes {
    let mut out = BytesMut::new();
    match row {
        Some((id, name)) => {
            out.extend_from_slice(&[1]); // has row
            out.extend_from_slice(&i32_packed(2)); // 2 fields
            put_string(&mut out, "id");
            out.extend_from_slice(&[0]); // Integer tag
            out.extend_from_slice(&i32_packed(id));
            put_string(&mut out, "name");
            out.extend_from_slice(&[3]); // String tag
            put_string(&mut out, name);
            out.extend_from_slice(&[1]); // has version
            out.extend_from_slice(&i32_packed(1));
            out.extend_from_slice(&[9]);
        }
        None => out.extend_from_slice(&[0]),
    }
    out.extend_from_slice(&[0]); // no expiration
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.freeze()
}

fn encode_write_result_with_existing(existing_id: i32, existing_name: &str, existing_version: &[u8]) -> Bytes {
    let mut out = BytesMut::new();
    out.extend_from_slice(&[0]); // success = false
    out.extend_from_slice(&[0]); // no version
    out.extend_from_slice(&[1]); // has existing row
    out.extend_from_slice(&i32_packed(2));
    put_string(&mut out, "id");
    out.extend_from_slice(&[0]);
    out.extend_from_slice(&i32_packed(existing_id));
    put_string(&mut out, "name");
    out.extend_from_slice(&[3]);
    put_string(&mut out, existing_name);
    out.extend_from_slice(&[1]); // has existing version
    out.extend_from_slice(&i32_packed(existing_version.len() as i32));
    out.extend_from_slice(existing_version);
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.extend_from_slice(&i32_packed(0));
    out.freeze()
}

struct Scripted {
    calls: AtomicU32,
    responses: Vec<Result<Bytes>>,
}

#[async_trait]
impl Transport for Scripted {
    async fn send(&self, _opcode: u8, _body: Bytes) -> Result<Bytes> {
        let i = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.responses
            .get(i)
            .cloned()
            .unwrap_or_else(|| Ok(Bytes::new()))
    }
    async fn dispose(&self) {}
}

fn handle_with(responses: Vec<Result<Bytes>>) -> NosqlHandle {
    NosqlHandle::builder(test_config())
        .transport(Arc::new(Scripted {
            calls: AtomicU32::new(0),
            responses,
        }))
        .authenticator(Arc::new(FixedAuthenticator::new("token")))
        .rate_limiter(Arc::new(NoRateLimiter))
        .retry_policy(Arc::new(NoRetryPolicy))
        .codec(Arc::new(DefaultCodec))
        .build()
}

fn row(id: i32, name: &str) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), FieldValue::Integer(id));
    row.insert("name".to_string(), FieldValue::String(name.to_string()));
    row
}

fn key(id: i32) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), FieldValue::Integer(id));
    row
}

#[tokio::test]
async fn unconditional_put_followed_by_get() {
    let client = handle_with(vec![
        Ok(encode_write_result(true)),
        Ok(encode_get_result(Some((1, "John")))),
        Ok(encode_get_result(None)),
    ]);
    let cancel = CancellationToken::new();

    let put_result = client
        .put("people", row(1, "John"), PutOptions::default(), &cancel)
        .await
        .unwrap();
    assert!(put_result.success);

    let found = client.get("people", key(1), GetOptions::default(), &cancel).await.unwrap();
    assert_eq!(found.row.unwrap().get("name"), Some(&FieldValue::String("John".into())));

    let missing = client.get("people", key(2), GetOptions::default(), &cancel).await.unwrap();
    assert!(missing.row.is_none());
}

#[tokio::test]
async fn conditional_put_if_version_failure_returns_existing() {
    let client = handle_with(vec![
        Ok(encode_write_result_with_version(true, &[1])),
        Ok(encode_write_result_with_existing(1, "John", &[1])),
    ]);
    let cancel = CancellationToken::new();

    let put_result = client
        .put("people", row(1, "John"), PutOptions::default(), &cancel)
        .await
        .unwrap();
    let v1 = put_result.version.unwrap();

    let options = PutOptions::default().return_existing(true);
    let conditional = client
        .put_if_version("people", row(1, "Jane"), RowVersion(vec![99]), options, &cancel)
        .await
        .unwrap();

    assert!(!conditional.success);
    assert_eq!(conditional.existing_version, Some(v1));
    let existing_row = conditional.existing_row.unwrap();
    assert_eq!(existing_row.get("name"), Some(&FieldValue::String("John".into())));
}

#[tokio::test]
async fn paged_delete_range_sums_to_primed_row_count() {
    fn encode_delete_range(deleted: i32, has_continuation: bool) -> Bytes {
        let mut out = BytesMut::new();
        out.extend_from_slice(&i32_packed_bounded(deleted));
        if has_continuation {
            out.extend_from_slice(&[1]);
            out.extend_from_slice(&i32_packed(2));
            out.extend_from_slice(&[0, 1]);
        } else {
            out.extend_from_slice(&[0]);
        }
        out.extend_from_slice(&i32_packed(0));
        out.extend_from_slice(&i32_packed(0));
        out.extend_from_slice(&i32_packed(0));
        out.extend_from_slice(&i32_packed(0));
        out.freeze()
    }

    fn i32_packed_bounded(value: i32) -> Vec<u8> {
        // These pages use counts above the single-byte fast path, so encode
        // through the real packed-int rule for the positive multi-byte case.
        if (-119..=120).contains(&value) {
            return vec![(value + 127) as u8];
        }
        let adjusted = (value - 121) as u64;
        let bytes = adjusted.to_be_bytes();
        let mut len = bytes.len();
        while len > 1 && bytes[bytes.len() - len] == 0 {
            len -= 1;
        }
        let mut out = vec![0xF7 + len as u8];
        out.extend_from_slice(&bytes[bytes.len() - len..]);
        out
    }

    let client = handle_with(vec![
        Ok(encode_delete_range(4000, true)),
        Ok(encode_delete_range(4000, true)),
        Ok(encode_delete_range(2000, false)),
    ]);
    let cancel = CancellationToken::new();

    let mut iter = client.delete_range_paged("people", key(1), DeleteRangeOptions::default());
    let mut total = 0;
    let mut last_continuation_was_none = false;
    loop {
        match iter.next_page(&cancel).await.unwrap() {
            Some(page) => {
                total += page.deleted_count;
                last_continuation_was_none = page.continuation_key.is_none();
            }
            None => break,
        }
    }
    assert_eq!(total, 10_000);
    assert!(last_continuation_was_none);
}

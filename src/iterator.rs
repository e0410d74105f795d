//! Paged result iterators (spec §4.6).
//!
//! Grounded on `neo4rs::stream::RowStream::into_stream_convert_and_summary`:
//! a `futures::stream::try_unfold` wrapping a `next_page`-shaped method.
//! Each iterator here exposes pages rather than the teacher's individual
//! rows (spec §4.6: "a lazy finite sequence of result pages"), since a page
//! carries its own consumed-capacity and cursor state the caller may need.

use crate::client::NosqlHandle;
use crate::errors::Result;
use crate::executor;
use crate::options::{DeleteRangeOptions, ListTablesOptions, QueryOptions};
use crate::request::query::QueryRequest;
use crate::request::row::DeleteRangeRequest;
use crate::request::table::ListTablesRequest;
use crate::request::Request;
use crate::result::{DeleteRangeResult, ExecResult, ListTablesResult, PreparedStatement, QueryContinuationKey, QueryResult, Row};
use futures::stream::{try_unfold, Stream};
use tokio_util::sync::CancellationToken;

/// Paged `ListTables` sequence, cursoring on `fromIndex` (spec §4.6).
pub struct ListTablesIterator<'a> {
    client: &'a NosqlHandle,
    options: ListTablesOptions,
    done: bool,
}

impl<'a> ListTablesIterator<'a> {
    pub(crate) fn new(client: &'a NosqlHandle, options: ListTablesOptions) -> Self {
        ListTablesIterator {
            client,
            options,
            done: false,
        }
    }

    /// Fetches the next page, or `None` once exhausted. Stops when a page
    /// comes back empty, or shorter than the requested limit (spec §4.6).
    pub async fn next_page(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<ListTablesResult>> {
        if self.done {
            return Ok(None);
        }

        let mut request = Request::ListTables(ListTablesRequest {
            from_index: self.options.from_index,
            limit: self.options.limit,
            namespace: self.options.namespace.clone(),
            base: self.options.common.request_base(self.client),
        });

        let result = match executor::execute(self.client, &mut request, cancel).await? {
            ExecResult::ListTables(r) => r,
            _ => unreachable!("ListTables request always yields ExecResult::ListTables"),
        };

        let page_len = result.names.len() as i32;
        self.options.from_index = result.next_index;
        let shorter_than_limit = self.options.limit.is_some_and(|limit| page_len < limit);
        if result.names.is_empty() || shorter_than_limit {
            self.done = true;
        }
        Ok(Some(result))
    }

    pub fn into_stream(self, cancel: CancellationToken) -> impl Stream<Item = Result<ListTablesResult>> + 'a {
        try_unfold((self, cancel), |(mut iter, cancel)| async move {
            match iter.next_page(&cancel).await? {
                Some(page) => Ok(Some((page, (iter, cancel)))),
                None => Ok(None),
            }
        })
    }
}

/// Paged `DeleteRange` sequence, cursoring on an opaque continuation token
/// (spec §4.6).
pub struct DeleteRangeIterator<'a> {
    client: &'a NosqlHandle,
    table_name: String,
    partial_key: Row,
    options: DeleteRangeOptions,
    done: bool,
}

impl<'a> DeleteRangeIterator<'a> {
    pub(crate) fn new(
        client: &'a NosqlHandle,
        table_name: String,
        partial_key: Row,
        options: DeleteRangeOptions,
    ) -> Self {
        DeleteRangeIterator {
            client,
            table_name,
            partial_key,
            options,
            done: false,
        }
    }

    /// Stops once the server returns a null continuation (spec §4.6).
    pub async fn next_page(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<DeleteRangeResult>> {
        if self.done {
            return Ok(None);
        }

        let mut request = Request::DeleteRange(DeleteRangeRequest {
            table_name: self.table_name.clone(),
            partial_key: self.partial_key.clone(),
            continuation_key: self.options.continuation_key.clone(),
            max_write_kb: self.options.max_write_kb,
            base: self.options.common.request_base(self.client),
        });

        let result = match executor::execute(self.client, &mut request, cancel).await? {
            ExecResult::DeleteRange(r) => r,
            _ => unreachable!("DeleteRange request always yields ExecResult::DeleteRange"),
        };

        self.options.continuation_key = result.continuation_key.clone();
        if result.continuation_key.is_none() {
            self.done = true;
        }
        Ok(Some(result))
    }

    pub fn into_stream(self, cancel: CancellationToken) -> impl Stream<Item = Result<DeleteRangeResult>> + 'a {
        try_unfold((self, cancel), |(mut iter, cancel)| async move {
            match iter.next_page(&cancel).await? {
                Some(page) => Ok(Some((page, (iter, cancel)))),
                None => Ok(None),
            }
        })
    }
}

/// Paged `Query` sequence, cursoring on a [`QueryContinuationKey`] (spec
/// §4.6). The first page of a never-before-prepared query returns no rows,
/// just the freshly-prepared statement (spec §8); this iterator chases
/// that follow-up page internally so callers only ever see pages with rows
/// (or the single terminal empty page that ends the sequence).
pub struct QueryIterator<'a> {
    client: &'a NosqlHandle,
    statement: String,
    options: QueryOptions,
    prepared: Option<PreparedStatement>,
    continuation: Option<QueryContinuationKey>,
    done: bool,
}

impl<'a> QueryIterator<'a> {
    pub(crate) fn new(client: &'a NosqlHandle, statement: String, options: QueryOptions) -> Self {
        QueryIterator {
            client,
            statement,
            options,
            prepared: None,
            continuation: None,
            done: false,
        }
    }

    pub async fn next_page(&mut self, cancel: &CancellationToken) -> Result<Option<QueryResult>> {
        if self.done {
            return Ok(None);
        }

        loop {
            let not_yet_prepared = self.prepared.is_none() && self.continuation.is_none();
            let request = QueryRequest {
                base: self.options.common.request_base(self.client),
                statement: not_yet_prepared.then(|| self.statement.clone()),
                prepared_statement: self.prepared.clone(),
                continuation_key: self.continuation.clone(),
                max_read_kb: self.options.max_read_kb,
                max_write_kb: self.options.max_write_kb,
                number_limit: self.options.number_limit,
                variables: Default::default(),
            };
            let needs_prepare = request.needs_prepare();
            let mut wrapped = Request::Query(request);

            let result = match executor::execute(self.client, &mut wrapped, cancel).await? {
                ExecResult::Query(r) => r,
                _ => unreachable!("Query request always yields ExecResult::Query"),
            };

            if let Some(prepared) = &result.prepared_statement {
                self.prepared = Some(prepared.clone());
            }
            self.continuation = result.continuation_key.clone();
            if self.continuation.is_none() {
                self.done = true;
            }

            if needs_prepare && result.rows.is_empty() && !self.done {
                continue;
            }
            return Ok(Some(result));
        }
    }

    pub fn into_stream(self, cancel: CancellationToken) -> impl Stream<Item = Result<QueryResult>> + 'a {
        try_unfold((self, cancel), |(mut iter, cancel)| async move {
            match iter.next_page(&cancel).await? {
                Some(page) => Ok(Some((page, (iter, cancel)))),
                None => Ok(None),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FixedAuthenticator;
    use crate::codec;
    use crate::rate_limiter::NoRateLimiter;
    use crate::retry::NoRetryPolicy;
    use crate::result::FieldValue;
    use crate::serializer::DefaultCodec;
    use crate::transport::Transport;
    use crate::wire;
    use crate::Config;
    use async_trait::async_trait;
    use bytes::{Bytes, BytesMut};
    use futures::StreamExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn test_config() -> Config {
        Config::builder()
            .endpoint("https://example.com")
            .unwrap()
            .build()
            .unwrap()
    }

    fn encode_list_tables(names: &[&str], next_index: i32) -> Bytes {
        let mut out = BytesMut::new();
        codec::encode_i32(names.len() as i32, &mut out);
        for name in names {
            wire::put_string(&mut out, name);
        }
        codec::encode_i32(next_index, &mut out);
        out.freeze()
    }

    fn encode_delete_range(deleted: i32, continuation: Option<&[u8]>) -> Bytes {
        let mut out = BytesMut::new();
        codec::encode_i32(deleted, &mut out);
        wire::put_optional_bytes(&mut out, continuation);
        codec::encode_i32(0, &mut out); // read_units
        codec::encode_i32(0, &mut out); // read_kb
        codec::encode_i32(0, &mut out); // write_units
        codec::encode_i32(0, &mut out); // write_kb
        out.freeze()
    }

    fn encode_query_prepare_page(table_name: &str) -> Bytes {
        let mut out = BytesMut::new();
        codec::encode_i32(0, &mut out); // no rows
        wire::put_bool(&mut out, true); // has continuation
        wire::put_bytes(&mut out, b"token-1");
        wire::put_optional_string(&mut out, Some(table_name));
        codec::encode_i32(0, &mut out); // operation_code
        codec::encode_i32(0, &mut out); // topology_seqno
        codec::encode_i32(0, &mut out); // consumed x4
        codec::encode_i32(0, &mut out);
        codec::encode_i32(0, &mut out);
        codec::encode_i32(0, &mut out);
        out.freeze()
    }

    fn encode_query_row_page(value: i32, has_more: bool) -> Bytes {
        let mut out = BytesMut::new();
        codec::encode_i32(1, &mut out); // one row
        codec::encode_i32(1, &mut out); // one field
        wire::put_string(&mut out, "id");
        out.extend_from_slice(&[0]); // FieldValue::Integer tag
        codec::encode_i32(value, &mut out);
        wire::put_bool(&mut out, has_more);
        if has_more {
            wire::put_bytes(&mut out, b"token-2");
        }
        codec::encode_i32(0, &mut out);
        codec::encode_i32(0, &mut out);
        codec::encode_i32(0, &mut out);
        codec::encode_i32(0, &mut out);
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

    #[tokio::test]
    async fn list_tables_empty_initial_page_terminates_immediately() {
        let client = handle_with(vec![Ok(encode_list_tables(&[], 0))]);
        let cancel = CancellationToken::new();
        let mut iter = ListTablesIterator::new(&client, ListTablesOptions::default());
        let page = iter.next_page(&cancel).await.unwrap().unwrap();
        assert!(page.names.is_empty());
        assert!(iter.next_page(&cancel).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_tables_pages_concatenate() {
        let client = handle_with(vec![
            Ok(encode_list_tables(&["a", "b"], 2)),
            Ok(encode_list_tables(&[], 2)),
        ]);
        let cancel = CancellationToken::new();
        let iter = ListTablesIterator::new(&client, ListTablesOptions::default());
        let pages: Vec<_> = iter
            .into_stream(cancel)
            .map(|p| p.unwrap().names)
            .collect()
            .await;
        let all: Vec<String> = pages.into_iter().flatten().collect();
        assert_eq!(all, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn delete_range_pages_sum_to_total_and_final_continuation_is_null() {
        let client = handle_with(vec![
            Ok(encode_delete_range(4000, Some(b"c1"))),
            Ok(encode_delete_range(4000, Some(b"c2"))),
            Ok(encode_delete_range(2000, None)),
        ]);
        let cancel = CancellationToken::new();
        let mut key = Row::new();
        key.insert("id".to_string(), FieldValue::Integer(1));
        let iter =
            DeleteRangeIterator::new(&client, "t".to_string(), key, DeleteRangeOptions::default());
        let pages: Vec<_> = iter.into_stream(cancel).map(|p| p.unwrap()).collect().await;
        let total: i32 = pages.iter().map(|p| p.deleted_count).sum();
        assert_eq!(total, 10_000);
        assert!(pages.last().unwrap().continuation_key.is_none());
    }

    #[tokio::test]
    async fn query_iterator_chases_prepare_page_internally() {
        let client = handle_with(vec![
            Ok(encode_query_prepare_page("t")),
            Ok(encode_query_row_page(1, false)),
        ]);
        let cancel = CancellationToken::new();
        let mut iter =
            QueryIterator::new(&client, "select * from t".to_string(), QueryOptions::default());
        let page = iter.next_page(&cancel).await.unwrap().unwrap();
        assert_eq!(page.rows.len(), 1);
        assert!(iter.next_page(&cancel).await.unwrap().is_none());
    }
}

//! Purpose: Row/column operations over one remote table handle.
//! Exports: `TableAccessor`.
//! Role: Normalizes shell-style arguments into typed requests, dispatches them, decodes results.
//! Invariants: Requests are fully validated before the first remote call; format errors leave no side effects.
//! Invariants: Remote failures propagate unmodified; no retries, caching, or backoff here.
//! Invariants: Scans and counts hold one cursor, released on every exit path.
//! Invariants: Increment is a single remote primitive, never read-then-write.
#![allow(clippy::result_large_err)]

use std::borrow::Cow;
use std::ops::ControlFlow;
use std::sync::Arc;

use bstr::ByteSlice;
use tracing::debug;

use super::client::{RemoteTableClient, ScannerGuard};
use super::config::AccessorOptions;
use super::scan::{DecodedRows, RowColumns, ScanResult};
use crate::core::binary::{to_i64, to_string_binary};
use crate::core::cell::Cell;
use crate::core::column::{ColumnRef, parse_column};
use crate::core::decode::CellDecoder;
use crate::core::error::Error;
use crate::core::filter::{ExpressionParser, FilterParser};
use crate::core::metadata::{CatalogCodec, MetadataCodec, is_reserved_table_name};
use crate::core::options::{OptionValue, Options, normalize_get_args};
use crate::core::request::{
    CountOptions, DeleteRequest, GetPlan, GetRequest, LATEST_TIMESTAMP, PutRequest, ScanPlan,
};

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone)]
pub struct TableAccessor {
    client: Arc<dyn RemoteTableClient>,
    filter_parser: Arc<dyn FilterParser>,
    codec: Arc<dyn MetadataCodec>,
    options: AccessorOptions,
}

impl TableAccessor {
    pub fn new(client: Arc<dyn RemoteTableClient>) -> Self {
        Self {
            client,
            filter_parser: Arc::new(ExpressionParser),
            codec: Arc::new(CatalogCodec),
            options: AccessorOptions::new(),
        }
    }

    pub fn with_filter_parser(mut self, parser: Arc<dyn FilterParser>) -> Self {
        self.filter_parser = parser;
        self
    }

    pub fn with_metadata_codec(mut self, codec: Arc<dyn MetadataCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_options(mut self, options: AccessorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AccessorOptions {
        &self.options
    }

    pub fn client(&self) -> &dyn RemoteTableClient {
        self.client.as_ref()
    }

    /// Writes one cell; without a timestamp the server assigns one.
    pub fn put(
        &self,
        row: impl AsRef<[u8]>,
        column: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        timestamp: Option<i64>,
    ) -> ApiResult<()> {
        let row = row.as_ref();
        let (column, qualifier) = cell_column(row, column)?;
        let put = PutRequest {
            row: row.to_vec(),
            family: column.family.clone(),
            qualifier,
            timestamp,
            value: value.as_ref().to_vec(),
        };
        debug!(row = %to_string_binary(row), column = %column, "put");
        self.client.put(&put)
    }

    /// Deletes one column's versions at or below `timestamp` (default: all).
    pub fn delete(
        &self,
        row: impl AsRef<[u8]>,
        column: impl AsRef<[u8]>,
        timestamp: Option<i64>,
    ) -> ApiResult<()> {
        self.delete_all(row, Some(column.as_ref()), timestamp)
    }

    /// Deletes the whole row, or only `column` when given.
    pub fn delete_all(
        &self,
        row: impl AsRef<[u8]>,
        column: Option<&[u8]>,
        timestamp: Option<i64>,
    ) -> ApiResult<()> {
        let row = row.as_ref();
        let scope = column
            .map(parse_column)
            .transpose()
            .map_err(|err| err.with_row(to_string_binary(row)))?;
        let delete = DeleteRequest {
            row: row.to_vec(),
            timestamp: timestamp.unwrap_or(LATEST_TIMESTAMP),
            scope,
        };
        debug!(row = %to_string_binary(row), timestamp = delete.timestamp, "delete");
        self.client.delete(&delete)
    }

    /// Atomically adds `delta` (default 1) to a counter column and returns the new value.
    pub fn incr(
        &self,
        row: impl AsRef<[u8]>,
        column: impl AsRef<[u8]>,
        delta: Option<i64>,
    ) -> ApiResult<i64> {
        let row = row.as_ref();
        let (column, qualifier) = cell_column(row, column)?;
        let delta = delta.unwrap_or(1);
        debug!(row = %to_string_binary(row), column = %column, delta, "increment");
        self.client.increment_column(row, &column.family, &qualifier, delta)
    }

    /// Reads the latest version of exactly one counter column.
    pub fn get_counter(
        &self,
        row: impl AsRef<[u8]>,
        column: impl AsRef<[u8]>,
    ) -> ApiResult<Option<i64>> {
        let row = row.as_ref();
        let (column, qualifier) = cell_column(row, column)?;
        let label = column.to_string();
        let family = column.family.clone();
        let request = GetRequest::new(row).with_column(column);
        let result = self.client.get(&request)?;
        let latest = result
            .cells
            .iter()
            .find(|cell| cell.family == family && cell.qualifier == qualifier);
        match latest {
            None => Ok(None),
            Some(cell) => to_i64(&cell.value)
                .map(Some)
                .map_err(|err| err.with_row(to_string_binary(row)).with_column(label)),
        }
    }

    /// Counts rows using the configured interval and caching.
    pub fn count(&self) -> ApiResult<u64> {
        self.count_with(self.options.count_options())
    }

    pub fn count_with(&self, options: CountOptions) -> ApiResult<u64> {
        self.count_with_progress(options, |_, _| {})
    }

    /// Counts rows, calling `on_progress(count, row key)` every `interval` rows.
    pub fn count_with_progress<F>(
        &self,
        options: CountOptions,
        mut on_progress: F,
    ) -> ApiResult<u64>
    where
        F: FnMut(u64, &str),
    {
        let scan = options.scan_request()?;
        let mut scanner = ScannerGuard::open(self.client.as_ref(), &scan)?;
        let mut count = 0u64;
        while let Some(row) = scanner.next_row()? {
            count += 1;
            if count % options.interval == 0 {
                on_progress(count, &*row.row.to_str_lossy());
            }
        }
        debug!(rows = count, "count finished");
        Ok(count)
    }

    /// Reads one row. `args` is either a single options map or column names.
    pub fn get(
        &self,
        row: impl AsRef<[u8]>,
        args: Vec<OptionValue>,
    ) -> ApiResult<Option<RowColumns>> {
        let plan = self.get_plan(row, args)?;
        self.get_with(&plan)
    }

    /// Streams `(column, decoded)` for one row; nothing is called for a missing row.
    pub fn get_each<F>(
        &self,
        row: impl AsRef<[u8]>,
        args: Vec<OptionValue>,
        mut sink: F,
    ) -> ApiResult<()>
    where
        F: FnMut(&str, &str) -> ControlFlow<()>,
    {
        let plan = self.get_plan(row, args)?;
        if let Some(cells) = self.read_row(&plan)? {
            for (column, value) in &cells {
                if sink(column, value).is_break() {
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn get_plan(&self, row: impl AsRef<[u8]>, args: Vec<OptionValue>) -> ApiResult<GetPlan> {
        let row = row.as_ref();
        normalize_get_args(args)
            .and_then(|options| GetPlan::from_options(row, options))
            .map_err(|err| err.with_row(to_string_binary(row)))
    }

    pub fn get_with(&self, plan: &GetPlan) -> ApiResult<Option<RowColumns>> {
        Ok(self
            .read_row(plan)?
            .map(|cells| cells.into_iter().collect::<RowColumns>()))
    }

    fn read_row(&self, plan: &GetPlan) -> ApiResult<Option<Vec<(String, String)>>> {
        debug!(
            row = %to_string_binary(&plan.request.row),
            columns = plan.request.columns.len(),
            versions = plan.request.max_versions,
            "get"
        );
        let result = self.client.get(&plan.request)?;
        if result.is_empty() {
            return Ok(None);
        }
        let decoder = self.decoder();
        let cells = result
            .cells
            .iter()
            .map(|cell| {
                let column = cell.column_label();
                let value = decoder.decode(&column, cell, plan.max_length);
                (column, value)
            })
            .collect();
        Ok(Some(cells))
    }

    /// Scans and collects `row key -> column -> decoded`.
    pub fn scan(&self, options: Options) -> ApiResult<ScanResult> {
        self.scan_rows(options)?.collect_rows()
    }

    /// Streams `(row key, "column=<col>, <decoded>")`; returns the rows delivered.
    pub fn scan_each<F>(&self, options: Options, sink: F) -> ApiResult<u64>
    where
        F: FnMut(&str, &str) -> ControlFlow<()>,
    {
        self.scan_rows(options)?.for_each_cell(sink)
    }

    /// Lazily decoded rows; dropping the iterator releases the cursor.
    pub fn scan_rows(&self, options: Options) -> ApiResult<DecodedRows<'_>> {
        let plan = self.scan_plan(options)?;
        self.scan_rows_with(&plan)
    }

    pub fn scan_plan(&self, options: Options) -> ApiResult<ScanPlan> {
        let mut plan = ScanPlan::from_options(options, self.filter_parser.as_ref(), || {
            self.all_column_families()
        })?;
        if plan.request.caching.is_none() {
            plan.request.caching = self.options.scan_caching;
        }
        Ok(plan)
    }

    pub fn scan_rows_with(&self, plan: &ScanPlan) -> ApiResult<DecodedRows<'_>> {
        debug!(
            start = %to_string_binary(&plan.request.start_row),
            stop = ?plan.request.stop_row.as_deref().map(to_string_binary),
            limit = ?plan.limit,
            "scan"
        );
        let scanner = ScannerGuard::open(self.client.as_ref(), &plan.request)?;
        Ok(DecodedRows::new(
            scanner,
            self.decoder(),
            plan.limit,
            plan.max_length,
        ))
    }

    pub fn decode(&self, column: &str, cell: &Cell, max_length: Option<usize>) -> String {
        self.decoder().decode(column, cell, max_length)
    }

    /// `"<family>:"` for every family, in schema order.
    pub fn all_column_families(&self) -> ApiResult<Vec<String>> {
        Ok(self
            .client
            .schema()?
            .families
            .iter()
            .map(|family| format!("{}:", family_name(&family.name)))
            .collect())
    }

    pub fn is_reserved_table(&self) -> bool {
        is_reserved_table_name(self.client.identity())
    }

    fn decoder(&self) -> CellDecoder<'_> {
        CellDecoder::new(self.is_reserved_table(), self.codec.as_ref())
    }
}

/// Parses a column that must address one cell; errors carry the row.
fn cell_column(row: &[u8], column: impl AsRef<[u8]>) -> ApiResult<(ColumnRef, Vec<u8>)> {
    let column = parse_column(column).map_err(|err| err.with_row(to_string_binary(row)))?;
    let qualifier = column
        .require_qualifier()
        .map_err(|err| err.with_row(to_string_binary(row)))?
        .to_vec();
    Ok((column, qualifier))
}

fn family_name(name: &[u8]) -> Cow<'_, str> {
    name.to_str_lossy()
}

#[cfg(test)]
mod tests {
    use super::TableAccessor;
    use crate::api::client::{FamilyDescriptor, RemoteTableClient, ScanCursor, TableSchema};
    use crate::core::cell::{Cell, RowResult};
    use crate::core::column::ColumnRef;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::filter::Filter;
    use crate::core::options::{COLUMNS, FILTER, OptionValue, Options, STARTROW};
    use crate::core::request::{
        CountOptions, DeleteRequest, GetRequest, LATEST_TIMESTAMP, PutRequest, ScanRequest,
    };
    use std::ops::ControlFlow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        scans: Mutex<Vec<ScanRequest>>,
        deletes: Mutex<Vec<DeleteRequest>>,
        closes: AtomicUsize,
    }

    struct RecordingClient {
        name: Vec<u8>,
        rows: Vec<RowResult>,
        fail_after: Option<usize>,
        recorder: Arc<Recorder>,
    }

    impl RecordingClient {
        fn new(name: &str, rows: Vec<RowResult>) -> Self {
            Self {
                name: name.as_bytes().to_vec(),
                rows,
                fail_after: None,
                recorder: Arc::new(Recorder::default()),
            }
        }

        fn record(&self, call: &str) {
            self.recorder.calls.lock().expect("lock").push(call.to_string());
        }
    }

    struct RecordingCursor {
        rows: std::vec::IntoIter<RowResult>,
        delivered: usize,
        fail_after: Option<usize>,
        recorder: Arc<Recorder>,
    }

    impl ScanCursor for RecordingCursor {
        fn next_row(&mut self) -> Result<Option<RowResult>, Error> {
            if self.fail_after == Some(self.delivered) {
                return Err(Error::new(ErrorKind::Remote).with_message("region moved"));
            }
            self.delivered += 1;
            Ok(self.rows.next())
        }

        fn close(&mut self) {
            self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl RemoteTableClient for RecordingClient {
        fn identity(&self) -> &[u8] {
            &self.name
        }

        fn schema(&self) -> Result<TableSchema, Error> {
            self.record("schema");
            Ok(TableSchema {
                families: vec![FamilyDescriptor::new("cf"), FamilyDescriptor::new("info")],
            })
        }

        fn put(&self, _put: &PutRequest) -> Result<(), Error> {
            self.record("put");
            Ok(())
        }

        fn get(&self, get: &GetRequest) -> Result<RowResult, Error> {
            self.record("get");
            Ok(self
                .rows
                .iter()
                .find(|row| row.row == get.row)
                .cloned()
                .unwrap_or_else(|| RowResult::empty(get.row.clone())))
        }

        fn delete(&self, delete: &DeleteRequest) -> Result<(), Error> {
            self.record("delete");
            self.recorder.deletes.lock().expect("lock").push(delete.clone());
            Ok(())
        }

        fn increment_column(&self, _: &[u8], _: &[u8], _: &[u8], delta: i64) -> Result<i64, Error> {
            self.record("increment");
            Ok(delta)
        }

        fn open_scanner(&self, scan: &ScanRequest) -> Result<Box<dyn ScanCursor>, Error> {
            self.record("scan");
            self.recorder.scans.lock().expect("lock").push(scan.clone());
            Ok(Box::new(RecordingCursor {
                rows: self.rows.clone().into_iter(),
                delivered: 0,
                fail_after: self.fail_after,
                recorder: Arc::clone(&self.recorder),
            }))
        }
    }

    fn rows(count: usize) -> Vec<RowResult> {
        (0..count)
            .map(|idx| {
                RowResult::new(
                    format!("r{idx}"),
                    vec![
                        Cell::new("cf", "a", 1, format!("a{idx}")),
                        Cell::new("cf", "b", 1, format!("b{idx}")),
                    ],
                )
            })
            .collect()
    }

    fn accessor(client: RecordingClient) -> (TableAccessor, Arc<Recorder>) {
        let recorder = Arc::clone(&client.recorder);
        (TableAccessor::new(Arc::new(client)), recorder)
    }

    fn calls(recorder: &Recorder) -> Vec<String> {
        recorder.calls.lock().expect("lock").clone()
    }

    #[test]
    fn format_errors_never_reach_the_client() {
        let (table, recorder) = accessor(RecordingClient::new("t", rows(1)));

        let err = table.put("r1", "cf", "v", None).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Format);
        let err = table.incr("r1", ":q", None).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Format);
        let err = table.get("r1", vec![OptionValue::Bool(true)]).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(err.row(), Some("r1"));
        let err = table
            .scan(Options::new().with(FILTER, "NotAFilter()"))
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Format);
        let err = table.delete_all("r1", Some(b":x".as_slice()), None).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Format);

        assert!(calls(&recorder).is_empty());
    }

    #[test]
    fn family_only_cell_columns_are_rejected_with_row() {
        let (table, recorder) = accessor(RecordingClient::new("t", rows(1)));

        let err = table.get_counter("r0", "cf").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(err.row(), Some("r0"));
        assert_eq!(err.column(), Some("cf"));
        let err = table.put("r0", "cf", "v", None).expect_err("err");
        assert_eq!(err.row(), Some("r0"));
        let err = table.incr(b"r\x00".as_slice(), "cf", None).expect_err("err");
        assert_eq!(err.row(), Some("r\\x00"));

        assert!(calls(&recorder).is_empty());
    }

    #[test]
    fn delete_defaults_to_latest_and_scopes_column() {
        let (table, recorder) = accessor(RecordingClient::new("t", Vec::new()));
        table.delete("r1", "cf:a", None).expect("delete");
        table.delete_all("r2", None, Some(7)).expect("delete");

        let deletes = recorder.deletes.lock().expect("lock").clone();
        assert_eq!(
            deletes,
            vec![
                DeleteRequest {
                    row: b"r1".to_vec(),
                    timestamp: LATEST_TIMESTAMP,
                    scope: Some(ColumnRef::column("cf", "a")),
                },
                DeleteRequest {
                    row: b"r2".to_vec(),
                    timestamp: 7,
                    scope: None,
                },
            ]
        );
    }

    #[test]
    fn incr_is_one_remote_call_with_default_delta() {
        let (table, recorder) = accessor(RecordingClient::new("t", Vec::new()));
        assert_eq!(table.incr("r1", "cf:n", None).expect("incr"), 1);
        assert_eq!(table.incr("r1", "cf:n", Some(9)).expect("incr"), 9);
        assert_eq!(calls(&recorder), vec!["increment", "increment"]);
    }

    #[test]
    fn count_uses_first_key_only_scan_and_reports_progress() {
        let (table, recorder) = accessor(RecordingClient::new("t", rows(7)));
        let mut progress = Vec::new();
        let total = table
            .count_with_progress(
                CountOptions::new().with_interval(3).with_caching_rows(4),
                |count, key| progress.push((count, key.to_string())),
            )
            .expect("count");

        assert_eq!(total, 7);
        assert_eq!(progress, vec![(3, "r2".to_string()), (6, "r5".to_string())]);
        let scans = recorder.scans.lock().expect("lock").clone();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].filter, Some(Filter::FirstKeyOnly));
        assert!(!scans[0].cache_blocks);
        assert_eq!(scans[0].caching, Some(4));
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_of_missing_row_is_none() {
        let (table, _) = accessor(RecordingClient::new("t", rows(1)));
        assert_eq!(table.get("nope", Vec::new()).expect("get"), None);

        let mut seen = 0;
        table
            .get_each("nope", Vec::new(), |_, _| {
                seen += 1;
                ControlFlow::Continue(())
            })
            .expect("get");
        assert_eq!(seen, 0);
    }

    #[test]
    fn get_each_streams_every_column() {
        let (table, _) = accessor(RecordingClient::new("t", rows(1)));
        let mut seen = Vec::new();
        table
            .get_each("r0", vec!["cf".into()], |column, value| {
                seen.push(format!("{column} {value}"));
                ControlFlow::Continue(())
            })
            .expect("get");
        assert_eq!(
            seen,
            vec!["cf:a timestamp=1, value=a0", "cf:b timestamp=1, value=b0"]
        );
    }

    #[test]
    fn scan_defaults_columns_from_schema() {
        let (table, recorder) = accessor(RecordingClient::new("t", rows(1)));
        table.scan(Options::new().with(STARTROW, "r")).expect("scan");
        let scans = recorder.scans.lock().expect("lock").clone();
        assert_eq!(
            scans[0].columns,
            vec![ColumnRef::column("cf", ""), ColumnRef::column("info", "")]
        );
        assert_eq!(calls(&recorder), vec!["schema", "scan"]);
    }

    #[test]
    fn early_stop_releases_cursor() {
        let (table, recorder) = accessor(RecordingClient::new("t", rows(5)));
        let mut lines = Vec::new();
        let delivered = table
            .scan_each(Options::new(), |key, line| {
                lines.push(format!("{key} {line}"));
                if lines.len() == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .expect("scan");
        assert_eq!(delivered, 2);
        assert_eq!(lines[2], "r1 column=cf:a, timestamp=1, value=a1");
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_lazy_rows_releases_cursor() {
        let (table, recorder) = accessor(RecordingClient::new("t", rows(5)));
        {
            let mut rows = table.scan_rows(Options::new()).expect("scan");
            let first = rows.next().expect("row").expect("ok");
            assert_eq!(first.key, "r0");
            assert_eq!(rows.rows_yielded(), 1);
            assert_eq!(recorder.closes.load(Ordering::SeqCst), 0);
        }
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cursor_failure_propagates_after_delivered_rows() {
        let mut client = RecordingClient::new("t", rows(5));
        client.fail_after = Some(2);
        let (table, recorder) = accessor(client);

        let mut keys = Vec::new();
        let err = table
            .scan_each(Options::new().with(COLUMNS, "cf"), |key, _| {
                keys.push(key.to_string());
                ControlFlow::Continue(())
            })
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(keys, vec!["r0", "r0", "r1", "r1"]);
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 1);

        let err = table.count().expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(recorder.closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reserved_identity_and_families() {
        let (table, _) = accessor(RecordingClient::new(".META.", Vec::new()));
        assert!(table.is_reserved_table());
        assert_eq!(
            table.all_column_families().expect("families"),
            vec!["cf:".to_string(), "info:".to_string()]
        );
        let (table, _) = accessor(RecordingClient::new("users", Vec::new()));
        assert!(!table.is_reserved_table());
    }

    #[test]
    fn get_counter_decodes_long() {
        let client = RecordingClient::new(
            "t",
            vec![RowResult::new(
                "r",
                vec![Cell::new("cf", "n", 1, 12i64.to_be_bytes().to_vec())],
            )],
        );
        let (table, _) = accessor(client);
        assert_eq!(table.get_counter("r", "cf:n").expect("counter"), Some(12));
        assert_eq!(table.get_counter("missing", "cf:n").expect("counter"), None);
    }
}

//! Purpose: In-process sparse, versioned, column-family table implementing `RemoteTableClient`.
//! Exports: `MemoryTable`.
//! Role: Reference collaborator for tests and embedding; mirrors remote semantics, not performance.
//! Invariants: Increments are read-modify-write under one write lock, so they are atomic.
//! Invariants: Scanners fetch `caching` rows per batch and track open/close for leak checks.
//! Invariants: Versions per column are kept newest-first; deletes remove covered versions.
#![allow(clippy::result_large_err)]

use std::cmp::Reverse;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bstr::ByteSlice;
use time::OffsetDateTime;
use tracing::debug;

use crate::api::client::{FamilyDescriptor, RemoteTableClient, ScanCursor, TableSchema};
use crate::core::binary::to_i64;
use crate::core::cell::{Cell, RowResult};
use crate::core::error::{Error, ErrorKind};
use crate::core::request::{DeleteRequest, GetRequest, PutRequest, ScanRequest};

const DEFAULT_SCANNER_CACHING: u32 = 1;

type Versions = BTreeMap<Reverse<i64>, Vec<u8>>;
type RowCells = BTreeMap<(Vec<u8>, Vec<u8>), Versions>;
type Rows = BTreeMap<Vec<u8>, RowCells>;

#[derive(Clone)]
pub struct MemoryTable {
    inner: Arc<MemoryTableInner>,
}

struct MemoryTableInner {
    name: Vec<u8>,
    schema: TableSchema,
    rows: RwLock<Rows>,
    open_scanners: AtomicUsize,
    scanner_fetches: AtomicU64,
    scan_failure_after: Mutex<Option<u64>>,
}

impl MemoryTable {
    pub fn new(name: impl Into<Vec<u8>>, families: &[&str]) -> Self {
        let families = families
            .iter()
            .map(|family| FamilyDescriptor::new(family.as_bytes()))
            .collect();
        Self::with_families(name, families)
    }

    pub fn with_families(name: impl Into<Vec<u8>>, families: Vec<FamilyDescriptor>) -> Self {
        Self {
            inner: Arc::new(MemoryTableInner {
                name: name.into(),
                schema: TableSchema { families },
                rows: RwLock::new(Rows::new()),
                open_scanners: AtomicUsize::new(0),
                scanner_fetches: AtomicU64::new(0),
                scan_failure_after: Mutex::new(None),
            }),
        }
    }

    /// Scanners currently open (opened and not yet closed).
    pub fn open_scanners(&self) -> usize {
        self.inner.open_scanners.load(Ordering::SeqCst)
    }

    /// Batches fetched by all scanners so far.
    pub fn scanner_fetches(&self) -> u64 {
        self.inner.scanner_fetches.load(Ordering::SeqCst)
    }

    /// The next scanner opened fails after delivering `rows` rows.
    pub fn fail_next_scan_after(&self, rows: u64) {
        if let Ok(mut slot) = self.inner.scan_failure_after.lock() {
            *slot = Some(rows);
        }
    }

    pub fn row_count(&self) -> Result<usize, Error> {
        Ok(self.inner.read_rows()?.len())
    }

    fn check_family(&self, family: &[u8]) -> Result<(), Error> {
        if self.inner.schema.families.iter().any(|f| f.name == family) {
            return Ok(());
        }
        Err(Error::new(ErrorKind::Remote).with_message(format!(
            "column family {} does not exist in table {}",
            family.to_str_lossy(),
            self.inner.name.to_str_lossy()
        )))
    }
}

impl MemoryTableInner {
    fn read_rows(&self) -> Result<RwLockReadGuard<'_, Rows>, Error> {
        self.rows
            .read()
            .map_err(|_| Error::new(ErrorKind::Internal).with_message("table lock poisoned"))
    }

    fn write_rows(&self) -> Result<RwLockWriteGuard<'_, Rows>, Error> {
        self.rows
            .write()
            .map_err(|_| Error::new(ErrorKind::Internal).with_message("table lock poisoned"))
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn select_cells<F>(
    cells: &RowCells,
    selects: F,
    timestamp: Option<i64>,
    max_versions: u32,
) -> Vec<Cell>
where
    F: Fn(&[u8], &[u8]) -> bool,
{
    let mut out = Vec::new();
    for ((family, qualifier), versions) in cells {
        if !selects(family.as_slice(), qualifier.as_slice()) {
            continue;
        }
        let matching = versions
            .iter()
            .filter(|(Reverse(ts), _)| timestamp.is_none_or(|wanted| wanted == *ts))
            .take(max_versions as usize);
        for (Reverse(ts), value) in matching {
            out.push(Cell::new(family.clone(), qualifier.clone(), *ts, value.clone()));
        }
    }
    out
}

impl RemoteTableClient for MemoryTable {
    fn identity(&self) -> &[u8] {
        &self.inner.name
    }

    fn schema(&self) -> Result<TableSchema, Error> {
        Ok(self.inner.schema.clone())
    }

    fn put(&self, put: &PutRequest) -> Result<(), Error> {
        self.check_family(&put.family)?;
        let timestamp = put.timestamp.unwrap_or_else(now_millis);
        let mut rows = self.inner.write_rows()?;
        rows.entry(put.row.clone())
            .or_default()
            .entry((put.family.clone(), put.qualifier.clone()))
            .or_default()
            .insert(Reverse(timestamp), put.value.clone());
        Ok(())
    }

    fn get(&self, get: &GetRequest) -> Result<RowResult, Error> {
        let rows = self.inner.read_rows()?;
        let Some(cells) = rows.get(&get.row) else {
            return Ok(RowResult::empty(get.row.clone()));
        };
        let cells = select_cells(
            cells,
            |family, qualifier| get.selects(family, qualifier),
            get.timestamp,
            get.max_versions,
        );
        Ok(RowResult::new(get.row.clone(), cells))
    }

    fn delete(&self, delete: &DeleteRequest) -> Result<(), Error> {
        if let Some(scope) = &delete.scope {
            self.check_family(&scope.family)?;
        }
        let mut rows = self.inner.write_rows()?;
        let Some(cells) = rows.get_mut(&delete.row) else {
            return Ok(());
        };
        for ((family, qualifier), versions) in cells.iter_mut() {
            versions.retain(|Reverse(ts), _| !delete.covers(family, qualifier, *ts));
        }
        cells.retain(|_, versions| !versions.is_empty());
        if cells.is_empty() {
            rows.remove(&delete.row);
        }
        Ok(())
    }

    fn increment_column(
        &self,
        row: &[u8],
        family: &[u8],
        qualifier: &[u8],
        delta: i64,
    ) -> Result<i64, Error> {
        self.check_family(family)?;
        let mut rows = self.inner.write_rows()?;
        let versions = rows
            .entry(row.to_vec())
            .or_default()
            .entry((family.to_vec(), qualifier.to_vec()))
            .or_default();
        let (current, latest_ts) = match versions.iter().next() {
            Some((Reverse(ts), value)) => {
                let current = to_i64(value).map_err(|_| {
                    Error::new(ErrorKind::Remote)
                        .with_message("attempted to increment a field that is not 64 bits wide")
                })?;
                (current, *ts)
            }
            None => (0, i64::MIN),
        };
        let next = current.checked_add(delta).ok_or_else(|| {
            Error::new(ErrorKind::Remote).with_message("counter increment overflowed")
        })?;
        versions.insert(Reverse(now_millis().max(latest_ts)), next.to_be_bytes().to_vec());
        Ok(next)
    }

    fn open_scanner(&self, scan: &ScanRequest) -> Result<Box<dyn ScanCursor>, Error> {
        let fail_after = self
            .inner
            .scan_failure_after
            .lock()
            .map_err(|_| Error::new(ErrorKind::Internal).with_message("scanner lock poisoned"))?
            .take();
        self.inner.open_scanners.fetch_add(1, Ordering::SeqCst);
        debug!(
            start = %scan.start_row.to_str_lossy(),
            caching = ?scan.caching,
            cache_blocks = scan.cache_blocks,
            "memory scanner opened"
        );
        Ok(Box::new(MemoryCursor {
            inner: Arc::clone(&self.inner),
            request: scan.clone(),
            next_bound: Bound::Included(scan.start_row.clone()),
            buffer: VecDeque::new(),
            exhausted: false,
            closed: false,
            delivered: 0,
            fail_after,
        }))
    }
}

struct MemoryCursor {
    inner: Arc<MemoryTableInner>,
    request: ScanRequest,
    next_bound: Bound<Vec<u8>>,
    buffer: VecDeque<RowResult>,
    exhausted: bool,
    closed: bool,
    delivered: u64,
    fail_after: Option<u64>,
}

impl MemoryCursor {
    fn fetch_batch(&mut self) -> Result<(), Error> {
        let batch = self.request.caching.unwrap_or(DEFAULT_SCANNER_CACHING).max(1) as usize;
        self.inner.scanner_fetches.fetch_add(1, Ordering::SeqCst);
        let rows = self.inner.read_rows()?;
        let bound = match &self.next_bound {
            Bound::Included(key) => Bound::Included(key.as_slice()),
            Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let mut last_key = None;
        let mut reached_end = true;
        for (key, cells) in rows.range::<[u8], _>((bound, Bound::Unbounded)) {
            if !self.request.contains_row(key) {
                break;
            }
            last_key = Some(key.clone());
            let selected = select_cells(
                cells,
                |family, qualifier| self.request.selects(family, qualifier),
                self.request.timestamp,
                self.request.max_versions,
            );
            let selected = match &self.request.filter {
                Some(filter) => filter.apply(key, selected),
                None => selected,
            };
            if !selected.is_empty() {
                self.buffer.push_back(RowResult::new(key.clone(), selected));
                if self.buffer.len() >= batch {
                    reached_end = false;
                    break;
                }
            }
        }
        drop(rows);
        if let Some(key) = last_key {
            self.next_bound = Bound::Excluded(key);
        }
        self.exhausted = reached_end;
        Ok(())
    }
}

impl ScanCursor for MemoryCursor {
    fn next_row(&mut self) -> Result<Option<RowResult>, Error> {
        if self.closed {
            return Err(Error::new(ErrorKind::Remote).with_message("scanner is closed"));
        }
        if self.fail_after.is_some_and(|limit| self.delivered >= limit) {
            return Err(Error::new(ErrorKind::Remote).with_message("scanner lease expired"));
        }
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_batch()?;
        }
        let row = self.buffer.pop_front();
        if row.is_some() {
            self.delivered += 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.open_scanners.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

//! Purpose: Define the contract this crate requires of a remote table connection.
//! Exports: `RemoteTableClient`, `ScanCursor`, `ScannerGuard`, `TableSchema`, `FamilyDescriptor`.
//! Role: Boundary to transport-owning clients; the accessor never sees the wire.
//! Invariants: Client failures are reported as `ErrorKind::Remote` and propagate unmodified.
//! Invariants: Every opened cursor is closed exactly once, on every exit path, via `ScannerGuard`.
#![allow(clippy::result_large_err)]

use tracing::trace;

use crate::core::cell::RowResult;
use crate::core::error::Error;
use crate::core::request::{DeleteRequest, GetRequest, PutRequest, ScanRequest};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FamilyDescriptor {
    pub name: Vec<u8>,
    pub max_versions: u32,
}

impl FamilyDescriptor {
    pub fn new(name: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            max_versions: 3,
        }
    }

    pub fn with_max_versions(mut self, max_versions: u32) -> Self {
        self.max_versions = max_versions;
        self
    }
}

/// Column families in schema order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableSchema {
    pub families: Vec<FamilyDescriptor>,
}

/// Forward-only server-side cursor over scan results.
pub trait ScanCursor: Send {
    fn next_row(&mut self) -> Result<Option<RowResult>, Error>;

    /// Releases the server-side resource. Must tolerate repeated calls.
    fn close(&mut self);
}

pub trait RemoteTableClient: Send + Sync {
    fn identity(&self) -> &[u8];

    fn schema(&self) -> Result<TableSchema, Error>;

    fn put(&self, put: &PutRequest) -> Result<(), Error>;

    /// An empty `RowResult` means the row (or selection) has no cells.
    fn get(&self, get: &GetRequest) -> Result<RowResult, Error>;

    fn delete(&self, delete: &DeleteRequest) -> Result<(), Error>;

    /// Atomically adds `delta` and returns the new value.
    fn increment_column(
        &self,
        row: &[u8],
        family: &[u8],
        qualifier: &[u8],
        delta: i64,
    ) -> Result<i64, Error>;

    fn open_scanner(&self, scan: &ScanRequest) -> Result<Box<dyn ScanCursor>, Error>;
}

/// Owns an open cursor and closes it when dropped.
pub struct ScannerGuard {
    cursor: Box<dyn ScanCursor>,
    rows: u64,
}

impl ScannerGuard {
    pub fn open(client: &dyn RemoteTableClient, scan: &ScanRequest) -> Result<Self, Error> {
        let cursor = client.open_scanner(scan)?;
        Ok(Self { cursor, rows: 0 })
    }

    pub fn next_row(&mut self) -> Result<Option<RowResult>, Error> {
        let row = self.cursor.next_row()?;
        if row.is_some() {
            self.rows += 1;
        }
        Ok(row)
    }
}

impl Drop for ScannerGuard {
    fn drop(&mut self) {
        trace!(rows = self.rows, "closing scanner");
        self.cursor.close();
    }
}

//! Purpose: One lazy traversal of a scan, decoded row by row.
//! Exports: `DecodedRows`, `DecodedRow`, `RowColumns`, `ScanResult`.
//! Role: Shared by the aggregating (`collect_rows`) and streaming (`for_each_cell`) scan modes.
//! Invariants: At most one row is buffered; rows beyond the limit are never fetched.
//! Invariants: The cursor closes on exhaustion, limit, error, early stop, or drop.
#![allow(clippy::result_large_err)]

use std::collections::BTreeMap;
use std::ops::ControlFlow;

use crate::api::client::ScannerGuard;
use crate::core::binary::to_string_binary;
use crate::core::cell::RowResult;
use crate::core::decode::CellDecoder;
use crate::core::error::Error;

/// Column label to decoded cell text.
pub type RowColumns = BTreeMap<String, String>;
/// Rendered row key to its columns.
pub type ScanResult = BTreeMap<String, RowColumns>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedRow {
    pub key: String,
    pub cells: Vec<(String, String)>,
}

pub struct DecodedRows<'a> {
    scanner: Option<ScannerGuard>,
    decoder: CellDecoder<'a>,
    limit: Option<u64>,
    max_length: Option<usize>,
    yielded: u64,
}

impl<'a> DecodedRows<'a> {
    pub(crate) fn new(
        scanner: ScannerGuard,
        decoder: CellDecoder<'a>,
        limit: Option<u64>,
        max_length: Option<usize>,
    ) -> Self {
        Self {
            scanner: Some(scanner),
            decoder,
            limit,
            max_length,
            yielded: 0,
        }
    }

    pub fn rows_yielded(&self) -> u64 {
        self.yielded
    }

    fn decode_row(&self, row: RowResult) -> DecodedRow {
        let cells = row
            .cells
            .iter()
            .map(|cell| {
                let column = cell.column_label();
                let value = self.decoder.decode(&column, cell, self.max_length);
                (column, value)
            })
            .collect();
        DecodedRow {
            key: to_string_binary(&row.row),
            cells,
        }
    }

    pub fn collect_rows(self) -> Result<ScanResult, Error> {
        let mut result = ScanResult::new();
        for row in self {
            let row = row?;
            let columns = result.entry(row.key).or_default();
            columns.extend(row.cells);
        }
        Ok(result)
    }

    /// Streams `(row key, "column=<col>, <decoded>")` and returns the rows delivered.
    pub fn for_each_cell<F>(self, mut sink: F) -> Result<u64, Error>
    where
        F: FnMut(&str, &str) -> ControlFlow<()>,
    {
        let mut rows = 0;
        for row in self {
            let row = row?;
            rows += 1;
            for (column, value) in &row.cells {
                let line = format!("column={column}, {value}");
                if sink(&row.key, &line).is_break() {
                    return Ok(rows);
                }
            }
        }
        Ok(rows)
    }
}

impl Iterator for DecodedRows<'_> {
    type Item = Result<DecodedRow, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.limit.is_some_and(|limit| self.yielded >= limit) {
            self.scanner = None;
            return None;
        }
        let scanner = self.scanner.as_mut()?;
        match scanner.next_row() {
            Ok(Some(row)) => {
                self.yielded += 1;
                Some(Ok(self.decode_row(row)))
            }
            Ok(None) => {
                self.scanner = None;
                None
            }
            Err(err) => {
                self.scanner = None;
                Some(Err(err))
            }
        }
    }
}

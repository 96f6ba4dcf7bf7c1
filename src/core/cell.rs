//! Purpose: Cells and rows as returned by the remote table client.
//! Exports: `Cell`, `RowResult`.
//! Role: Raw, undecoded results handed from `RemoteTableClient` to the decoders.
use crate::core::column::column_label;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cell {
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
    pub timestamp: i64,
    pub value: Vec<u8>,
}

impl Cell {
    pub fn new(
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: i64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            value: value.into(),
        }
    }

    pub fn column_label(&self) -> String {
        column_label(&self.family, &self.qualifier)
    }
}

/// Cells sharing one row key, ordered by family, qualifier, then newest timestamp first.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RowResult {
    pub row: Vec<u8>,
    pub cells: Vec<Cell>,
}

impl RowResult {
    pub fn new(row: impl Into<Vec<u8>>, cells: Vec<Cell>) -> Self {
        Self {
            row: row.into(),
            cells,
        }
    }

    pub fn empty(row: impl Into<Vec<u8>>) -> Self {
        Self::new(row, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

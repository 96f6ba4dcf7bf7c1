//! Purpose: Render cells as `timestamp=<ts>, value=<rendered>`.
//! Exports: `CellDecoder`.
//! Role: Picks a renderer per (reserved table, column); catalog columns go through `MetadataCodec`.
//! Invariants: Decoding never fails; undecodable catalog values fall back to raw rendering.
use tracing::warn;

use crate::core::binary::to_string_binary;
use crate::core::cell::Cell;
use crate::core::error::Error;
use crate::core::metadata::{MetadataCodec, REGIONINFO_COLUMN, STARTCODE_COLUMN};

type RenderValue = fn(&dyn MetadataCodec, &Cell) -> Result<String, Error>;

const RESERVED_RENDERERS: &[(&str, RenderValue)] = &[
    (REGIONINFO_COLUMN, render_region_descriptor),
    (STARTCODE_COLUMN, render_start_code),
];

fn render_region_descriptor(codec: &dyn MetadataCodec, cell: &Cell) -> Result<String, Error> {
    Ok(codec.decode_region_descriptor(&cell.value)?.to_string())
}

fn render_start_code(codec: &dyn MetadataCodec, cell: &Cell) -> Result<String, Error> {
    Ok(codec.decode_start_code(&cell.value).to_string())
}

fn render_raw(cell: &Cell) -> String {
    to_string_binary(&cell.value)
}

/// Renders cells of one table. Built once per operation.
pub struct CellDecoder<'a> {
    codec: &'a dyn MetadataCodec,
    renderers: &'static [(&'static str, RenderValue)],
}

impl<'a> CellDecoder<'a> {
    pub fn new(reserved_table: bool, codec: &'a dyn MetadataCodec) -> Self {
        let renderers: &'static [(&'static str, RenderValue)] = if reserved_table {
            RESERVED_RENDERERS
        } else {
            &[]
        };
        Self { codec, renderers }
    }

    fn renderer(&self, column: &str) -> Option<RenderValue> {
        self.renderers
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, render)| *render)
    }

    /// Truncates to `max_length` characters when given.
    pub fn decode(&self, column: &str, cell: &Cell, max_length: Option<usize>) -> String {
        let value = match self.renderer(column) {
            Some(render) => render(self.codec, cell).unwrap_or_else(|err| {
                warn!(
                    column,
                    timestamp = cell.timestamp,
                    error = %err,
                    "catalog value decode failed; rendering raw bytes"
                );
                render_raw(cell)
            }),
            None => render_raw(cell),
        };
        let text = format!("timestamp={}, value={}", cell.timestamp, value);
        match max_length {
            Some(max) if text.chars().count() > max => text.chars().take(max).collect(),
            _ => text,
        }
    }
}

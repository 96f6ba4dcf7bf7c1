//! Purpose: Define the public Rust API boundary for table access.
//! Exports: `TableAccessor`, the remote client contract, scan results, and core value types.
//! Role: Public, additive-only surface over the core request and decoding modules.
//! Invariants: Transport lives behind `RemoteTableClient`; nothing here opens connections.
//! Invariants: `MemoryTable` is the in-process client used by tests and embedders.

mod client;
mod config;
mod memory;
mod scan;
mod table;

pub use crate::core::cell::{Cell, RowResult};
pub use crate::core::column::{ColumnRef, parse_column};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::filter::{ExpressionParser, Filter, FilterParser};
pub use crate::core::metadata::{CatalogCodec, MetadataCodec, RegionDescriptor, StartCode};
pub use crate::core::options::{OptionValue, Options};
pub use crate::core::request::{
    CountOptions, DeleteRequest, GetPlan, GetRequest, LATEST_TIMESTAMP, PutRequest, ScanPlan,
    ScanRequest,
};
pub use client::{FamilyDescriptor, RemoteTableClient, ScanCursor, ScannerGuard, TableSchema};
pub use config::AccessorOptions;
pub use memory::MemoryTable;
pub use scan::{DecodedRow, DecodedRows, RowColumns, ScanResult};
pub use table::{ApiResult, TableAccessor};

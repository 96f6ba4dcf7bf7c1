//! Purpose: Build well-formed remote requests from normalized options.
//! Exports: `GetRequest`, `ScanRequest`, `PutRequest`, `DeleteRequest`, `GetPlan`, `ScanPlan`, `CountOptions`.
//! Role: Ordered validation pipelines; the only place loosely-typed options become typed requests.
//! Invariants: Every format check runs before any collaborator is consulted.
//! Invariants: Client-side options (LIMIT, MAXLENGTH) never reach the remote request.
//! Invariants: No I/O; the only callback is the lazy column-family lookup for scans.

use crate::core::column::{ColumnRef, parse_column};
use crate::core::error::{Error, ErrorKind};
use crate::core::filter::{Filter, FilterParser};
use crate::core::options::{
    CACHE_BLOCKS, COLUMN, COLUMNS, FILTER, LIMIT, MAXLENGTH, OptionValue, Options, STARTROW,
    STOPROW, TIMESTAMP, VERSIONS,
};

/// Timestamp meaning "newest"; deletes at this timestamp remove every version.
pub const LATEST_TIMESTAMP: i64 = i64::MAX;

pub const DEFAULT_COUNT_INTERVAL: u64 = 1000;
pub const DEFAULT_COUNT_CACHING_ROWS: u32 = 10;

fn selects(columns: &[ColumnRef], family: &[u8], qualifier: &[u8]) -> bool {
    columns.is_empty() || columns.iter().any(|column| column.matches(family, qualifier))
}

fn push_unique(columns: &mut Vec<ColumnRef>, column: ColumnRef) {
    if !columns.contains(&column) {
        columns.push(column);
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GetRequest {
    pub row: Vec<u8>,
    /// Empty selects every column.
    pub columns: Vec<ColumnRef>,
    pub max_versions: u32,
    /// Exact timestamp to match.
    pub timestamp: Option<i64>,
}

impl GetRequest {
    pub fn new(row: impl Into<Vec<u8>>) -> Self {
        Self {
            row: row.into(),
            columns: Vec::new(),
            max_versions: 1,
            timestamp: None,
        }
    }

    pub fn add_column(&mut self, column: ColumnRef) {
        push_unique(&mut self.columns, column);
    }

    pub fn with_column(mut self, column: ColumnRef) -> Self {
        self.add_column(column);
        self
    }

    pub fn with_max_versions(mut self, max_versions: u32) -> Self {
        self.max_versions = max_versions;
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn selects(&self, family: &[u8], qualifier: &[u8]) -> bool {
        selects(&self.columns, family, qualifier)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScanRequest {
    /// Inclusive; empty starts at the beginning of the table.
    pub start_row: Vec<u8>,
    /// Exclusive; `None` runs to the end of the table.
    pub stop_row: Option<Vec<u8>>,
    pub columns: Vec<ColumnRef>,
    pub filter: Option<Filter>,
    pub cache_blocks: bool,
    /// Rows fetched per server round trip; `None` leaves the server default.
    pub caching: Option<u32>,
    pub max_versions: u32,
    pub timestamp: Option<i64>,
}

impl ScanRequest {
    pub fn new() -> Self {
        Self {
            start_row: Vec::new(),
            stop_row: None,
            columns: Vec::new(),
            filter: None,
            cache_blocks: true,
            caching: None,
            max_versions: 1,
            timestamp: None,
        }
    }

    pub fn with_range(mut self, start_row: impl Into<Vec<u8>>, stop_row: Option<Vec<u8>>) -> Self {
        self.start_row = start_row.into();
        self.stop_row = stop_row;
        self
    }

    pub fn with_column(mut self, column: ColumnRef) -> Self {
        push_unique(&mut self.columns, column);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_cache_blocks(mut self, cache_blocks: bool) -> Self {
        self.cache_blocks = cache_blocks;
        self
    }

    pub fn with_caching(mut self, rows: u32) -> Self {
        self.caching = Some(rows);
        self
    }

    pub fn contains_row(&self, row: &[u8]) -> bool {
        if row < self.start_row.as_slice() {
            return false;
        }
        match &self.stop_row {
            Some(stop) => row < stop.as_slice(),
            None => true,
        }
    }

    pub fn selects(&self, family: &[u8], qualifier: &[u8]) -> bool {
        selects(&self.columns, family, qualifier)
    }
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PutRequest {
    pub row: Vec<u8>,
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
    /// `None` lets the server assign the timestamp.
    pub timestamp: Option<i64>,
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeleteRequest {
    pub row: Vec<u8>,
    /// Versions at or below this timestamp are deleted.
    pub timestamp: i64,
    /// `None` deletes the whole row; a family-only reference deletes the family.
    /// `cf:` addresses only the empty-qualifier column.
    pub scope: Option<ColumnRef>,
}

impl DeleteRequest {
    pub fn covers(&self, family: &[u8], qualifier: &[u8], timestamp: i64) -> bool {
        if timestamp > self.timestamp {
            return false;
        }
        match &self.scope {
            Some(column) => column.addresses(family, qualifier),
            None => true,
        }
    }
}

/// A single-row read plus its client-side display options.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GetPlan {
    pub request: GetRequest,
    pub max_length: Option<usize>,
}

impl GetPlan {
    pub fn from_options(row: impl Into<Vec<u8>>, mut options: Options) -> Result<Self, Error> {
        let mut request = GetRequest::new(row);
        let max_length = take_max_length(&mut options)?;

        if options.is_empty() {
            return Ok(Self {
                request,
                max_length,
            });
        }

        let columns = options
            .value(COLUMN)
            .or_else(|| options.value(COLUMNS))
            .map(column_names)
            .transpose()?;
        match columns {
            Some(columns) => {
                for column in columns {
                    request.add_column(column);
                }
                request.max_versions = match options.value(VERSIONS) {
                    Some(value) => versions_option(value)?,
                    None => 1,
                };
                if let Some(value) = options.value(TIMESTAMP) {
                    request.timestamp = Some(int_option(TIMESTAMP, value)?);
                }
            }
            None => {
                let Some(value) = options.value(TIMESTAMP) else {
                    return Err(Error::new(ErrorKind::Format)
                        .with_message(format!(
                            "failed to parse get options ({})",
                            options.names().collect::<Vec<_>>().join(", ")
                        ))
                        .with_hint(
                            "Pass COLUMN/COLUMNS, or TIMESTAMP to read every column at that time.",
                        ));
                };
                request.timestamp = Some(int_option(TIMESTAMP, value)?);
            }
        }

        Ok(Self {
            request,
            max_length,
        })
    }
}

/// A scan plus its client-side options.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanPlan {
    pub request: ScanRequest,
    /// Stop after this many rows; `None` is unbounded.
    pub limit: Option<u64>,
    pub max_length: Option<usize>,
}

impl ScanPlan {
    /// Builds a scan plan. `all_columns` is only called when no columns are given.
    pub fn from_options<F>(
        mut options: Options,
        parser: &dyn FilterParser,
        all_columns: F,
    ) -> Result<Self, Error>
    where
        F: FnOnce() -> Result<Vec<String>, Error>,
    {
        let limit = match options.remove(LIMIT) {
            None | Some(OptionValue::Null) => None,
            Some(value) => {
                let limit = int_option(LIMIT, &value)?;
                (limit > 0).then_some(limit as u64)
            }
        };
        let max_length = take_max_length(&mut options)?;

        if options.is_empty() {
            return Ok(Self {
                request: ScanRequest::new(),
                limit,
                max_length,
            });
        }

        let mut request = ScanRequest::new();
        request.filter = match options.value(FILTER) {
            None => None,
            Some(OptionValue::Filter(filter)) => Some(filter.clone()),
            Some(OptionValue::Str(expression)) => Some(parser.parse(expression)?),
            Some(other) => return Err(type_error(FILTER, "a filter or filter string", other)),
        };
        if let Some(value) = options.value(STARTROW) {
            request.start_row = row_option(STARTROW, value)?;
        }
        if let Some(value) = options.value(STOPROW) {
            request.stop_row = Some(row_option(STOPROW, value)?);
        }
        if let Some(value) = options.value(TIMESTAMP) {
            request.timestamp = Some(int_option(TIMESTAMP, value)?);
        }
        request.cache_blocks = match options.value(CACHE_BLOCKS) {
            None => true,
            Some(OptionValue::Bool(flag)) => *flag,
            Some(other) => return Err(type_error(CACHE_BLOCKS, "a boolean", other)),
        };
        if let Some(value) = options.value(VERSIONS) {
            if int_option(VERSIONS, value)? > 1 {
                request.max_versions = versions_option(value)?;
            }
        }

        let columns = match options.value(COLUMNS).or_else(|| options.value(COLUMN)) {
            Some(value) => column_names(value)?,
            None => all_columns()?
                .into_iter()
                .map(parse_column)
                .collect::<Result<Vec<_>, _>>()?,
        };
        for column in columns {
            push_unique(&mut request.columns, column);
        }

        Ok(Self {
            request,
            limit,
            max_length,
        })
    }
}

/// Options for the row counter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CountOptions {
    /// Progress is reported every `interval` rows.
    pub interval: u64,
    pub caching_rows: u32,
}

impl CountOptions {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_COUNT_INTERVAL,
            caching_rows: DEFAULT_COUNT_CACHING_ROWS,
        }
    }

    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_caching_rows(mut self, caching_rows: u32) -> Self {
        self.caching_rows = caching_rows;
        self
    }

    /// First-key-only, uncached scan: only row existence matters.
    pub fn scan_request(&self) -> Result<ScanRequest, Error> {
        if self.interval == 0 {
            return Err(
                Error::new(ErrorKind::Format).with_message("count interval must be positive"),
            );
        }
        if self.caching_rows == 0 {
            return Err(
                Error::new(ErrorKind::Format).with_message("count caching rows must be positive"),
            );
        }
        Ok(ScanRequest::new()
            .with_cache_blocks(false)
            .with_caching(self.caching_rows)
            .with_filter(Filter::FirstKeyOnly))
    }
}

impl Default for CountOptions {
    fn default() -> Self {
        Self::new()
    }
}

fn take_max_length(options: &mut Options) -> Result<Option<usize>, Error> {
    match options.remove(MAXLENGTH) {
        None | Some(OptionValue::Null) => Ok(None),
        Some(value) => {
            let length = int_option(MAXLENGTH, &value)?;
            Ok(usize::try_from(length).ok())
        }
    }
}

fn column_names(value: &OptionValue) -> Result<Vec<ColumnRef>, Error> {
    match value {
        OptionValue::Str(_) | OptionValue::Bytes(_) => Ok(vec![column_name(value)?]),
        OptionValue::List(items) => items.iter().map(column_name).collect(),
        other => Err(type_error(COLUMNS, "a string or a list of strings", other)),
    }
}

fn column_name(value: &OptionValue) -> Result<ColumnRef, Error> {
    match value.as_bytes() {
        Some(name) => parse_column(name),
        None => Err(type_error(COLUMNS, "column name strings", value)),
    }
}

fn int_option(name: &str, value: &OptionValue) -> Result<i64, Error> {
    match value {
        OptionValue::Int(number) => Ok(*number),
        OptionValue::Str(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| type_error(name, "an integer", value)),
        other => Err(type_error(name, "an integer", other)),
    }
}

fn versions_option(value: &OptionValue) -> Result<u32, Error> {
    let versions = int_option(VERSIONS, value)?;
    u32::try_from(versions)
        .ok()
        .filter(|versions| *versions >= 1)
        .ok_or_else(|| {
            Error::new(ErrorKind::Format)
                .with_message(format!("{VERSIONS} must be between 1 and {}", u32::MAX))
        })
}

fn row_option(name: &str, value: &OptionValue) -> Result<Vec<u8>, Error> {
    value
        .as_bytes()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| type_error(name, "a row key string", value))
}

fn type_error(name: &str, expected: &str, found: &OptionValue) -> Error {
    Error::new(ErrorKind::Format).with_message(format!(
        "{name} must be {expected}, found {}",
        found.type_name()
    ))
}

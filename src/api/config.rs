//! Purpose: Accessor defaults, loadable from JSON.
//! Exports: `AccessorOptions`.
//! Role: Ambient configuration for `TableAccessor`; every field has a default.
//! Invariants: Unknown JSON fields are rejected so typos do not silently fall back to defaults.
#![allow(clippy::result_large_err)]

use std::path::Path;

use serde::Deserialize;

use crate::core::error::{Error, ErrorKind};
use crate::core::request::{CountOptions, DEFAULT_COUNT_CACHING_ROWS, DEFAULT_COUNT_INTERVAL};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AccessorOptions {
    pub count_interval: u64,
    pub count_caching_rows: u32,
    /// Server-side row caching for option-driven scans.
    pub scan_caching: Option<u32>,
}

impl AccessorOptions {
    pub fn new() -> Self {
        Self {
            count_interval: DEFAULT_COUNT_INTERVAL,
            count_caching_rows: DEFAULT_COUNT_CACHING_ROWS,
            scan_caching: None,
        }
    }

    pub fn with_count_interval(mut self, interval: u64) -> Self {
        self.count_interval = interval;
        self
    }

    pub fn with_count_caching_rows(mut self, rows: u32) -> Self {
        self.count_caching_rows = rows;
        self
    }

    pub fn with_scan_caching(mut self, rows: u32) -> Self {
        self.scan_caching = Some(rows);
        self
    }

    pub fn count_options(&self) -> CountOptions {
        CountOptions::new()
            .with_interval(self.count_interval)
            .with_caching_rows(self.count_caching_rows)
    }

    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|err| {
            Error::new(ErrorKind::Format)
                .with_message("invalid accessor options")
                .with_source(err)
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read accessor options")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_json_str(&json).map_err(|err| err.with_path(path))
    }
}

impl Default for AccessorOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::AccessorOptions;
    use crate::core::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn defaults_match_count_defaults() {
        let options = AccessorOptions::new();
        assert_eq!(options.count_interval, 1000);
        assert_eq!(options.count_caching_rows, 10);
        assert_eq!(options.scan_caching, None);
        assert_eq!(AccessorOptions::from_json_str("{}").expect("options"), options);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let options = AccessorOptions::from_json_str(r#"{"scan_caching": 100}"#).expect("options");
        assert_eq!(options, AccessorOptions::new().with_scan_caching(100));
    }

    #[test]
    fn unknown_fields_are_format_errors() {
        let err = AccessorOptions::from_json_str(r#"{"scan_cache": 1}"#).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn load_reads_file_and_reports_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("accessor.json");
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(br#"{"count_interval": 5}"#).expect("write");

        let options = AccessorOptions::load(&path).expect("load");
        assert_eq!(options.count_options().interval, 5);

        let missing = temp.path().join("missing.json");
        let err = AccessorOptions::load(&missing).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("missing.json"));
    }
}

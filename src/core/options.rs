//! Purpose: Represent loosely-typed shell-style request options as tagged values.
//! Exports: `OptionValue`, `Options`, option-name constants, `normalize_get_args`.
//! Role: Input model for the get/scan validation pipelines in `core::request`.
//! Invariants: Option names are matched exactly (upper-case), never case-folded.
//! Invariants: Normalization is pure and fails with `ErrorKind::Format` only.

use std::collections::BTreeMap;

use crate::core::error::{Error, ErrorKind};
use crate::core::filter::Filter;

pub const MAXLENGTH: &str = "MAXLENGTH";
pub const COLUMN: &str = "COLUMN";
pub const COLUMNS: &str = "COLUMNS";
pub const VERSIONS: &str = "VERSIONS";
pub const TIMESTAMP: &str = "TIMESTAMP";
pub const LIMIT: &str = "LIMIT";
pub const STARTROW: &str = "STARTROW";
pub const STOPROW: &str = "STOPROW";
pub const FILTER: &str = "FILTER";
pub const CACHE_BLOCKS: &str = "CACHE_BLOCKS";

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<OptionValue>),
    Map(Options),
    Filter(Filter),
}

impl OptionValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Null => "null",
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "int",
            OptionValue::Str(_) => "string",
            OptionValue::Bytes(_) => "bytes",
            OptionValue::List(_) => "list",
            OptionValue::Map(_) => "map",
            OptionValue::Filter(_) => "filter",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, OptionValue::Null)
    }

    /// Byte form of a string-like value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            OptionValue::Str(text) => Some(text.as_bytes()),
            OptionValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl From<&[u8]> for OptionValue {
    fn from(value: &[u8]) -> Self {
        OptionValue::Bytes(value.to_vec())
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<Filter> for OptionValue {
    fn from(value: Filter) -> Self {
        OptionValue::Filter(value)
    }
}

impl From<Options> for OptionValue {
    fn from(value: Options) -> Self {
        OptionValue::Map(value)
    }
}

impl<T: Into<OptionValue>> From<Vec<T>> for OptionValue {
    fn from(value: Vec<T>) -> Self {
        OptionValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<OptionValue>> From<Option<T>> for OptionValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(OptionValue::Null, Into::into)
    }
}

/// Named request options, e.g. `{COLUMNS => ["cf:a"], VERSIONS => 3}`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options {
    entries: BTreeMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries.get(name)
    }

    /// Present and not null.
    pub fn value(&self, name: &str) -> Option<&OptionValue> {
        self.get(name).filter(|value| !value.is_null())
    }

    pub fn remove(&mut self, name: &str) -> Option<OptionValue> {
        self.entries.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Normalizes the extra arguments of a `get` call into options.
///
/// A single map is taken as the options. Otherwise every argument must be a
/// column name or a (nested) list of them; nulls are dropped and the result
/// becomes the `COLUMNS` option.
pub fn normalize_get_args(mut args: Vec<OptionValue>) -> Result<Options, Error> {
    if matches!(args.first(), Some(OptionValue::Map(_))) {
        if args.len() > 1 {
            return Err(Error::new(ErrorKind::Format)
                .with_message("an options map must be the only argument")
                .with_hint("Pass columns inside the map, e.g. {COLUMNS => ['cf:a']}."));
        }
        if let Some(OptionValue::Map(options)) = args.pop() {
            return Ok(options);
        }
    }

    let mut columns = Vec::new();
    flatten_columns(args, &mut columns)?;
    Ok(Options::new().with(COLUMNS, OptionValue::List(columns)))
}

fn flatten_columns(args: Vec<OptionValue>, out: &mut Vec<OptionValue>) -> Result<(), Error> {
    for arg in args {
        match arg {
            OptionValue::Null => {}
            OptionValue::Str(_) | OptionValue::Bytes(_) => out.push(arg),
            OptionValue::List(items) => flatten_columns(items, out)?,
            other => {
                return Err(Error::new(ErrorKind::Format).with_message(format!(
                    "failed to parse get arguments: unexpected {} argument",
                    other.type_name()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{COLUMNS, OptionValue, Options, VERSIONS, normalize_get_args};
    use crate::core::error::ErrorKind;

    fn columns_of(options: &Options) -> Vec<OptionValue> {
        match options.get(COLUMNS) {
            Some(OptionValue::List(items)) => items.clone(),
            other => panic!("expected column list, got {other:?}"),
        }
    }

    #[test]
    fn single_map_is_used_as_options() {
        let options = Options::new().with(VERSIONS, 2i64);
        let normalized = normalize_get_args(vec![options.clone().into()]).expect("options");
        assert_eq!(normalized, options);
    }

    #[test]
    fn strings_and_lists_become_flat_columns() {
        let args = vec![
            OptionValue::from("cf:a"),
            OptionValue::from(vec![
                OptionValue::from("cf:b"),
                OptionValue::Null,
                OptionValue::from(vec!["cf:c"]),
            ]),
        ];
        let normalized = normalize_get_args(args).expect("options");
        assert_eq!(
            columns_of(&normalized),
            vec![
                OptionValue::from("cf:a"),
                OptionValue::from("cf:b"),
                OptionValue::from("cf:c"),
            ]
        );
    }

    #[test]
    fn no_arguments_means_empty_column_list() {
        let normalized = normalize_get_args(Vec::new()).expect("options");
        assert!(columns_of(&normalized).is_empty());
        assert_eq!(normalized.len(), 1);
    }

    #[test]
    fn other_shapes_are_rejected() {
        let err = normalize_get_args(vec![OptionValue::Int(5)]).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = normalize_get_args(vec![Options::new().into(), "cf:a".into()]).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn value_skips_nulls() {
        let options = Options::new().with(VERSIONS, OptionValue::Null);
        assert!(options.get(VERSIONS).is_some());
        assert!(options.value(VERSIONS).is_none());
    }
}

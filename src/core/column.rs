//! Purpose: Parse `family:qualifier` column names and render column labels.
//! Exports: `ColumnRef`, `parse_column`, `column_label`.
//! Role: The single column-addressing model shared by reads, writes, and deletes.
//! Invariants: Names split at the first colon byte; the family must be non-empty.
//! Invariants: `qualifier: None` widens to the family; `Some(empty)` widens only for reads.
use std::fmt;

use bstr::ByteSlice;

use crate::core::binary::to_string_binary;
use crate::core::error::{Error, ErrorKind};

const FAMILY_DELIMITER: u8 = b':';

/// A parsed column name. `qualifier: None` addresses the whole family.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ColumnRef {
    pub family: Vec<u8>,
    pub qualifier: Option<Vec<u8>>,
}

impl ColumnRef {
    pub fn family(family: impl Into<Vec<u8>>) -> Self {
        Self {
            family: family.into(),
            qualifier: None,
        }
    }

    pub fn column(family: impl Into<Vec<u8>>, qualifier: impl Into<Vec<u8>>) -> Self {
        Self {
            family: family.into(),
            qualifier: Some(qualifier.into()),
        }
    }

    /// True when this reference selects every qualifier of the family.
    ///
    /// An empty qualifier (`"cf:"`) selects the family when used for reads.
    pub fn selects_family(&self) -> bool {
        self.qualifier.as_ref().is_none_or(|qualifier| qualifier.is_empty())
    }

    pub fn matches(&self, family: &[u8], qualifier: &[u8]) -> bool {
        if self.family != family {
            return false;
        }
        if self.selects_family() {
            return true;
        }
        self.qualifier.as_deref() == Some(qualifier)
    }

    /// Exact addressing for deletes: only `qualifier: None` widens to the family.
    pub fn addresses(&self, family: &[u8], qualifier: &[u8]) -> bool {
        self.family == family
            && self
                .qualifier
                .as_deref()
                .is_none_or(|wanted| wanted == qualifier)
    }

    /// Qualifier for writes; a family-only reference cannot address a cell.
    pub fn require_qualifier(&self) -> Result<&[u8], Error> {
        self.qualifier.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::Format)
                .with_message("column qualifier is required")
                .with_column(self.to_string())
                .with_hint("Use the `family:qualifier` form, e.g. `cf:name`.")
        })
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}", column_label(&self.family, qualifier)),
            None => write!(f, "{}", self.family.to_str_lossy()),
        }
    }
}

pub fn parse_column(name: impl AsRef<[u8]>) -> Result<ColumnRef, Error> {
    let name = name.as_ref();
    let (family, qualifier) = match name.find_byte(FAMILY_DELIMITER) {
        Some(idx) => (&name[..idx], Some(name[idx + 1..].to_vec())),
        None => (name, None),
    };
    if family.is_empty() {
        return Err(Error::new(ErrorKind::Format)
            .with_message("column family must not be empty")
            .with_column(to_string_binary(name))
            .with_hint("Column names take the form `family` or `family:qualifier`."));
    }
    Ok(ColumnRef {
        family: family.to_vec(),
        qualifier,
    })
}

/// Display label for a stored cell's column.
pub fn column_label(family: &[u8], qualifier: &[u8]) -> String {
    format!("{}:{}", family.to_str_lossy(), to_string_binary(qualifier))
}

//! Purpose: Model server-side scan filters and parse their textual form.
//! Exports: `Filter`, `FilterParser`, `ExpressionParser`.
//! Role: `FilterParser` is the seam for an external filter grammar; `ExpressionParser` covers the common filters.
//! Invariants: Parse failures are format errors carrying a hint; parsing never touches the table.
//! Invariants: `Filter::apply` is pure; an empty output means the row is dropped.

use std::fmt;

use crate::core::cell::Cell;
use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Filter {
    /// Keep only the first cell of each row.
    FirstKeyOnly,
    /// Keep every cell but drop its value.
    KeyOnly,
    /// Keep rows whose key starts with the prefix.
    Prefix(Vec<u8>),
    /// Keep cells whose qualifier starts with the prefix.
    ColumnPrefix(Vec<u8>),
    /// Apply each filter in order.
    All(Vec<Filter>),
}

impl Filter {
    pub fn apply(&self, row: &[u8], mut cells: Vec<Cell>) -> Vec<Cell> {
        match self {
            Filter::FirstKeyOnly => {
                cells.truncate(1);
                cells
            }
            Filter::KeyOnly => {
                for cell in cells.iter_mut() {
                    cell.value.clear();
                }
                cells
            }
            Filter::Prefix(prefix) => {
                if row.starts_with(prefix) {
                    cells
                } else {
                    Vec::new()
                }
            }
            Filter::ColumnPrefix(prefix) => {
                cells.retain(|cell| cell.qualifier.starts_with(prefix));
                cells
            }
            Filter::All(filters) => {
                for filter in filters {
                    if cells.is_empty() {
                        break;
                    }
                    cells = filter.apply(row, cells);
                }
                cells
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::FirstKeyOnly => write!(f, "FirstKeyOnlyFilter()"),
            Filter::KeyOnly => write!(f, "KeyOnlyFilter()"),
            Filter::Prefix(prefix) => write!(f, "PrefixFilter({})", quote(prefix)),
            Filter::ColumnPrefix(prefix) => write!(f, "ColumnPrefixFilter({})", quote(prefix)),
            Filter::All(filters) => {
                for (idx, filter) in filters.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " AND ")?;
                    }
                    write!(f, "{filter}")?;
                }
                Ok(())
            }
        }
    }
}

fn quote(bytes: &[u8]) -> String {
    format!("'{}'", String::from_utf8_lossy(bytes).replace('\'', "''"))
}

/// Turns a filter expression string into a [`Filter`].
pub trait FilterParser: Send + Sync {
    fn parse(&self, expression: &str) -> Result<Filter, Error>;
}

/// Parses `Name(args) [AND Name(args) ...]` for the filters [`Filter`] can express.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpressionParser;

impl FilterParser for ExpressionParser {
    fn parse(&self, expression: &str) -> Result<Filter, Error> {
        let mut lexer = Lexer::new(expression);
        let mut filters = vec![parse_term(&mut lexer, expression)?];
        loop {
            lexer.skip_whitespace();
            if lexer.at_end() {
                break;
            }
            let word = lexer.ident();
            if word != "AND" {
                return Err(filter_error(expression, "expected `AND` between filters"));
            }
            filters.push(parse_term(&mut lexer, expression)?);
        }
        if filters.len() == 1 {
            Ok(filters.remove(0))
        } else {
            Ok(Filter::All(filters))
        }
    }
}

fn parse_term(lexer: &mut Lexer<'_>, expression: &str) -> Result<Filter, Error> {
    lexer.skip_whitespace();
    let name = lexer.ident();
    if name.is_empty() {
        return Err(filter_error(expression, "expected a filter name"));
    }
    lexer.skip_whitespace();
    if !lexer.eat(b'(') {
        return Err(filter_error(expression, "expected `(` after filter name"));
    }
    lexer.skip_whitespace();
    let argument = if lexer.peek() == Some(b'\'') {
        Some(
            lexer
                .quoted()
                .ok_or_else(|| filter_error(expression, "unterminated quoted argument"))?,
        )
    } else {
        None
    };
    lexer.skip_whitespace();
    if !lexer.eat(b')') {
        return Err(filter_error(expression, "expected `)` to close filter arguments"));
    }

    match (name, argument) {
        ("FirstKeyOnlyFilter", None) => Ok(Filter::FirstKeyOnly),
        ("KeyOnlyFilter", None) => Ok(Filter::KeyOnly),
        ("PrefixFilter", Some(prefix)) => Ok(Filter::Prefix(prefix)),
        ("ColumnPrefixFilter", Some(prefix)) => Ok(Filter::ColumnPrefix(prefix)),
        ("FirstKeyOnlyFilter" | "KeyOnlyFilter", Some(_)) => {
            Err(filter_error(expression, &format!("{name} takes no arguments")))
        }
        ("PrefixFilter" | "ColumnPrefixFilter", None) => Err(filter_error(
            expression,
            &format!("{name} requires one quoted argument"),
        )),
        _ => Err(filter_error(expression, &format!("unknown filter `{name}`"))),
    }
}

fn filter_error(expression: &str, detail: &str) -> Error {
    Error::new(ErrorKind::Format)
        .with_message(format!("invalid filter expression: {detail}"))
        .with_hint(format!(
            "Failed to parse `{expression}`.\nExample: \"PrefixFilter('row') AND KeyOnlyFilter()\""
        ))
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn ident(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(|byte| byte.is_ascii_alphanumeric() || byte == b'_') {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    // '' inside quotes is an escaped quote.
    fn quoted(&mut self) -> Option<Vec<u8>> {
        if !self.eat(b'\'') {
            return None;
        }
        let mut out = Vec::new();
        loop {
            let byte = self.peek()?;
            self.pos += 1;
            if byte == b'\'' {
                if self.peek() == Some(b'\'') {
                    self.pos += 1;
                    out.push(b'\'');
                    continue;
                }
                return Some(out);
            }
            out.push(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExpressionParser, Filter, FilterParser};
    use crate::core::cell::Cell;
    use crate::core::error::ErrorKind;

    fn cells() -> Vec<Cell> {
        vec![
            Cell::new("cf", "a", 2, "v1"),
            Cell::new("cf", "b", 1, "v2"),
            Cell::new("cf", "ab", 1, "v3"),
        ]
    }

    #[test]
    fn parses_single_filters() {
        let parser = ExpressionParser;
        assert_eq!(parser.parse("FirstKeyOnlyFilter()").expect("filter"), Filter::FirstKeyOnly);
        assert_eq!(
            parser.parse("  PrefixFilter ( 'it''s' ) ").expect("filter"),
            Filter::Prefix(b"it's".to_vec())
        );
    }

    #[test]
    fn parses_conjunction() {
        let filter = ExpressionParser
            .parse("PrefixFilter('r') AND ColumnPrefixFilter('a') AND KeyOnlyFilter()")
            .expect("filter");
        assert_eq!(
            filter,
            Filter::All(vec![
                Filter::Prefix(b"r".to_vec()),
                Filter::ColumnPrefix(b"a".to_vec()),
                Filter::KeyOnly,
            ])
        );
        assert_eq!(ExpressionParser.parse(&filter.to_string()).expect("reparse"), filter);
    }

    #[test]
    fn rejects_malformed_expressions() {
        for expr in [
            "",
            "Nope()",
            "PrefixFilter()",
            "KeyOnlyFilter('x')",
            "PrefixFilter('x'",
            "PrefixFilter('x) ",
            "KeyOnlyFilter() OR FirstKeyOnlyFilter()",
        ] {
            let err = ExpressionParser.parse(expr).expect_err(expr);
            assert_eq!(err.kind(), ErrorKind::Format, "{expr}");
            assert!(err.hint().is_some());
        }
    }

    #[test]
    fn first_key_only_keeps_one_cell() {
        let out = Filter::FirstKeyOnly.apply(b"r1", cells());
        assert_eq!(out, vec![Cell::new("cf", "a", 2, "v1")]);
    }

    #[test]
    fn prefix_filters_rows_and_columns() {
        assert!(Filter::Prefix(b"x".to_vec()).apply(b"r1", cells()).is_empty());
        let out = Filter::ColumnPrefix(b"a".to_vec()).apply(b"r1", cells());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn key_only_clears_values() {
        let out = Filter::KeyOnly.apply(b"r1", cells());
        assert!(out.iter().all(|cell| cell.value.is_empty()));
        assert_eq!(out.len(), 3);
    }
}

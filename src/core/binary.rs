//! Purpose: Render arbitrary bytes as printable text and back, and decode big-endian longs.
//! Exports: `to_string_binary`, `to_bytes_binary`, `to_i64`.
//! Role: Shared byte-level helpers for column labels, row keys, and cell values.
//! Invariants: Alphanumerics, space, and `PRINTABLE_PUNCTUATION` pass through; other bytes become `\xHH`.
//! Invariants: `to_i64` accepts exactly eight bytes.
use crate::core::error::{Error, ErrorKind};

const PRINTABLE_PUNCTUATION: &[u8] = b" `~!@#$%^&*()-_=+[]{}|;:'\",.<>/?";
const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

fn is_printable(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || PRINTABLE_PUNCTUATION.contains(&byte)
}

/// Renders bytes with every non-printable byte (and `\`) escaped as `\xHH`.
///
/// The output is deterministic and reversible through [`to_bytes_binary`].
pub fn to_string_binary(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        if is_printable(byte) {
            out.push(byte as char);
        } else {
            out.push_str("\\x");
            out.push(HEX_UPPER[(byte >> 4) as usize] as char);
            out.push(HEX_UPPER[(byte & 0x0F) as usize] as char);
        }
    }
    out
}

/// Inverse of [`to_string_binary`]. A `\x` not followed by two hex digits is kept as-is.
pub fn to_bytes_binary(text: &str) -> Vec<u8> {
    let input = text.as_bytes();
    let mut out = Vec::with_capacity(input.len());
    let mut idx = 0;
    while idx < input.len() {
        if input[idx] == b'\\' && idx + 3 < input.len() && input[idx + 1] == b'x' {
            if let (Some(hi), Some(lo)) = (hex_value(input[idx + 2]), hex_value(input[idx + 3])) {
                out.push((hi << 4) | lo);
                idx += 4;
                continue;
            }
        }
        out.push(input[idx]);
        idx += 1;
    }
    out
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decodes an 8-byte big-endian signed long, the on-table encoding of counters.
pub fn to_i64(bytes: &[u8]) -> Result<i64, Error> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        Error::new(ErrorKind::Corrupt).with_message(format!(
            "expected 8 bytes for a long value, found {}",
            bytes.len()
        ))
    })?;
    Ok(i64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::{to_bytes_binary, to_i64, to_string_binary};
    use crate::core::error::ErrorKind;

    #[test]
    fn printable_bytes_pass_through() {
        assert_eq!(to_string_binary(b"row-1 {a=b}, ok?"), "row-1 {a=b}, ok?");
    }

    #[test]
    fn non_printable_bytes_are_escaped_uppercase() {
        assert_eq!(to_string_binary(&[0x00, b'a', 0xff, b'\n']), "\\x00a\\xFF\\x0A");
        assert_eq!(to_string_binary(b"a\\b"), "a\\x5Cb");
    }

    #[test]
    fn escaped_text_decodes_back_to_bytes() {
        let raw = vec![0u8, 1, 2, b'\\', b'x', 0x7f, 0x80, b'z'];
        assert_eq!(to_bytes_binary(&to_string_binary(&raw)), raw);
    }

    #[test]
    fn incomplete_escape_is_literal() {
        assert_eq!(to_bytes_binary("\\x4"), b"\\x4".to_vec());
        assert_eq!(to_bytes_binary("\\xZZ"), b"\\xZZ".to_vec());
    }

    #[test]
    fn long_decoding_requires_eight_bytes() {
        assert_eq!(to_i64(&42i64.to_be_bytes()).expect("long"), 42);
        assert_eq!(to_i64(&(-7i64).to_be_bytes()).expect("long"), -7);
        let err = to_i64(b"abc").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }
}

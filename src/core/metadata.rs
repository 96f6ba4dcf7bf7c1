//! Purpose: Decode the structured values stored in the reserved catalog tables.
//! Exports: reserved names, `MetadataCodec`, `RegionDescriptor`, `StartCode`, `CatalogCodec`.
//! Role: `MetadataCodec` is the seam for catalog value formats; `CatalogCodec` is the built-in layout.
//! Invariants: Exactly two reserved tables and two reserved columns exist.
//! Invariants: Decoding is pure; malformed bytes surface as `ErrorKind::Corrupt`.

use std::fmt;

use bstr::ByteSlice;
use sha2::{Digest, Sha256};

use crate::core::binary::{to_i64, to_string_binary};
use crate::core::error::{Error, ErrorKind};

pub const ROOT_TABLE_NAME: &[u8] = b"-ROOT-";
pub const META_TABLE_NAME: &[u8] = b".META.";
pub const REGIONINFO_COLUMN: &str = "info:regioninfo";
pub const STARTCODE_COLUMN: &str = "info:serverstartcode";

const REGION_DESCRIPTOR_VERSION: u8 = 1;

pub fn is_reserved_table_name(identity: &[u8]) -> bool {
    identity == ROOT_TABLE_NAME || identity == META_TABLE_NAME
}

/// Location and state of one region of a table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegionDescriptor {
    pub table: Vec<u8>,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    pub region_id: i64,
    pub offline: bool,
    pub split: bool,
}

impl RegionDescriptor {
    /// `<table>,<start key>,<region id>`
    pub fn region_name(&self) -> Vec<u8> {
        let mut name = Vec::with_capacity(self.table.len() + self.start_key.len() + 22);
        name.extend_from_slice(&self.table);
        name.push(b',');
        name.extend_from_slice(&self.start_key);
        name.push(b',');
        name.extend_from_slice(self.region_id.to_string().as_bytes());
        name
    }

    pub fn encoded_name(&self) -> String {
        let digest = Sha256::digest(self.region_name());
        digest[..16].iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl fmt::Display for RegionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{NAME => '{}', STARTKEY => '{}', ENDKEY => '{}', ENCODED => {}",
            to_string_binary(&self.region_name()),
            to_string_binary(&self.start_key),
            to_string_binary(&self.end_key),
            self.encoded_name()
        )?;
        if self.offline {
            write!(f, ", OFFLINE => true")?;
        }
        if self.split {
            write!(f, ", SPLIT => true")?;
        }
        write!(f, ", TABLE => '{}'}}", self.table.to_str_lossy())
    }
}

/// Decoded server start code.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StartCode {
    Code(i64),
    /// Not a long; kept verbatim.
    Raw(Vec<u8>),
}

impl fmt::Display for StartCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartCode::Code(code) => write!(f, "{code}"),
            StartCode::Raw(bytes) => write!(f, "{}", to_string_binary(bytes)),
        }
    }
}

pub trait MetadataCodec: Send + Sync {
    fn decode_region_descriptor(&self, bytes: &[u8]) -> Result<RegionDescriptor, Error>;

    fn decode_start_code(&self, bytes: &[u8]) -> StartCode {
        match to_i64(bytes) {
            Ok(code) => StartCode::Code(code),
            Err(_) => StartCode::Raw(bytes.to_vec()),
        }
    }
}

/// Versioned big-endian layout: version, table, start key, end key (u32 length
/// prefixed), region id (i64), offline (u8), split (u8).
#[derive(Clone, Copy, Debug, Default)]
pub struct CatalogCodec;

impl CatalogCodec {
    pub fn encode_region_descriptor(&self, region: &RegionDescriptor) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            1 + 12 + region.table.len() + region.start_key.len() + region.end_key.len() + 10,
        );
        buf.push(REGION_DESCRIPTOR_VERSION);
        write_bytes(&mut buf, &region.table);
        write_bytes(&mut buf, &region.start_key);
        write_bytes(&mut buf, &region.end_key);
        buf.extend_from_slice(&region.region_id.to_be_bytes());
        buf.push(u8::from(region.offline));
        buf.push(u8::from(region.split));
        buf
    }
}

impl MetadataCodec for CatalogCodec {
    fn decode_region_descriptor(&self, bytes: &[u8]) -> Result<RegionDescriptor, Error> {
        let mut reader = Reader { buf: bytes, pos: 0 };
        let version = reader.u8()?;
        if version != REGION_DESCRIPTOR_VERSION {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("unsupported region descriptor version {version}")));
        }
        let table = reader.bytes()?;
        let start_key = reader.bytes()?;
        let end_key = reader.bytes()?;
        let region_id = i64::from_be_bytes(reader.array::<8>()?);
        let offline = reader.u8()? != 0;
        let split = reader.u8()? != 0;
        if reader.pos != bytes.len() {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("trailing bytes after region descriptor"));
        }
        Ok(RegionDescriptor {
            table,
            start_key,
            end_key,
            region_id,
            offline,
            split,
        })
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, len: usize) -> Result<&[u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                Error::new(ErrorKind::Corrupt).with_message("region descriptor truncated")
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.array::<1>()?[0])
    }

    fn bytes(&mut self) -> Result<Vec<u8>, Error> {
        let len = u32::from_be_bytes(self.array::<4>()?) as usize;
        Ok(self.take(len)?.to_vec())
    }
}

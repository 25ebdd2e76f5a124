//! RPA header line.
//!
//! The first line of an archive looks like one of:
//!
//! ```text
//! RPA-3.0 <hex index offset> <hex key>
//! RPA-2.0 <hex index offset>
//! ```

use std::io::Read;

use crate::{Error, Result};

/// Longest header line we are willing to read before giving up.
pub const MAX_HEADER_LEN: u64 = 1024;

const MAGIC_V3: &str = "RPA-3.0";
const MAGIC_V2: &str = "RPA-2.0";

/// RPA layout version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveVersion {
    /// `RPA-2.0`: plain offsets.
    V2,
    /// `RPA-3.0`: offsets and lengths XORed with a per-archive key.
    V3,
}

impl ArchiveVersion {
    /// The major version number (2 or 3).
    #[inline]
    pub fn number(self) -> u8 {
        match self {
            ArchiveVersion::V2 => 2,
            ArchiveVersion::V3 => 3,
        }
    }
}

impl std::fmt::Display for ArchiveVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveVersion::V2 => f.write_str(MAGIC_V2),
            ArchiveVersion::V3 => f.write_str(MAGIC_V3),
        }
    }
}

/// Decoded header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: ArchiveVersion,
    /// Byte offset of the compressed index.
    pub index_offset: i64,
    /// Obfuscation key, always 0 for version 2.
    pub key: u64,
}

impl Header {
    /// Parse a header line. Trailing whitespace (including the newline) is ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end();
        let parts: Vec<&str> = line.split(' ').collect();

        if line.starts_with(MAGIC_V3) {
            if parts.len() < 3 {
                return Err(Error::invalid_header(line, "expected offset and key"));
            }
            Ok(Self {
                version: ArchiveVersion::V3,
                index_offset: parse_offset(line, parts[1])?,
                key: u64::from_str_radix(parts[2], 16)
                    .map_err(|e| Error::invalid_header(line, format!("bad key: {e}")))?,
            })
        } else if line.starts_with(MAGIC_V2) {
            if parts.len() < 2 {
                return Err(Error::invalid_header(line, "expected offset"));
            }
            Ok(Self {
                version: ArchiveVersion::V2,
                index_offset: parse_offset(line, parts[1])?,
                key: 0,
            })
        } else {
            Err(Error::invalid_header(line, "unsupported archive format"))
        }
    }

    /// Read and parse the first line of `reader`.
    ///
    /// At most [`MAX_HEADER_LEN`] bytes are consumed.
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let mut buf = Vec::with_capacity(64);
        reader.take(MAX_HEADER_LEN).read_to_end(&mut buf)?;

        let end = memchr::memchr(b'\n', &buf).ok_or_else(|| {
            Error::invalid_header(
                &String::from_utf8_lossy(&buf[..buf.len().min(64)]),
                "missing header line terminator",
            )
        })?;

        Self::parse(&String::from_utf8_lossy(&buf[..end]))
    }
}

fn parse_offset(line: &str, token: &str) -> Result<i64> {
    i64::from_str_radix(token, 16).map_err(|e| Error::invalid_header(line, format!("bad offset: {e}")))
}

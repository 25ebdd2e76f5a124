//! Heuristic recovery of the file table from a pickled RPA index.
//!
//! The index is a pickled `dict` mapping each path to a list of
//! `(offset, length[, prefix])` tuples. Rather than run a pickle VM, the
//! decoder walks the stream with a tiny state machine that understands a
//! closed set of opcodes:
//!
//! - the `PROTO` marker at the start of the stream,
//! - `SHORT_BINSTRING`, `SHORT_BINUNICODE` and `BINUNICODE` strings,
//! - `BININT1`, `BININT2` and `BININT` integers,
//! - memo opcodes and `FRAME`, whose operands are stepped over.
//!
//! Stepping over memo and frame operands goes beyond a plain byte scan:
//! a memo index of 85 or 88 would otherwise read as a `U` or `X` string.
//! A `FRAME` only counts when its declared length fits in the bytes that
//! follow, so a stray `0x95` cannot swallow the path opcode behind it.
//!
//! Every other byte advances the cursor by one. Nested containers, negative
//! integers and the long encodings (`LONG1`, `LONG4`, `BINSTRING`) are not
//! supported. A string that looks like a content path is paired with the
//! first two positive integers found in the [`TUPLE_WINDOW`] bytes after it,
//! taken as offset and length in that order.

use renarc_common::BinaryReader;

use crate::obfuscation::Deobfuscator;
use crate::{Error, FileEntry, Result};

/// Shortest string accepted as a content path.
pub const MIN_PATH_LEN: usize = 3;
/// Longest string accepted as a content path.
pub const MAX_PATH_LEN: usize = 500;
/// Longest `BINUNICODE` payload considered at all.
pub const MAX_WIDE_STRING_LEN: u32 = 1000;
/// Bytes after a path searched for its offset/length pair.
pub const TUPLE_WINDOW: usize = 100;

/// Extensions (lower case, without the dot) of files stored in RPA archives.
pub const CONTENT_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "gif", // images
    "ogg", "mp3", "wav", "opus", // audio
    "rpy", "rpyc", "rpym", "rpymc", // scripts
    "ttf", "otf", // fonts
    "txt", "json", "yaml", "yml", // text
];

mod op {
    pub const PROTO: u8 = 0x80;
    pub const FRAME: u8 = 0x95;
    pub const SHORT_BINSTRING: u8 = b'U';
    pub const SHORT_BINUNICODE: u8 = 0x8c;
    pub const BINUNICODE: u8 = b'X';
    pub const BININT: u8 = b'J';
    pub const BININT1: u8 = b'K';
    pub const BININT2: u8 = b'M';
    pub const BINPUT: u8 = b'q';
    pub const LONG_BINPUT: u8 = b'r';
    pub const BINGET: u8 = b'h';
    pub const LONG_BINGET: u8 = b'j';
}

/// One step of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Str(&'a [u8]),
    Int(i64),
    /// A recognized opcode with no value we care about.
    Skip,
    /// Anything else; the cursor moved by a single byte.
    Unknown,
}

/// Decode the (decompressed) index of an archive.
///
/// Every recovered offset and length goes through `deobfuscator` on its
/// own. Entries come back in stream order and duplicates are kept.
pub fn decode_index(data: &[u8], deobfuscator: Deobfuscator) -> Result<Vec<FileEntry>> {
    if data.is_empty() {
        return Err(Error::EmptyIndex);
    }

    let start = if data[0] == op::PROTO && data.len() > 1 { 2 } else { 0 };
    let mut reader = BinaryReader::new_at(data, start);
    let mut entries = Vec::with_capacity(128);

    while !reader.is_empty() {
        let Token::Str(bytes) = next_token(&mut reader) else {
            continue;
        };
        let Some(path) = content_path(bytes) else {
            continue;
        };

        let window_start = reader.position();
        let window_end = window_start.saturating_add(TUPLE_WINDOW).min(data.len());
        if let Some((offset, length)) = scan_tuple(&data[window_start..window_end], deobfuscator) {
            entries.push(FileEntry::new(path, offset, length));
        }
    }

    Ok(entries)
}

/// Whether `name` ends in one of [`CONTENT_EXTENSIONS`] (case-insensitive).
pub fn has_content_extension(name: &str) -> bool {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    file_name.rsplit_once('.').is_some_and(|(_, ext)| {
        CONTENT_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

fn content_path(bytes: &[u8]) -> Option<&str> {
    if !(MIN_PATH_LEN..=MAX_PATH_LEN).contains(&bytes.len()) {
        return None;
    }
    let name = std::str::from_utf8(bytes).ok()?;
    has_content_extension(name).then_some(name)
}

fn scan_tuple(window: &[u8], deobfuscator: Deobfuscator) -> Option<(i64, i64)> {
    let mut reader = BinaryReader::new(window);
    let mut offset = None;

    while !reader.is_empty() {
        let Token::Int(raw) = next_token(&mut reader) else {
            continue;
        };
        if raw <= 0 {
            continue;
        }

        let value = deobfuscator.apply(raw);
        match offset {
            None => offset = Some(value),
            Some(offset) => return (offset > 0).then_some((offset, value)),
        }
    }

    None
}

/// Decode the opcode under the cursor. Always advances by at least one byte.
fn next_token<'a>(reader: &mut BinaryReader<'a>) -> Token<'a> {
    let mut probe = reader.clone();
    let token = match probe.read_u8() {
        Ok(opcode) => read_operand(opcode, &mut probe),
        Err(_) => None,
    };

    match token {
        Some(token) => {
            reader.seek(probe.position());
            token
        }
        None => {
            reader.advance(1);
            Token::Unknown
        }
    }
}

fn read_operand<'a>(opcode: u8, probe: &mut BinaryReader<'a>) -> Option<Token<'a>> {
    let token = match opcode {
        op::SHORT_BINSTRING | op::SHORT_BINUNICODE => {
            let len = probe.read_u8().ok()?;
            if len == 0 {
                return None;
            }
            Token::Str(probe.read_bytes(len as usize).ok()?)
        }
        op::BINUNICODE => {
            let len = probe.read_u32().ok()?;
            if len == 0 || len > MAX_WIDE_STRING_LEN {
                return None;
            }
            Token::Str(probe.read_bytes(len as usize).ok()?)
        }
        op::BININT1 => Token::Int(probe.read_u8().ok()? as i64),
        op::BININT2 => Token::Int(probe.read_u16().ok()? as i64),
        op::BININT => Token::Int(probe.read_i32().ok()? as i64),
        op::BINPUT | op::BINGET => {
            probe.read_bytes(1).ok()?;
            Token::Skip
        }
        op::LONG_BINPUT | op::LONG_BINGET => {
            probe.read_bytes(4).ok()?;
            Token::Skip
        }
        op::FRAME => {
            let len = u64::from_le_bytes(probe.read_bytes(8).ok()?.try_into().ok()?);
            if len > probe.remaining() as u64 {
                return None;
            }
            Token::Skip
        }
        _ => return None,
    };
    Some(token)
}

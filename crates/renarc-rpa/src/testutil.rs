//! Synthetic archives for tests.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;

use crate::header::ArchiveVersion;

/// One `path -> [(offset, length, "")]` item of a pickled index.
#[derive(Debug, Clone)]
pub(crate) struct IndexRecord {
    pub path: String,
    pub offset: i64,
    pub length: i64,
}

impl IndexRecord {
    pub fn new(path: &str, offset: i64, length: i64) -> Self {
        Self {
            path: path.to_string(),
            offset,
            length,
        }
    }
}

/// Pickle `records` the way a protocol 2 dump of the index dict looks,
/// with offsets and lengths XORed by `key`.
pub(crate) fn pickle_index(records: &[IndexRecord], key: u64) -> Vec<u8> {
    let mut out = vec![0x80, 0x02, b'}'];
    let mut memo = 0u32;
    put(&mut out, &mut memo);
    out.push(b'(');

    for record in records {
        out.push(b'X');
        out.extend_from_slice(&(record.path.len() as u32).to_le_bytes());
        out.extend_from_slice(record.path.as_bytes());
        put(&mut out, &mut memo);
        out.push(b']');
        put(&mut out, &mut memo);
        push_int(&mut out, record.offset ^ key as i64);
        push_int(&mut out, record.length ^ key as i64);
        out.extend_from_slice(&[b'U', 0x00, 0x87]);
        put(&mut out, &mut memo);
        out.push(b'a');
    }

    out.extend_from_slice(b"u.");
    out
}

fn put(out: &mut Vec<u8>, memo: &mut u32) {
    if *memo < 256 {
        out.extend_from_slice(&[b'q', *memo as u8]);
    } else {
        out.push(b'r');
        out.extend_from_slice(&memo.to_le_bytes());
    }
    *memo += 1;
}

fn push_int(out: &mut Vec<u8>, value: i64) {
    match value {
        0..=0xff => out.extend_from_slice(&[b'K', value as u8]),
        0x100..=0xffff => {
            out.push(b'M');
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        _ => {
            let value = i32::try_from(value).expect("test value must fit BININT");
            out.push(b'J');
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Zlib framing around stored (uncompressed) blocks.
pub(crate) fn zlib_stored(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::none());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub(crate) fn raw_deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn header_line(version: ArchiveVersion, offset: u64, key: u64) -> String {
    match version {
        ArchiveVersion::V3 => format!("RPA-3.0 {offset:016x} {key:08x}\n"),
        ArchiveVersion::V2 => format!("RPA-2.0 {offset:016x}\n"),
    }
}

/// Header + `content` + `index` (already compressed), with the header
/// pointing right after the content.
pub(crate) fn assemble(version: ArchiveVersion, key: u64, content: &[u8], index: &[u8]) -> Vec<u8> {
    let header_len = header_line(version, 0, key).len();
    let offset = (header_len + content.len()) as u64;

    let mut out = header_line(version, offset, key).into_bytes();
    out.extend_from_slice(content);
    out.extend_from_slice(index);
    out
}

/// A complete archive holding `files`, plus the records its index lists.
pub(crate) fn build_archive(
    version: ArchiveVersion,
    key: u64,
    files: &[(&str, &[u8])],
) -> (Vec<u8>, Vec<IndexRecord>) {
    let header_len = header_line(version, 0, key).len() as i64;
    let mut content = Vec::new();
    let mut records = Vec::with_capacity(files.len());

    for (path, data) in files {
        records.push(IndexRecord::new(
            path,
            header_len + content.len() as i64,
            data.len() as i64,
        ));
        content.extend_from_slice(data);
    }

    let key_for_index = match version {
        ArchiveVersion::V3 => key,
        ArchiveVersion::V2 => 0,
    };
    let index = zlib(&pickle_index(&records, key_for_index));
    (assemble(version, key, &content, &index), records)
}

pub(crate) fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

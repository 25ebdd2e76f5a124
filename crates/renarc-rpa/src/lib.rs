//! RPA archive reader for Ren'Py game files.
//!
//! An RPA archive is laid out as:
//!
//! - a header line, `RPA-3.0 <hex index offset> <hex key>` or
//!   `RPA-2.0 <hex index offset>`
//! - the stored files, back to back
//! - a zlib-compressed pickle mapping each path to its `(offset, length)`
//!
//! Version 3 archives XOR every offset and length with the header key.
//! This crate reads the header, recovers the file table with a restricted
//! pickle scanner, and streams entries to disk without ever writing outside
//! the destination directory or overwriting existing files.
//!
//! # Example
//!
//! ```no_run
//! use renarc_rpa::Archive;
//!
//! let archive = Archive::open("game/archive.rpa")?;
//!
//! for entry in archive.read_index()? {
//!     println!("{}: {} bytes", entry.path, entry.length);
//! }
//!
//! let result = archive.extract_all("extracted")?;
//! println!("{} extracted, {} skipped", result.extracted, result.skipped);
//! for failure in &result.failures {
//!     eprintln!("{}: {}", failure.path, failure.error);
//! }
//! # Ok::<(), renarc_rpa::Error>(())
//! ```

mod archive;
mod entry;
mod error;
mod extract;
mod header;
mod index;
mod obfuscation;
mod path;
mod pickle;

#[cfg(test)]
mod testutil;

pub use archive::Archive;
pub use entry::FileEntry;
pub use error::{Error, ErrorKind, Result};
pub use extract::{
    CancelToken, EntryFailure, EntryOutcome, ExtractOptions, ExtractResult, BUFFER_SIZE,
};
pub use header::{ArchiveVersion, Header, MAX_HEADER_LEN};
pub use index::MAX_INDEX_SIZE;
pub use obfuscation::Deobfuscator;
pub use pickle::{decode_index, has_content_extension, CONTENT_EXTENSIONS};

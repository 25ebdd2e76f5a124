//! Error types for the RPA crate.

use thiserror::Error;

/// Errors that can occur when working with RPA archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecognized or malformed header line.
    #[error("invalid archive header ({reason}): {line:?}")]
    InvalidHeader { line: String, reason: String },

    /// The header points at an index outside the archive.
    #[error("invalid index offset {offset:#x} for archive of {archive_size} bytes")]
    InvalidIndexOffset { offset: i64, archive_size: u64 },

    /// Compressed index larger than the configured limit.
    #[error("index too large ({size} bytes > {limit} max)")]
    IndexTooLarge { size: u64, limit: u64 },

    /// Index decompressed to nothing.
    #[error("empty index data")]
    EmptyIndex,

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// Destination path would land outside the extraction root.
    #[error("path traversal detected: {path}")]
    PathEscapesRoot { path: String },

    /// Entry offset/length inconsistent with the archive.
    #[error("{path}: {reason}")]
    InvalidEntry { path: String, reason: String },
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    Size,
    Decompression,
    Io,
    Security,
    Validation,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidHeader { .. } => ErrorKind::Format,
            Error::InvalidIndexOffset { .. } | Error::IndexTooLarge { .. } | Error::EmptyIndex => {
                ErrorKind::Size
            }
            Error::Decompression(_) => ErrorKind::Decompression,
            Error::Io(_) => ErrorKind::Io,
            Error::PathEscapesRoot { .. } => ErrorKind::Security,
            Error::InvalidEntry { .. } => ErrorKind::Validation,
        }
    }

    pub(crate) fn invalid_header(line: &str, reason: impl Into<String>) -> Self {
        Error::InvalidHeader {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for RPA operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Streaming extraction of archive entries to disk.
//!
//! Entries are processed one at a time against a single archive handle.
//! A failing entry is recorded in the [`ExtractResult`] and the batch moves
//! on; only failing to open the archive or the destination root aborts.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::path;
use crate::{Error, FileEntry, Result};

/// Size of the reusable copy buffer.
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Cooperative cancellation flag, checked between entries.
///
/// Only library callers cancel. The `renarc` binary runs every batch to
/// completion, and an interrupt ends the process without cleanup.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the running batch stop before its next entry.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Knobs for an extraction batch.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub cancel: Option<CancelToken>,
}

impl ExtractOptions {
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// What happened to a single entry.
#[derive(Debug)]
pub enum EntryOutcome {
    /// Written out; `bytes` includes the prefix.
    Extracted { bytes: u64 },
    /// The destination already existed.
    Skipped,
    Failed(Error),
}

/// A recorded per-entry failure.
#[derive(Debug)]
pub struct EntryFailure {
    pub path: String,
    pub error: Error,
}

/// Accumulated result of an extraction batch.
#[derive(Debug, Default)]
pub struct ExtractResult {
    pub extracted: usize,
    pub skipped: usize,
    /// Failures in the order they occurred.
    pub failures: Vec<EntryFailure>,
    /// Total bytes written across extracted entries.
    pub bytes_written: u64,
    /// The batch stopped early because of a [`CancelToken`].
    pub cancelled: bool,
}

impl ExtractResult {
    /// Number of entries that were looked at.
    pub fn processed(&self) -> usize {
        self.extracted + self.skipped + self.failures.len()
    }

    /// No failures and not cancelled.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    fn record(&mut self, entry: &FileEntry, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Extracted { bytes } => {
                trace!(path = %entry.path, bytes, "extracted");
                self.extracted += 1;
                self.bytes_written += bytes;
            }
            EntryOutcome::Skipped => {
                trace!(path = %entry.path, "destination exists, skipped");
                self.skipped += 1;
            }
            EntryOutcome::Failed(error) => {
                debug!(path = %entry.path, %error, "entry failed");
                self.failures.push(EntryFailure {
                    path: entry.path.clone(),
                    error,
                });
            }
        }
    }
}

/// Extract `entries` one after another, calling `on_entry` after each.
pub(crate) fn extract_sequential<F>(
    archive_path: &Path,
    entries: &[FileEntry],
    dest: &Path,
    options: &ExtractOptions,
    mut on_entry: F,
) -> Result<ExtractResult>
where
    F: FnMut(&FileEntry, &EntryOutcome),
{
    let mut extractor = Extractor::open(archive_path, dest)?;
    let mut result = ExtractResult::default();

    for entry in entries {
        if options.is_cancelled() {
            result.cancelled = true;
            break;
        }
        let outcome = extractor.extract(entry);
        on_entry(entry, &outcome);
        result.record(entry, outcome);
    }

    log_summary(archive_path, &result);
    Ok(result)
}

/// Extract `entries` on the rayon pool, one archive handle per worker.
#[cfg(feature = "parallel")]
pub(crate) fn extract_parallel<F>(
    archive_path: &Path,
    entries: &[FileEntry],
    dest: &Path,
    options: &ExtractOptions,
    on_entry: F,
) -> Result<ExtractResult>
where
    F: Fn(&FileEntry, &EntryOutcome) + Sync,
{
    use rayon::prelude::*;

    let template = Extractor::open(archive_path, dest)?;
    let root = template.root.clone();
    let archive_size = template.archive_size;
    drop(template);

    let outcomes: Vec<Option<EntryOutcome>> = entries
        .par_iter()
        .map_init(
            || Extractor::with_root(archive_path, root.clone(), archive_size),
            |worker, entry| {
                if options.is_cancelled() {
                    return None;
                }
                let outcome = match worker {
                    Ok(extractor) => extractor.extract(entry),
                    Err(e) => EntryOutcome::Failed(Error::Io(io::Error::new(e.kind(), e.to_string()))),
                };
                on_entry(entry, &outcome);
                Some(outcome)
            },
        )
        .collect();

    let mut result = ExtractResult::default();
    for (entry, outcome) in entries.iter().zip(outcomes) {
        match outcome {
            Some(outcome) => result.record(entry, outcome),
            None => result.cancelled = true,
        }
    }

    log_summary(archive_path, &result);
    Ok(result)
}

fn log_summary(archive_path: &Path, result: &ExtractResult) {
    debug!(
        archive = %archive_path.display(),
        extracted = result.extracted,
        skipped = result.skipped,
        failed = result.failures.len(),
        bytes = result.bytes_written,
        cancelled = result.cancelled,
        "extraction finished"
    );
}

/// One archive handle plus the state needed to write entries under a root.
pub(crate) struct Extractor {
    archive: File,
    archive_size: u64,
    root: PathBuf,
    buffer: Vec<u8>,
}

impl Extractor {
    /// Open the archive and create (then canonicalize) the destination root.
    pub(crate) fn open(archive_path: &Path, dest: &Path) -> Result<Self> {
        let archive = File::open(archive_path)?;
        let archive_size = archive.metadata()?.len();

        fs::create_dir_all(dest)?;
        let root = dest.canonicalize()?;

        Ok(Self {
            archive,
            archive_size,
            root,
            buffer: vec![0u8; BUFFER_SIZE],
        })
    }

    #[cfg(feature = "parallel")]
    fn with_root(archive_path: &Path, root: PathBuf, archive_size: u64) -> io::Result<Self> {
        Ok(Self {
            archive: File::open(archive_path)?,
            archive_size,
            root,
            buffer: vec![0u8; BUFFER_SIZE],
        })
    }

    pub(crate) fn extract(&mut self, entry: &FileEntry) -> EntryOutcome {
        match self.try_extract(entry) {
            Ok(Some(bytes)) => EntryOutcome::Extracted { bytes },
            Ok(None) => EntryOutcome::Skipped,
            Err(error) => EntryOutcome::Failed(error),
        }
    }

    fn try_extract(&mut self, entry: &FileEntry) -> Result<Option<u64>> {
        check_bounds(entry, self.archive_size)?;
        let dest = path::resolve(&self.root, &entry.path)?;

        if fs::symlink_metadata(&dest).is_ok() {
            return Ok(None);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
            path::ensure_within(&self.root, parent, &entry.path)?;
        }

        let out = match OpenOptions::new().write(true).create_new(true).open(&dest) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match self.copy_entry(entry, out) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&dest) {
                    warn!(path = %dest.display(), error = %remove_err, "could not remove partial file");
                }
                Err(e.into())
            }
        }
    }

    /// Write the prefix, then exactly `stored_len` bytes from the archive.
    fn copy_entry(&mut self, entry: &FileEntry, out: File) -> io::Result<u64> {
        self.archive.seek(SeekFrom::Start(entry.offset as u64))?;

        let mut writer = BufWriter::new(out);
        writer.write_all(&entry.prefix)?;

        let mut remaining = entry.stored_len();
        while remaining > 0 {
            let chunk = remaining.min(self.buffer.len() as u64) as usize;
            let n = match self.archive.read(&mut self.buffer[..chunk]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("archive ended with {remaining} bytes of entry data left"),
                    ))
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            writer.write_all(&self.buffer[..n])?;
            remaining -= n as u64;
        }

        writer.flush()?;
        Ok(entry.prefix.len() as u64 + entry.stored_len())
    }
}

fn check_bounds(entry: &FileEntry, archive_size: u64) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidEntry {
        path: entry.path.clone(),
        reason: reason.to_string(),
    };

    if entry.offset < 0 || entry.length <= 0 {
        return Err(invalid("invalid offset/length"));
    }
    match entry.offset.checked_add(entry.length) {
        Some(end) if end as u64 <= archive_size => Ok(()),
        _ => Err(invalid("entry extends beyond archive")),
    }
}

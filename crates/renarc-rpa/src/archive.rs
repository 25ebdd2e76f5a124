//! RPA archive handle.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::extract::{self, EntryOutcome, ExtractOptions, ExtractResult};
use crate::header::{ArchiveVersion, Header};
use crate::index::{self, MAX_INDEX_SIZE};
use crate::obfuscation::Deobfuscator;
use crate::pickle;
use crate::{FileEntry, Result};

/// An opened RPA archive.
///
/// Holds only the decoded header; every operation opens its own file
/// handle, so the value is cheap to clone and share between threads.
#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
    header: Header,
    max_index_size: u64,
}

impl Archive {
    /// Open an archive and parse its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let header = Header::read_from(&file)?;

        debug!(
            archive = %path.display(),
            version = %header.version,
            index_offset = header.index_offset,
            "opened archive"
        );

        Ok(Self {
            path: path.to_path_buf(),
            header,
            max_index_size: MAX_INDEX_SIZE,
        })
    }

    /// Replace the cap on compressed and decompressed index size.
    pub fn with_max_index_size(mut self, limit: u64) -> Self {
        self.max_index_size = limit;
        self
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[inline]
    pub fn version(&self) -> ArchiveVersion {
        self.header.version
    }

    #[inline]
    pub fn index_offset(&self) -> i64 {
        self.header.index_offset
    }

    /// The obfuscation key from the header (0 for version 2).
    #[inline]
    pub fn key(&self) -> u64 {
        self.header.key
    }

    #[inline]
    pub fn max_index_size(&self) -> u64 {
        self.max_index_size
    }

    pub fn deobfuscator(&self) -> Deobfuscator {
        Deobfuscator::new(self.header.version, self.header.key)
    }

    /// Reverse the key transform on a single index value.
    #[inline]
    pub fn deobfuscate(&self, raw: i64) -> i64 {
        self.deobfuscator().apply(raw)
    }

    /// Read, inflate and decode the index.
    pub fn read_index(&self) -> Result<Vec<FileEntry>> {
        let mut file = File::open(&self.path)?;
        let archive_size = file.metadata()?.len();

        let data = index::load_index(
            &mut file,
            archive_size,
            self.header.index_offset,
            self.max_index_size,
        )?;
        let entries = pickle::decode_index(&data, self.deobfuscator())?;

        debug!(
            archive = %self.path.display(),
            entries = entries.len(),
            "index decoded"
        );
        Ok(entries)
    }

    /// Read the index and extract every entry under `dest`.
    pub fn extract_all<P: AsRef<Path>>(&self, dest: P) -> Result<ExtractResult> {
        let entries = self.read_index()?;
        self.extract_files(&entries, dest)
    }

    /// Extract `entries` under `dest`, skipping files that already exist.
    pub fn extract_files<P: AsRef<Path>>(
        &self,
        entries: &[FileEntry],
        dest: P,
    ) -> Result<ExtractResult> {
        self.extract_files_with(entries, dest, &ExtractOptions::default(), |_, _| {})
    }

    /// Like [`extract_files`](Self::extract_files), with cancellation and a
    /// callback invoked after each entry.
    pub fn extract_files_with<P, F>(
        &self,
        entries: &[FileEntry],
        dest: P,
        options: &ExtractOptions,
        on_entry: F,
    ) -> Result<ExtractResult>
    where
        P: AsRef<Path>,
        F: FnMut(&FileEntry, &EntryOutcome),
    {
        extract::extract_sequential(&self.path, entries, dest.as_ref(), options, on_entry)
    }

    /// Parallel extraction; each worker reads through its own handle.
    #[cfg(feature = "parallel")]
    pub fn extract_files_parallel<P, F>(
        &self,
        entries: &[FileEntry],
        dest: P,
        options: &ExtractOptions,
        on_entry: F,
    ) -> Result<ExtractResult>
    where
        P: AsRef<Path>,
        F: Fn(&FileEntry, &EntryOutcome) + Sync,
    {
        extract::extract_parallel(&self.path, entries, dest.as_ref(), options, on_entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{assemble, build_archive, pickle_index, write_file, zlib, IndexRecord};
    use crate::{Error, ErrorKind};

    #[test]
    fn test_open_and_read_v3() {
        let dir = tempfile::tempdir().unwrap();
        let key = 0x1ead_beef;
        let (bytes, records) = build_archive(
            ArchiveVersion::V3,
            key,
            &[("a.png", b"aaaa"), ("dir/b.txt", b"bb")],
        );
        let archive = Archive::open(write_file(dir.path(), "x.rpa", &bytes)).unwrap();

        assert_eq!(archive.version(), ArchiveVersion::V3);
        assert_eq!(archive.key(), key);
        assert_eq!(archive.max_index_size(), MAX_INDEX_SIZE);

        let entries = archive.read_index().unwrap();
        let expected: Vec<FileEntry> = records
            .iter()
            .map(|r| FileEntry::new(r.path.as_str(), r.offset, r.length))
            .collect();
        assert_eq!(entries, expected);
    }

    #[test]
    fn test_v2_reads_plain_values() {
        let dir = tempfile::tempdir().unwrap();
        let (bytes, records) = build_archive(ArchiveVersion::V2, 0, &[("music.opus", b"opus")]);
        let archive = Archive::open(write_file(dir.path(), "x.rpa", &bytes)).unwrap();

        assert_eq!(archive.key(), 0);
        assert_eq!(archive.deobfuscate(1234), 1234);
        let entries = archive.read_index().unwrap();
        assert_eq!(entries[0].offset, records[0].offset);
        assert_eq!(entries[0].length, 4);
    }

    #[test]
    fn test_open_rejects_bad_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "x.rpa", b"PK\x03\x04 definitely a zip\n");

        let err = Archive::open(path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_open_missing_file() {
        let err = Archive::open("/nonexistent/archive.rpa").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_index_limit_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (bytes, _) = build_archive(ArchiveVersion::V2, 0, &[("a.png", b"a")]);
        let archive = Archive::open(write_file(dir.path(), "x.rpa", &bytes))
            .unwrap()
            .with_max_index_size(8);

        let err = archive.read_index().unwrap_err();
        assert!(matches!(err, Error::IndexTooLarge { limit: 8, .. }));

        let err = archive.extract_all(dir.path().join("out")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Size);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_oversized_inflated_index_keeps_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut records = vec![IndexRecord::new("first.png", 30, 1)];
        records.extend((0..2000).map(|i| IndexRecord::new(&format!("pad/{i:04}.txt"), 30, 1)));
        let pickled = pickle_index(&records, 0);
        let index = zlib(&pickled);
        let limit = (pickled.len() / 2) as u64;
        assert!((index.len() as u64) < limit);

        let bytes = assemble(ArchiveVersion::V2, 0, b"x", &index);
        let archive = Archive::open(write_file(dir.path(), "x.rpa", &bytes))
            .unwrap()
            .with_max_index_size(limit);

        let entries = archive.read_index().unwrap();
        assert!(!entries.is_empty());
        assert!(entries.len() < records.len());
        assert_eq!(entries[0].path, "first.png");
    }

    #[test]
    fn test_header_offset_past_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "x.rpa", b"RPA-3.0 00000000000fffff 00000001\n");

        let archive = Archive::open(path).unwrap();
        let err = archive.read_index().unwrap_err();
        assert!(matches!(err, Error::InvalidIndexOffset { .. }));
    }
}

//! RPA archive entry.

/// A file stored in an RPA archive, as recovered from the index.
///
/// Offsets and lengths are already deobfuscated. They are not validated
/// against the archive until extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileEntry {
    /// Archive-relative path, `/` separated.
    pub path: String,
    /// Byte offset of the stored data.
    pub offset: i64,
    /// Total length of the file, prefix included.
    pub length: i64,
    /// Literal bytes written before the stored data.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub prefix: Vec<u8>,
}

impl FileEntry {
    /// Create an entry without prefix bytes.
    pub fn new(path: impl Into<String>, offset: i64, length: i64) -> Self {
        Self {
            path: path.into(),
            offset,
            length,
            prefix: Vec::new(),
        }
    }

    /// Attach literal prefix bytes.
    pub fn with_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Number of bytes copied from the archive itself.
    #[inline]
    pub fn stored_len(&self) -> u64 {
        (self.length.max(0) as u64).saturating_sub(self.prefix.len() as u64)
    }
}

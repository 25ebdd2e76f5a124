//! RPA-3.0 offset/length obfuscation.

use crate::header::ArchiveVersion;

/// Reverses the XOR applied to index integers.
///
/// Only version 3 archives with a nonzero key are obfuscated; for anything
/// else [`apply`](Self::apply) is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deobfuscator {
    key: u64,
}

impl Deobfuscator {
    pub fn new(version: ArchiveVersion, key: u64) -> Self {
        let key = match version {
            ArchiveVersion::V3 => key,
            ArchiveVersion::V2 => 0,
        };
        Self { key }
    }

    /// The effective key (0 when no transform applies).
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    pub fn apply(&self, raw: i64) -> i64 {
        if self.key == 0 {
            raw
        } else {
            raw ^ self.key as i64
        }
    }
}

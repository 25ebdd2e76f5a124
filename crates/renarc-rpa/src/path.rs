//! Mapping archive paths onto the extraction root.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Join `entry_path` onto the canonical `root`, refusing anything that could
/// land outside it.
///
/// Both `/` and `\` separate segments. `..`, leading separators, drive or
/// stream designators (`:`) and NUL bytes are rejected, as is an existing
/// ancestor that resolves outside `root` through a symlink.
pub(crate) fn resolve(root: &Path, entry_path: &str) -> Result<PathBuf> {
    let escape = || Error::PathEscapesRoot {
        path: entry_path.to_string(),
    };

    if entry_path.contains('\0') || entry_path.starts_with(['/', '\\']) {
        return Err(escape());
    }

    let mut dest = root.to_path_buf();
    let mut depth = 0usize;
    for segment in entry_path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return Err(escape()),
            s if s.contains(':') => return Err(escape()),
            s => {
                dest.push(s);
                depth += 1;
            }
        }
    }
    if depth == 0 {
        return Err(escape());
    }

    if let Some(parent) = dest.parent() {
        ensure_within(root, parent, entry_path)?;
    }
    Ok(dest)
}

/// Check that the deepest existing ancestor of `dir` (itself included)
/// resolves inside `root`.
pub(crate) fn ensure_within(root: &Path, dir: &Path, entry_path: &str) -> Result<()> {
    let mut existing = dir;
    while fs::symlink_metadata(existing).is_err() {
        match existing.parent() {
            Some(parent) => existing = parent,
            None => return Ok(()),
        }
    }

    match existing.canonicalize() {
        Ok(resolved) if resolved.starts_with(root) => Ok(()),
        _ => Err(Error::PathEscapesRoot {
            path: entry_path.to_string(),
        }),
    }
}

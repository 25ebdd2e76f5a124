//! renarc - Ren'Py archive extraction library.
//!
//! This crate provides a unified interface to the renarc crates.
//!
//! # Crates
//!
//! - [`renarc_common`] - Common utilities (binary reading)
//! - [`renarc_rpa`] - RPA-2.0 / RPA-3.0 archive reading and extraction
//!
//! # Example
//!
//! ```no_run
//! use renarc::prelude::*;
//!
//! let archive = Archive::open("game/images.rpa")?;
//! let entries = archive.read_index()?;
//!
//! let pngs: Vec<FileEntry> = entries
//!     .into_iter()
//!     .filter(|e| e.path.ends_with(".png"))
//!     .collect();
//! let result = archive.extract_files(&pngs, "out")?;
//! println!("{} written", result.extracted);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use renarc_common as common;
pub use renarc_rpa as rpa;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use renarc_common::BinaryReader;
    pub use renarc_rpa::{
        Archive, ArchiveVersion, CancelToken, EntryOutcome, ExtractOptions, ExtractResult,
        FileEntry,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

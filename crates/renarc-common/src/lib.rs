//! Common utilities for renarc.
//!
//! This crate provides foundational types used across the renarc crates:
//!
//! - [`BinaryReader`] - Zero-copy little-endian reading from byte slices
//! - [`Error`] - Errors raised while reading binary data

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::BinaryReader;

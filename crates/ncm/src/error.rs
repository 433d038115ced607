//! NCM Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A decoding error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file does not start with the NCM magic bytes.
    #[display("not an NCM file")]
    InvalidHeader,
    /// The file ended before a declared block did. Don't retry with the same input.
    #[display("truncated NCM file")]
    Truncated,
    /// A key or metadata block did not decrypt. Don't retry with the same input.
    #[display("invalid or corrupted encrypted block")]
    Cipher,
    /// The decrypted metadata block is not usable.
    #[display("invalid metadata: {_0}")]
    Metadata(#[error(not(source))] String),
    /// The input path has no file name to derive output names from.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Reading the input or writing the output failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}

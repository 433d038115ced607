//! Queue Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Collaborators (enumerators, dumpers)
//! raise their own failures into these kinds so the controller can log them
//! without knowing where they came from.

use derive_more::{Display, Error};

/// A queue error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for queue and collaborator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// ### Collaborator Errors
/// - [`ErrorKind::Enumeration`]: recovered locally, the dropped path simply
///   contributes nothing to the queue.
/// - [`ErrorKind::Dump`]: recovered locally, the batch moves on to the next
///   file.
///
/// ### Usage Errors
/// - [`ErrorKind::AlreadySubscribed`]
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// A dropped path could not be expanded into files.
    #[display("could not enumerate dropped path: {_0}")]
    Enumeration(#[error(not(source))] String),
    /// A queued file could not be dumped.
    #[display("could not dump file: {_0}")]
    Dump(#[error(not(source))] String),
    /// The controller is already listening to a drag-and-drop event stream.
    #[display("controller is already subscribed to drag-and-drop events")]
    AlreadySubscribed,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Dump(_))
    }
}

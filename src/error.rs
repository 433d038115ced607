//! Session Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not create output directory {}", _0.display())]
    OutputDir(#[error(not(source))] PathBuf),
    /// The controller refused the event channel, or the channel closed early.
    #[display("could not start session")]
    Session,
}

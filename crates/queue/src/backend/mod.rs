//! Collaborator traits.
//!
//! The controller never touches the filesystem, a decoder, or a window
//! toolkit directly. Everything outside the queue state machine is reached
//! through one of these traits, each shared as an `Arc<dyn Trait>` handle so
//! a single implementation can serve the controller and any spawned
//! enumeration tasks at once.

#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockDialogs, MockDumper, MockEnumerator, MockNotifier};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub type EnumeratorHandle = Arc<dyn Enumerator + Send + Sync>;
pub type DumperHandle = Arc<dyn Dumper + Send + Sync>;
pub type DialogsHandle = Arc<dyn Dialogs + Send + Sync>;
pub type NotifierHandle = Arc<dyn Notifier + Send + Sync>;

/// Expands one dropped path into the files it stands for.
#[async_trait]
pub trait Enumerator: Send + Sync {
    /// Returns the dump-eligible files behind `path`, in the order they
    /// should be queued. A directory may yield many files; an unrelated file
    /// yields none.
    ///
    /// # Errors
    /// Implementations raise [`Enumeration`](crate::error::ErrorKind::Enumeration)
    /// when the path cannot be expanded at all. The controller treats that
    /// as an empty result.
    async fn enumerate(&self, path: &str) -> Result<Vec<String>>;
}

/// Decodes one queued file into an output directory.
#[async_trait]
pub trait Dumper: Send + Sync {
    /// # Errors
    /// Implementations raise [`Dump`](crate::error::ErrorKind::Dump) on any
    /// failure. The batch logs it and moves on.
    async fn dump(&self, file: &str, output_dir: &str) -> Result<()>;
}

/// Native pickers. `None` means the user dismissed the dialog.
#[async_trait]
pub trait Dialogs: Send + Sync {
    /// Multi-file picker restricted to the given extensions (without the
    /// leading dot).
    async fn pick_files(&self, extensions: &[String]) -> Option<Vec<String>>;

    async fn pick_directory(&self) -> Option<String>;
}

/// User-visible acknowledgement, fire-and-forget.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str, title: &str);
}

/// The full set of collaborators a [`Controller`](crate::Controller) needs.
#[derive(Clone)]
pub struct Collaborators {
    pub enumerator: EnumeratorHandle,
    pub dumper: DumperHandle,
    pub dialogs: DialogsHandle,
    pub notifier: NotifierHandle,
}

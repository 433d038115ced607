//! File queue state machine and sequential batch dispatcher.
//!
//! Files arrive either dropped onto a window (and expanded by an
//! [`Enumerator`](backend::Enumerator)) or picked through a dialog. They wait
//! in a duplicate-free [`FileQueue`] until the user starts a batch, at which
//! point the [`Controller`] snapshots the queue and hands every file, one at a
//! time, to a [`Dumper`](backend::Dumper).
//!
//! # Architecture
//! - [`FileQueue`], [`DragState`] and [`BatchProgress`] are plain values with
//!   no I/O.
//! - [`dispatch`](dispatch::dispatch) turns a work list into a stream of
//!   [`DispatchEvent`]s, awaiting each dump before starting the next.
//! - [`Controller`] owns the session state, reacts to [`DragDropEvent`]s and
//!   drives batches. Everything it needs from the outside world comes in as
//!   [`Collaborators`](backend::Collaborators).

pub mod backend;
mod controller;
pub mod dispatch;
mod drag;
pub mod error;
mod progress;
mod queue;

pub use crate::controller::{BatchOutcome, BatchReport, Controller, FileOutcome, Phase, Settings, Status, Subscription};
pub use crate::dispatch::DispatchEvent;
pub use crate::drag::{DragDropEvent, DragState};
pub use crate::progress::BatchProgress;
pub use crate::queue::FileQueue;

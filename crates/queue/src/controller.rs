//! Ingestion and batch control.
//!
//! A [`Controller`] owns the whole mutable state of a session: the
//! [`FileQueue`], the [`DragState`], the [`BatchProgress`] and the batch
//! [`Phase`]. Everything else talks to it through its methods, or through a
//! drag-and-drop event channel handed to [`Controller::subscribe`].
//!
//! State lives behind a single mutex that is only ever held for the length
//! of one mutation, never across an await point. Every mutation publishes a
//! fresh [`Status`] on a [`watch`] channel for whatever is drawing the UI.

use crate::backend::{Collaborators, Dumper};
use crate::dispatch::{Attempt, DispatchEvent, dispatch};
use crate::drag::{DragDropEvent, DragState};
use crate::error::{ErrorKind, Result};
use crate::progress::BatchProgress;
use crate::queue::FileQueue;
use futures::StreamExt;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::instrument;

/// Where the batch runner currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    /// Triggered; waiting for the user to choose an output directory.
    AwaitingOutputDir,
    /// Dumping the snapshot taken when the directory was chosen.
    Running,
}

/// Read-only view of the controller state, as published after each change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub queue: FileQueue,
    pub drag: DragState,
    pub progress: BatchProgress,
    pub phase: Phase,
    /// Dropped paths whose enumeration has not settled yet.
    pub pending_enumerations: usize,
}

/// Fixed, user-facing behaviour of a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Extensions offered by the manual file picker, without the leading dot.
    pub extensions: Vec<String>,
    pub completion_title: String,
    pub completion_message: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extensions: vec!["ncm".to_string()],
            completion_title: "Done".to_string(),
            completion_message: "All files have been dumped.".to_string(),
        }
    }
}

/// How a call to [`Controller::run_batch`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Another batch is already waiting for a directory or running.
    Busy,
    /// Nothing was queued when the batch was triggered or when the snapshot
    /// was taken.
    Empty,
    /// The output directory dialog was dismissed. Nothing changed.
    Aborted,
    /// Every item of the snapshot was attempted.
    Completed(BatchReport),
}

/// Per-file results of a completed batch.
///
/// The user only ever sees a single completion message; this is for callers
/// that want to know more.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub output_dir: String,
    pub files: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_none()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.error.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: String,
    /// Why the dump failed, if it did.
    pub error: Option<String>,
}

impl From<Attempt> for FileOutcome {
    fn from(attempt: Attempt) -> Self {
        Self {
            path: attempt.path,
            error: attempt.result.err().map(|err| (*err).to_string()),
        }
    }
}

struct Inner {
    collaborators: Collaborators,
    settings: Settings,
    state: Mutex<Status>,
    published: watch::Sender<Status>,
    subscribed: AtomicBool,
}

/// Handle to the session state. Cloning is cheap and every clone controls
/// the same session.
///
/// # Examples
///
/// ```
/// use ncmdrop_queue::backend::Collaborators;
/// use ncmdrop_queue::{Controller, DragDropEvent, Settings};
///
/// async fn drop_then_dump(collaborators: Collaborators) {
///     let controller = Controller::new(collaborators, Settings::default());
///     controller.handle_event(DragDropEvent::Drop { paths: vec!["/music".to_string()] });
///     controller.wait_idle().await;
///     controller.run_batch().await;
/// }
/// ```
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

/// Keeps a [`Controller`] listening to a drag-and-drop event channel.
///
/// Dropping the guard stops the listener.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Whether the listener has stopped, either because the sending half of
    /// the channel was dropped or because it was aborted.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the listener to stop on its own, which happens once every
    /// sender of the event channel is gone and the remaining events have
    /// been handled.
    pub async fn join(mut self) {
        let _ = (&mut self.handle).await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Applies `undo` to the controller state when dropped, unless disarmed.
///
/// Covers futures that are dropped part way (a cancelled batch trigger) and
/// collaborators that panic.
struct Rollback<'a> {
    controller: &'a Controller,
    undo: Option<fn(&mut Status)>,
}

impl<'a> Rollback<'a> {
    fn new(controller: &'a Controller, undo: fn(&mut Status)) -> Self {
        Self {
            controller,
            undo: Some(undo),
        }
    }

    fn disarm(mut self) {
        self.undo = None;
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            self.controller.update(undo);
        }
    }
}

impl Controller {
    pub fn new(collaborators: Collaborators, settings: Settings) -> Self {
        let (published, _) = watch::channel(Status::default());
        Self {
            inner: Arc::new(Inner {
                collaborators,
                settings,
                state: Mutex::new(Status::default()),
                published,
                subscribed: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Copy of the current state.
    pub fn status(&self) -> Status {
        self.lock().clone()
    }

    /// Receiver that sees every published [`Status`] from now on.
    pub fn watch(&self) -> watch::Receiver<Status> {
        self.inner.published.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        // A panic inside `update` cannot leave the state half-written in a
        // way later readers care about; keep going with whatever is there.
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one atomic mutation and publish the result.
    fn update<R>(&self, mutate: impl FnOnce(&mut Status) -> R) -> R {
        let mut state = self.lock();
        let result = mutate(&mut state);
        self.inner.published.send_replace(state.clone());
        result
    }

    /// Start listening to `events` for the rest of the session.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns [`AlreadySubscribed`](ErrorKind::AlreadySubscribed) if this
    /// controller (or any clone of it) has subscribed before.
    pub fn subscribe(&self, mut events: mpsc::Receiver<DragDropEvent>) -> Result<Subscription> {
        if self.inner.subscribed.swap(true, Ordering::SeqCst) {
            exn::bail!(ErrorKind::AlreadySubscribed);
        }
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                controller.handle_event(event);
            }
            tracing::debug!("Drag-and-drop event channel closed");
        });
        Ok(Subscription { handle })
    }

    /// React to a single drag-and-drop notification.
    ///
    /// The hover flag is updated before this returns. Each path of a drop is
    /// enumerated on its own task; use [`wait_idle()`](Self::wait_idle) to
    /// wait for them. Must be called from within a Tokio runtime.
    pub fn handle_event(&self, event: DragDropEvent) {
        self.update(|state| {
            state.drag = state.drag.reduce(&event);
            if let DragDropEvent::Drop { paths } = &event {
                state.pending_enumerations += paths.len();
            }
        });
        if let DragDropEvent::Drop { paths } = event {
            tracing::debug!(paths = paths.len(), "Files dropped");
            for path in paths {
                tokio::spawn(self.clone().ingest(path));
            }
        }
    }

    #[instrument(skip(self))]
    async fn ingest(self, path: String) {
        let pending = Rollback::new(&self, |state| {
            state.pending_enumerations = state.pending_enumerations.saturating_sub(1);
        });
        let result = self.inner.collaborators.enumerator.enumerate(&path).await;
        pending.disarm();
        let outcome = self.update(|state| {
            state.pending_enumerations = state.pending_enumerations.saturating_sub(1);
            result.map(|files| {
                let found = files.len();
                let added = files.into_iter().filter(|file| state.queue.add(file.as_str())).count();
                (found, added)
            })
        });
        match outcome {
            Ok((found, added)) => tracing::debug!(found, added, "Dropped path enumerated"),
            Err(err) => tracing::warn!(error = ?err, "Dropped path could not be enumerated; ignoring"),
        }
    }

    /// Resolves once every dropped path handed to
    /// [`handle_event()`](Self::handle_event) so far has been enumerated.
    pub async fn wait_idle(&self) {
        let mut published = self.watch();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = published.wait_for(|status| status.pending_enumerations == 0).await;
    }

    /// Ask the user for files and queue whatever they pick.
    ///
    /// Picked files are queued as-is, without going through the
    /// enumerator. Returns how many were new to the queue.
    pub async fn select_files(&self) -> usize {
        let picked = self.inner.collaborators.dialogs.pick_files(&self.inner.settings.extensions).await;
        let Some(files) = picked else {
            tracing::debug!("File selection dismissed");
            return 0;
        };
        let added = self.update(|state| files.into_iter().filter(|file| state.queue.add(file.as_str())).count());
        tracing::debug!(added, "Files selected");
        added
    }

    /// Returns `true` if `path` was queued.
    pub fn remove(&self, path: &str) -> bool {
        self.update(|state| state.queue.remove(path))
    }

    /// Empty the queue and reset progress.
    pub fn clear(&self) {
        self.update(|state| {
            state.queue.clear();
            state.progress = BatchProgress::IDLE;
        });
    }

    /// Dump everything currently queued.
    ///
    /// Asks for an output directory first, then snapshots the queue and
    /// dumps the snapshot in order, one file at a time. Failed files are
    /// logged and skipped. Once every file has been attempted the queue is
    /// cleared, progress goes back to zero and the user gets one completion
    /// message.
    #[instrument(skip_all)]
    pub async fn run_batch(&self) -> BatchOutcome {
        let triggered = self.update(|state| {
            if state.phase != Phase::Idle {
                return Err(BatchOutcome::Busy);
            }
            if state.queue.is_empty() {
                return Err(BatchOutcome::Empty);
            }
            state.phase = Phase::AwaitingOutputDir;
            Ok(())
        });
        if let Err(outcome) = triggered {
            tracing::debug!(?outcome, "Batch not started");
            return outcome;
        }
        let abandoned = Rollback::new(self, |state| {
            state.phase = Phase::Idle;
            state.progress = BatchProgress::IDLE;
        });

        let Some(output_dir) = self.inner.collaborators.dialogs.pick_directory().await else {
            self.update(|state| state.phase = Phase::Idle);
            abandoned.disarm();
            tracing::info!("No output directory chosen; batch aborted");
            return BatchOutcome::Aborted;
        };

        let items = self.update(|state| {
            let items = state.queue.snapshot();
            state.phase = if items.is_empty() { Phase::Idle } else { Phase::Running };
            items
        });
        if items.is_empty() {
            abandoned.disarm();
            tracing::info!("Queue emptied while choosing a directory; nothing to dump");
            return BatchOutcome::Empty;
        }

        let dumper = Arc::clone(&self.inner.collaborators.dumper);
        let report = self.drive(&*dumper, items, output_dir).await;

        self.update(|state| {
            state.progress = BatchProgress::IDLE;
            state.queue.clear();
            state.phase = Phase::Idle;
        });
        abandoned.disarm();
        let settings = &self.inner.settings;
        self.inner.collaborators.notifier.notify(&settings.completion_message, &settings.completion_title).await;
        BatchOutcome::Completed(report)
    }

    async fn drive(&self, dumper: &dyn Dumper, items: Vec<String>, output_dir: String) -> BatchReport {
        let mut report = BatchReport {
            output_dir: output_dir.clone(),
            files: Vec::with_capacity(items.len()),
        };
        let mut events = pin!(dispatch(dumper, items, &output_dir));
        while let Some(event) = events.next().await {
            match event {
                DispatchEvent::Started { total } => {
                    tracing::info!(total, output_dir = %output_dir, "Batch started");
                },
                DispatchEvent::Attempted(attempt) => {
                    if let Some(progress) = attempt.progress {
                        self.update(|state| state.progress = progress);
                    }
                    report.files.push(attempt.into());
                },
                DispatchEvent::Complete { succeeded, failed } => {
                    tracing::info!(succeeded, failed, "Batch complete");
                },
            }
        }
        report
    }
}

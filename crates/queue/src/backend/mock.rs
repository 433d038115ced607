//! In-memory collaborators for testing.
//!
//! Every mock records what it was asked to do so tests can assert on call
//! order afterwards. Internal locks are plain `std` mutexes: they are never
//! held across an await point.

use super::{Dialogs, Dumper, Enumerator, Notifier};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Enumerator backed by a fixed path-to-files table.
///
/// Paths missing from the table fail with
/// [`Enumeration`](ErrorKind::Enumeration).
#[derive(Default)]
pub struct MockEnumerator {
    entries: HashMap<String, Vec<String>>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockEnumerator {
    pub fn with_entries<P, F, I>(entries: impl IntoIterator<Item = (P, I)>) -> Self
    where
        P: Into<String>,
        F: Into<String>,
        I: IntoIterator<Item = F>,
    {
        let entries = entries
            .into_iter()
            .map(|(path, files)| (path.into(), files.into_iter().map(Into::into).collect()))
            .collect();
        Self {
            entries,
            ..Self::default()
        }
    }

    /// Make enumerating `path` take at least `delay`, to force interleaving
    /// between paths from the same drop gesture.
    pub fn with_delay(mut self, path: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(path.into(), delay);
        self
    }

    /// Every path passed to [`enumerate()`](Enumerator::enumerate), in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl Enumerator for MockEnumerator {
    async fn enumerate(&self, path: &str) -> Result<Vec<String>> {
        lock(&self.calls).push(path.to_string());
        if let Some(delay) = self.delays.get(path) {
            tokio::time::sleep(*delay).await;
        }
        match self.entries.get(path) {
            Some(files) => Ok(files.clone()),
            None => exn::bail!(ErrorKind::Enumeration(path.to_string())),
        }
    }
}

type DumpHook = Box<dyn Fn(&str) + Send + Sync>;

/// Dumper that succeeds unless told otherwise, and writes nothing.
#[derive(Default)]
pub struct MockDumper {
    failing: HashSet<String>,
    hook: Option<DumpHook>,
    calls: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockDumper {
    /// Fail with [`Dump`](ErrorKind::Dump) for each of these files.
    pub fn failing<S: Into<String>>(mut self, files: impl IntoIterator<Item = S>) -> Self {
        self.failing.extend(files.into_iter().map(Into::into));
        self
    }

    /// Run `hook` at the start of every dump, before it settles.
    pub fn on_dump(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Every `(file, output_dir)` pair dumped, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }

    /// Highest number of dumps that were ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dumper for MockDumper {
    async fn dump(&self, file: &str, output_dir: &str) -> Result<()> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        lock(&self.calls).push((file.to_string(), output_dir.to_string()));
        if let Some(hook) = &self.hook {
            hook(file);
        }
        // Give anything else on the runtime a chance to run mid-dump.
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.contains(file) {
            exn::bail!(ErrorKind::Dump(file.to_string()));
        }
        Ok(())
    }
}

/// Dialogs that always give the same canned answers.
#[derive(Default)]
pub struct MockDialogs {
    files: Option<Vec<String>>,
    directory: Option<String>,
    file_requests: Mutex<Vec<Vec<String>>>,
    directory_requests: AtomicUsize,
}

impl MockDialogs {
    pub fn with_files<S: Into<String>>(mut self, files: Option<impl IntoIterator<Item = S>>) -> Self {
        self.files = files.map(|files| files.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_directory(mut self, directory: Option<impl Into<String>>) -> Self {
        self.directory = directory.map(Into::into);
        self
    }

    /// Extension filters passed to each [`pick_files()`](Dialogs::pick_files) call.
    pub fn file_requests(&self) -> Vec<Vec<String>> {
        lock(&self.file_requests).clone()
    }

    pub fn directory_requests(&self) -> usize {
        self.directory_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialogs for MockDialogs {
    async fn pick_files(&self, extensions: &[String]) -> Option<Vec<String>> {
        lock(&self.file_requests).push(extensions.to_vec());
        self.files.clone()
    }

    async fn pick_directory(&self) -> Option<String> {
        self.directory_requests.fetch_add(1, Ordering::SeqCst);
        self.directory.clone()
    }
}

/// Notifier that just remembers what it was told.
#[derive(Default)]
pub struct MockNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl MockNotifier {
    /// Every `(text, title)` pair shown, in order.
    pub fn messages(&self) -> Vec<(String, String)> {
        lock(&self.messages).clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, text: &str, title: &str) {
        lock(&self.messages).push((text.to_string(), title.to_string()));
    }
}

//! Sequential batch dispatch.
//!
//! [`dispatch`] walks a fixed work list and hands each file to a [`Dumper`],
//! strictly one after another. It knows nothing about the queue it came from;
//! the [`Controller`](crate::Controller) takes the snapshot and applies the
//! resulting events to its own state.

use crate::backend::Dumper;
use crate::error::Result;
use crate::progress::BatchProgress;
use async_stream::stream;
use futures::Stream;

/// Progress events emitted by [`dispatch`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once, with the batch size.
/// 2. [`Attempted`](Self::Attempted) once per item, in work-list order.
/// 3. [`Complete`](Self::Complete) exactly once.
///
/// Individual dump failures are carried inside [`Attempt::result`] and never
/// end the stream early.
pub enum DispatchEvent {
    Started { total: usize },
    Attempted(Attempt),
    Complete { succeeded: usize, failed: usize },
}

/// The outcome of dumping a single item of the batch.
pub struct Attempt {
    /// 0-based position in the work list.
    pub index: usize,
    pub total: usize,
    pub path: String,
    pub result: Result<()>,
    /// Batch progress once this attempt settled. `None` for single-item
    /// batches.
    pub progress: Option<BatchProgress>,
}

/// Streams [`DispatchEvent`]s while dumping every file in `items` into
/// `output_dir`.
///
/// The next dump only starts once the previous one has settled, so
/// `Attempted` events arrive in exactly the order of `items` and the
/// progress they carry only ever goes up.
pub fn dispatch<'a>(
    dumper: &'a dyn Dumper,
    items: Vec<String>,
    output_dir: &'a str,
) -> impl Stream<Item = DispatchEvent> + Send + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let total = items.len();
        yield DispatchEvent::Started { total };

        let (mut succeeded, mut failed) = (0, 0);
        for (index, path) in items.into_iter().enumerate() {
            let result = dumper.dump(&path, output_dir).await;
            match &result {
                Ok(()) => {
                    succeeded += 1;
                    tracing::debug!(index, total, path = %path, "Dumped file");
                },
                Err(err) => {
                    failed += 1;
                    tracing::warn!(index, total, path = %path, error = ?err, "Dump failed; skipping file");
                },
            }
            yield DispatchEvent::Attempted(Attempt {
                index,
                total,
                progress: BatchProgress::after_attempt(index, total),
                path,
                result,
            });
        }

        yield DispatchEvent::Complete { succeeded, failed };
    })
}

//! Chunked-run progress events.
//!
//! The coordinator narrates its progress through a [`ProgressReporter`]
//! instead of writing to any user interface. Front ends subscribe by
//! passing an implementation in [`RunOptions`](crate::coordinator::RunOptions);
//! the app crate ships stderr reporters (human and JSON).

/// A single progress event for a chunked run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkProgressEvent {
    /// Planning finished and chunked processing will proceed.
    Planned { chunk_count: usize, item_count: usize },
    /// The model call for chunk `index` (1-based) is about to be issued.
    ChunkStarted { index: usize, total: usize },
    /// The model call for chunk `index` completed and its answer was recorded.
    ChunkCompleted { index: usize, total: usize },
    /// All chunks are answered; the synthesis call is about to be issued.
    Synthesizing { total: usize },
}

/// Receives progress events. Called from the coordinator.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ChunkProgressEvent);
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ChunkProgressEvent) {}
}

impl<F> ProgressReporter for F
where
    F: Fn(ChunkProgressEvent) + Send + Sync,
{
    fn report(&self, event: ChunkProgressEvent) {
        self(event)
    }
}

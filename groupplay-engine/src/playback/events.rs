//! Internal queue events (not exposed via SSE)
//!
//! Sink completions are delivered as discrete messages into the owning
//! queue's event channel instead of calling back into queue state directly.
//! The queue's listener task applies them under the same lock that guards
//! command-issued mutations.

use tokio::sync::mpsc;
use tracing::debug;

/// Events consumed by a queue's listener task
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QueueEvent {
    /// The sink finished (naturally or by forced stop) the play call that
    /// was tagged with `generation`
    Completed {
        generation: u64,
        error: Option<String>,
    },
}

/// One-shot completion token handed to [`AudioSink::play`](crate::traits::AudioSink::play)
///
/// Consuming methods make a second completion impossible. Dropping the
/// handle without firing it reports a completion as well, so a sink that
/// panics or forgets still lets the queue advance.
#[derive(Debug)]
pub struct CompletionHandle {
    generation: u64,
    tx: Option<mpsc::UnboundedSender<QueueEvent>>,
}

impl CompletionHandle {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<QueueEvent>) -> Self {
        Self {
            generation,
            tx: Some(tx),
        }
    }

    /// Generation of the play call this handle belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report natural end of stream or forced stop
    pub fn complete(mut self) {
        self.send(None);
    }

    /// Report that playback ended because of an output error
    pub fn fail(mut self, error: impl Into<String>) {
        self.send(Some(error.into()));
    }

    fn send(&mut self, error: Option<String>) {
        if let Some(tx) = self.tx.take() {
            let event = QueueEvent::Completed {
                generation: self.generation,
                error,
            };
            // Receiver gone means the queue was dropped
            if tx.send(event).is_err() {
                debug!("Completion for generation {} dropped: queue gone", self.generation);
            }
        }
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        self.send(None);
    }
}

//! Trait abstractions for the engine's external collaborators.
//!
//! The queue and controller depend on these traits rather than on concrete
//! implementations, so the chat platform, the media extractor and the audio
//! device can be swapped (or faked in tests).

use async_trait::async_trait;
use groupplay_common::events::{GroupEvent, Notification};
use groupplay_common::{GroupId, NotifyTarget};
use std::sync::Arc;

use crate::error::Result;
use crate::playback::command::CommandContext;
use crate::playback::events::CompletionHandle;

/// Opaque byte-producing audio source supplied by an external decoder.
///
/// Implementations must be safe to read from the sink's thread while the
/// queue checks liveness or closes the stream from another thread.
pub trait AudioStream: Send + Sync {
    /// Read decoded bytes. `Ok(0)` means the source is exhausted.
    fn read(&self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// True until the source is exhausted or closed. Must not consume data.
    fn is_live(&self) -> bool;

    /// Release the underlying decoder (process, socket, file).
    fn close(&self);
}

/// Outcome of a successful resolution
pub struct Resolved {
    pub title: String,
    /// Canonical page URL reported by the provider, if any
    pub url: Option<String>,
    pub stream: Arc<dyn AudioStream>,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("title", &self.title)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Turns a reference (URL, video id, search text) into a playable stream.
///
/// Slow (network lookup plus decoder start) and fallible. Must be safely
/// callable concurrently for different references.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<Resolved>;
}

/// External audio output for one group.
///
/// Called while the queue lock is held, so every method must return
/// promptly; blocking hand-off of bytes belongs on the sink's own thread.
pub trait AudioSink: Send + Sync {
    /// Start playing `source`. On success `on_complete` fires exactly once,
    /// on natural end or forced stop.
    fn play(
        &self,
        source: Arc<dyn AudioStream>,
        volume: f32,
        on_complete: CompletionHandle,
    ) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn resume(&self) -> Result<()>;

    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;
}

/// Fire-and-forget delivery of status notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, group_id: &GroupId, target: &NotifyTarget, notification: Notification);

    /// Structured state events (state changes, song starts, queue changes)
    fn publish(&self, _event: GroupEvent) {}
}

/// Resolves the audio connection for a command's originating context
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    /// Active connection for the context's group, if any
    fn connection(&self, ctx: &CommandContext) -> Option<Arc<dyn AudioSink>>;

    /// Connect (or move) to the context's channel
    async fn join(&self, ctx: &CommandContext) -> Result<Arc<dyn AudioSink>>;

    /// Disconnect; returns the channel that was left, `None` if not connected
    async fn leave(&self, ctx: &CommandContext) -> Result<Option<String>>;
}

/// Turns free-text search into a reference the resolver understands
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn find(&self, query: &str) -> Result<String>;
}

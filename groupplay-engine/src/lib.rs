//! # GroupPlay Engine (groupplay-engine)
//!
//! Per-group sequential playback engine.
//!
//! **Purpose:** Resolve playback requests into audio streams, play exactly
//! one stream at a time per group, advance automatically when a stream ends,
//! and expose pause/resume/skip/loop/remove with consistent state.
//!
//! **Architecture:** One [`PlaybackQueue`] per group behind its own lock,
//! owned by an injectable [`PlayerRegistry`]; the [`PlaybackController`]
//! maps commands onto queue operations. Resolvers, sinks, notifiers and
//! connections are traits so the chat/voice layer stays outside the core.

pub mod adapters;
pub mod api;
pub mod error;
pub mod playback;
pub mod traits;

pub use error::{Error, Result};
pub use playback::{
    Command, CommandContext, PlaybackController, PlaybackQueue, PlayerRegistry, QueueEntryView,
    QueueSnapshot, ResolutionState, Song, StreamHandle,
};

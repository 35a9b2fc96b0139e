//! Playback engine: songs, per-group queues, registry and controller

pub mod command;
pub mod controller;
pub mod events;
pub mod queue;
pub mod registry;
pub mod song;
pub mod stream;

pub use command::{Command, CommandContext};
pub use controller::PlaybackController;
pub use events::CompletionHandle;
pub use queue::{PlaybackQueue, QueueEntryView, QueueSnapshot};
pub use registry::PlayerRegistry;
pub use song::{ResolutionState, Song};
pub use stream::StreamHandle;

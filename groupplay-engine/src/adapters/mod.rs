//! Reference implementations of the engine's collaborator traits
//!
//! Enough to run the engine standalone: an extractor/decoder subprocess
//! resolver, a sink that consumes PCM in real time, per-group local
//! connections, and a notifier that feeds the event bus.

pub mod connections;
pub mod notifier;
pub mod paced_sink;
pub mod process;
pub mod search;

pub use connections::LocalConnections;
pub use notifier::EventBusNotifier;
pub use paced_sink::PacedSink;
pub use process::{parse_extractor_output, ExtractedMedia, ProcessResolver, ProcessStream};
pub use search::ExtractorSearch;

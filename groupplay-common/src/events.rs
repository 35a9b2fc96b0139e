//! Event types for the GroupPlay event system
//!
//! Provides the notification model shared by the engine and its outer
//! surfaces, plus the EventBus used to fan events out to listeners (SSE
//! clients, log sinks, tests).

use crate::group::{GroupId, NotifyTarget};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Success => write!(f, "SUCCESS"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// A status notification addressed to a [`NotifyTarget`]
///
/// Rendering (embeds, colours, plain text) is left to whoever consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    /// Ordered key/value pairs ("Title", "URL", "Position", ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Notification {
    pub fn new(severity: Severity, title: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            fields: Vec::new(),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(Severity::Success, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(Severity::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title)
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(Severity::Info, title)
    }

    /// Append a field, keeping insertion order
    pub fn field(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((name.into(), value.to_string()));
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Look up a field value by name
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Playback state of a group queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing selected for playback
    #[default]
    Idle,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// GroupPlay event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GroupEvent {
    /// A notification was delivered to a target
    Notification {
        group_id: GroupId,
        target: NotifyTarget,
        notification: Notification,
    },

    /// Playback state changed (Idle / Playing / Paused)
    PlaybackStateChanged {
        group_id: GroupId,
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A song was handed to the sink
    SongStarted {
        group_id: GroupId,
        song_id: Uuid,
        title: Option<String>,
        url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pending queue contents changed
    QueueChanged {
        group_id: GroupId,
        pending: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl GroupEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            GroupEvent::Notification { .. } => "Notification",
            GroupEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            GroupEvent::SongStarted { .. } => "SongStarted",
            GroupEvent::QueueChanged { .. } => "QueueChanged",
        }
    }

    pub fn group_id(&self) -> &GroupId {
        match self {
            GroupEvent::Notification { group_id, .. }
            | GroupEvent::PlaybackStateChanged { group_id, .. }
            | GroupEvent::SongStarted { group_id, .. }
            | GroupEvent::QueueChanged { group_id, .. } => group_id,
        }
    }
}

/// One-to-many event broadcaster over a tokio broadcast channel
pub struct EventBus {
    tx: broadcast::Sender<GroupEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow receivers
    /// start lagging (old events are dropped for them).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GroupEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: GroupEvent,
    ) -> Result<usize, broadcast::error::SendError<GroupEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GroupEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! Song: a playback request and the stream it resolved to
//!
//! Resolution is explicit. Accessors never perform I/O: `title()` is `None`
//! until [`Song::resolve`] (or [`Song::install`]) has succeeded.

use crate::error::{Error, Result};
use crate::playback::stream::{StreamHandle, DEFAULT_VOLUME};
use crate::traits::{Resolved, Resolver};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Observable resolution state
///
/// `Ended` is never stored: it is a `Ready` song whose stream is no longer
/// live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionState {
    Unresolved,
    Ready,
    Ended,
    Failed,
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionState::Unresolved => write!(f, "unresolved"),
            ResolutionState::Ready => write!(f, "ready"),
            ResolutionState::Ended => write!(f, "ended"),
            ResolutionState::Failed => write!(f, "failed"),
        }
    }
}

/// Stored resolution; the handle only exists inside `Ready`
enum Resolution {
    Unresolved,
    Ready(StreamHandle),
    Failed(String),
}

/// A playback request identified by its source reference
pub struct Song {
    id: Uuid,
    reference: String,
    url: String,
    title: Option<String>,
    volume: f32,
    resolution: Resolution,
}

impl Song {
    pub fn new(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let url = canonical_url(&reference);
        debug!("Song created: {}", url);
        Self {
            id: Uuid::new_v4(),
            reference,
            url,
            title: None,
            volume: DEFAULT_VOLUME,
            resolution: Resolution::Unresolved,
        }
    }

    /// Volume multiplier applied to streams installed from now on
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Raw request text, immutable after creation
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Title if known, otherwise the reference
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.reference)
    }

    pub fn state(&self) -> ResolutionState {
        match &self.resolution {
            Resolution::Unresolved => ResolutionState::Unresolved,
            Resolution::Ready(handle) if handle.is_live() => ResolutionState::Ready,
            Resolution::Ready(_) => ResolutionState::Ended,
            Resolution::Failed(_) => ResolutionState::Failed,
        }
    }

    /// True if there is no stream or the stream is no longer live.
    /// Consults liveness only; never reads from the stream.
    pub fn is_ended(&self) -> bool {
        match &self.resolution {
            Resolution::Ready(handle) => !handle.is_live(),
            _ => true,
        }
    }

    /// Ready with a live stream
    pub fn is_playable(&self) -> bool {
        self.state() == ResolutionState::Ready
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.resolution, Resolution::Failed(_))
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.resolution {
            Resolution::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn stream(&self) -> Option<&StreamHandle> {
        match &self.resolution {
            Resolution::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    /// Install a resolved stream, closing any previous one first
    pub fn install(&mut self, resolved: Resolved) {
        self.close_stream();
        self.title = Some(resolved.title);
        if let Some(url) = resolved.url {
            self.url = url;
        }
        self.resolution = Resolution::Ready(StreamHandle::new(resolved.stream, self.volume));
        info!("Song ready: {} ({})", self.display_title(), self.url);
    }

    /// Mark resolution as failed, closing any stream
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.close_stream();
        let reason = reason.into();
        warn!("Song failed: {}: {}", self.reference, reason);
        self.resolution = Resolution::Failed(reason);
    }

    /// Close the stream and return to `Unresolved` so the song can be
    /// resolved again. A failed song stays failed.
    pub fn release(&mut self) {
        if let Resolution::Ready(handle) = &self.resolution {
            handle.close();
            self.resolution = Resolution::Unresolved;
        }
    }

    /// Resolve through `resolver`, re-resolving if the song has ended.
    ///
    /// Never call this while holding a queue lock.
    pub async fn resolve(&mut self, resolver: &dyn Resolver) -> Result<()> {
        if self.is_playable() {
            return Ok(());
        }
        self.release();

        match resolver.resolve(&self.reference).await {
            Ok(resolved) => {
                self.install(resolved);
                Ok(())
            }
            Err(e) => {
                let reason = match &e {
                    Error::Resolution(reason) => reason.clone(),
                    other => other.to_string(),
                };
                self.fail(reason.clone());
                Err(Error::Resolution(reason))
            }
        }
    }

    fn close_stream(&mut self) {
        if let Resolution::Ready(handle) = &self.resolution {
            handle.close();
        }
    }
}

impl fmt::Debug for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Song")
            .field("id", &self.id)
            .field("reference", &self.reference)
            .field("title", &self.title)
            .field("state", &self.state())
            .finish()
    }
}

/// Canonical playback URL for a reference
///
/// Full URLs are kept verbatim, bare video ids are expanded to a watch URL,
/// anything else (search text) is kept as typed until the provider reports
/// a page URL.
pub fn canonical_url(reference: &str) -> String {
    let reference = reference.trim();
    if reference.starts_with("https://") || reference.starts_with("http://") {
        return reference.to_string();
    }
    if is_video_id(reference) {
        return format!("{}{}", WATCH_URL_PREFIX, reference);
    }
    reference.to_string()
}

fn is_video_id(s: &str) -> bool {
    s.len() == 11
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

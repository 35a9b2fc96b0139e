//! Per-group playback queue
//!
//! Tracks the pending songs and the single current song of one group, and
//! drives the sink.
//!
//! **Locking:** every state transition happens under one `tokio::sync::Mutex`
//! per queue. Commands and sink completions are totally ordered by lock
//! acquisition. Resolution is awaited with the lock released and its result
//! is installed only if the song is still current afterwards.
//!
//! **Completions:** each `sink.play` is tagged with a fresh generation. The
//! sink's [`CompletionHandle`] posts a message to this queue's listener task,
//! which ignores generations that are no longer active (after `stop`, or a
//! failed `play`).

use crate::error::{Error, Result};
use crate::playback::events::{CompletionHandle, QueueEvent};
use crate::playback::song::{ResolutionState, Song};
use crate::traits::{AudioSink, Notifier, Resolver};
use groupplay_common::events::{GroupEvent, Notification, PlaybackState};
use groupplay_common::{GroupId, NotifyTarget};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Display entry for one song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntryView {
    pub id: Uuid,
    /// Position in pending; `None` for the current song
    pub index: Option<usize>,
    pub title: String,
    pub url: String,
    pub state: ResolutionState,
}

impl QueueEntryView {
    fn of(song: &Song, index: Option<usize>) -> Self {
        Self {
            id: song.id(),
            index,
            title: song.display_title().to_string(),
            url: song.url().to_string(),
            state: song.state(),
        }
    }
}

/// Read-only view of a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub group_id: GroupId,
    pub state: PlaybackState,
    pub loop_enabled: bool,
    pub current: Option<QueueEntryView>,
    pub pending: Vec<QueueEntryView>,
}

impl QueueSnapshot {
    /// Current is never also pending
    pub fn is_consistent(&self) -> bool {
        match &self.current {
            Some(current) => self.pending.iter().all(|entry| entry.id != current.id),
            None => true,
        }
    }
}

/// Result of the current-song selection algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    /// Existing current kept (still live, or loop)
    Kept,
    /// Head of pending promoted to current
    Advanced,
    /// Nothing to play
    Empty,
}

struct QueueState {
    notify_target: NotifyTarget,
    sink: Option<Arc<dyn AudioSink>>,
    pending: VecDeque<Song>,
    current: Option<Song>,
    loop_enabled: bool,
    playback_state: PlaybackState,
    generation: u64,
    active_generation: Option<u64>,
    resolving: Option<Uuid>,
    /// Last song handed to the sink, to announce only new songs
    last_started: Option<Uuid>,
}

impl QueueState {
    /// Pick the current song (the single authority for advancing).
    ///
    /// Keeps the current if it is not ended, if it has not been started yet,
    /// or if loop is on. A failed current is never kept. Otherwise the old
    /// current is released and the head of pending (if any) becomes current.
    fn select_current(&mut self) -> Selection {
        if let Some(current) = &self.current {
            let untried = self.last_started != Some(current.id());
            let keep = !current.is_failed()
                && (!current.is_ended() || untried || self.loop_enabled);
            if keep {
                return Selection::Kept;
            }
        }

        if let Some(mut previous) = self.current.take() {
            previous.release();
        }

        match self.pending.pop_front() {
            Some(next) => {
                self.current = Some(next);
                Selection::Advanced
            }
            None => Selection::Empty,
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn sink(&self) -> Result<Arc<dyn AudioSink>> {
        self.sink.clone().ok_or(Error::NotConnected)
    }

    fn clear_songs(&mut self) {
        if let Some(mut current) = self.current.take() {
            current.release();
        }
        for mut song in self.pending.drain(..) {
            song.release();
        }
    }

    fn current_id(&self) -> Option<Uuid> {
        self.current.as_ref().map(Song::id)
    }
}

/// Playback queue for one group
pub struct PlaybackQueue {
    group_id: GroupId,
    resolver: Arc<dyn Resolver>,
    notifier: Arc<dyn Notifier>,
    events_tx: mpsc::UnboundedSender<QueueEvent>,
    state: Mutex<QueueState>,
}

impl PlaybackQueue {
    /// Create a queue and spawn its completion listener.
    ///
    /// Must be called inside a tokio runtime. The listener holds only a weak
    /// reference and exits once the queue is dropped.
    pub fn new(
        group_id: GroupId,
        notify_target: NotifyTarget,
        resolver: Arc<dyn Resolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let queue = Arc::new(Self {
            group_id,
            resolver,
            notifier,
            events_tx,
            state: Mutex::new(QueueState {
                notify_target,
                sink: None,
                pending: VecDeque::new(),
                current: None,
                loop_enabled: false,
                playback_state: PlaybackState::Idle,
                generation: 0,
                active_generation: None,
                resolving: None,
                last_started: None,
            }),
        });

        tokio::spawn(Self::run_listener(Arc::downgrade(&queue), events_rx));
        info!("Playback queue created for group {}", queue.group_id);
        queue
    }

    async fn run_listener(queue: Weak<Self>, mut rx: mpsc::UnboundedReceiver<QueueEvent>) {
        while let Some(event) = rx.recv().await {
            let Some(queue) = queue.upgrade() else {
                break;
            };
            match event {
                QueueEvent::Completed { generation, error } => {
                    queue.on_completion(generation, error).await;
                }
            }
        }
        debug!("Queue listener exiting");
    }

    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    pub async fn notify_target(&self) -> NotifyTarget {
        self.state.lock().await.notify_target.clone()
    }

    pub async fn set_notify_target(&self, target: NotifyTarget) {
        self.state.lock().await.notify_target = target;
    }

    /// Bind the group's current audio connection
    pub async fn attach_sink(&self, sink: Arc<dyn AudioSink>) {
        self.state.lock().await.sink = Some(sink);
    }

    /// Stop playback silently, drop every song and unbind the sink.
    /// Used when the group's connection goes away.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if let Some(sink) = state.sink.take() {
            if sink.is_playing() || sink.is_paused() {
                if let Err(e) = sink.stop() {
                    warn!("Group {}: sink stop on disconnect failed: {}", self.group_id, e);
                }
            }
        }
        state.active_generation = None;
        state.resolving = None;
        state.clear_songs();
        self.set_state(&mut state, PlaybackState::Idle);
        self.publish_queue_changed(&state);
        info!("Group {} disconnected", self.group_id);
    }

    /// True if the bound sink reports active (unpaused) playback
    pub async fn is_playing(&self) -> bool {
        let state = self.state.lock().await;
        state.sink.as_ref().map(|s| s.is_playing()).unwrap_or(false)
    }

    pub async fn playback_state(&self) -> PlaybackState {
        self.state.lock().await.playback_state
    }

    pub async fn loop_enabled(&self) -> bool {
        self.state.lock().await.loop_enabled
    }

    /// Append a song. Never starts playback.
    ///
    /// Returns the song's position in pending (0-based).
    pub async fn add(&self, song: Song) -> usize {
        let mut state = self.state.lock().await;
        let position = state.pending.len();

        if state.current.is_some() || !state.pending.is_empty() {
            self.notify(
                &state,
                Notification::success("Added to queue")
                    .field("Title", song.display_title())
                    .field("URL", song.url())
                    .field("Position", position),
            );
        }

        info!(
            "Group {}: queued {} at position {}",
            self.group_id,
            song.display_title(),
            position
        );
        state.pending.push_back(song);
        self.publish_queue_changed(&state);
        position
    }

    /// Run the selection algorithm and report the current song.
    ///
    /// Idempotent while the current song is live (or looping).
    pub async fn current(&self) -> Option<QueueEntryView> {
        let mut state = self.state.lock().await;
        if state.resolving.is_none() {
            state.select_current();
        }
        state.current.as_ref().map(|song| QueueEntryView::of(song, None))
    }

    /// Start the current (or next) song on the sink.
    ///
    /// Resolves the selected song first if it has no live stream, with the
    /// lock released. If nothing is left the sink is stopped and "Queue is
    /// empty" is reported.
    pub async fn play_next(&self) -> Result<()> {
        loop {
            let mut state = self.state.lock().await;

            if let Some(song_id) = state.resolving {
                debug!("Group {}: {} is being resolved, not advancing", self.group_id, song_id);
                return Ok(());
            }
            if let Some(generation) = state.active_generation {
                debug!("Group {}: generation {} still active", self.group_id, generation);
                return Ok(());
            }

            let sink = state.sink()?;

            let selection = state.select_current();
            debug!("Group {}: selection {:?}", self.group_id, selection);

            let selected = state
                .current
                .as_ref()
                .map(|song| (song.is_playable(), song.id(), song.reference().to_string()));

            let (song_id, reference) = match selected {
                None => {
                    self.finish_queue(&mut state, sink.as_ref());
                    return Ok(());
                }
                Some((true, _, _)) => {
                    return self.start_current(&mut state, sink.as_ref());
                }
                Some((false, id, reference)) => (id, reference),
            };

            state.resolving = Some(song_id);
            drop(state);

            debug!("Group {}: resolving {}", self.group_id, reference);
            let outcome = self.resolver.resolve(&reference).await;

            let mut state = self.state.lock().await;
            if state.resolving == Some(song_id) {
                state.resolving = None;
            }

            if state.current_id() != Some(song_id) {
                // Stopped or replaced while resolving
                if let Ok(resolved) = outcome {
                    resolved.stream.close();
                }
                debug!("Group {}: discarding resolution for replaced song", self.group_id);
                return Ok(());
            }

            match outcome {
                Ok(resolved) => {
                    if let Some(song) = state.current.as_mut() {
                        song.install(resolved);
                    }
                    let sink = state.sink()?;
                    return self.start_current(&mut state, sink.as_ref());
                }
                Err(e) => {
                    let reason = e.to_string();
                    if let Some(mut failed) = state.current.take() {
                        failed.fail(reason.clone());
                        self.notify(
                            &state,
                            Notification::error("Failed to load")
                                .field("Title", failed.reference())
                                .field("Error", &reason),
                        );
                    }
                    // Fall through to the next pending song
                }
            }
        }
    }

    /// Skip the current song (and `count - 1` pending songs after it)
    ///
    /// Stops the sink and leaves `Playing` at once; the sink's completion
    /// advances the queue. With loop enabled the current song restarts.
    /// Returns false if there was nothing to skip.
    pub async fn skip(&self, count: usize) -> Result<bool> {
        let mut state = self.state.lock().await;
        let sink = state.sink()?;

        if state.pending.is_empty() && !sink.is_playing() {
            self.notify(&state, Notification::warning("Nothing to skip"));
            return Ok(false);
        }

        sink.stop()?;

        for _ in 1..count.max(1) {
            match state.pending.pop_front() {
                Some(mut dropped) => {
                    debug!("Group {}: skipping queued {}", self.group_id, dropped.display_title());
                    dropped.release();
                }
                None => break,
            }
        }
        if state.loop_enabled {
            if let Some(current) = state.current.as_mut() {
                info!("Group {}: restarting {}", self.group_id, current.display_title());
                current.release();
            }
        } else if let Some(mut current) = state.current.take() {
            info!("Group {}: skipping {}", self.group_id, current.display_title());
            current.release();
        }
        self.set_state(&mut state, PlaybackState::Idle);
        self.publish_queue_changed(&state);
        Ok(true)
    }

    /// Stop playback and discard the whole queue
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let sink = state.sink()?;

        if sink.is_playing() || sink.is_paused() {
            sink.stop()?;
            self.notify(&state, Notification::success("Stopped"));
        } else {
            self.notify(&state, Notification::warning("Nothing to stop"));
        }

        state.active_generation = None;
        state.resolving = None;
        state.clear_songs();
        self.set_state(&mut state, PlaybackState::Idle);
        self.publish_queue_changed(&state);
        info!("Group {}: stopped and cleared", self.group_id);
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let sink = state.sink()?;

        if sink.is_playing() && !sink.is_paused() {
            sink.pause()?;
            self.set_state(&mut state, PlaybackState::Paused);
            self.notify(&state, Notification::success("Paused"));
        } else {
            self.notify(&state, Notification::warning("Nothing to pause"));
        }
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let sink = state.sink()?;

        if !sink.is_playing() && sink.is_paused() {
            sink.resume()?;
            self.set_state(&mut state, PlaybackState::Playing);
            self.notify(&state, Notification::success("Resumed"));
        } else {
            self.notify(&state, Notification::warning("Nothing to resume"));
        }
        Ok(())
    }

    /// Remove `pending[index]`, releasing its stream
    pub async fn remove(&self, index: usize) -> Result<QueueEntryView> {
        let mut state = self.state.lock().await;
        let len = state.pending.len();

        let Some(mut song) = state.pending.remove(index) else {
            return Err(Error::IndexOutOfRange { index, len });
        };

        let view = QueueEntryView::of(&song, Some(index));
        self.notify(
            &state,
            Notification::success("Deleted from queue")
                .field("Title", &view.title)
                .field("URL", &view.url),
        );
        song.release();
        self.publish_queue_changed(&state);
        Ok(view)
    }

    pub async fn set_loop(&self, enabled: bool) {
        let mut state = self.state.lock().await;
        state.loop_enabled = enabled;
        let title = if enabled { "Loop enabled" } else { "Loop disabled" };
        self.notify(&state, Notification::success(title));
        info!("Group {}: {}", self.group_id, title);
    }

    /// Flip the loop flag, returning the new value
    pub async fn toggle_loop(&self) -> bool {
        let enabled = !self.loop_enabled().await;
        self.set_loop(enabled).await;
        enabled
    }

    /// Pending songs in play order
    pub async fn list_pending(&self) -> Vec<QueueEntryView> {
        let state = self.state.lock().await;
        state
            .pending
            .iter()
            .enumerate()
            .map(|(i, song)| QueueEntryView::of(song, Some(i)))
            .collect()
    }

    /// Report the pending list as a notification
    pub async fn print_queue(&self) {
        let state = self.state.lock().await;
        if state.pending.is_empty() {
            self.notify(&state, Notification::warning("Queue is empty"));
            return;
        }

        let lines: Vec<String> = state
            .pending
            .iter()
            .enumerate()
            .map(|(i, song)| format!("{}: {}", i, song.display_title()))
            .collect();
        self.notify(&state, Notification::success("Queue").message(lines.join("\n")));
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().await;
        QueueSnapshot {
            group_id: self.group_id.clone(),
            state: state.playback_state,
            loop_enabled: state.loop_enabled,
            current: state.current.as_ref().map(|song| QueueEntryView::of(song, None)),
            pending: state
                .pending
                .iter()
                .enumerate()
                .map(|(i, song)| QueueEntryView::of(song, Some(i)))
                .collect(),
        }
    }

    /// Apply a sink completion
    async fn on_completion(&self, generation: u64, error: Option<String>) {
        {
            let mut state = self.state.lock().await;
            if state.active_generation != Some(generation) {
                debug!(
                    "Group {}: ignoring stale completion {} (active {:?})",
                    self.group_id, generation, state.active_generation
                );
                return;
            }
            state.active_generation = None;
            self.set_state(&mut state, PlaybackState::Idle);

            if let Some(reason) = error {
                warn!("Group {}: playback error: {}", self.group_id, reason);
                if let Some(current) = state.current.as_mut() {
                    current.release();
                }
                self.notify(&state, Notification::error("Playback error").message(reason));
            }
        }

        if let Err(e) = self.play_next().await {
            error!("Group {}: failed to advance after completion: {}", self.group_id, e);
            let state = self.state.lock().await;
            self.notify(&state, Notification::error("Error").message(e.to_string()));
        }
    }

    fn start_current(
        &self,
        state: &mut QueueState,
        sink: &dyn AudioSink,
    ) -> Result<()> {
        let Some(song) = state.current.as_ref() else {
            return Err(Error::InvalidState("no current song to start".to_string()));
        };
        let Some(handle) = song.stream() else {
            return Err(Error::InvalidState("current song has no stream".to_string()));
        };
        let source = handle.source();
        let volume = handle.volume();
        let view = QueueEntryView::of(song, None);

        let generation = state.next_generation();
        let completion = CompletionHandle::new(generation, self.events_tx.clone());

        if let Err(e) = sink.play(source, volume, completion) {
            error!("Group {}: sink refused {}: {}", self.group_id, view.title, e);
            state.active_generation = None;
            if let Some(mut current) = state.current.take() {
                current.release();
            }
            self.set_state(state, PlaybackState::Idle);
            return Err(match e {
                Error::Sink(_) => e,
                other => Error::Sink(other.to_string()),
            });
        }

        state.active_generation = Some(generation);
        self.set_state(state, PlaybackState::Playing);

        if state.last_started.replace(view.id) != Some(view.id) {
            self.notify(
                state,
                Notification::success("Playing")
                    .field("Title", &view.title)
                    .field("URL", &view.url),
            );
        }
        self.notifier.publish(GroupEvent::SongStarted {
            group_id: self.group_id.clone(),
            song_id: view.id,
            title: Some(view.title.clone()),
            url: view.url.clone(),
            timestamp: chrono::Utc::now(),
        });
        self.publish_queue_changed(state);
        info!("Group {}: playing {} (generation {})", self.group_id, view.title, generation);
        Ok(())
    }

    fn finish_queue(&self, state: &mut QueueState, sink: &dyn AudioSink) {
        if sink.is_playing() || sink.is_paused() {
            if let Err(e) = sink.stop() {
                warn!("Group {}: sink stop failed: {}", self.group_id, e);
            }
        }
        state.active_generation = None;
        self.set_state(state, PlaybackState::Idle);
        self.notify(state, Notification::info("Queue is empty"));
        info!("Group {}: queue is empty", self.group_id);
    }

    fn set_state(&self, state: &mut QueueState, new_state: PlaybackState) {
        let old_state = state.playback_state;
        if old_state == new_state {
            return;
        }
        state.playback_state = new_state;
        debug!("Group {}: {} -> {}", self.group_id, old_state, new_state);
        self.notifier.publish(GroupEvent::PlaybackStateChanged {
            group_id: self.group_id.clone(),
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn notify(&self, state: &QueueState, notification: Notification) {
        self.notifier
            .notify(&self.group_id, &state.notify_target, notification);
    }

    fn publish_queue_changed(&self, state: &QueueState) {
        self.notifier.publish(GroupEvent::QueueChanged {
            group_id: self.group_id.clone(),
            pending: state.pending.len(),
            timestamp: chrono::Utc::now(),
        });
    }
}

impl std::fmt::Debug for PlaybackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackQueue")
            .field("group_id", &self.group_id)
            .finish_non_exhaustive()
    }
}

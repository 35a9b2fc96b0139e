//! Test helpers for GroupPlay engine integration tests
//!
//! Scripted stand-ins for the engine's collaborators:
//! - ScriptedStream / ScriptedResolver: in-memory sources with failure and
//!   delay injection
//! - ScriptedSink: holds the completion handle until the test ends a song
//! - RecordingNotifier: keeps every notification and state event
//! - FixedConnections / FixedSearch: connection and search fakes

#![allow(dead_code)]

use async_trait::async_trait;
use groupplay_common::events::{GroupEvent, Notification, PlaybackState};
use groupplay_common::{GroupId, NotifyTarget};
use groupplay_engine::playback::{CommandContext, CompletionHandle, QueueSnapshot};
use groupplay_engine::traits::{
    AudioSink, AudioStream, ConnectionResolver, Notifier, Resolved, Resolver, SearchProvider,
};
use groupplay_engine::{Error, PlaybackController, PlaybackQueue, PlayerRegistry, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const GROUP: &str = "guild-1";
pub const TARGET: &str = "text-1";

// ============================================================================
// Streams and resolution
// ============================================================================

/// In-memory PCM source
pub struct ScriptedStream {
    pub reference: String,
    remaining: AtomicUsize,
    closed: AtomicBool,
    pub closes: AtomicUsize,
}

impl ScriptedStream {
    pub fn new(reference: &str, bytes: usize) -> Arc<Self> {
        Arc::new(Self {
            reference: reference.to_string(),
            remaining: AtomicUsize::new(bytes),
            closed: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl AudioStream for ScriptedStream {
    fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(0);
        }
        let remaining = self.remaining.load(Ordering::SeqCst);
        let n = remaining.min(buf.len());
        self.remaining.fetch_sub(n, Ordering::SeqCst);
        Ok(n)
    }

    fn is_live(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.remaining.load(Ordering::SeqCst) > 0
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Resolver producing `ScriptedStream`s, titled `Title <reference>`
#[derive(Default)]
pub struct ScriptedResolver {
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    pub streams: Mutex<Vec<Arc<ScriptedStream>>>,
    pub calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, reference: &str) {
        self.failing.lock().unwrap().insert(reference.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn streams(&self) -> Vec<Arc<ScriptedStream>> {
        self.streams.lock().unwrap().clone()
    }

    /// Every stream ever resolved was closed at most once
    pub fn no_double_close(&self) -> bool {
        self.streams().iter().all(|s| s.close_count() <= 1)
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, reference: &str) -> Result<Resolved> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(reference) {
            return Err(Error::Resolution(format!("{} is unavailable", reference)));
        }

        let stream = ScriptedStream::new(reference, 4096);
        self.streams.lock().unwrap().push(Arc::clone(&stream));
        Ok(Resolved {
            title: format!("Title {}", reference),
            url: Some(format!("https://media.example/{}", reference)),
            stream,
        })
    }
}

// ============================================================================
// Sink
// ============================================================================

struct Playing {
    source: Arc<dyn AudioStream>,
    handle: CompletionHandle,
}

/// Sink that plays until the test ends the song or something stops it
#[derive(Default)]
pub struct ScriptedSink {
    playing: Mutex<Option<Playing>>,
    paused: AtomicBool,
    fail_next_play: AtomicBool,
    pub plays: AtomicUsize,
    pub stops: AtomicUsize,
    last_generation: AtomicU64,
}

impl ScriptedSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_play(&self) {
        self.fail_next_play.store(true, Ordering::SeqCst);
    }

    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn last_generation(&self) -> u64 {
        self.last_generation.load(Ordering::SeqCst)
    }

    /// Drain the current source and report a natural end.
    /// Returns false if nothing was playing.
    pub fn finish_current(&self) -> bool {
        let playing = self.playing.lock().unwrap().take();
        match playing {
            Some(Playing { source, handle }) => {
                let mut buf = [0u8; 1024];
                while matches!(source.read(&mut buf), Ok(n) if n > 0) {}
                self.paused.store(false, Ordering::SeqCst);
                handle.complete();
                true
            }
            None => false,
        }
    }
}

impl AudioSink for ScriptedSink {
    fn play(
        &self,
        source: Arc<dyn AudioStream>,
        _volume: f32,
        on_complete: CompletionHandle,
    ) -> Result<()> {
        if self.fail_next_play.swap(false, Ordering::SeqCst) {
            return Err(Error::Sink("device unplugged".to_string()));
        }
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.last_generation
            .store(on_complete.generation(), Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);

        let previous = self.playing.lock().unwrap().replace(Playing {
            source,
            handle: on_complete,
        });
        if let Some(previous) = previous {
            previous.handle.complete();
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        let playing = self.playing.lock().unwrap().take();
        if let Some(playing) = playing {
            playing.handle.complete();
        }
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.lock().unwrap().is_some() && !self.paused.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.playing.lock().unwrap().is_some() && self.paused.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Notifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<(NotifyTarget, Notification)>>,
    pub events: Mutex<Vec<GroupEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn titles(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|(_, n)| n.title.clone())
            .collect()
    }

    pub fn count(&self, title: &str) -> usize {
        self.titles().iter().filter(|t| t.as_str() == title).count()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notifications
            .lock()
            .unwrap()
            .last()
            .map(|(_, n)| n.clone())
    }

    pub fn find(&self, title: &str) -> Option<Notification> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .find(|(_, n)| n.title == title)
            .map(|(_, n)| n.clone())
    }

    /// Titles of songs announced as "Playing", in order
    pub fn played_titles(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, n)| n.title == "Playing")
            .filter_map(|(_, n)| n.field_value("Title").map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.notifications.lock().unwrap().clear();
        self.events.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _group_id: &GroupId, target: &NotifyTarget, notification: Notification) {
        self.notifications
            .lock()
            .unwrap()
            .push((target.clone(), notification));
    }

    fn publish(&self, event: GroupEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ============================================================================
// Connections and search
// ============================================================================

/// Every group shares one scripted sink
pub struct FixedConnections {
    pub sink: Arc<ScriptedSink>,
    connected: Mutex<HashSet<GroupId>>,
    pub joins: AtomicUsize,
}

impl FixedConnections {
    pub fn new(sink: Arc<ScriptedSink>) -> Arc<Self> {
        Arc::new(Self {
            sink,
            connected: Mutex::new(HashSet::new()),
            joins: AtomicUsize::new(0),
        })
    }

    pub fn is_connected(&self, group_id: &GroupId) -> bool {
        self.connected.lock().unwrap().contains(group_id)
    }
}

#[async_trait]
impl ConnectionResolver for FixedConnections {
    fn connection(&self, ctx: &CommandContext) -> Option<Arc<dyn AudioSink>> {
        if self.is_connected(&ctx.group_id) {
            let sink: Arc<dyn AudioSink> = self.sink.clone();
            Some(sink)
        } else {
            None
        }
    }

    async fn join(&self, ctx: &CommandContext) -> Result<Arc<dyn AudioSink>> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        self.connected.lock().unwrap().insert(ctx.group_id.clone());
        Ok(self.sink.clone())
    }

    async fn leave(&self, ctx: &CommandContext) -> Result<Option<String>> {
        if self.connected.lock().unwrap().remove(&ctx.group_id) {
            Ok(Some(ctx.channel.clone().unwrap_or_else(|| "voice".to_string())))
        } else {
            Ok(None)
        }
    }
}

/// Maps a query to `found-<query>`; `broken` queries fail
pub struct FixedSearch;

#[async_trait]
impl SearchProvider for FixedSearch {
    async fn find(&self, query: &str) -> Result<String> {
        if query == "broken" {
            return Err(Error::Internal("quota exceeded".to_string()));
        }
        Ok(format!("found-{}", query.replace(' ', "-")))
    }
}

// ============================================================================
// Assembly
// ============================================================================

pub struct Harness {
    pub resolver: Arc<ScriptedResolver>,
    pub sink: Arc<ScriptedSink>,
    pub notifier: Arc<RecordingNotifier>,
    pub connections: Arc<FixedConnections>,
    pub registry: Arc<PlayerRegistry>,
    pub controller: Arc<PlaybackController>,
}

impl Harness {
    pub fn new() -> Self {
        let resolver = ScriptedResolver::new();
        let sink = ScriptedSink::new();
        let notifier = RecordingNotifier::new();
        let connections = FixedConnections::new(sink.clone());
        let registry = Arc::new(PlayerRegistry::new(resolver.clone(), notifier.clone()));
        let controller = Arc::new(PlaybackController::new(
            registry.clone(),
            resolver.clone(),
            connections.clone(),
            Arc::new(FixedSearch),
            notifier.clone(),
        ));

        Self {
            resolver,
            sink,
            notifier,
            connections,
            registry,
            controller,
        }
    }

    pub fn ctx(&self) -> CommandContext {
        CommandContext::new(GROUP, TARGET).with_channel("voice-1")
    }

    pub async fn queue(&self) -> Arc<PlaybackQueue> {
        self.registry
            .get(&GroupId::new(GROUP))
            .await
            .expect("queue exists")
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        self.queue().await.snapshot().await
    }
}

/// Standalone queue bound to a scripted sink
pub fn queue_with(
    resolver: Arc<ScriptedResolver>,
    notifier: Arc<RecordingNotifier>,
) -> Arc<PlaybackQueue> {
    PlaybackQueue::new(GroupId::new(GROUP), NotifyTarget::new(TARGET), resolver, notifier)
}

// ============================================================================
// Waiting
// ============================================================================

const WAIT_LIMIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(5);

/// Poll the queue until `check` holds for its snapshot
pub async fn wait_for_snapshot<F>(queue: &PlaybackQueue, check: F) -> QueueSnapshot
where
    F: Fn(&QueueSnapshot) -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    loop {
        let snapshot = queue.snapshot().await;
        if check(&snapshot) {
            return snapshot;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached; last snapshot: {:?}",
            snapshot
        );
        tokio::time::sleep(POLL).await;
    }
}

pub async fn wait_for_state(queue: &PlaybackQueue, state: PlaybackState) -> QueueSnapshot {
    wait_for_snapshot(queue, |s| s.state == state).await
}

/// Wait until `title` has been notified at least `count` times
pub async fn wait_for_notification(notifier: &RecordingNotifier, title: &str, count: usize) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while notifier.count(title) < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {} x {:?}; got {:?}",
            count,
            title,
            notifier.titles()
        );
        tokio::time::sleep(POLL).await;
    }
}

/// Wait until the sink has accepted `count` plays
pub async fn wait_for_plays(sink: &ScriptedSink, count: usize) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while sink.play_count() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {} plays, got {}",
            count,
            sink.play_count()
        );
        tokio::time::sleep(POLL).await;
    }
}

//! Playback controller: the public command surface
//!
//! Maps each command onto one queue operation. Every error is recovered at
//! [`PlaybackController::dispatch`] and turned into a notification for the
//! command's originating context.

use crate::error::{Error, Result};
use crate::playback::command::{Command, CommandContext};
use crate::playback::queue::{PlaybackQueue, QueueSnapshot};
use crate::playback::registry::PlayerRegistry;
use crate::playback::song::Song;
use crate::playback::stream::DEFAULT_VOLUME;
use crate::traits::{ConnectionResolver, Notifier, Resolver, SearchProvider};
use groupplay_common::events::Notification;
use groupplay_common::GroupId;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PlaybackController {
    registry: Arc<PlayerRegistry>,
    resolver: Arc<dyn Resolver>,
    connections: Arc<dyn ConnectionResolver>,
    search: Arc<dyn SearchProvider>,
    notifier: Arc<dyn Notifier>,
    default_volume: f32,
}

impl PlaybackController {
    pub fn new(
        registry: Arc<PlayerRegistry>,
        resolver: Arc<dyn Resolver>,
        connections: Arc<dyn ConnectionResolver>,
        search: Arc<dyn SearchProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            resolver,
            connections,
            search,
            notifier,
            default_volume: DEFAULT_VOLUME,
        }
    }

    /// Volume applied to newly requested songs
    pub fn with_default_volume(mut self, volume: f32) -> Self {
        self.default_volume = volume;
        self
    }

    pub fn registry(&self) -> &Arc<PlayerRegistry> {
        &self.registry
    }

    /// Run one command, reporting any error as a notification.
    ///
    /// The error is still returned so the caller can log it or map it to a
    /// status code.
    pub async fn dispatch(&self, ctx: &CommandContext, command: Command) -> Result<()> {
        info!("Group {}: {}", ctx.group_id, command);

        if ctx.acknowledge {
            self.notify(ctx, Notification::info("Done"));
        }

        let result = match command {
            Command::Join => self.join(ctx).await,
            Command::Leave => self.leave(ctx).await,
            Command::Play(reference) => self.play(ctx, &reference).await,
            Command::Find(query) => self.find(ctx, &query).await,
            Command::Stop => self.stop(ctx).await,
            Command::Skip => self.skip(ctx).await,
            Command::Queue => self.queue(ctx).await,
            Command::Delete(index) => self.delete(ctx, index).await,
            Command::Loop => self.toggle_loop(ctx).await.map(|_| ()),
            Command::Pause => self.pause(ctx).await,
            Command::Resume => self.resume(ctx).await,
        };

        if let Err(e) = &result {
            warn!("Group {}: command failed: {}", ctx.group_id, e);
            self.notify(ctx, error_notification(e));
        }
        result
    }

    /// Resolve and enqueue `reference`, starting playback if idle.
    ///
    /// Joins the caller's channel when not connected. A resolution failure
    /// leaves the queue untouched.
    pub async fn play(&self, ctx: &CommandContext, reference: &str) -> Result<()> {
        let queue = self.queue_for(ctx, true).await?;

        let mut song = Song::new(reference).with_volume(self.default_volume);
        song.resolve(self.resolver.as_ref()).await?;

        queue.add(song).await;
        queue.play_next().await
    }

    /// Search, then behave as [`play`](Self::play)
    pub async fn find(&self, ctx: &CommandContext, query: &str) -> Result<()> {
        debug!("Finding {}", query);
        let reference = self.search.find(query).await.map_err(|e| match e {
            Error::Search(_) => e,
            other => Error::Search(other.to_string()),
        })?;
        info!("Found {} for {:?}", reference, query);
        self.play(ctx, &reference).await
    }

    pub async fn stop(&self, ctx: &CommandContext) -> Result<()> {
        self.queue_for(ctx, false).await?.stop().await
    }

    /// Skip the current song. If nothing was playing, start the next one
    /// directly since no completion will arrive.
    pub async fn skip(&self, ctx: &CommandContext) -> Result<()> {
        let queue = self.queue_for(ctx, false).await?;
        if queue.skip(1).await? {
            queue.play_next().await?;
        }
        Ok(())
    }

    pub async fn pause(&self, ctx: &CommandContext) -> Result<()> {
        self.queue_for(ctx, false).await?.pause().await
    }

    pub async fn resume(&self, ctx: &CommandContext) -> Result<()> {
        self.queue_for(ctx, false).await?.resume().await
    }

    pub async fn delete(&self, ctx: &CommandContext, index: usize) -> Result<()> {
        self.queue_for(ctx, false).await?.remove(index).await?;
        Ok(())
    }

    /// Flip looping; returns the new value
    pub async fn toggle_loop(&self, ctx: &CommandContext) -> Result<bool> {
        Ok(self.queue_for(ctx, false).await?.toggle_loop().await)
    }

    pub async fn queue(&self, ctx: &CommandContext) -> Result<()> {
        self.queue_for(ctx, false).await?.print_queue().await;
        Ok(())
    }

    /// Connect to the caller's channel and bind the group's queue to it
    pub async fn join(&self, ctx: &CommandContext) -> Result<()> {
        let sink = self.connections.join(ctx).await?;
        let queue = self
            .registry
            .get_or_create(&ctx.group_id, ctx.notify_target.clone())
            .await;
        queue.attach_sink(sink).await;
        info!(
            "Group {}: joined {}",
            ctx.group_id,
            ctx.channel.as_deref().unwrap_or("default channel")
        );
        Ok(())
    }

    /// Disconnect, discarding the group's queue contents
    pub async fn leave(&self, ctx: &CommandContext) -> Result<()> {
        match self.connections.leave(ctx).await? {
            Some(channel) => {
                self.notify(ctx, Notification::success("Left").field("Channel", &channel));
                if let Some(queue) = self.registry.get(&ctx.group_id).await {
                    queue.disconnect().await;
                }
                info!("Group {}: left {}", ctx.group_id, channel);
            }
            None => {
                self.notify(ctx, Notification::error("Not connected"));
            }
        }
        Ok(())
    }

    pub async fn snapshot(&self, group_id: &GroupId) -> Option<QueueSnapshot> {
        match self.registry.get(group_id).await {
            Some(queue) => Some(queue.snapshot().await),
            None => None,
        }
    }

    /// Queue for the context's group, bound to its live connection.
    ///
    /// Fails fast with `NotConnected` unless `join` allows connecting.
    async fn queue_for(&self, ctx: &CommandContext, join: bool) -> Result<Arc<PlaybackQueue>> {
        let sink = match self.connections.connection(ctx) {
            Some(sink) => sink,
            None if join => self.connections.join(ctx).await?,
            None => return Err(Error::NotConnected),
        };

        let queue = self
            .registry
            .get_or_create(&ctx.group_id, ctx.notify_target.clone())
            .await;
        queue.attach_sink(sink).await;
        Ok(queue)
    }

    fn notify(&self, ctx: &CommandContext, notification: Notification) {
        self.notifier
            .notify(&ctx.group_id, &ctx.notify_target, notification);
    }
}

fn error_notification(error: &Error) -> Notification {
    match error {
        Error::IndexOutOfRange { index, len } => Notification::error("Index out of range")
            .field("Index", index)
            .field("Length", len),
        Error::NotConnected => Notification::error("Not connected"),
        other => Notification::error("Error").message(other.to_string()),
    }
}

//! Local connection tracking: one paced sink per joined group

use crate::adapters::paced_sink::PacedSink;
use crate::error::Result;
use crate::playback::CommandContext;
use crate::traits::{AudioSink, ConnectionResolver};
use async_trait::async_trait;
use groupplay_common::GroupId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

const DEFAULT_CHANNEL: &str = "default";

struct Connection {
    channel: String,
    sink: Arc<dyn AudioSink>,
}

pub struct LocalConnections {
    byte_rate: u64,
    connections: Mutex<HashMap<GroupId, Connection>>,
}

impl LocalConnections {
    pub fn new(byte_rate: u64) -> Self {
        Self {
            byte_rate,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Channel the group is connected to, if any
    pub fn channel(&self, group_id: &GroupId) -> Option<String> {
        self.lock().get(group_id).map(|c| c.channel.clone())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<GroupId, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConnectionResolver for LocalConnections {
    fn connection(&self, ctx: &CommandContext) -> Option<Arc<dyn AudioSink>> {
        self.lock().get(&ctx.group_id).map(|c| Arc::clone(&c.sink))
    }

    /// Joining again moves the group to the requested channel but keeps the
    /// sink, so playback is not interrupted.
    async fn join(&self, ctx: &CommandContext) -> Result<Arc<dyn AudioSink>> {
        let channel = ctx.channel.clone().unwrap_or_else(|| DEFAULT_CHANNEL.to_string());
        let mut connections = self.lock();

        if let Some(existing) = connections.get_mut(&ctx.group_id) {
            if existing.channel != channel {
                info!("Moving {} to {}", ctx.group_id, channel);
                existing.channel = channel;
            } else {
                info!("Already in {}", channel);
            }
            return Ok(Arc::clone(&existing.sink));
        }

        info!("Joining {} for {}", channel, ctx.group_id);
        let sink: Arc<dyn AudioSink> =
            Arc::new(PacedSink::new(ctx.group_id.as_str(), self.byte_rate));
        connections.insert(
            ctx.group_id.clone(),
            Connection {
                channel,
                sink: Arc::clone(&sink),
            },
        );
        Ok(sink)
    }

    async fn leave(&self, ctx: &CommandContext) -> Result<Option<String>> {
        let removed = self.lock().remove(&ctx.group_id);
        Ok(removed.map(|c| {
            info!("Left {} for {}", c.channel, ctx.group_id);
            c.channel
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_move_leave() {
        let connections = LocalConnections::new(192_000);
        let ctx = CommandContext::new("g", "t").with_channel("lounge");

        assert!(connections.connection(&ctx).is_none());

        let first = connections.join(&ctx).await.unwrap();
        let moved = connections
            .join(&CommandContext::new("g", "t").with_channel("hall"))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &moved));
        assert_eq!(connections.channel(&ctx.group_id).as_deref(), Some("hall"));

        assert_eq!(connections.leave(&ctx).await.unwrap().as_deref(), Some("hall"));
        assert_eq!(connections.leave(&ctx).await.unwrap(), None);
        assert!(connections.connection(&ctx).is_none());
    }
}

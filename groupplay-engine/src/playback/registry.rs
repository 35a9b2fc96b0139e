//! Group → queue lookup
//!
//! Owned and injected into the controller. The map lock is held only for
//! lookup and insert; queue operations never run under it.

use crate::playback::queue::PlaybackQueue;
use crate::traits::{Notifier, Resolver};
use groupplay_common::{GroupId, NotifyTarget};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub struct PlayerRegistry {
    players: RwLock<HashMap<GroupId, Arc<PlaybackQueue>>>,
    resolver: Arc<dyn Resolver>,
    notifier: Arc<dyn Notifier>,
}

impl PlayerRegistry {
    pub fn new(resolver: Arc<dyn Resolver>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            resolver,
            notifier,
        }
    }

    /// Queue for `group_id`, created on first use.
    ///
    /// The notify target is updated on every access so notifications follow
    /// the most recent command.
    pub async fn get_or_create(
        &self,
        group_id: &GroupId,
        notify_target: NotifyTarget,
    ) -> Arc<PlaybackQueue> {
        if let Some(queue) = self.get(group_id).await {
            queue.set_notify_target(notify_target).await;
            return queue;
        }

        let queue = {
            let mut players = self.players.write().await;
            // Re-check: another caller may have inserted while we waited
            players
                .entry(group_id.clone())
                .or_insert_with(|| {
                    debug!("Creating queue for group {}", group_id);
                    PlaybackQueue::new(
                        group_id.clone(),
                        notify_target.clone(),
                        Arc::clone(&self.resolver),
                        Arc::clone(&self.notifier),
                    )
                })
                .clone()
        };

        queue.set_notify_target(notify_target).await;
        queue
    }

    /// Existing queue, without creating one
    pub async fn get(&self, group_id: &GroupId) -> Option<Arc<PlaybackQueue>> {
        self.players.read().await.get(group_id).cloned()
    }

    /// Known group ids, sorted
    pub async fn groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<GroupId> = self.players.read().await.keys().cloned().collect();
        groups.sort();
        groups
    }

    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }
}

//! Notifier backed by the shared event bus

use crate::traits::Notifier;
use groupplay_common::events::{EventBus, GroupEvent, Notification, Severity};
use groupplay_common::{GroupId, NotifyTarget};
use std::sync::Arc;
use tracing::{info, warn};

/// Logs every notification and broadcasts it (plus state events) to SSE
/// subscribers. Delivery is lossy: with no subscribers events are dropped.
pub struct EventBusNotifier {
    bus: Arc<EventBus>,
}

impl EventBusNotifier {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl Notifier for EventBusNotifier {
    fn notify(&self, group_id: &GroupId, target: &NotifyTarget, notification: Notification) {
        match notification.severity {
            Severity::Success | Severity::Info => info!(
                "[{}] {} -> {}: {}",
                notification.severity, group_id, target, notification.title
            ),
            Severity::Warning | Severity::Error => warn!(
                "[{}] {} -> {}: {} {}",
                notification.severity,
                group_id,
                target,
                notification.title,
                notification.message.as_deref().unwrap_or("")
            ),
        }

        self.bus.emit_lossy(GroupEvent::Notification {
            group_id: group_id.clone(),
            target: target.clone(),
            notification,
        });
    }

    fn publish(&self, event: GroupEvent) {
        self.bus.emit_lossy(event);
    }
}

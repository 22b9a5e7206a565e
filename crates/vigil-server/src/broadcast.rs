//! In-process fan-out of committed activity entries.
//!
//! The service publishes every committed [`AuditRunActivity`] through the
//! [`ActivitySink`] trait; the broadcaster forwards it to any live
//! subscribers. Nothing is buffered for late subscribers.

use std::sync::RwLock;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use vigil_core::entities::AuditRunActivity;
use vigil_db::service::ActivitySink;

pub struct ActivityBroadcaster {
    sender: RwLock<Option<broadcast::Sender<AuditRunActivity>>>,
}

impl ActivityBroadcaster {
    /// `capacity` is the number of entries a slow subscriber may fall behind
    /// before it starts missing entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    /// Subscribe to future entries. Returns `None` after [`Self::shutdown`].
    pub fn subscribe(&self) -> Option<broadcast::Receiver<AuditRunActivity>> {
        let sender = self.sender.read().ok()?;
        sender.as_ref().map(broadcast::Sender::subscribe)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(broadcast::Sender::receiver_count))
            .unwrap_or(0)
    }

    /// Drop the sender. Subscribers drain what they already hold and then
    /// observe a closed channel; later publishes are no-ops.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.write() {
            if sender.take().is_some() {
                tracing::debug!("activity broadcaster shut down");
            }
        }
    }
}

impl ActivitySink for ActivityBroadcaster {
    fn publish(&self, activity: &AuditRunActivity) {
        let Ok(sender) = self.sender.read() else {
            return;
        };
        if let Some(sender) = sender.as_ref() {
            // Err only means nobody is listening.
            if sender.send(activity.clone()).is_err() {
                tracing::trace!(activity = %activity.id, "no activity subscribers");
            }
        }
    }
}

/// Emit every committed entry on the `vigil::activity` tracing target until
/// the broadcaster shuts down.
pub fn spawn_activity_log(broadcaster: &ActivityBroadcaster) -> Option<JoinHandle<()>> {
    let mut rx = broadcaster.subscribe()?;
    Some(tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(activity) => tracing::debug!(
                    target: "vigil::activity",
                    id = %activity.id,
                    audit_run_id = %activity.audit_run_id,
                    activity_type = %activity.activity_type,
                    performed_by = %activity.performed_by,
                    target_id = %activity.target_entity_id,
                    "activity committed"
                ),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "activity log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use vigil_core::enums::{ActivityType, EntityType};

    use super::*;

    fn entry(id: &str) -> AuditRunActivity {
        AuditRunActivity {
            id: id.into(),
            audit_run_id: "run-1".into(),
            activity_type: ActivityType::RunUpdated,
            performed_by: "usr-1".into(),
            target_entity_type: EntityType::AuditRun,
            target_entity_id: "run-1".into(),
            old_value: None,
            new_value: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_entries() {
        let broadcaster = ActivityBroadcaster::new(8);
        let mut a = broadcaster.subscribe().unwrap();
        let mut b = broadcaster.subscribe().unwrap();
        assert_eq!(broadcaster.subscriber_count(), 2);

        broadcaster.publish(&entry("act-1"));

        assert_eq!(a.recv().await.unwrap().id, "act-1");
        assert_eq!(b.recv().await.unwrap().id, "act-1");
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let broadcaster = ActivityBroadcaster::new(8);
        broadcaster.publish(&entry("act-1"));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_closes_subscribers() {
        let broadcaster = ActivityBroadcaster::new(8);
        let mut rx = broadcaster.subscribe().unwrap();
        broadcaster.publish(&entry("act-1"));
        broadcaster.shutdown();

        assert!(broadcaster.subscribe().is_none());
        assert_eq!(rx.recv().await.unwrap().id, "act-1");
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));

        // Idempotent; publishing afterwards is a no-op.
        broadcaster.shutdown();
        broadcaster.publish(&entry("act-2"));
    }

    #[tokio::test]
    async fn activity_log_runs_until_shutdown() {
        let broadcaster = ActivityBroadcaster::new(8);
        let handle = spawn_activity_log(&broadcaster).unwrap();
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.publish(&entry("act-1"));
        broadcaster.shutdown();
        handle.await.unwrap();

        assert!(spawn_activity_log(&broadcaster).is_none());
    }
}

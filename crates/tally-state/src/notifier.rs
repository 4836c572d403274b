//! Outbound notifications.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::Notification;
use tokio::sync::{broadcast, RwLock};

/// Sends chat messages.
///
/// Fire-and-forget from the engine's point of view: delivery failures are
/// the implementation's concern to log.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message.
    async fn send(&self, notification: Notification);
}

/// A notification together with the time it was handed to the notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentNotification {
    #[serde(flatten)]
    pub notification: Notification,
    pub sent_at: DateTime<Utc>,
}

/// Filter for notification subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationFilter {
    /// Only messages to this recipient.
    pub transport_id: Option<String>,

    /// Only messages under this thread.
    pub thread_message_id: Option<String>,
}

impl NotificationFilter {
    /// Create a filter for one recipient.
    pub fn recipient(transport_id: impl Into<String>) -> Self {
        Self {
            transport_id: Some(transport_id.into()),
            ..Default::default()
        }
    }

    /// Check if a notification matches this filter.
    pub fn matches(&self, notification: &Notification) -> bool {
        if let Some(ref transport_id) = self.transport_id {
            if &notification.transport_id != transport_id {
                return false;
            }
        }

        if let Some(ref thread) = self.thread_message_id {
            if notification.thread_message_id.as_ref() != Some(thread) {
                return false;
            }
        }

        true
    }
}

/// Notifier that fans messages out to live subscribers and keeps a history.
///
/// The platform transport subscribes to deliver messages; tests read the
/// history. The history holds at most `capacity` entries, oldest dropped
/// first.
#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<SentNotification>,
    history: Arc<RwLock<VecDeque<SentNotification>>>,
    capacity: usize,
}

impl BroadcastNotifier {
    /// Create a notifier buffering up to `capacity` undelivered messages per
    /// subscriber and keeping the last `capacity` in its history.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            history: Arc::new(RwLock::new(VecDeque::new())),
            capacity,
        }
    }

    /// Subscribe to every notification sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SentNotification> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Every notification sent so far.
    pub async fn sent(&self) -> Vec<Notification> {
        self.history
            .read()
            .await
            .iter()
            .map(|s| s.notification.clone())
            .collect()
    }

    /// Notifications matching `filter`.
    pub async fn sent_matching(&self, filter: &NotificationFilter) -> Vec<Notification> {
        self.history
            .read()
            .await
            .iter()
            .filter(|s| filter.matches(&s.notification))
            .map(|s| s.notification.clone())
            .collect()
    }

    /// Notifications sent to `transport_id`.
    pub async fn sent_to(&self, transport_id: &str) -> Vec<Notification> {
        self.sent_matching(&NotificationFilter::recipient(transport_id))
            .await
    }

    /// Forget the history.
    pub async fn clear(&self) {
        self.history.write().await.clear();
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn send(&self, notification: Notification) {
        let sent = SentNotification {
            notification,
            sent_at: Utc::now(),
        };

        tracing::debug!(
            transport_id = %sent.notification.transport_id,
            "notification sent"
        );

        {
            let mut history = self.history.write().await;
            if history.len() >= self.capacity {
                history.pop_front();
            }
            history.push_back(sent.clone());
        }
        // No subscribers is fine; the history still has it.
        let _ = self.sender.send(sent);
    }
}

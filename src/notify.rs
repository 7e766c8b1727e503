//! Operator notifications.
//!
//! Every dispatch, forward and login attempt publishes a human-readable
//! notification. It is the only operator-visible audit trail, so each one is
//! also written to the log.

use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A titled message for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub level: NotificationLevel,
    pub emitted_at: DateTime<Utc>,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            level: NotificationLevel::Success,
            emitted_at: Utc::now(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            title: "Error".to_string(),
            description: description.into(),
            level: NotificationLevel::Error,
            emitted_at: Utc::now(),
        }
    }
}

/// Broadcast channel for notifications.
///
/// Cloning a `Notifier` shares the channel. Slow subscribers lose the oldest
/// notifications once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => tracing::info!(
                title = %notification.title,
                description = %notification.description,
                "Notification"
            ),
            NotificationLevel::Error => tracing::warn!(
                title = %notification.title,
                description = %notification.description,
                "Notification"
            ),
        }
        // Nobody listening is fine
        let _ = self.tx.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Subscribe as a stream, skipping over notifications lost to lag.
    pub fn stream(&self) -> impl Stream<Item = Notification> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|item| async move {
            match item {
                Ok(notification) => Some(notification),
                Err(e) => {
                    tracing::warn!(error = %e, "Notification subscriber lagged");
                    None
                }
            }
        })
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_notifications() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        notifier.publish(Notification::success(
            "Requests Sent",
            "All pending requests have been consolidated and sent to Jio",
        ));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.title, "Requests Sent");
        assert_eq!(received.level, NotificationLevel::Success);
    }

    #[tokio::test]
    async fn test_stream_yields_in_order() {
        let notifier = Notifier::default();
        let stream = notifier.stream();

        notifier.publish(Notification::error("Please fill in all fields"));
        notifier.publish(Notification::success("Success", "Login successful!"));

        let received: Vec<_> = stream.take(2).collect().await;
        assert_eq!(received[0].title, "Error");
        assert_eq!(received[1].description, "Login successful!");
    }

    #[test]
    fn test_publish_without_subscribers_does_not_fail() {
        Notifier::new(1).publish(Notification::error("Incorrect CAPTCHA answer"));
    }
}

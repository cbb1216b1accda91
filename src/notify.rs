use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

pub const NOTIFICATION_TTL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NotificationId(Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

struct Entry {
    notification: Notification,
    expiry: CancellationToken,
}

/// Transient user-facing messages. Each entry removes itself after the TTL
/// unless dismissed first. Clones share the same queue.
#[derive(Clone)]
pub struct NotificationQueue {
    entries: Arc<Mutex<Vec<Entry>>>,
    ttl: Duration,
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::with_ttl(NOTIFICATION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            ttl,
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn push(&self, message: impl Into<String>, kind: NotificationKind) -> NotificationId {
        let id = NotificationId(Uuid::new_v4());
        let expiry = CancellationToken::new();
        let notification = Notification {
            id,
            message: message.into(),
            kind,
            created_at: Utc::now(),
        };
        debug!(?id, ?kind, message = %notification.message, "notification pushed");

        self.lock().push(Entry {
            notification,
            expiry: expiry.clone(),
        });

        let entries = Arc::clone(&self.entries);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::select! {
                _ = expiry.cancelled() => {}
                _ = tokio::time::sleep(ttl) => {
                    let mut entries = entries.lock().unwrap_or_else(|p| p.into_inner());
                    entries.retain(|entry| entry.notification.id != id);
                    debug!(?id, "notification expired");
                }
            }
        });

        id
    }

    /// Returns false if the notification was already gone.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        let mut entries = self.lock();
        match entries.iter().position(|entry| entry.notification.id == id) {
            Some(index) => {
                let entry = entries.remove(index);
                entry.expiry.cancel();
                true
            }
            None => false,
        }
    }

    /// Current notifications in insertion order.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.lock()
            .iter()
            .map(|entry| entry.notification.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: NotificationId) -> bool {
        self.lock().iter().any(|entry| entry.notification.id == id)
    }

    /// Cancels every pending expiry and empties the queue.
    pub fn clear(&self) {
        for entry in self.lock().drain(..) {
            entry.expiry.cancel();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

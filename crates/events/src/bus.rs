//! In-process notification bus backed by a `tokio::sync::broadcast`
//! channel.
//!
//! [`NotificationBus`] fans every published [`Notification`] out to all
//! subscribers. It is designed to be shared via `Arc<NotificationBus>`;
//! a real deployment hangs delivery channels (email, chat) off
//! subscriptions, while tests subscribe directly to assert on emitted
//! notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use conclave_core::types::Recipients;

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A notification the engine wants delivered.
///
/// Constructed via [`Notification::new`] and enriched with
/// [`with_context`](Notification::with_context).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Who should receive it.
    pub recipients: Recipients,
    /// Human-readable message.
    pub message: String,
    /// Free-form JSON context (instance id, state, SLA data, ...).
    pub context: serde_json::Value,
    /// When the notification was created (UTC).
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipients: Recipients, message: impl Into<String>) -> Self {
        Self {
            recipients,
            message: message.into(),
            context: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    /// Set the JSON context for the notification.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

// ---------------------------------------------------------------------------
// NotificationBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for notifications.
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// Create a bus with a custom buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publish a notification to all current subscribers.
    ///
    /// Returns the number of subscribers that received it. Zero
    /// subscribers is not an error — delivery is fire-and-forget.
    pub fn publish(&self, notification: Notification) -> usize {
        match self.sender.send(notification) {
            Ok(count) => count,
            Err(_) => {
                tracing::debug!("Notification published with no subscribers");
                0
            }
        }
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

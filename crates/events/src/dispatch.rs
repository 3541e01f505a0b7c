//! Collaborator traits the engine dispatches side effects through.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::{Notification, NotificationBus};

/// Fire-and-forget notification delivery.
///
/// Delivery failures are the dispatcher's concern; the engine never
/// retries a notification.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: Notification);
}

/// External collaborator that owns document state. Invoked only as a
/// declared `document` side effect; the engine does not understand
/// document storage.
#[async_trait]
pub trait DocumentStateCollaborator: Send + Sync {
    async fn move_document(&self, document_id: &str, target_state: &str);
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

/// Dispatcher that publishes onto the in-process [`NotificationBus`].
pub struct BusDispatcher {
    bus: Arc<NotificationBus>,
}

impl BusDispatcher {
    pub fn new(bus: Arc<NotificationBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl NotificationDispatcher for BusDispatcher {
    async fn dispatch(&self, notification: Notification) {
        self.bus.publish(notification);
    }
}

/// Dispatcher that drops everything. For tests and headless runs.
#[derive(Default)]
pub struct NullDispatcher;

#[async_trait]
impl NotificationDispatcher for NullDispatcher {
    async fn dispatch(&self, notification: Notification) {
        tracing::trace!(message = %notification.message, "Dropping notification (null dispatcher)");
    }
}

/// Document collaborator that only logs. For tests and headless runs.
#[derive(Default)]
pub struct NullDocumentCollaborator;

#[async_trait]
impl DocumentStateCollaborator for NullDocumentCollaborator {
    async fn move_document(&self, document_id: &str, target_state: &str) {
        tracing::trace!(document_id, target_state, "Dropping document move (null collaborator)");
    }
}

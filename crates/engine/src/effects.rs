//! Declared side-effect dispatch.
//!
//! Definitions declare side effects data-side (`notify`, `audit`,
//! `document`); the engine interprets the declaration and hands the
//! work to collaborators. Side effects are fire-and-forget: a failed
//! dispatch is logged and never fails the transition that triggered it.

use std::sync::Arc;

use serde_json::json;

use conclave_core::definition::SideEffect;
use conclave_core::instance::WorkflowInstance;
use conclave_events::{DocumentStateCollaborator, Notification, NotificationDispatcher};

use crate::chain::{AppendRequest, AuditChain};

/// Dispatches declared side effects to the notification and document
/// collaborators, and appends declared `audit` actions to the chain.
#[derive(Clone)]
pub struct SideEffectRunner {
    notifier: Arc<dyn NotificationDispatcher>,
    documents: Arc<dyn DocumentStateCollaborator>,
}

impl SideEffectRunner {
    pub fn new(
        notifier: Arc<dyn NotificationDispatcher>,
        documents: Arc<dyn DocumentStateCollaborator>,
    ) -> Self {
        Self {
            notifier,
            documents,
        }
    }

    /// Hand a single notification to the dispatcher (SLA warnings and
    /// escalations, which are not declared effects).
    pub async fn dispatch_notification(&self, notification: Notification) {
        self.notifier.dispatch(notification).await;
    }

    /// Run a batch of declared effects in declaration order.
    pub async fn run(
        &self,
        chain: &AuditChain,
        instance: &WorkflowInstance,
        actor: &str,
        effects: &[SideEffect],
    ) {
        for effect in effects {
            match effect {
                SideEffect::Notify {
                    recipients,
                    message,
                } => {
                    let notification = Notification::new(recipients.clone(), message.clone())
                        .with_context(json!({
                            "instance_id": instance.id,
                            "state": instance.current_state,
                        }));
                    self.notifier.dispatch(notification).await;
                }
                SideEffect::AuditLog { action } => {
                    let request = AppendRequest {
                        partition: instance.partition.clone(),
                        action: action.clone(),
                        actor: actor.to_string(),
                        payload: json!({
                            "instance_id": instance.id,
                            "state": instance.current_state,
                        }),
                        // Declared audit effects are not retried by
                        // callers, so each firing gets a fresh key.
                        correlation_id: format!(
                            "wf:{}:effect:{}:{}",
                            instance.id,
                            action,
                            uuid::Uuid::new_v4()
                        ),
                    };
                    if let Err(e) = chain.append(request).await {
                        tracing::warn!(
                            instance_id = %instance.id,
                            action = %action,
                            error = %e,
                            "Declared audit side effect failed"
                        );
                    }
                }
                SideEffect::DocumentMove { target_state } => match &instance.document {
                    Some(document) => {
                        self.documents
                            .move_document(&document.document_id, target_state)
                            .await;
                    }
                    None => {
                        tracing::warn!(
                            instance_id = %instance.id,
                            target_state = %target_state,
                            "Document move declared but instance has no linked document"
                        );
                    }
                },
            }
        }
    }
}

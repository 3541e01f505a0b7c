//! In-memory store implementation.
//!
//! Backs the engine in tests and single-process deployments. Tables are
//! plain `HashMap`s behind `std::sync` locks (never held across an
//! await). The audit table and the per-partition heads share one mutex
//! so `append_if_head` is genuinely atomic: the head check, the event
//! insert, and the head advance happen under a single lock acquisition.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use conclave_core::audit::{AuditEvent, GENESIS_HASH};
use conclave_core::definition::WorkflowDefinition;
use conclave_core::instance::WorkflowInstance;
use conclave_core::types::{DefinitionId, InstanceId};

use crate::error::StoreError;
use crate::{AuditStore, DefinitionQuery, DefinitionStore, InstanceQuery, InstanceStore, StoreResult};

/// Audit table for one process: events grouped by partition plus the
/// chain head per partition.
#[derive(Default)]
struct AuditTable {
    events: HashMap<String, Vec<AuditEvent>>,
    heads: HashMap<String, String>,
}

/// Process-local store. Cheap to share via `Arc`.
#[derive(Default)]
pub struct MemoryStore {
    definitions: RwLock<HashMap<DefinitionId, WorkflowDefinition>>,
    instances: RwLock<HashMap<InstanceId, WorkflowInstance>>,
    audit: Mutex<AuditTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_poisoned() -> StoreError {
        StoreError::Backend("store lock poisoned".to_string())
    }
}

#[async_trait]
impl DefinitionStore for MemoryStore {
    async fn insert(&self, definition: WorkflowDefinition) -> StoreResult<()> {
        let mut table = self.definitions.write().map_err(|_| Self::lock_poisoned())?;
        table.insert(definition.id, definition);
        Ok(())
    }

    async fn get(&self, id: DefinitionId) -> StoreResult<Option<WorkflowDefinition>> {
        let table = self.definitions.read().map_err(|_| Self::lock_poisoned())?;
        Ok(table.get(&id).cloned())
    }

    async fn list(&self, query: &DefinitionQuery) -> StoreResult<Vec<WorkflowDefinition>> {
        let table = self.definitions.read().map_err(|_| Self::lock_poisoned())?;
        let mut results: Vec<WorkflowDefinition> = table
            .values()
            .filter(|d| {
                query
                    .category
                    .as_ref()
                    .is_none_or(|c| d.category.as_deref() == Some(c.as_str()))
            })
            .filter(|d| query.is_active.is_none_or(|active| d.is_active == active))
            .filter(|d| {
                query
                    .name_contains
                    .as_ref()
                    .is_none_or(|needle| d.name.to_lowercase().contains(&needle.to_lowercase()))
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(results)
    }

    async fn update(&self, definition: WorkflowDefinition) -> StoreResult<()> {
        let mut table = self.definitions.write().map_err(|_| Self::lock_poisoned())?;
        if !table.contains_key(&definition.id) {
            return Err(StoreError::NotFound {
                entity: "workflow_definition",
                id: definition.id.to_string(),
            });
        }
        table.insert(definition.id, definition);
        Ok(())
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn insert(&self, instance: WorkflowInstance) -> StoreResult<()> {
        let mut table = self.instances.write().map_err(|_| Self::lock_poisoned())?;
        table.insert(instance.id, instance);
        Ok(())
    }

    async fn get(&self, id: InstanceId) -> StoreResult<Option<WorkflowInstance>> {
        let table = self.instances.read().map_err(|_| Self::lock_poisoned())?;
        Ok(table.get(&id).cloned())
    }

    async fn update(&self, instance: WorkflowInstance) -> StoreResult<()> {
        let mut table = self.instances.write().map_err(|_| Self::lock_poisoned())?;
        if !table.contains_key(&instance.id) {
            return Err(StoreError::NotFound {
                entity: "workflow_instance",
                id: instance.id.to_string(),
            });
        }
        table.insert(instance.id, instance);
        Ok(())
    }

    async fn list(&self, query: &InstanceQuery) -> StoreResult<Vec<WorkflowInstance>> {
        let table = self.instances.read().map_err(|_| Self::lock_poisoned())?;
        let mut results: Vec<WorkflowInstance> = table
            .values()
            .filter(|i| query.definition_id.is_none_or(|d| i.definition_id == d))
            .filter(|i| {
                query
                    .current_state
                    .as_ref()
                    .is_none_or(|s| &i.current_state == s)
            })
            .filter(|i| {
                query.document_id.as_ref().is_none_or(|doc| {
                    i.document
                        .as_ref()
                        .is_some_and(|d| &d.document_id == doc)
                })
            })
            .filter(|i| query.partition.as_ref().is_none_or(|p| &i.partition == p))
            .cloned()
            .collect();
        results.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(results)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn head(&self, partition: &str) -> StoreResult<Option<String>> {
        let table = self.audit.lock().map_err(|_| Self::lock_poisoned())?;
        Ok(table.heads.get(partition).cloned())
    }

    async fn append_if_head(&self, event: AuditEvent, expected_head: &str) -> StoreResult<()> {
        let mut table = self.audit.lock().map_err(|_| Self::lock_poisoned())?;

        let current = table
            .heads
            .get(&event.partition)
            .cloned()
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        if current != expected_head {
            return Err(StoreError::HeadConflict {
                partition: event.partition.clone(),
            });
        }

        let partition = event.partition.clone();
        let new_head = event.current_hash.clone();
        table.events.entry(partition.clone()).or_default().push(event);
        table.heads.insert(partition, new_head);
        Ok(())
    }

    async fn find_by_correlation(
        &self,
        partition: &str,
        correlation_id: &str,
    ) -> StoreResult<Option<AuditEvent>> {
        let table = self.audit.lock().map_err(|_| Self::lock_poisoned())?;
        Ok(table
            .events
            .get(partition)
            .and_then(|events| {
                events
                    .iter()
                    .find(|e| e.correlation_id == correlation_id)
            })
            .cloned())
    }

    async fn list_partition(&self, partition: &str) -> StoreResult<Vec<AuditEvent>> {
        let table = self.audit.lock().map_err(|_| Self::lock_poisoned())?;
        Ok(table.events.get(partition).cloned().unwrap_or_default())
    }
}

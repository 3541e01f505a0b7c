//! Storage abstraction for Conclave.
//!
//! The engine consumes a key/attribute store and does not implement
//! one: it needs point lookup by id, listing with a filter, whole-record
//! update, and — for the audit chain only — an atomic append-if-head
//! (compare-and-set) primitive scoped to a partition. Those
//! requirements are captured here as async traits, one per aggregate,
//! plus the [`MemoryStore`] implementation used by the binary and the
//! test suites. A deployment backed by a hosted document/list store
//! implements the same traits.

pub mod error;
pub mod memory;

use async_trait::async_trait;
use serde::Deserialize;

use conclave_core::audit::AuditEvent;
use conclave_core::definition::WorkflowDefinition;
use conclave_core::instance::WorkflowInstance;
use conclave_core::types::{DefinitionId, InstanceId};

pub use error::StoreError;
pub use memory::MemoryStore;

/// Convenience alias for fallible store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Query parameter types
// ---------------------------------------------------------------------------

/// Filter parameters for listing workflow definitions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefinitionQuery {
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub name_contains: Option<String>,
}

/// Filter parameters for listing workflow instances.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceQuery {
    pub definition_id: Option<DefinitionId>,
    pub current_state: Option<String>,
    pub document_id: Option<String>,
    pub partition: Option<String>,
}

// ---------------------------------------------------------------------------
// Repository traits
// ---------------------------------------------------------------------------

/// Persistence for workflow definitions. Definitions are insert-only;
/// deactivation happens by publishing a new version and flipping
/// `is_active` on the old one.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn insert(&self, definition: WorkflowDefinition) -> StoreResult<()>;
    async fn get(&self, id: DefinitionId) -> StoreResult<Option<WorkflowDefinition>>;
    async fn list(&self, query: &DefinitionQuery) -> StoreResult<Vec<WorkflowDefinition>>;
    /// Replace a stored definition (used only to flip `is_active`).
    async fn update(&self, definition: WorkflowDefinition) -> StoreResult<()>;
}

/// Persistence for workflow instances. Instances are never deleted.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn insert(&self, instance: WorkflowInstance) -> StoreResult<()>;
    async fn get(&self, id: InstanceId) -> StoreResult<Option<WorkflowInstance>>;
    async fn update(&self, instance: WorkflowInstance) -> StoreResult<()>;
    async fn list(&self, query: &InstanceQuery) -> StoreResult<Vec<WorkflowInstance>>;
}

/// Persistence for the audit chain.
///
/// `append_if_head` is the single mutual-exclusion boundary in the
/// system: it persists the event and advances the partition head to the
/// event's `current_hash` only if the head still equals
/// `expected_head`, as one atomic step. A losing writer receives
/// [`StoreError::HeadConflict`] and must redo the whole
/// read-compute-write cycle.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Current head hash for a partition, or `None` before any event.
    async fn head(&self, partition: &str) -> StoreResult<Option<String>>;

    /// Atomically persist `event` and advance the head.
    async fn append_if_head(&self, event: AuditEvent, expected_head: &str) -> StoreResult<()>;

    /// Point lookup by idempotency key.
    async fn find_by_correlation(
        &self,
        partition: &str,
        correlation_id: &str,
    ) -> StoreResult<Option<AuditEvent>>;

    /// All events in a partition, unordered.
    async fn list_partition(&self, partition: &str) -> StoreResult<Vec<AuditEvent>>;
}

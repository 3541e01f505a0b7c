//! Audit chain service: idempotent appends and integrity verification.
//!
//! Appends are the only write path that needs mutual exclusion, and the
//! scope is a single partition head: read the head, compute the new
//! hash, write only if the head is unchanged. A losing writer redoes
//! the whole read-compute-write cycle a bounded number of times with
//! exponential backoff before surfacing `Conflict`.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use conclave_core::audit::{self, AuditEvent, ChainVerification, GENESIS_HASH};
use conclave_core::error::CoreError;
use conclave_store::{AuditStore, StoreError};

/// Maximum read-compute-write attempts before giving up with `Conflict`.
const MAX_APPEND_ATTEMPTS: u32 = 4;

/// Base delay for the exponential backoff between attempts.
const BACKOFF_BASE_MS: u64 = 5;

/// One append request. The correlation id is the idempotency key:
/// replaying a request with a correlation id already present in the
/// partition returns the stored event unchanged.
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub partition: String,
    pub action: String,
    pub actor: String,
    pub payload: serde_json::Value,
    pub correlation_id: String,
}

/// Append-only, hash-linked audit log over an [`AuditStore`].
#[derive(Clone)]
pub struct AuditChain {
    store: Arc<dyn AuditStore>,
}

impl AuditChain {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append an event to its partition's chain.
    ///
    /// Idempotent at-most-once semantics: if an event with the same
    /// correlation id already exists in the partition it is returned
    /// unchanged and the chain does not grow. Callers may safely retry
    /// after timeouts.
    pub async fn append(&self, request: AppendRequest) -> Result<AuditEvent, CoreError> {
        if let Some(existing) = self
            .store
            .find_by_correlation(&request.partition, &request.correlation_id)
            .await
            .map_err(store_internal)?
        {
            tracing::debug!(
                partition = %request.partition,
                correlation_id = %request.correlation_id,
                "Replayed audit append, returning stored event"
            );
            return Ok(existing);
        }

        for attempt in 0..MAX_APPEND_ATTEMPTS {
            let head = self
                .store
                .head(&request.partition)
                .await
                .map_err(store_internal)?
                .unwrap_or_else(|| GENESIS_HASH.to_string());

            let timestamp = chrono::Utc::now();
            let current_hash = audit::compute_event_hash(
                &request.action,
                &request.actor,
                &request.correlation_id,
                &request.payload,
                &head,
                &request.partition,
                &timestamp,
            );
            let event = AuditEvent {
                id: uuid::Uuid::new_v4(),
                partition: request.partition.clone(),
                correlation_id: request.correlation_id.clone(),
                action: request.action.clone(),
                actor: request.actor.clone(),
                payload: request.payload.clone(),
                previous_hash: head.clone(),
                current_hash,
                timestamp,
            };

            match self.store.append_if_head(event.clone(), &head).await {
                Ok(()) => return Ok(event),
                Err(StoreError::HeadConflict { .. }) => {
                    // A concurrent writer advanced the head. It may even
                    // have been a retry of this very request.
                    if let Some(existing) = self
                        .store
                        .find_by_correlation(&request.partition, &request.correlation_id)
                        .await
                        .map_err(store_internal)?
                    {
                        return Ok(existing);
                    }
                    let delay = backoff_delay(attempt);
                    tracing::debug!(
                        partition = %request.partition,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Lost audit head race, retrying append"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(other) => return Err(store_internal(other)),
            }
        }

        Err(CoreError::Conflict(format!(
            "could not append to audit partition '{}' after {MAX_APPEND_ATTEMPTS} attempts",
            request.partition
        )))
    }

    /// Verify a partition's chain. Read-only; never mutates or repairs.
    pub async fn verify(&self, partition: &str) -> Result<ChainVerification, CoreError> {
        let events = self
            .store
            .list_partition(partition)
            .await
            .map_err(store_internal)?;
        let head = self
            .store
            .head(partition)
            .await
            .map_err(store_internal)?
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let report = audit::verify_chain(&events, &head);
        if !report.chain_valid {
            tracing::error!(
                partition,
                first_break = ?report.first_break,
                verified_entries = report.verified_entries,
                "Audit chain verification failed"
            );
        }
        Ok(report)
    }

    /// Verify and escalate a broken chain to [`CoreError::IntegrityViolation`].
    pub async fn ensure_intact(&self, partition: &str) -> Result<ChainVerification, CoreError> {
        let report = self.verify(partition).await?;
        if report.chain_valid {
            Ok(report)
        } else {
            Err(CoreError::IntegrityViolation {
                partition: partition.to_string(),
                message: match report.first_break {
                    Some(id) => format!("hash mismatch at event {id}"),
                    None => "recorded head does not match any event".to_string(),
                },
            })
        }
    }

    /// Look up an event by its idempotency key.
    pub async fn find_by_correlation(
        &self,
        partition: &str,
        correlation_id: &str,
    ) -> Result<Option<AuditEvent>, CoreError> {
        self.store
            .find_by_correlation(partition, correlation_id)
            .await
            .map_err(store_internal)
    }

    /// All events in a partition ordered by timestamp, oldest first.
    pub async fn list(&self, partition: &str) -> Result<Vec<AuditEvent>, CoreError> {
        let mut events = self
            .store
            .list_partition(partition)
            .await
            .map_err(store_internal)?;
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(events)
    }
}

/// Exponential backoff with a little jitter to de-synchronise retrying
/// writers.
fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS * (1 << attempt);
    let jitter = rand::rng().random_range(0..BACKOFF_BASE_MS);
    Duration::from_millis(base + jitter)
}

/// Store failures that are not head conflicts are internal errors.
fn store_internal(err: StoreError) -> CoreError {
    CoreError::Internal(err.to_string())
}

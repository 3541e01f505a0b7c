//! Audit chain event model, hash computation, and verification.
//!
//! Every state change in the engine is durable only once an audit event
//! has been appended and chain-linked. Events are immutable; each
//! carries the hash of its predecessor so the chain is tamper-evident.
//! Verification is pure — it takes a slice of events plus the recorded
//! head and reports the first break, if any. Storage and retry live in
//! the engine crate.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::hashing::{canonical_json, sha256_hex};
use crate::types::{EventId, Timestamp};

/// Head value of an empty chain: 64 zero characters (the width of a
/// SHA-256 hex digest).
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// ---------------------------------------------------------------------------
// Action name constants
// ---------------------------------------------------------------------------

/// Well-known audit action names emitted by the engine.
pub mod actions {
    pub const DEFINITION_CREATED: &str = "definition.created";
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    pub const WORKFLOW_TRANSITIONED: &str = "workflow.transitioned";
    pub const WORKFLOW_FIELDS_UPDATED: &str = "workflow.fields_updated";
    pub const VOTE_OPENED: &str = "vote.opened";
    pub const VOTE_CAST: &str = "vote.cast";
    pub const VOTE_FAILED: &str = "vote.failed";
}

// ---------------------------------------------------------------------------
// Event model
// ---------------------------------------------------------------------------

/// A single audit chain entry. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: EventId,
    /// Logical namespace for one chain (one per governance domain).
    pub partition: String,
    /// Caller-supplied idempotency key, unique within the partition.
    pub correlation_id: String,
    /// Dot-separated action name, e.g. `"workflow.transitioned"`.
    pub action: String,
    /// Id of the actor that performed the action.
    pub actor: String,
    /// Free-form JSON payload carrying action-specific data.
    pub payload: serde_json::Value,
    /// `current_hash` of the predecessor, or [`GENESIS_HASH`].
    pub previous_hash: String,
    /// SHA-256 over this event's canonical fields.
    pub current_hash: String,
    pub timestamp: Timestamp,
}

/// Render a timestamp the way it is hashed: RFC 3339 UTC with
/// microsecond precision. Changing this breaks every existing chain.
fn canonical_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Compute the hash of an event from its canonical fields.
///
/// The canonical form is a key-sorted compact JSON object over exactly
/// the fields that define the event's identity in the chain. The event
/// id is deliberately excluded so a replayed append can return a
/// previously stored event without a hash mismatch.
pub fn compute_event_hash(
    action: &str,
    actor: &str,
    correlation_id: &str,
    payload: &serde_json::Value,
    previous_hash: &str,
    partition: &str,
    timestamp: &Timestamp,
) -> String {
    let canonical = canonical_json(&json!({
        "action": action,
        "actor": actor,
        "correlation_id": correlation_id,
        "partition": partition,
        "payload": payload,
        "previous_hash": previous_hash,
        "timestamp": canonical_timestamp(timestamp),
    }));
    sha256_hex(canonical.as_bytes())
}

impl AuditEvent {
    /// Recompute this event's hash from its own fields.
    pub fn expected_hash(&self) -> String {
        compute_event_hash(
            &self.action,
            &self.actor,
            &self.correlation_id,
            &self.payload,
            &self.previous_hash,
            &self.partition,
            &self.timestamp,
        )
    }
}

// ---------------------------------------------------------------------------
// Chain verification
// ---------------------------------------------------------------------------

/// Result of verifying a partition's chain.
#[derive(Debug, Clone, Serialize)]
pub struct ChainVerification {
    /// Number of events checked before stopping.
    pub verified_entries: usize,
    /// Whether the entire chain is valid.
    pub chain_valid: bool,
    /// Id of the first event where the chain breaks, if any.
    pub first_break: Option<EventId>,
}

impl ChainVerification {
    fn valid(verified_entries: usize) -> Self {
        Self {
            verified_entries,
            chain_valid: true,
            first_break: None,
        }
    }

    fn broken(verified_entries: usize, event: &AuditEvent) -> Self {
        Self {
            verified_entries,
            chain_valid: false,
            first_break: Some(event.id),
        }
    }
}

/// Verify a partition's chain against its recorded head.
///
/// Sorts the events by timestamp and walks backward from the most
/// recent: the newest event must match the head, every event's stored
/// hash must equal the hash recomputed from its own fields, every
/// `previous_hash` must equal the predecessor's `current_hash`, and the
/// oldest event must link to [`GENESIS_HASH`]. Stops at the first
/// mismatch. An empty chain is valid iff the head is the genesis value.
pub fn verify_chain(events: &[AuditEvent], head: &str) -> ChainVerification {
    if events.is_empty() {
        return ChainVerification {
            verified_entries: 0,
            chain_valid: head == GENESIS_HASH,
            first_break: None,
        };
    }

    let mut ordered: Vec<&AuditEvent> = events.iter().collect();
    ordered.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.current_hash.cmp(&b.current_hash))
    });

    let mut checked = 0;
    let mut expected = head.to_string();

    for (idx, event) in ordered.iter().enumerate().rev() {
        if event.current_hash != expected {
            return ChainVerification::broken(checked, event);
        }
        if event.expected_hash() != event.current_hash {
            return ChainVerification::broken(checked, event);
        }
        checked += 1;

        // What the immediately preceding event's hash must have been.
        expected = event.previous_hash.clone();
        if idx == 0 && expected != GENESIS_HASH {
            return ChainVerification::broken(checked, event);
        }
    }

    ChainVerification::valid(checked)
}

//! Workflow instance model — one running case.
//!
//! Instances are mutated only through the engine (transition execution,
//! field updates, vote casting) and are never hard-deleted: a final
//! state stops further transitions but the record persists for the
//! definition's retention period. History is not stored here — it is
//! derived from the audit chain events scoped to the instance.

use serde::{Deserialize, Serialize};

use crate::types::{DefinitionId, InstanceId, Timestamp};
use crate::voting::VoteRecord;

/// Reference to the document a case is bound to, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    pub document_id: String,
    #[serde(default)]
    pub document_type: Option<String>,
}

/// A vote gate opened by a vote-gated transition attempt. Cleared when
/// quorum resolves either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingVote {
    pub transition_id: String,
    /// Fixed voter population captured when the gate opened.
    pub eligible_voters: u32,
    /// Actor that attempted the transition.
    pub opened_by: String,
    pub opened_at: Timestamp,
    /// Comment supplied with the original transition attempt, replayed
    /// when quorum passes and the transition completes.
    #[serde(default)]
    pub comment: Option<String>,
}

/// One running workflow case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: InstanceId,
    pub definition_id: DefinitionId,
    /// Audit partition, copied from the definition at start.
    pub partition: String,
    pub current_state: String,
    pub field_values: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub document: Option<DocumentRef>,
    #[serde(default)]
    pub assigned_committee: Option<String>,
    /// Append-only; one record per (transition, voter), overwritten on
    /// re-vote.
    #[serde(default)]
    pub vote_records: Vec<VoteRecord>,
    #[serde(default)]
    pub pending_vote: Option<PendingVote>,
    /// When the current state was entered; SLA clocks run from here.
    pub entered_state_at: Timestamp,
    /// SLA warning already emitted for this state entry.
    #[serde(default)]
    pub sla_warning_sent: bool,
    /// SLA escalation already emitted for this state entry.
    #[serde(default)]
    pub sla_escalation_sent: bool,
    /// Automation ids already fired for this state entry.
    #[serde(default)]
    pub fired_automations: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WorkflowInstance {
    /// Record entry into a new state, resetting per-entry SLA and
    /// automation bookkeeping.
    pub fn enter_state(&mut self, state_id: &str, now: Timestamp) {
        self.current_state = state_id.to_string();
        self.entered_state_at = now;
        self.sla_warning_sent = false;
        self.sla_escalation_sent = false;
        self.fired_automations.clear();
        self.updated_at = now;
    }

    /// Upsert a ballot: a second vote from the same voter on the same
    /// transition overwrites rather than duplicates.
    ///
    /// Returns the ballot's revision — 1 for a first ballot,
    /// incremented when a re-vote changes the choice or comment, and
    /// unchanged for an identical re-cast (a client retry), which is
    /// also left untouched in the record.
    pub fn record_vote(&mut self, mut record: VoteRecord) -> u32 {
        if let Some(existing) = self
            .vote_records
            .iter_mut()
            .find(|r| r.transition_id == record.transition_id && r.voter_id == record.voter_id)
        {
            if existing.vote == record.vote && existing.comment == record.comment {
                return existing.revision;
            }
            record.revision = existing.revision + 1;
            *existing = record;
            existing.revision
        } else {
            record.revision = 1;
            self.vote_records.push(record);
            1
        }
    }
}

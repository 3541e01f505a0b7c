//! Shared test fixtures for the engine integration tests.

use std::sync::Arc;

use conclave_core::definition::{
    AssignmentRule, DefinitionSettings, SideEffect, State, StateSla, Transition, VoteType,
};
use conclave_core::fields::{FieldSchema, FieldType};
use conclave_core::types::ActorContext;
use conclave_engine::{
    AuditChain, DefaultVoterAuthorizer, DefinitionDraft, SideEffectRunner, WorkflowEngine,
};
use conclave_events::{NullDispatcher, NullDocumentCollaborator};
use conclave_store::MemoryStore;

/// Engine wired to a fresh in-memory store with null collaborators.
pub struct TestHarness {
    pub engine: WorkflowEngine,
    pub store: Arc<MemoryStore>,
}

pub fn harness() -> TestHarness {
    let store = Arc::new(MemoryStore::new());
    let chain = AuditChain::new(store.clone());
    let effects = SideEffectRunner::new(
        Arc::new(NullDispatcher),
        Arc::new(NullDocumentCollaborator),
    );
    let engine = WorkflowEngine::new(
        store.clone(),
        store.clone(),
        chain,
        effects,
        Arc::new(DefaultVoterAuthorizer),
    );
    TestHarness { engine, store }
}

pub fn state(id: &str, is_initial: bool, is_final: bool) -> State {
    State {
        id: id.to_string(),
        label: id.to_string(),
        is_initial,
        is_final,
        allowed_actions: Vec::new(),
        sla: None,
        on_enter: Vec::new(),
    }
}

pub fn transition(id: &str, from: &str, to: &str) -> Transition {
    Transition {
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        required_roles: Vec::new(),
        requires_comment: false,
        vote_type: None,
        requires_attachments: false,
        min_attachments: 0,
        confirmation_message: None,
        actions: Vec::new(),
    }
}

/// A document approval process: draft -> pending-review -> approved or
/// rejected. Submitting is open to anyone; approving and rejecting need
/// the Board role plus a comment.
pub fn doc_approval_draft() -> DefinitionDraft {
    let mut approve = transition("approve", "pending-review", "approved");
    approve.required_roles = vec!["Board".to_string()];
    approve.requires_comment = true;

    let mut reject = transition("reject", "pending-review", "rejected");
    reject.required_roles = vec!["Board".to_string()];
    reject.requires_comment = true;

    DefinitionDraft {
        name: "Document Approval".to_string(),
        category: Some("policies".to_string()),
        version: 1,
        states: vec![
            state("draft", true, false),
            state("pending-review", false, false),
            state("approved", false, true),
            state("rejected", false, true),
        ],
        transitions: vec![transition("submit", "draft", "pending-review"), approve, reject],
        fields: vec![FieldSchema {
            name: "title".to_string(),
            field_type: FieldType::Text,
            required: true,
            max_length: Some(200),
            editable_in: vec!["draft".to_string()],
            required_in: Vec::new(),
        }],
        assignment_rules: vec![AssignmentRule {
            priority: 10,
            document_types: vec!["policy".to_string()],
            categories: Vec::new(),
            committees: Vec::new(),
            tags: Vec::new(),
        }],
        automations: Vec::new(),
        settings: DefinitionSettings::default(),
    }
}

/// Same shape with a simple-majority vote gate on the approve edge.
pub fn voted_approval_draft() -> DefinitionDraft {
    let mut draft = doc_approval_draft();
    let approve = draft
        .transitions
        .iter_mut()
        .find(|t| t.id == "approve")
        .unwrap();
    approve.vote_type = Some(VoteType::SimpleMajority);
    approve.requires_comment = false;
    draft
}

/// Definition whose single working state carries a tight SLA and an
/// automation.
pub fn sla_draft() -> DefinitionDraft {
    let mut open = state("open", true, false);
    open.sla = Some(StateSla {
        max_duration_secs: 60,
        warning_at_secs: 30,
        escalate_to: Some("Chair".to_string()),
    });
    DefinitionDraft {
        name: "Timed Review".to_string(),
        category: Some("reviews".to_string()),
        version: 1,
        states: vec![open, state("closed", false, true)],
        transitions: vec![transition("close", "open", "closed")],
        fields: Vec::new(),
        assignment_rules: Vec::new(),
        automations: vec![conclave_core::definition::Automation {
            id: "nudge".to_string(),
            state_id: "open".to_string(),
            after_secs: 10,
            effect: SideEffect::AuditLog {
                action: "review.nudged".to_string(),
            },
        }],
        settings: DefinitionSettings::default(),
    }
}

pub fn clerk() -> ActorContext {
    ActorContext::new("clerk-1").with_roles(["Clerk"])
}

pub fn board_member(id: &str) -> ActorContext {
    ActorContext::new(id).with_roles(["Board"])
}

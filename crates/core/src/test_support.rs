//! Shared builders for unit tests in this crate.

use chrono::Utc;

use crate::definition::{State, Transition, WorkflowDefinition};

pub fn simple_state(id: &str, is_initial: bool, is_final: bool) -> State {
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

pub fn definition_builder(
    states: Vec<State>,
    transitions: Vec<Transition>,
) -> WorkflowDefinition {
    WorkflowDefinition {
        id: uuid::Uuid::new_v4(),
        name: "Test definition".to_string(),
        category: Some("meetings".to_string()),
        version: 1,
        is_active: true,
        created_at: Utc::now(),
        states,
        transitions,
        fields: Vec::new(),
        assignment_rules: Vec::new(),
        automations: Vec::new(),
        settings: Default::default(),
    }
}

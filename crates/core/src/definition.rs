//! Workflow definition model and validation.
//!
//! A [`WorkflowDefinition`] is a declarative template for one approval
//! process: states, guarded transitions, custom fields, assignment
//! rules, automations, and settings. Definitions are immutable once
//! published; behaviour changes mean a new version. Validation collects
//! every violation it finds so an authoring UI can report all problems
//! in one round trip.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::fields::FieldSchema;
use crate::types::{DefinitionId, Recipients, Timestamp};

// ---------------------------------------------------------------------------
// Side effects
// ---------------------------------------------------------------------------

/// A declared side effect, dispatched to external collaborators when a
/// state is entered or a transition's actions run. The engine interprets
/// the declaration; it never executes delivery itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    /// Send a notification to the given recipients.
    Notify {
        recipients: Recipients,
        message: String,
    },
    /// Append a free-form audit event to the instance's partition.
    AuditLog { action: String },
    /// Ask the document collaborator to move the linked document.
    DocumentMove { target_state: String },
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// SLA declared on a state. Durations are in seconds of wall-clock time
/// spent in the state since the most recent entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSla {
    /// Hard limit; at or past this the state is breached.
    pub max_duration_secs: i64,
    /// Soft limit; at or past this a warning is due.
    pub warning_at_secs: i64,
    /// Role to notify on breach. `None` disables escalation.
    pub escalate_to: Option<String>,
}

/// One state in a workflow's state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// Stable id referenced by transitions (e.g. `"pending-review"`).
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Exactly one state per definition has this set.
    #[serde(default)]
    pub is_initial: bool,
    /// Terminal states stop further transitions; the record persists.
    #[serde(default)]
    pub is_final: bool,
    /// Free-form action names surfaced to UIs while in this state.
    #[serde(default)]
    pub allowed_actions: Vec<String>,
    #[serde(default)]
    pub sla: Option<StateSla>,
    /// Side effects dispatched when the state is entered.
    #[serde(default)]
    pub on_enter: Vec<SideEffect>,
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Vote-counting policy for a vote-gated transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoteType {
    SimpleMajority,
    SuperMajority,
    Unanimous,
}

/// A guarded edge between two states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// Stable id callers use to execute the transition (e.g. `"approve"`).
    pub id: String,
    /// Source state id.
    pub from: String,
    /// Target state id.
    pub to: String,
    /// Roles allowed to execute. Empty = any authenticated actor.
    #[serde(default)]
    pub required_roles: Vec<String>,
    #[serde(default)]
    pub requires_comment: bool,
    /// `Some` makes the transition vote-gated with the given policy.
    #[serde(default)]
    pub vote_type: Option<VoteType>,
    #[serde(default)]
    pub requires_attachments: bool,
    /// Minimum attachment count when `requires_attachments` is set.
    #[serde(default)]
    pub min_attachments: u32,
    /// Optional confirmation prompt surfaced to UIs before execution.
    #[serde(default)]
    pub confirmation_message: Option<String>,
    /// Side effects dispatched when the transition completes.
    #[serde(default)]
    pub actions: Vec<SideEffect>,
}

// ---------------------------------------------------------------------------
// Assignment rules & automations
// ---------------------------------------------------------------------------

/// A ranked matcher used by the assignment router. A rule matches a
/// routing context when every non-empty predicate field intersects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRule {
    /// Higher priority wins; ties broken by definition creation order.
    pub priority: i32,
    #[serde(default)]
    pub document_types: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub committees: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A time-based trigger bound to a state: fire `effect` once per state
/// entry after `after_secs` in the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub id: String,
    pub state_id: String,
    pub after_secs: i64,
    pub effect: SideEffect,
}

/// Access gates and housekeeping settings for a definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionSettings {
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub allowed_committees: Vec<String>,
    /// Compliance retention period for closed instances.
    #[serde(default)]
    pub retention_days: Option<i32>,
    /// Storage location identifier for linked documents.
    #[serde(default)]
    pub storage_location: Option<String>,
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// Immutable-once-published template for one approval process type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: DefinitionId,
    pub name: String,
    /// Governance domain; doubles as the audit partition key.
    #[serde(default)]
    pub category: Option<String>,
    pub version: u32,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub assignment_rules: Vec<AssignmentRule>,
    #[serde(default)]
    pub automations: Vec<Automation>,
    #[serde(default)]
    pub settings: DefinitionSettings,
}

impl WorkflowDefinition {
    /// The single initial state. Only valid on a validated definition.
    pub fn initial_state(&self) -> Option<&State> {
        self.states.iter().find(|s| s.is_initial)
    }

    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.iter().find(|s| s.id == id)
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id == id)
    }

    /// All transitions leaving the given state. This is the state
    /// machine's only form of "what can happen next" — there is no
    /// implicit wildcard transition.
    pub fn transitions_from<'a>(&'a self, state_id: &'a str) -> impl Iterator<Item = &'a Transition> {
        self.transitions.iter().filter(move |t| t.from == state_id)
    }

    /// Audit partition for instances of this definition.
    pub fn partition(&self) -> String {
        self.category
            .clone()
            .unwrap_or_else(|| crate::types::DEFAULT_PARTITION.to_string())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a definition's structural invariants, collecting every
/// violation found.
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), CoreError> {
    let mut errors = Vec::new();

    if def.name.trim().is_empty() {
        errors.push("definition name must not be empty".to_string());
    }

    if def.states.is_empty() {
        errors.push("definition must declare at least one state".to_string());
    }

    let initial_count = def.states.iter().filter(|s| s.is_initial).count();
    if !def.states.is_empty() && initial_count != 1 {
        errors.push(format!(
            "definition must declare exactly one initial state, found {initial_count}"
        ));
    }

    let mut state_ids: HashSet<&str> = HashSet::new();
    for state in &def.states {
        if !state_ids.insert(&state.id) {
            errors.push(format!("duplicate state id '{}'", state.id));
        }
        if let Some(sla) = &state.sla {
            if sla.warning_at_secs > sla.max_duration_secs {
                errors.push(format!(
                    "state '{}': SLA warning_at ({}s) must not exceed max_duration ({}s)",
                    state.id, sla.warning_at_secs, sla.max_duration_secs
                ));
            }
        }
    }

    let mut transition_ids: HashSet<&str> = HashSet::new();
    for transition in &def.transitions {
        if !transition_ids.insert(&transition.id) {
            errors.push(format!("duplicate transition id '{}'", transition.id));
        }
        if !state_ids.contains(transition.from.as_str()) {
            errors.push(format!(
                "transition '{}' references unknown source state '{}'",
                transition.id, transition.from
            ));
        }
        if !state_ids.contains(transition.to.as_str()) {
            errors.push(format!(
                "transition '{}' references unknown target state '{}'",
                transition.id, transition.to
            ));
        }
        if transition.requires_attachments && transition.min_attachments == 0 {
            errors.push(format!(
                "transition '{}' requires attachments but declares min_attachments = 0",
                transition.id
            ));
        }
    }

    // Orphan check: every non-initial state must be reachable from the
    // initial state through declared transitions.
    if initial_count == 1 {
        let reachable = reachable_states(def);
        for state in &def.states {
            if !state.is_initial && !reachable.contains(state.id.as_str()) {
                errors.push(format!(
                    "state '{}' is unreachable from the initial state",
                    state.id
                ));
            }
        }
    }

    for field in &def.fields {
        for state_id in field.editable_in.iter().chain(field.required_in.iter()) {
            if !state_ids.contains(state_id.as_str()) {
                errors.push(format!(
                    "field '{}' references unknown state '{state_id}'",
                    field.name
                ));
            }
        }
    }

    for automation in &def.automations {
        if !state_ids.contains(automation.state_id.as_str()) {
            errors.push(format!(
                "automation '{}' references unknown state '{}'",
                automation.id, automation.state_id
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation { errors })
    }
}

/// Breadth-first reachability from the initial state.
fn reachable_states(def: &WorkflowDefinition) -> HashSet<&str> {
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for t in &def.transitions {
        edges.entry(t.from.as_str()).or_default().push(t.to.as_str());
    }

    let mut reachable: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    if let Some(initial) = def.initial_state() {
        reachable.insert(initial.id.as_str());
        queue.push_back(initial.id.as_str());
    }
    while let Some(current) = queue.pop_front() {
        for next in edges.get(current).into_iter().flatten() {
            if reachable.insert(next) {
                queue.push_back(next);
            }
        }
    }
    reachable
}

//! Workflow definition lifecycle and the instance engine.
//!
//! All mutations flow through here: a transition is considered durable
//! only once its audit event has been appended and chain-linked, so the
//! audit append happens before the instance record is updated. Retried
//! calls reuse the same correlation id and therefore cannot
//! double-transition or double-log.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use conclave_core::audit::{actions, AuditEvent};
use conclave_core::definition::{
    validate_definition, AssignmentRule, Automation, DefinitionSettings, State, Transition,
    WorkflowDefinition,
};
use conclave_core::error::{CoreError, GuardKind};
use conclave_core::fields::{missing_required_fields, FieldSchema};
use conclave_core::instance::{DocumentRef, PendingVote, WorkflowInstance};
use conclave_core::types::{ActorContext, DefinitionId, InstanceId};
use conclave_store::{
    DefinitionQuery, DefinitionStore, InstanceQuery, InstanceStore, StoreError,
};

use crate::chain::{AppendRequest, AuditChain};
use crate::effects::SideEffectRunner;
use crate::voting::VoterAuthorizer;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// DTO for creating a workflow definition. The engine assigns the id
/// and creation timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionDraft {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
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

fn default_version() -> u32 {
    1
}

/// Parameters for starting a workflow instance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub initial_field_values: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub document: Option<DocumentRef>,
    #[serde(default)]
    pub assigned_committee: Option<String>,
    /// Idempotency token; derived from the new instance id when absent.
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// Parameters for executing a transition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteOptions {
    #[serde(default)]
    pub comment: Option<String>,
    /// Number of attachments the caller has supplied for the guard.
    #[serde(default)]
    pub attachment_count: u32,
    /// Field updates merged on success, validated against the source
    /// state's editable set.
    #[serde(default)]
    pub field_updates: serde_json::Map<String, serde_json::Value>,
    /// Idempotency token; derived from (instance, transition, actor,
    /// timestamp) when absent.
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Eligible voter population, required when this call opens a vote
    /// gate. Fixed for the lifetime of the vote.
    #[serde(default)]
    pub eligible_voters: Option<u32>,
}

/// Result of a transition attempt.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// Guards passed and the state changed.
    Completed(WorkflowInstance),
    /// The transition is vote-gated; a pending vote is registered and
    /// the state is unchanged.
    AwaitingVotes(WorkflowInstance),
}

impl TransitionOutcome {
    pub fn instance(&self) -> &WorkflowInstance {
        match self {
            TransitionOutcome::Completed(i) | TransitionOutcome::AwaitingVotes(i) => i,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The workflow engine facade: definition lifecycle plus the per-case
/// instance engine.
#[derive(Clone)]
pub struct WorkflowEngine {
    pub(crate) definitions: Arc<dyn DefinitionStore>,
    pub(crate) instances: Arc<dyn InstanceStore>,
    pub(crate) chain: AuditChain,
    pub(crate) effects: SideEffectRunner,
    pub(crate) voter_authorizer: Arc<dyn VoterAuthorizer>,
}

impl WorkflowEngine {
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        instances: Arc<dyn InstanceStore>,
        chain: AuditChain,
        effects: SideEffectRunner,
        voter_authorizer: Arc<dyn VoterAuthorizer>,
    ) -> Self {
        Self {
            definitions,
            instances,
            chain,
            effects,
            voter_authorizer,
        }
    }

    /// Direct access to the audit chain (verification endpoints).
    pub fn chain(&self) -> &AuditChain {
        &self.chain
    }

    // -----------------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------------

    /// Validate and persist a new workflow definition.
    ///
    /// Rejects with a [`CoreError::Validation`] listing every violation
    /// found, not just the first.
    pub async fn create_definition(
        &self,
        draft: DefinitionDraft,
        actor: &ActorContext,
    ) -> Result<WorkflowDefinition, CoreError> {
        let definition = WorkflowDefinition {
            id: uuid::Uuid::new_v4(),
            name: draft.name,
            category: draft.category,
            version: draft.version,
            is_active: true,
            created_at: chrono::Utc::now(),
            states: draft.states,
            transitions: draft.transitions,
            fields: draft.fields,
            assignment_rules: draft.assignment_rules,
            automations: draft.automations,
            settings: draft.settings,
        };
        validate_definition(&definition)?;

        self.definitions
            .insert(definition.clone())
            .await
            .map_err(map_store_error)?;

        self.chain
            .append(AppendRequest {
                partition: definition.partition(),
                action: actions::DEFINITION_CREATED.to_string(),
                actor: actor.id.clone(),
                payload: json!({
                    "definition_id": definition.id,
                    "name": definition.name,
                    "version": definition.version,
                }),
                correlation_id: format!("def:{}:created", definition.id),
            })
            .await?;

        tracing::info!(
            definition_id = %definition.id,
            name = %definition.name,
            "Created workflow definition"
        );
        Ok(definition)
    }

    pub async fn get_definition(
        &self,
        id: DefinitionId,
    ) -> Result<WorkflowDefinition, CoreError> {
        self.definitions
            .get(id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| CoreError::not_found("workflow_definition", id))
    }

    pub async fn list_definitions(
        &self,
        query: &DefinitionQuery,
    ) -> Result<Vec<WorkflowDefinition>, CoreError> {
        self.definitions.list(query).await.map_err(map_store_error)
    }

    /// Flip a definition's active flag. Published definitions are
    /// otherwise immutable; replacing behaviour means a new version.
    pub async fn set_definition_active(
        &self,
        id: DefinitionId,
        is_active: bool,
    ) -> Result<WorkflowDefinition, CoreError> {
        let mut definition = self.get_definition(id).await?;
        definition.is_active = is_active;
        self.definitions
            .update(definition.clone())
            .await
            .map_err(map_store_error)?;
        Ok(definition)
    }

    // -----------------------------------------------------------------------
    // Instances
    // -----------------------------------------------------------------------

    /// Start a new instance of a definition in its initial state.
    pub async fn start_workflow(
        &self,
        definition_id: DefinitionId,
        request: StartRequest,
        actor: &ActorContext,
    ) -> Result<WorkflowInstance, CoreError> {
        let definition = self.get_definition(definition_id).await?;
        if !definition.is_active {
            return Err(CoreError::validation(format!(
                "definition '{}' is not active",
                definition.name
            )));
        }
        check_access_gates(&definition, actor)?;

        let initial = definition
            .initial_state()
            .ok_or_else(|| CoreError::Internal("definition has no initial state".into()))?;

        // Supplied values must belong to the schema and type-check.
        let mut errors = Vec::new();
        for (name, value) in &request.initial_field_values {
            match definition.fields.iter().find(|f| &f.name == name) {
                Some(schema) => {
                    if let Err(e) = schema.validate_value(value) {
                        errors.push(e);
                    }
                }
                None => errors.push(format!("unknown field '{name}'")),
            }
        }
        for missing in
            missing_required_fields(&definition, &initial.id, &request.initial_field_values)
        {
            errors.push(format!("required field '{missing}' is missing"));
        }
        if !errors.is_empty() {
            return Err(CoreError::Validation { errors });
        }

        let now = chrono::Utc::now();
        let instance = WorkflowInstance {
            id: uuid::Uuid::new_v4(),
            definition_id,
            partition: definition.partition(),
            current_state: initial.id.clone(),
            field_values: request.initial_field_values,
            document: request.document,
            assigned_committee: request.assigned_committee,
            vote_records: Vec::new(),
            pending_vote: None,
            entered_state_at: now,
            sla_warning_sent: false,
            sla_escalation_sent: false,
            fired_automations: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let event = self
            .chain
            .append(AppendRequest {
                partition: instance.partition.clone(),
                action: actions::WORKFLOW_STARTED.to_string(),
                actor: actor.id.clone(),
                payload: json!({
                    "instance_id": instance.id,
                    "definition_id": definition_id,
                    "state": instance.current_state,
                }),
                correlation_id: request
                    .correlation_id
                    .unwrap_or_else(|| format!("wf:{}:started", instance.id)),
            })
            .await?;

        // A replayed append means a prior call with this correlation id
        // already committed a start. Return that instance instead of
        // inserting a second one with no chained event of its own.
        let chained_id = event
            .payload
            .get("instance_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<InstanceId>().ok());
        if let Some(existing_id) = chained_id.filter(|id| *id != instance.id) {
            tracing::debug!(
                instance_id = %existing_id,
                definition_id = %definition_id,
                "Replayed workflow start, returning existing instance"
            );
            return self.get_instance(existing_id).await;
        }

        self.instances
            .insert(instance.clone())
            .await
            .map_err(map_store_error)?;

        self.effects
            .run(&self.chain, &instance, &actor.id, &initial.on_enter)
            .await;

        tracing::info!(
            instance_id = %instance.id,
            definition_id = %definition_id,
            state = %instance.current_state,
            "Started workflow instance"
        );
        Ok(instance)
    }

    pub async fn get_instance(&self, id: InstanceId) -> Result<WorkflowInstance, CoreError> {
        self.instances
            .get(id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| CoreError::not_found("workflow_instance", id))
    }

    pub async fn list_instances(
        &self,
        query: &InstanceQuery,
    ) -> Result<Vec<WorkflowInstance>, CoreError> {
        self.instances.list(query).await.map_err(map_store_error)
    }

    /// All transitions available from the instance's current state.
    ///
    /// Final states list nothing; there is no implicit wildcard
    /// transition.
    pub async fn list_available_transitions(
        &self,
        instance_id: InstanceId,
    ) -> Result<Vec<Transition>, CoreError> {
        let instance = self.get_instance(instance_id).await?;
        let definition = self.get_definition(instance.definition_id).await?;

        let current = definition
            .state(&instance.current_state)
            .ok_or_else(|| CoreError::Internal("instance in undeclared state".into()))?;
        if current.is_final {
            return Ok(Vec::new());
        }
        Ok(definition
            .transitions_from(&instance.current_state)
            .cloned()
            .collect())
    }

    /// Execute a transition against an instance.
    ///
    /// Guard order: role, comment, attachments, vote gate — short-
    /// circuiting on the first failure. A vote-gated transition
    /// registers a pending vote and returns
    /// [`TransitionOutcome::AwaitingVotes`] without changing state.
    pub async fn execute_transition(
        &self,
        instance_id: InstanceId,
        transition_id: &str,
        actor: &ActorContext,
        options: ExecuteOptions,
    ) -> Result<TransitionOutcome, CoreError> {
        let mut instance = self.get_instance(instance_id).await?;
        let definition = self.get_definition(instance.definition_id).await?;

        // A retry of an already-committed transition returns the prior
        // result, not an error: once the state moved, the from-state
        // filter below would otherwise report NotFound.
        if let Some(correlation_id) = &options.correlation_id {
            if let Some(event) = self
                .chain
                .find_by_correlation(&instance.partition, correlation_id)
                .await?
            {
                if event.action == actions::WORKFLOW_TRANSITIONED
                    && event.payload["instance_id"] == json!(instance.id)
                    && event.payload["transition_id"] == json!(transition_id)
                {
                    tracing::debug!(
                        instance_id = %instance.id,
                        transition_id,
                        "Replayed transition, returning committed instance"
                    );
                    return Ok(TransitionOutcome::Completed(instance));
                }
            }
        }

        let transition = definition
            .transition(transition_id)
            .filter(|t| t.from == instance.current_state)
            .ok_or_else(|| CoreError::not_found("transition", transition_id))?
            .clone();

        // Guard 1: roles.
        if !actor.has_any_role(&transition.required_roles) {
            return Err(CoreError::Forbidden(format!(
                "transition '{}' requires one of roles: {}",
                transition.id,
                transition.required_roles.join(", ")
            )));
        }

        // Guard 2: comment.
        if transition.requires_comment
            && options
                .comment
                .as_ref()
                .is_none_or(|c| c.trim().is_empty())
        {
            return Err(CoreError::GuardFailed {
                guard: GuardKind::Comment,
                message: format!("transition '{}' requires a comment", transition.id),
            });
        }

        // Guard 3: attachments.
        if transition.requires_attachments && options.attachment_count < transition.min_attachments
        {
            return Err(CoreError::GuardFailed {
                guard: GuardKind::Attachments,
                message: format!(
                    "transition '{}' requires at least {} attachment(s), got {}",
                    transition.id, transition.min_attachments, options.attachment_count
                ),
            });
        }

        // Guard 4: vote gate. Registering the gate does not change the
        // instance's state; quorum resolution completes the transition
        // later via `cast_vote`.
        if transition.vote_type.is_some() {
            if let Some(pending) = &instance.pending_vote {
                if pending.transition_id == transition.id {
                    // Idempotent: the gate is already open.
                    return Ok(TransitionOutcome::AwaitingVotes(instance));
                }
                return Err(CoreError::GuardFailed {
                    guard: GuardKind::Vote,
                    message: format!(
                        "another vote is already open for transition '{}'",
                        pending.transition_id
                    ),
                });
            }

            let eligible_voters = options.eligible_voters.ok_or_else(|| {
                CoreError::validation(
                    "eligible_voters is required to open a vote-gated transition",
                )
            })?;
            if eligible_voters == 0 {
                return Err(CoreError::validation("eligible_voters must be positive"));
            }

            let now = chrono::Utc::now();
            instance.pending_vote = Some(PendingVote {
                transition_id: transition.id.clone(),
                eligible_voters,
                opened_by: actor.id.clone(),
                opened_at: now,
                comment: options.comment.clone(),
            });
            instance.updated_at = now;

            self.chain
                .append(AppendRequest {
                    partition: instance.partition.clone(),
                    action: actions::VOTE_OPENED.to_string(),
                    actor: actor.id.clone(),
                    payload: json!({
                        "instance_id": instance.id,
                        "transition_id": transition.id,
                        "eligible_voters": eligible_voters,
                    }),
                    correlation_id: options.correlation_id.unwrap_or_else(|| {
                        format!("wf:{}:{}:vote-opened", instance.id, transition.id)
                    }),
                })
                .await?;

            self.instances
                .update(instance.clone())
                .await
                .map_err(map_store_error)?;

            tracing::info!(
                instance_id = %instance.id,
                transition_id = %transition.id,
                eligible_voters,
                "Opened vote gate"
            );
            return Ok(TransitionOutcome::AwaitingVotes(instance));
        }

        let instance = self
            .complete_transition(instance, &definition, &transition, actor, &options)
            .await?;
        Ok(TransitionOutcome::Completed(instance))
    }

    /// Apply a transition whose guards have all passed: state change,
    /// field merge, chained audit event, target-state side effects.
    pub(crate) async fn complete_transition(
        &self,
        mut instance: WorkflowInstance,
        definition: &WorkflowDefinition,
        transition: &Transition,
        actor: &ActorContext,
        options: &ExecuteOptions,
    ) -> Result<WorkflowInstance, CoreError> {
        let target = definition
            .state(&transition.to)
            .ok_or_else(|| CoreError::Internal("transition targets undeclared state".into()))?;

        let merged = self.validated_field_merge(
            definition,
            &instance,
            &options.field_updates,
        )?;

        let now = chrono::Utc::now();
        let from_state = instance.current_state.clone();
        instance.enter_state(&target.id, now);
        for (name, value) in merged {
            instance.field_values.insert(name, value);
        }
        instance.pending_vote = None;

        // Durability rule: the transition exists once its audit event
        // is chained. The instance update follows; a retry with the
        // same correlation id replays the event and reapplies the
        // update idempotently.
        let correlation_id = options.correlation_id.clone().unwrap_or_else(|| {
            format!(
                "wf:{}:{}:{}:{}",
                instance.id,
                transition.id,
                actor.id,
                now.timestamp_millis()
            )
        });
        self.chain
            .append(AppendRequest {
                partition: instance.partition.clone(),
                action: actions::WORKFLOW_TRANSITIONED.to_string(),
                actor: actor.id.clone(),
                payload: json!({
                    "instance_id": instance.id,
                    "transition_id": transition.id,
                    "from": from_state,
                    "to": target.id,
                    "comment": options.comment,
                }),
                correlation_id,
            })
            .await?;

        self.instances
            .update(instance.clone())
            .await
            .map_err(map_store_error)?;

        self.effects
            .run(&self.chain, &instance, &actor.id, &transition.actions)
            .await;
        self.effects
            .run(&self.chain, &instance, &actor.id, &target.on_enter)
            .await;

        tracing::info!(
            instance_id = %instance.id,
            transition_id = %transition.id,
            from = %from_state,
            to = %target.id,
            "Executed transition"
        );
        Ok(instance)
    }

    /// Update custom field values outside a transition.
    pub async fn update_field_values(
        &self,
        instance_id: InstanceId,
        updates: serde_json::Map<String, serde_json::Value>,
        actor: &ActorContext,
        correlation_id: Option<String>,
    ) -> Result<WorkflowInstance, CoreError> {
        let mut instance = self.get_instance(instance_id).await?;
        let definition = self.get_definition(instance.definition_id).await?;

        let merged = self.validated_field_merge(&definition, &instance, &updates)?;
        if merged.is_empty() {
            return Ok(instance);
        }

        let updated_names: Vec<&String> = merged.iter().map(|(name, _)| name).collect();
        let payload = json!({
            "instance_id": instance.id,
            "fields": updated_names,
        });

        let now = chrono::Utc::now();
        for (name, value) in merged {
            instance.field_values.insert(name, value);
        }
        instance.updated_at = now;

        self.chain
            .append(AppendRequest {
                partition: instance.partition.clone(),
                action: actions::WORKFLOW_FIELDS_UPDATED.to_string(),
                actor: actor.id.clone(),
                payload,
                correlation_id: correlation_id.unwrap_or_else(|| {
                    format!("wf:{}:fields:{}", instance.id, now.timestamp_millis())
                }),
            })
            .await?;

        self.instances
            .update(instance.clone())
            .await
            .map_err(map_store_error)?;
        Ok(instance)
    }

    /// Validate a set of field updates against the schema and the
    /// current state's editable set.
    fn validated_field_merge(
        &self,
        definition: &WorkflowDefinition,
        instance: &WorkflowInstance,
        updates: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<(String, serde_json::Value)>, CoreError> {
        let mut merged = Vec::new();
        for (name, value) in updates {
            let schema = definition
                .fields
                .iter()
                .find(|f| &f.name == name)
                .ok_or_else(|| CoreError::validation(format!("unknown field '{name}'")))?;
            if !schema.editable_in_state(&instance.current_state) {
                return Err(CoreError::GuardFailed {
                    guard: GuardKind::Field,
                    message: format!(
                        "field '{name}' is not editable in state '{}'",
                        instance.current_state
                    ),
                });
            }
            schema
                .validate_value(value)
                .map_err(CoreError::validation)?;
            merged.push((name.clone(), value.clone()));
        }
        Ok(merged)
    }

    /// Reconstruct an instance's history from its partition's audit
    /// events. History is derived, never stored redundantly.
    pub async fn instance_history(
        &self,
        instance_id: InstanceId,
    ) -> Result<Vec<AuditEvent>, CoreError> {
        let instance = self.get_instance(instance_id).await?;
        let events = self.chain.list(&instance.partition).await?;
        Ok(events
            .into_iter()
            .filter(|e| {
                e.payload
                    .get("instance_id")
                    .and_then(|v| v.as_str())
                    .is_some_and(|id| id == instance_id.to_string())
            })
            .collect())
    }
}

/// Enforce a definition's access gates (allowed roles / committees).
fn check_access_gates(
    definition: &WorkflowDefinition,
    actor: &ActorContext,
) -> Result<(), CoreError> {
    let settings = &definition.settings;
    let roles_ok = settings.allowed_roles.is_empty()
        || actor.roles.iter().any(|r| settings.allowed_roles.contains(r));
    let committees_ok = settings.allowed_committees.is_empty()
        || actor
            .committees
            .iter()
            .any(|c| settings.allowed_committees.contains(c));
    if roles_ok && committees_ok {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "actor '{}' may not start instances of definition '{}'",
            actor.id, definition.name
        )))
    }
}

/// Map store failures to the domain taxonomy at the engine boundary.
pub(crate) fn map_store_error(err: StoreError) -> CoreError {
    match err {
        StoreError::NotFound { entity, id } => CoreError::NotFound { entity, id },
        StoreError::HeadConflict { partition } => {
            CoreError::Conflict(format!("audit head moved for partition '{partition}'"))
        }
        other => CoreError::Internal(other.to_string()),
    }
}

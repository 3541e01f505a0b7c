//! End-to-end engine scenarios over the in-memory store: guarded
//! transitions, vote gates, routing, field edits, the SLA sweep, and
//! the audit trail each of them leaves behind.

mod common;

use assert_matches::assert_matches;
use serde_json::json;

use common::{
    board_member, clerk, doc_approval_draft, harness, sla_draft, voted_approval_draft,
};
use conclave_core::audit::actions;
use conclave_core::error::{CoreError, GuardKind};
use conclave_core::routing::RoutingContext;
use conclave_core::voting::VoteChoice;
use conclave_engine::{
    ExecuteOptions, RouteOutcome, SlaScheduler, StartRequest, TransitionOutcome, VoteOutcome,
};
use conclave_store::InstanceStore;

fn start_request() -> StartRequest {
    StartRequest {
        initial_field_values: json!({ "title": "Budget 2027" })
            .as_object()
            .unwrap()
            .clone(),
        ..StartRequest::default()
    }
}

// ---------------------------------------------------------------------------
// Guarded transitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_document_approval_happy_path() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();

    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();
    assert_eq!(instance.current_state, "draft");

    let available = h
        .engine
        .list_available_transitions(instance.id)
        .await
        .unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, "submit");

    let outcome = h
        .engine
        .execute_transition(instance.id, "submit", &actor, ExecuteOptions::default())
        .await
        .unwrap();
    let instance = match outcome {
        TransitionOutcome::Completed(i) => i,
        other => panic!("expected completed transition, got {other:?}"),
    };
    assert_eq!(instance.current_state, "pending-review");

    let board = board_member("board-1");
    let outcome = h
        .engine
        .execute_transition(
            instance.id,
            "approve",
            &board,
            ExecuteOptions {
                comment: Some("Reviewed and sound".to_string()),
                ..ExecuteOptions::default()
            },
        )
        .await
        .unwrap();
    let instance = match outcome {
        TransitionOutcome::Completed(i) => i,
        other => panic!("expected completed transition, got {other:?}"),
    };
    assert_eq!(instance.current_state, "approved");

    // Final state: nothing further is offered.
    let available = h
        .engine
        .list_available_transitions(instance.id)
        .await
        .unwrap();
    assert!(available.is_empty());
}

#[tokio::test]
async fn test_role_guard_rejects_then_allows_retry() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();
    h.engine
        .execute_transition(instance.id, "submit", &actor, ExecuteOptions::default())
        .await
        .unwrap();

    // A clerk may not approve; the state must not move.
    let err = h
        .engine
        .execute_transition(
            instance.id,
            "approve",
            &actor,
            ExecuteOptions {
                comment: Some("sneaky".to_string()),
                ..ExecuteOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));
    let current = h.engine.get_instance(instance.id).await.unwrap();
    assert_eq!(current.current_state, "pending-review");

    // The same transition succeeds for a board member.
    let outcome = h
        .engine
        .execute_transition(
            instance.id,
            "approve",
            &board_member("board-1"),
            ExecuteOptions {
                comment: Some("ok".to_string()),
                ..ExecuteOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.instance().current_state, "approved");
}

#[tokio::test]
async fn test_comment_guard_blocks_without_comment() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();
    h.engine
        .execute_transition(instance.id, "submit", &actor, ExecuteOptions::default())
        .await
        .unwrap();

    let err = h
        .engine
        .execute_transition(
            instance.id,
            "reject",
            &board_member("board-1"),
            ExecuteOptions::default(),
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        CoreError::GuardFailed {
            guard: GuardKind::Comment,
            ..
        }
    );

    // Whitespace does not satisfy the guard either.
    let err = h
        .engine
        .execute_transition(
            instance.id,
            "reject",
            &board_member("board-1"),
            ExecuteOptions {
                comment: Some("   ".to_string()),
                ..ExecuteOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::GuardFailed { .. });
}

#[tokio::test]
async fn test_attachment_guard_counts_attachments() {
    let h = harness();
    let actor = clerk();
    let mut draft = doc_approval_draft();
    let submit = draft
        .transitions
        .iter_mut()
        .find(|t| t.id == "submit")
        .unwrap();
    submit.requires_attachments = true;
    submit.min_attachments = 2;
    let def = h.engine.create_definition(draft, &actor).await.unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();

    let err = h
        .engine
        .execute_transition(
            instance.id,
            "submit",
            &actor,
            ExecuteOptions {
                attachment_count: 1,
                ..ExecuteOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        CoreError::GuardFailed {
            guard: GuardKind::Attachments,
            ..
        }
    );

    let outcome = h
        .engine
        .execute_transition(
            instance.id,
            "submit",
            &actor,
            ExecuteOptions {
                attachment_count: 2,
                ..ExecuteOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.instance().current_state, "pending-review");
}

#[tokio::test]
async fn test_transition_from_wrong_state_is_not_found() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();

    // "approve" exists but does not leave "draft".
    let err = h
        .engine
        .execute_transition(
            instance.id,
            "approve",
            &board_member("board-1"),
            ExecuteOptions {
                comment: Some("x".to_string()),
                ..ExecuteOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::NotFound { .. });
}

#[tokio::test]
async fn test_start_requires_required_fields() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();

    let err = h
        .engine
        .start_workflow(def.id, StartRequest::default(), &actor)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation { .. });
}

#[tokio::test]
async fn test_inactive_definition_cannot_start() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();
    h.engine.set_definition_active(def.id, false).await.unwrap();

    let err = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation { .. });
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_transition_links_to_start_in_audit_chain() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();
    h.engine
        .execute_transition(instance.id, "submit", &actor, ExecuteOptions::default())
        .await
        .unwrap();

    let events = h.engine.chain().list("policies").await.unwrap();
    let started = events
        .iter()
        .find(|e| e.action == actions::WORKFLOW_STARTED)
        .unwrap();
    let transitioned = events
        .iter()
        .find(|e| e.action == actions::WORKFLOW_TRANSITIONED)
        .unwrap();
    assert_eq!(transitioned.previous_hash, started.current_hash);

    let report = h.engine.chain().verify("policies").await.unwrap();
    assert!(report.chain_valid);
}

#[tokio::test]
async fn test_instance_history_is_scoped_to_the_instance() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();
    let first = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();
    let second = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();
    h.engine
        .execute_transition(first.id, "submit", &actor, ExecuteOptions::default())
        .await
        .unwrap();

    let history = h.engine.instance_history(first.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .all(|e| e.payload["instance_id"] == json!(first.id)));

    let history = h.engine.instance_history(second.id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_retried_transition_with_same_correlation_is_idempotent() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();

    let options = ExecuteOptions {
        correlation_id: Some("client-req-42".to_string()),
        ..ExecuteOptions::default()
    };
    let first = h
        .engine
        .execute_transition(instance.id, "submit", &actor, options.clone())
        .await
        .unwrap();
    // A client retry after a lost response gets the prior result back,
    // not an error.
    let replay = h
        .engine
        .execute_transition(instance.id, "submit", &actor, options)
        .await
        .unwrap();
    assert_eq!(
        replay.instance().current_state,
        first.instance().current_state
    );
    assert_eq!(replay.instance().current_state, "pending-review");

    // Exactly one transitioned event despite the retry.
    let history = h.engine.instance_history(instance.id).await.unwrap();
    let transitions = history
        .iter()
        .filter(|e| e.action == actions::WORKFLOW_TRANSITIONED)
        .count();
    assert_eq!(transitions, 1);
}

#[tokio::test]
async fn test_retried_start_with_same_correlation_returns_existing_instance() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();

    let request = StartRequest {
        correlation_id: Some("client-start-7".to_string()),
        ..start_request()
    };
    let first = h
        .engine
        .start_workflow(def.id, request.clone(), &actor)
        .await
        .unwrap();
    // A client retry after a lost response must not create a second
    // case; the chained start event belongs to the first one.
    let second = h
        .engine
        .start_workflow(def.id, request, &actor)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let instances = h
        .engine
        .list_instances(&conclave_store::InstanceQuery::default())
        .await
        .unwrap();
    assert_eq!(instances.len(), 1);

    let history = h.engine.instance_history(first.id).await.unwrap();
    let starts = history
        .iter()
        .filter(|e| e.action == actions::WORKFLOW_STARTED)
        .count();
    assert_eq!(starts, 1);
}

// ---------------------------------------------------------------------------
// Vote gates
// ---------------------------------------------------------------------------

async fn open_vote_gate(
    h: &common::TestHarness,
) -> conclave_core::instance::WorkflowInstance {
    let actor = clerk();
    let def = h
        .engine
        .create_definition(voted_approval_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();
    h.engine
        .execute_transition(instance.id, "submit", &actor, ExecuteOptions::default())
        .await
        .unwrap();

    let outcome = h
        .engine
        .execute_transition(
            instance.id,
            "approve",
            &board_member("board-1"),
            ExecuteOptions {
                eligible_voters: Some(3),
                ..ExecuteOptions::default()
            },
        )
        .await
        .unwrap();
    assert_matches!(outcome, TransitionOutcome::AwaitingVotes(_));
    h.engine.get_instance(instance.id).await.unwrap()
}

#[tokio::test]
async fn test_vote_gate_holds_state_until_quorum() {
    let h = harness();
    let instance = open_vote_gate(&h).await;
    assert_eq!(instance.current_state, "pending-review");
    assert!(instance.pending_vote.is_some());

    let outcome = h
        .engine
        .cast_vote(
            instance.id,
            "approve",
            &board_member("board-1"),
            VoteChoice::For,
            None,
            None,
        )
        .await
        .unwrap();
    assert_matches!(outcome, VoteOutcome::Pending { .. });

    // Second of three for-votes locks a simple majority.
    let outcome = h
        .engine
        .cast_vote(
            instance.id,
            "approve",
            &board_member("board-2"),
            VoteChoice::For,
            None,
            None,
        )
        .await
        .unwrap();
    let instance = match outcome {
        VoteOutcome::Passed { instance, tally } => {
            assert_eq!(tally.for_votes, 2);
            instance
        }
        other => panic!("expected passed vote, got {other:?}"),
    };
    assert_eq!(instance.current_state, "approved");
    assert!(instance.pending_vote.is_none());
}

#[tokio::test]
async fn test_failed_vote_keeps_state_and_closes_gate() {
    let h = harness();
    let instance = open_vote_gate(&h).await;

    h.engine
        .cast_vote(
            instance.id,
            "approve",
            &board_member("board-1"),
            VoteChoice::Against,
            None,
            None,
        )
        .await
        .unwrap();
    let outcome = h
        .engine
        .cast_vote(
            instance.id,
            "approve",
            &board_member("board-2"),
            VoteChoice::Against,
            None,
            None,
        )
        .await
        .unwrap();
    assert_matches!(outcome, VoteOutcome::Failed { .. });

    let instance = h.engine.get_instance(instance.id).await.unwrap();
    assert_eq!(instance.current_state, "pending-review");
    assert!(instance.pending_vote.is_none());

    let history = h.engine.instance_history(instance.id).await.unwrap();
    assert!(history.iter().any(|e| e.action == actions::VOTE_FAILED));
}

#[tokio::test]
async fn test_revote_overwrites_earlier_ballot() {
    let h = harness();
    let instance = open_vote_gate(&h).await;
    let voter = board_member("board-1");

    h.engine
        .cast_vote(instance.id, "approve", &voter, VoteChoice::Against, None, None)
        .await
        .unwrap();
    let outcome = h
        .engine
        .cast_vote(instance.id, "approve", &voter, VoteChoice::For, None, None)
        .await
        .unwrap();
    match outcome {
        VoteOutcome::Pending { tally } => {
            assert_eq!(tally.for_votes, 1);
            assert_eq!(tally.against_votes, 0);
        }
        other => panic!("expected pending vote, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unqualified_voter_is_forbidden() {
    let h = harness();
    let instance = open_vote_gate(&h).await;

    let err = h
        .engine
        .cast_vote(instance.id, "approve", &clerk(), VoteChoice::For, None, None)
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Forbidden(_));
}

#[tokio::test]
async fn test_retried_ballot_chains_one_vote_event() {
    let h = harness();
    let instance = open_vote_gate(&h).await;
    let voter = board_member("board-1");

    h.engine
        .cast_vote(instance.id, "approve", &voter, VoteChoice::For, None, None)
        .await
        .unwrap();
    // A network retry of the same ballot replays the chained event.
    h.engine
        .cast_vote(instance.id, "approve", &voter, VoteChoice::For, None, None)
        .await
        .unwrap();

    let history = h.engine.instance_history(instance.id).await.unwrap();
    let cast = history
        .iter()
        .filter(|e| e.action == actions::VOTE_CAST)
        .count();
    assert_eq!(cast, 1);

    // A changed ballot is a new event, not a replay.
    h.engine
        .cast_vote(instance.id, "approve", &voter, VoteChoice::Against, None, None)
        .await
        .unwrap();
    let history = h.engine.instance_history(instance.id).await.unwrap();
    let cast = history
        .iter()
        .filter(|e| e.action == actions::VOTE_CAST)
        .count();
    assert_eq!(cast, 2);
}

#[tokio::test]
async fn test_vote_without_open_gate_is_rejected() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(voted_approval_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();

    let err = h
        .engine
        .cast_vote(
            instance.id,
            "approve",
            &board_member("board-1"),
            VoteChoice::For,
            None,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation { .. });
}

// ---------------------------------------------------------------------------
// Field edits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fields_editable_only_in_declared_states() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();

    // Editable while drafting.
    let updated = h
        .engine
        .update_field_values(
            instance.id,
            json!({ "title": "Budget 2027 (rev 2)" })
                .as_object()
                .unwrap()
                .clone(),
            &actor,
            None,
        )
        .await
        .unwrap();
    assert_eq!(updated.field_values["title"], json!("Budget 2027 (rev 2)"));

    // Locked after submission.
    h.engine
        .execute_transition(instance.id, "submit", &actor, ExecuteOptions::default())
        .await
        .unwrap();
    let err = h
        .engine
        .update_field_values(
            instance.id,
            json!({ "title": "too late" }).as_object().unwrap().clone(),
            &actor,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        CoreError::GuardFailed {
            guard: GuardKind::Field,
            ..
        }
    );
}

#[tokio::test]
async fn test_unknown_field_update_is_rejected() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, start_request(), &actor)
        .await
        .unwrap();

    let err = h
        .engine
        .update_field_values(
            instance.id,
            json!({ "nonexistent": 1 }).as_object().unwrap().clone(),
            &actor,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Validation { .. });
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_route_document_starts_best_match() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();

    let ctx = RoutingContext {
        document_id: "doc-7".to_string(),
        document_type: Some("policy".to_string()),
        ..RoutingContext::default()
    };
    let suggestions = h.engine.suggest_workflows(&ctx).await.unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].definition_id, def.id);

    // The matched definition requires a title, which routing cannot
    // supply; drop the requirement so the instance can start.
    let mut relaxed = doc_approval_draft();
    relaxed.fields.clear();
    relaxed.assignment_rules[0].priority = 20;
    let better = h.engine.create_definition(relaxed, &actor).await.unwrap();

    let outcome = h.engine.route_document(&ctx, &actor).await.unwrap();
    match outcome {
        RouteOutcome::Routed {
            instance,
            definition_id,
            rule_priority,
        } => {
            assert_eq!(definition_id, better.id);
            assert_eq!(rule_priority, 20);
            assert_eq!(
                instance.document.as_ref().unwrap().document_id,
                "doc-7"
            );
        }
        RouteOutcome::NoMatch => panic!("expected a routed document"),
    }
}

#[tokio::test]
async fn test_rerouted_document_does_not_duplicate_instance() {
    let h = harness();
    let actor = clerk();
    let mut relaxed = doc_approval_draft();
    relaxed.fields.clear();
    h.engine.create_definition(relaxed, &actor).await.unwrap();

    let ctx = RoutingContext {
        document_id: "doc-9".to_string(),
        document_type: Some("policy".to_string()),
        ..RoutingContext::default()
    };
    let first = h.engine.route_document(&ctx, &actor).await.unwrap();
    let second = h.engine.route_document(&ctx, &actor).await.unwrap();

    let first_id = match first {
        RouteOutcome::Routed { instance, .. } => instance.id,
        RouteOutcome::NoMatch => panic!("expected a routed document"),
    };
    match second {
        RouteOutcome::Routed { instance, .. } => assert_eq!(instance.id, first_id),
        RouteOutcome::NoMatch => panic!("expected a routed document"),
    }

    let instances = h
        .engine
        .list_instances(&conclave_store::InstanceQuery::default())
        .await
        .unwrap();
    assert_eq!(instances.len(), 1);
}

#[tokio::test]
async fn test_unmatched_document_is_not_routed() {
    let h = harness();
    let actor = clerk();
    h.engine
        .create_definition(doc_approval_draft(), &actor)
        .await
        .unwrap();

    let ctx = RoutingContext {
        document_id: "doc-8".to_string(),
        document_type: Some("minutes".to_string()),
        ..RoutingContext::default()
    };
    let outcome = h.engine.route_document(&ctx, &actor).await.unwrap();
    assert_matches!(outcome, RouteOutcome::NoMatch);
    assert!(h
        .engine
        .list_instances(&conclave_store::InstanceQuery::default())
        .await
        .unwrap()
        .is_empty());
}

// ---------------------------------------------------------------------------
// SLA sweep
// ---------------------------------------------------------------------------

/// Rewind an instance's state-entry clock so thresholds fire without
/// sleeping in tests.
async fn rewind_entry(
    h: &common::TestHarness,
    instance_id: conclave_core::types::InstanceId,
    secs: i64,
) {
    let mut instance = h.engine.get_instance(instance_id).await.unwrap();
    instance.entered_state_at = chrono::Utc::now() - chrono::Duration::seconds(secs);
    h.store.update(instance).await.unwrap();
}

#[tokio::test]
async fn test_sla_warning_emitted_once_per_state_entry() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(sla_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, StartRequest::default(), &actor)
        .await
        .unwrap();
    rewind_entry(&h, instance.id, 31).await;

    let scheduler = SlaScheduler::new(std::sync::Arc::new(h.engine.clone()));
    scheduler.sweep().await.unwrap();
    let after = h.engine.get_instance(instance.id).await.unwrap();
    assert!(after.sla_warning_sent);
    assert!(!after.sla_escalation_sent);

    // Idempotent across sweeps.
    scheduler.sweep().await.unwrap();
    let again = h.engine.get_instance(instance.id).await.unwrap();
    assert_eq!(after.updated_at, again.updated_at);
}

#[tokio::test]
async fn test_sla_breach_escalates_and_fires_automation() {
    let h = harness();
    let actor = clerk();
    let def = h
        .engine
        .create_definition(sla_draft(), &actor)
        .await
        .unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, StartRequest::default(), &actor)
        .await
        .unwrap();
    rewind_entry(&h, instance.id, 61).await;

    let scheduler = SlaScheduler::new(std::sync::Arc::new(h.engine.clone()));
    scheduler.sweep().await.unwrap();

    let after = h.engine.get_instance(instance.id).await.unwrap();
    assert!(after.sla_warning_sent);
    assert!(after.sla_escalation_sent);
    assert_eq!(after.fired_automations, vec!["nudge".to_string()]);

    // The automation's declared audit effect landed on the chain.
    let history = h.engine.instance_history(instance.id).await.unwrap();
    assert!(history.iter().any(|e| e.action == "review.nudged"));

    // The instance never moves on its own, however overdue.
    assert_eq!(after.current_state, "open");
}

#[tokio::test]
async fn test_state_reentry_resets_sla_flags() {
    let h = harness();
    let actor = clerk();
    let mut draft = sla_draft();
    // Allow leaving and re-entering the timed state.
    draft.states[1].is_final = false;
    draft
        .transitions
        .push(common::transition("reopen", "closed", "open"));
    let def = h.engine.create_definition(draft, &actor).await.unwrap();
    let instance = h
        .engine
        .start_workflow(def.id, StartRequest::default(), &actor)
        .await
        .unwrap();
    rewind_entry(&h, instance.id, 61).await;

    let scheduler = SlaScheduler::new(std::sync::Arc::new(h.engine.clone()));
    scheduler.sweep().await.unwrap();
    assert!(h
        .engine
        .get_instance(instance.id)
        .await
        .unwrap()
        .sla_escalation_sent);

    h.engine
        .execute_transition(instance.id, "close", &actor, ExecuteOptions::default())
        .await
        .unwrap();
    h.engine
        .execute_transition(instance.id, "reopen", &actor, ExecuteOptions::default())
        .await
        .unwrap();

    let reentered = h.engine.get_instance(instance.id).await.unwrap();
    assert!(!reentered.sla_warning_sent);
    assert!(!reentered.sla_escalation_sent);
    assert!(reentered.fired_automations.is_empty());
}

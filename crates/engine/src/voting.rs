//! Vote casting against an open vote gate.
//!
//! Ballots accumulate on the instance; after each one the quorum rule
//! is re-evaluated against the voter population fixed when the gate
//! opened. The moment the outcome is locked the gate closes — passed
//! votes complete the gated transition, failed votes leave the state
//! untouched.

use async_trait::async_trait;
use serde_json::json;

use conclave_core::audit::actions;
use conclave_core::definition::Transition;
use conclave_core::error::CoreError;
use conclave_core::instance::WorkflowInstance;
use conclave_core::types::{ActorContext, InstanceId};
use conclave_core::voting::{
    evaluate_quorum, QuorumDecision, VoteChoice, VoteRecord, VoteTally,
};

use crate::chain::AppendRequest;
use crate::engine::{map_store_error, ExecuteOptions, WorkflowEngine};

/// Decides whether an actor may cast a ballot on a given transition.
///
/// A trait seam so deployments can plug in an external membership
/// service without touching the engine.
#[async_trait]
pub trait VoterAuthorizer: Send + Sync {
    async fn is_eligible(
        &self,
        voter: &ActorContext,
        instance: &WorkflowInstance,
        transition: &Transition,
    ) -> bool;
}

/// Default policy: the voter must hold one of the transition's required
/// roles, and when the instance is assigned to a committee, belong to it.
pub struct DefaultVoterAuthorizer;

#[async_trait]
impl VoterAuthorizer for DefaultVoterAuthorizer {
    async fn is_eligible(
        &self,
        voter: &ActorContext,
        instance: &WorkflowInstance,
        transition: &Transition,
    ) -> bool {
        if !voter.has_any_role(&transition.required_roles) {
            return false;
        }
        match &instance.assigned_committee {
            Some(committee) => voter.committees.iter().any(|c| c == committee),
            None => true,
        }
    }
}

/// Result of casting one ballot.
#[derive(Debug, Clone)]
pub enum VoteOutcome {
    /// Quorum not yet locked; the gate stays open.
    Pending { tally: VoteTally },
    /// Quorum passed; the gated transition completed and the instance
    /// moved to the target state.
    Passed {
        instance: WorkflowInstance,
        tally: VoteTally,
    },
    /// Quorum failed; the gate closed and the state is unchanged.
    Failed { tally: VoteTally },
}

impl WorkflowEngine {
    /// Cast a ballot on the instance's open vote gate.
    ///
    /// Re-voting overwrites the voter's earlier ballot. After the
    /// ballot is recorded the quorum rule is re-evaluated; a locked
    /// outcome closes the gate in the same call.
    pub async fn cast_vote(
        &self,
        instance_id: InstanceId,
        transition_id: &str,
        voter: &ActorContext,
        choice: VoteChoice,
        comment: Option<String>,
        correlation_id: Option<String>,
    ) -> Result<VoteOutcome, CoreError> {
        let mut instance = self.get_instance(instance_id).await?;
        let definition = self.get_definition(instance.definition_id).await?;

        let pending = instance
            .pending_vote
            .clone()
            .filter(|p| p.transition_id == transition_id)
            .ok_or_else(|| {
                CoreError::validation(format!(
                    "no open vote for transition '{transition_id}' on this instance"
                ))
            })?;

        let transition = definition
            .transition(transition_id)
            .ok_or_else(|| CoreError::not_found("transition", transition_id))?
            .clone();
        let vote_type = transition
            .vote_type
            .ok_or_else(|| CoreError::Internal("pending vote on unvoted transition".into()))?;

        if !self
            .voter_authorizer
            .is_eligible(voter, &instance, &transition)
            .await
        {
            return Err(CoreError::Forbidden(format!(
                "actor '{}' is not eligible to vote on transition '{}'",
                voter.id, transition.id
            )));
        }

        let now = chrono::Utc::now();
        let revision = instance.record_vote(VoteRecord {
            transition_id: transition.id.clone(),
            voter_id: voter.id.clone(),
            vote: choice,
            comment: comment.clone(),
            revision: 0,
            cast_at: now,
        });
        instance.updated_at = now;

        self.chain
            .append(AppendRequest {
                partition: instance.partition.clone(),
                action: actions::VOTE_CAST.to_string(),
                actor: voter.id.clone(),
                payload: json!({
                    "instance_id": instance.id,
                    "transition_id": transition.id,
                    "vote": choice,
                    "comment": comment,
                    "revision": revision,
                }),
                // The revision makes the derived key stable across
                // retries of the same ballot while a genuine re-vote
                // still chains its own event.
                correlation_id: correlation_id.unwrap_or_else(|| {
                    format!(
                        "wf:{}:{}:vote:{}:{}",
                        instance.id, transition.id, voter.id, revision
                    )
                }),
            })
            .await?;

        let tally = VoteTally::from_records(&instance.vote_records, &transition.id);
        let decision = evaluate_quorum(vote_type, tally, pending.eligible_voters);

        match decision {
            QuorumDecision::Pending => {
                self.instances
                    .update(instance)
                    .await
                    .map_err(map_store_error)?;
                Ok(VoteOutcome::Pending { tally })
            }
            QuorumDecision::Passed => {
                // The gate's guards were checked when it opened; the
                // stored comment satisfies the comment guard on replay.
                instance.pending_vote = None;
                let options = ExecuteOptions {
                    comment: pending.comment.clone(),
                    ..ExecuteOptions::default()
                };
                let opened_by = ActorContext::new(pending.opened_by.clone());
                let instance = self
                    .complete_transition(instance, &definition, &transition, &opened_by, &options)
                    .await?;
                tracing::info!(
                    instance_id = %instance.id,
                    transition_id = %transition.id,
                    for_votes = tally.for_votes,
                    against_votes = tally.against_votes,
                    "Vote passed, transition completed"
                );
                Ok(VoteOutcome::Passed { instance, tally })
            }
            QuorumDecision::Failed => {
                instance.pending_vote = None;
                self.chain
                    .append(AppendRequest {
                        partition: instance.partition.clone(),
                        action: actions::VOTE_FAILED.to_string(),
                        actor: voter.id.clone(),
                        payload: json!({
                            "instance_id": instance.id,
                            "transition_id": transition.id,
                            "for_votes": tally.for_votes,
                            "against_votes": tally.against_votes,
                            "abstain_votes": tally.abstain_votes,
                        }),
                        correlation_id: format!(
                            "wf:{}:{}:vote-failed:{}",
                            instance.id,
                            transition.id,
                            now.timestamp_millis()
                        ),
                    })
                    .await?;
                self.instances
                    .update(instance.clone())
                    .await
                    .map_err(map_store_error)?;
                tracing::info!(
                    instance_id = %instance.id,
                    transition_id = %transition.id,
                    for_votes = tally.for_votes,
                    against_votes = tally.against_votes,
                    "Vote failed, gate closed"
                );
                Ok(VoteOutcome::Failed { tally })
            }
        }
    }
}

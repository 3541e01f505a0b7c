//! Ballot model and quorum evaluation.
//!
//! A vote-gated transition accumulates ballots until the outcome is
//! mathematically locked given the eligible voter population captured
//! when the gate opened. Abstentions never count toward either side;
//! they only consume an eligible ballot.

use serde::{Deserialize, Serialize};

use crate::definition::VoteType;
use crate::types::Timestamp;

/// A single ballot choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

/// One cast ballot. Unique per (transition, voter) — re-voting
/// overwrites the earlier record rather than duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub transition_id: String,
    pub voter_id: String,
    pub vote: VoteChoice,
    #[serde(default)]
    pub comment: Option<String>,
    /// Starts at 1 and increments each time the voter changes their
    /// ballot; assigned by [`WorkflowInstance::record_vote`]. A retry
    /// of an identical ballot keeps the revision, which is what makes
    /// the vote's audit correlation id stable across retries.
    ///
    /// [`WorkflowInstance::record_vote`]: crate::instance::WorkflowInstance::record_vote
    #[serde(default = "first_revision")]
    pub revision: u32,
    pub cast_at: Timestamp,
}

fn first_revision() -> u32 {
    1
}

/// Aggregated counts over the ballots cast for one transition attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub for_votes: u32,
    pub against_votes: u32,
    pub abstain_votes: u32,
}

impl VoteTally {
    pub fn cast(&self) -> u32 {
        self.for_votes + self.against_votes + self.abstain_votes
    }

    /// Count ballots for the given transition.
    pub fn from_records(records: &[VoteRecord], transition_id: &str) -> Self {
        let mut tally = VoteTally::default();
        for record in records.iter().filter(|r| r.transition_id == transition_id) {
            match record.vote {
                VoteChoice::For => tally.for_votes += 1,
                VoteChoice::Against => tally.against_votes += 1,
                VoteChoice::Abstain => tally.abstain_votes += 1,
            }
        }
        tally
    }
}

/// Outcome of evaluating a quorum rule against a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumDecision {
    /// Outcome not yet locked; more ballots may change it.
    Pending,
    Passed,
    Failed,
}

/// Evaluate a quorum rule.
///
/// `eligible_voters` is the population fixed when the vote gate opened.
/// A rule resolves as soon as the remaining uncast ballots can no longer
/// change the outcome, so absentees cannot stall a decided vote.
///
/// - simple-majority: for > against among cast ballots, abstentions
///   excluded from the comparison.
/// - super-majority: for ≥ ⅔ of (for + against), votes-cast denominator.
/// - unanimous: any against fails immediately; passes once every
///   eligible ballot is in with zero against and at least one for.
pub fn evaluate_quorum(
    vote_type: VoteType,
    tally: VoteTally,
    eligible_voters: u32,
) -> QuorumDecision {
    let remaining = eligible_voters.saturating_sub(tally.cast());
    let VoteTally {
        for_votes,
        against_votes,
        ..
    } = tally;

    match vote_type {
        VoteType::SimpleMajority => {
            if for_votes > against_votes + remaining {
                QuorumDecision::Passed
            } else if for_votes + remaining <= against_votes || (remaining == 0 && for_votes <= against_votes) {
                QuorumDecision::Failed
            } else {
                QuorumDecision::Pending
            }
        }
        VoteType::SuperMajority => {
            // Locked pass: even if every remaining ballot votes against,
            // for >= 2/3 of the decisive total. Locked fail: even if
            // every remaining ballot votes for, the threshold is missed.
            let pass_floor = 3 * for_votes >= 2 * (for_votes + against_votes + remaining);
            let fail_ceiling =
                3 * (for_votes + remaining) < 2 * (for_votes + remaining + against_votes);
            if pass_floor && for_votes > 0 {
                QuorumDecision::Passed
            } else if fail_ceiling || remaining == 0 {
                QuorumDecision::Failed
            } else {
                QuorumDecision::Pending
            }
        }
        VoteType::Unanimous => {
            if against_votes > 0 {
                QuorumDecision::Failed
            } else if remaining == 0 {
                if for_votes > 0 {
                    QuorumDecision::Passed
                } else {
                    QuorumDecision::Failed
                }
            } else {
                QuorumDecision::Pending
            }
        }
    }
}

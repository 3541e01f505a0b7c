//! Conclave workflow engine.
//!
//! Ties the pure domain logic from `conclave-core` to a storage backend
//! and the notification collaborators:
//!
//! - [`AuditChain`] — idempotent, chain-linked audit appends with a
//!   bounded compare-and-set retry loop, plus integrity verification.
//! - [`WorkflowEngine`] — definition lifecycle and the instance engine
//!   (start, available transitions, guarded execution, field updates,
//!   vote casting, history).
//! - routing — matches incoming documents to definitions and starts
//!   instances.
//! - [`SlaScheduler`] — periodic SLA warning/escalation emission and
//!   state-bound automations.

pub mod chain;
pub mod effects;
pub mod engine;
pub mod router;
pub mod scheduler;
pub mod voting;

pub use chain::{AppendRequest, AuditChain};
pub use effects::SideEffectRunner;
pub use engine::{
    DefinitionDraft, ExecuteOptions, StartRequest, TransitionOutcome, WorkflowEngine,
};
pub use router::{RouteOutcome, RoutingSuggestion};
pub use scheduler::{SlaScheduler, SlaSchedulerConfig};
pub use voting::{DefaultVoterAuthorizer, VoteOutcome, VoterAuthorizer};

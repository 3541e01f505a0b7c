//! Domain error taxonomy shared by every Conclave crate.
//!
//! The split between [`CoreError::Forbidden`] (role/committee guard) and
//! [`CoreError::GuardFailed`] (comment/attachment/vote guard) is
//! deliberate: it lets a UI render "what's missing" instead of
//! "access denied".

use serde::{Deserialize, Serialize};

/// The transition guard that rejected an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    /// A comment was required but missing.
    Comment,
    /// The attachment count was below the declared minimum.
    Attachments,
    /// The transition is vote-gated and quorum has not resolved.
    Vote,
    /// A field is not editable in the instance's current state.
    Field,
}

impl std::fmt::Display for GuardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GuardKind::Comment => "comment",
            GuardKind::Attachments => "attachments",
            GuardKind::Vote => "vote",
            GuardKind::Field => "field",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// Every violation found, not just the first, so a workflow-authoring
    /// UI can report all problems in one round trip.
    #[error("Validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A non-role transition guard was not satisfied.
    #[error("Guard '{guard}' failed: {message}")]
    GuardFailed { guard: GuardKind, message: String },

    /// Lost the compare-and-set race on an audit chain head after
    /// exhausting retries.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Chain verification found a hash mismatch. Never retried, never
    /// auto-repaired; processing of the partition should halt pending
    /// manual review.
    #[error("Audit chain integrity violation in partition '{partition}': {message}")]
    IntegrityViolation { partition: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a single-message validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            errors: vec![message.into()],
        }
    }

    /// Shorthand for a not-found error with a displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

use serde::{Deserialize, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Workflow definition identifier.
pub type DefinitionId = uuid::Uuid;

/// Workflow instance identifier.
pub type InstanceId = uuid::Uuid;

/// Audit event identifier.
pub type EventId = uuid::Uuid;

/// Audit partition key — one hash chain per governance domain
/// (e.g. `"meetings"`, `"policies"`).
pub type Partition = String;

/// Partition used when a definition declares no category.
pub const DEFAULT_PARTITION: &str = "default";

/// Identity of the caller performing an action.
///
/// Supplied by the surrounding request layer; authentication itself is
/// out of scope for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorContext {
    /// Stable actor id (user id from the identity provider).
    pub id: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Role names held by the actor.
    pub roles: Vec<String>,
    /// Committee memberships.
    pub committees: Vec<String>,
}

impl ActorContext {
    /// Create an actor with only an id; roles and committees empty.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            roles: Vec::new(),
            committees: Vec::new(),
        }
    }

    /// Builder-style helper to attach roles.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style helper to attach committee memberships.
    pub fn with_committees<I, S>(mut self, committees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.committees = committees.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the actor holds at least one of the given roles.
    ///
    /// An empty `required` set means any authenticated actor qualifies.
    pub fn has_any_role(&self, required: &[String]) -> bool {
        required.is_empty() || self.roles.iter().any(|r| required.contains(r))
    }
}

/// Recipient selector for notifications and declared side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Recipients {
    /// Everyone holding one of the given roles.
    Roles(Vec<String>),
    /// All members of a committee.
    Committee(String),
    /// Specific user ids.
    Users(Vec<String>),
}

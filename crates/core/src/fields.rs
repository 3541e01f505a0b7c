//! Custom field schemas and per-state value validation.
//!
//! Each workflow definition carries a set of field schemas describing
//! the data captured alongside a case: the field's type, whether it is
//! required, and in which states it may be edited or must hold a value.

use serde::{Deserialize, Serialize};

use crate::definition::WorkflowDefinition;

/// Data type of a custom field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Boolean,
    /// ISO 8601 date string (`YYYY-MM-DD`).
    Date,
    /// One of a fixed set of options.
    Selection { options: Vec<String> },
}

/// Schema for one custom field on a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    /// Whether the field must be present when the instance starts.
    #[serde(default)]
    pub required: bool,
    /// Upper length bound for text values.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// States in which the field may be edited. Empty = never editable
    /// after start.
    #[serde(default)]
    pub editable_in: Vec<String>,
    /// States in which the field must hold a value.
    #[serde(default)]
    pub required_in: Vec<String>,
}

impl FieldSchema {
    /// Whether this field may be edited while the instance sits in the
    /// given state.
    pub fn editable_in_state(&self, state_id: &str) -> bool {
        self.editable_in.iter().any(|s| s == state_id)
    }

    /// Type-check a candidate value against this schema.
    pub fn validate_value(&self, value: &serde_json::Value) -> Result<(), String> {
        match (&self.field_type, value) {
            (FieldType::Text, serde_json::Value::String(s)) => {
                if let Some(max) = self.max_length {
                    if s.chars().count() > max {
                        return Err(format!(
                            "field '{}' exceeds maximum length of {max} characters",
                            self.name
                        ));
                    }
                }
                Ok(())
            }
            (FieldType::Number, serde_json::Value::Number(_)) => Ok(()),
            (FieldType::Boolean, serde_json::Value::Bool(_)) => Ok(()),
            (FieldType::Date, serde_json::Value::String(s)) => {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(|_| ())
                    .map_err(|_| {
                        format!("field '{}' must be an ISO date (YYYY-MM-DD), got '{s}'", self.name)
                    })
            }
            (FieldType::Selection { options }, serde_json::Value::String(s)) => {
                if options.iter().any(|o| o == s) {
                    Ok(())
                } else {
                    Err(format!(
                        "field '{}' must be one of: {}",
                        self.name,
                        options.join(", ")
                    ))
                }
            }
            (_, serde_json::Value::Null) => Ok(()),
            _ => Err(format!(
                "field '{}' has the wrong type for its schema",
                self.name
            )),
        }
    }
}

/// Names of fields that must hold a value in `state_id` but are missing
/// or null in `values`.
pub fn missing_required_fields(
    def: &WorkflowDefinition,
    state_id: &str,
    values: &serde_json::Map<String, serde_json::Value>,
) -> Vec<String> {
    def.fields
        .iter()
        .filter(|f| f.required || f.required_in.iter().any(|s| s == state_id))
        .filter(|f| {
            matches!(
                values.get(&f.name),
                None | Some(serde_json::Value::Null)
            )
        })
        .map(|f| f.name.clone())
        .collect()
}

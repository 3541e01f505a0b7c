//! Document router: picks a workflow for an incoming document and
//! starts it.
//!
//! Matching and ranking are pure (`conclave_core::routing`); this layer
//! loads the active definitions, applies the ranking, and starts an
//! instance bound to the document for the best match. No match is a
//! normal outcome, not an error.

use serde::Serialize;
use serde_json::json;

use conclave_core::error::CoreError;
use conclave_core::instance::{DocumentRef, WorkflowInstance};
use conclave_core::routing::{rank_matches, RoutingContext};
use conclave_core::types::{ActorContext, DefinitionId};
use conclave_store::DefinitionQuery;

use crate::engine::{StartRequest, WorkflowEngine};

/// Result of routing one document.
#[derive(Debug, Clone)]
pub enum RouteOutcome {
    /// A rule matched and an instance was started.
    Routed {
        instance: WorkflowInstance,
        definition_id: DefinitionId,
        rule_priority: i32,
    },
    /// No active definition had a matching rule; nothing was started.
    NoMatch,
}

/// One entry of a routing preview: a definition that would accept the
/// document, with the priority of the rule that matched.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingSuggestion {
    pub definition_id: DefinitionId,
    pub definition_name: String,
    pub rule_priority: i32,
}

impl WorkflowEngine {
    /// Preview which workflows would accept a document, best first.
    /// Read-only; starts nothing.
    pub async fn suggest_workflows(
        &self,
        ctx: &RoutingContext,
    ) -> Result<Vec<RoutingSuggestion>, CoreError> {
        let definitions = self
            .list_definitions(&DefinitionQuery {
                is_active: Some(true),
                ..DefinitionQuery::default()
            })
            .await?;

        Ok(rank_matches(&definitions, ctx)
            .into_iter()
            .map(|m| RoutingSuggestion {
                definition_id: m.definition.id,
                definition_name: m.definition.name.clone(),
                rule_priority: m.rule.priority,
            })
            .collect())
    }

    /// Route a document to the best-matching workflow and start an
    /// instance bound to it.
    pub async fn route_document(
        &self,
        ctx: &RoutingContext,
        actor: &ActorContext,
    ) -> Result<RouteOutcome, CoreError> {
        let definitions = self
            .list_definitions(&DefinitionQuery {
                is_active: Some(true),
                ..DefinitionQuery::default()
            })
            .await?;

        let ranked = rank_matches(&definitions, ctx);
        let Some(best) = ranked.first() else {
            tracing::debug!(
                document_id = %ctx.document_id,
                "No assignment rule matched, document not routed"
            );
            return Ok(RouteOutcome::NoMatch);
        };

        let definition_id = best.definition.id;
        let rule_priority = best.rule.priority;

        let mut initial_field_values = serde_json::Map::new();
        if let Some(doc_type) = &ctx.document_type {
            // Conventionally-named field, populated when the schema
            // declares it.
            if best
                .definition
                .fields
                .iter()
                .any(|f| f.name == "document_type")
            {
                initial_field_values.insert("document_type".into(), json!(doc_type));
            }
        }

        let instance = self
            .start_workflow(
                definition_id,
                StartRequest {
                    initial_field_values,
                    document: Some(DocumentRef {
                        document_id: ctx.document_id.clone(),
                        document_type: ctx.document_type.clone(),
                    }),
                    assigned_committee: ctx.committee.clone(),
                    correlation_id: Some(format!("route:{}:{}", ctx.document_id, definition_id)),
                },
                actor,
            )
            .await?;

        tracing::info!(
            document_id = %ctx.document_id,
            definition_id = %definition_id,
            rule_priority,
            instance_id = %instance.id,
            "Routed document to workflow"
        );
        Ok(RouteOutcome::Routed {
            instance,
            definition_id,
            rule_priority,
        })
    }
}

//! Assignment-rule matching for the document router.
//!
//! A rule matches a routing context when every non-empty predicate
//! field (document type / category / committee / tags) intersects the
//! context. Candidates are ranked by rule priority descending, ties
//! broken by definition creation order (earliest wins) so routing is
//! deterministic. No rule matching means no workflow — the router never
//! falls back to a default.

use serde::{Deserialize, Serialize};

use crate::definition::{AssignmentRule, WorkflowDefinition};

/// Attributes of an incoming document used to select a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingContext {
    pub document_id: String,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub committee: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A matching (definition, rule) pair produced by [`rank_matches`].
#[derive(Debug, Clone)]
pub struct RoutingMatch<'a> {
    pub definition: &'a WorkflowDefinition,
    pub rule: &'a AssignmentRule,
}

/// Whether a single rule matches the context.
pub fn rule_matches(rule: &AssignmentRule, ctx: &RoutingContext) -> bool {
    let doc_type_ok = rule.document_types.is_empty()
        || ctx
            .document_type
            .as_ref()
            .is_some_and(|t| rule.document_types.contains(t));
    let category_ok = rule.categories.is_empty()
        || ctx
            .category
            .as_ref()
            .is_some_and(|c| rule.categories.contains(c));
    let committee_ok = rule.committees.is_empty()
        || ctx
            .committee
            .as_ref()
            .is_some_and(|c| rule.committees.contains(c));
    let tags_ok = rule.tags.is_empty() || ctx.tags.iter().any(|t| rule.tags.contains(t));

    doc_type_ok && category_ok && committee_ok && tags_ok
}

/// All matching rules across active definitions, best first.
///
/// `definitions` may arrive in any order; ranking sorts by priority
/// descending, then definition `created_at` ascending.
pub fn rank_matches<'a>(
    definitions: &'a [WorkflowDefinition],
    ctx: &RoutingContext,
) -> Vec<RoutingMatch<'a>> {
    let mut matches: Vec<RoutingMatch<'a>> = definitions
        .iter()
        .filter(|d| d.is_active)
        .flat_map(|d| {
            d.assignment_rules
                .iter()
                .filter(|r| rule_matches(r, ctx))
                .map(move |r| RoutingMatch {
                    definition: d,
                    rule: r,
                })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.rule
            .priority
            .cmp(&a.rule.priority)
            .then_with(|| a.definition.created_at.cmp(&b.definition.created_at))
    });
    matches
}

//! Actor identity extraction.
//!
//! Authentication happens upstream (the platform gateway); this service
//! trusts the identity headers the gateway injects:
//!
//! - `x-actor-id` (required)
//! - `x-actor-name` (optional, defaults to the id)
//! - `x-actor-roles` (optional, comma-separated)
//! - `x-actor-committees` (optional, comma-separated)

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use conclave_core::types::ActorContext;

use crate::error::AppError;

/// Extractor that builds an [`ActorContext`] from the gateway headers.
/// Rejects with 400 when `x-actor-id` is absent.
#[derive(Debug, Clone)]
pub struct Actor(pub ActorContext);

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_str(parts, "x-actor-id")
            .ok_or_else(|| AppError::BadRequest("missing x-actor-id header".to_string()))?
            .to_string();

        let display_name = header_str(parts, "x-actor-name")
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());

        Ok(Actor(ActorContext {
            id,
            display_name,
            roles: split_csv(header_str(parts, "x-actor-roles")),
            committees: split_csv(header_str(parts, "x-actor-committees")),
        }))
    }
}

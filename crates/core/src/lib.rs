//! Conclave core domain logic.
//!
//! This crate has zero internal dependencies so it can be used by the
//! storage layer, the engine, the API, and any future CLI tooling. It
//! contains the workflow definition model and its validation, the audit
//! chain math, custom field schemas, quorum evaluation, assignment-rule
//! matching, and SLA evaluation — all pure logic, no I/O.

pub mod audit;
pub mod definition;
pub mod error;
pub mod fields;
pub mod hashing;
pub mod instance;
pub mod routing;
pub mod sla;
pub mod types;
pub mod voting;

#[cfg(test)]
pub(crate) mod test_support;

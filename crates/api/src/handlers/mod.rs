//! HTTP handlers, grouped by resource.

pub mod audit;
pub mod definitions;
pub mod instances;
pub mod routing;

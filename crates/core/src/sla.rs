//! SLA evaluation for time spent in a state.
//!
//! Pure threshold math; the engine's scheduler decides what to emit and
//! records what has already been emitted. SLA breach is advisory — it
//! never forces a transition.

use serde::Serialize;

use crate::definition::StateSla;
use crate::types::Timestamp;

/// Where an instance stands against its current state's SLA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    /// Within the warning threshold.
    OnTrack,
    /// Past `warning_at`, not yet past `max_duration`.
    Warning,
    /// At or past `max_duration`.
    Breached,
}

/// Evaluate elapsed time in a state against its SLA thresholds.
pub fn evaluate_sla(sla: &StateSla, entered_state_at: Timestamp, now: Timestamp) -> SlaStatus {
    let elapsed_secs = (now - entered_state_at).num_seconds();
    if elapsed_secs >= sla.max_duration_secs {
        SlaStatus::Breached
    } else if elapsed_secs >= sla.warning_at_secs {
        SlaStatus::Warning
    } else {
        SlaStatus::OnTrack
    }
}

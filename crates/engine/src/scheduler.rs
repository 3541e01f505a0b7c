//! SLA scheduler.
//!
//! [`SlaScheduler`] runs as a background task, periodically sweeping the
//! open instances: it emits SLA warnings and breach escalations (at most
//! once per state entry) and fires due state-bound automations (at most
//! once per automation per state entry). It is advisory only — it never
//! forces a transition, no matter how overdue an instance is.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use conclave_core::definition::WorkflowDefinition;
use conclave_core::error::CoreError;
use conclave_core::instance::WorkflowInstance;
use conclave_core::sla::{evaluate_sla, SlaStatus};
use conclave_core::types::{Recipients, Timestamp};
use conclave_events::Notification;
use conclave_store::InstanceQuery;

use crate::engine::{map_store_error, WorkflowEngine};

/// How often the scheduler sweeps the open instances.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Scheduler tuning knobs.
#[derive(Debug, Clone)]
pub struct SlaSchedulerConfig {
    pub sweep_interval: Duration,
}

impl Default for SlaSchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// SlaScheduler
// ---------------------------------------------------------------------------

/// Background service that emits SLA warnings/escalations and fires
/// due automations.
pub struct SlaScheduler {
    engine: Arc<WorkflowEngine>,
    config: SlaSchedulerConfig,
}

impl SlaScheduler {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self {
            engine,
            config: SlaSchedulerConfig::default(),
        }
    }

    pub fn with_config(engine: Arc<WorkflowEngine>, config: SlaSchedulerConfig) -> Self {
        Self { engine, config }
    }

    /// Run the scheduler loop.
    ///
    /// Sweeps on every interval tick; exits gracefully when the provided
    /// [`CancellationToken`] is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("SLA scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::error!(error = %e, "SLA sweep failed");
                    }
                }
            }
        }
    }

    /// One sweep over all open instances. Per-instance failures are
    /// logged and do not abort the sweep.
    pub async fn sweep(&self) -> Result<(), CoreError> {
        let instances = self
            .engine
            .list_instances(&InstanceQuery::default())
            .await?;

        let mut processed = 0usize;
        for instance in instances {
            match self.process_instance(instance).await {
                Ok(did_work) => {
                    if did_work {
                        processed += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to process instance in SLA sweep");
                }
            }
        }

        if processed > 0 {
            tracing::info!(count = processed, "SLA sweep emitted work");
        }
        Ok(())
    }

    /// Evaluate one instance: SLA thresholds, then due automations.
    /// Returns whether anything was emitted or fired.
    async fn process_instance(&self, mut instance: WorkflowInstance) -> Result<bool, CoreError> {
        let definition = self.engine.get_definition(instance.definition_id).await?;
        let Some(state) = definition.state(&instance.current_state) else {
            tracing::warn!(
                instance_id = %instance.id,
                state = %instance.current_state,
                "Instance in state its definition no longer declares, skipping"
            );
            return Ok(false);
        };
        if state.is_final {
            return Ok(false);
        }

        let now = chrono::Utc::now();
        let mut dirty = false;

        if let Some(sla) = &state.sla {
            match evaluate_sla(sla, instance.entered_state_at, now) {
                SlaStatus::OnTrack => {}
                SlaStatus::Warning => {
                    if !instance.sla_warning_sent {
                        self.notify_sla(
                            &definition,
                            &instance,
                            format!(
                                "Instance '{}' has been in state '{}' past its warning threshold",
                                instance.id, state.label
                            ),
                            None,
                        )
                        .await;
                        instance.sla_warning_sent = true;
                        dirty = true;
                    }
                }
                SlaStatus::Breached => {
                    // A breach discovered after a missed warning window
                    // emits both markers in one pass.
                    if !instance.sla_warning_sent {
                        instance.sla_warning_sent = true;
                        dirty = true;
                    }
                    // Escalation needs a declared target role.
                    if !instance.sla_escalation_sent && sla.escalate_to.is_some() {
                        self.notify_sla(
                            &definition,
                            &instance,
                            format!(
                                "Instance '{}' breached the SLA for state '{}'",
                                instance.id, state.label
                            ),
                            sla.escalate_to.as_deref(),
                        )
                        .await;
                        instance.sla_escalation_sent = true;
                        dirty = true;
                    }
                }
            }
        }

        let elapsed_secs = (now - instance.entered_state_at).num_seconds();
        let due: Vec<_> = definition
            .automations
            .iter()
            .filter(|a| {
                a.state_id == instance.current_state
                    && elapsed_secs >= a.after_secs
                    && !instance.fired_automations.contains(&a.id)
            })
            .cloned()
            .collect();
        for automation in due {
            tracing::info!(
                instance_id = %instance.id,
                automation_id = %automation.id,
                "Firing automation"
            );
            self.engine
                .effects
                .run(
                    self.engine.chain(),
                    &instance,
                    "scheduler",
                    std::slice::from_ref(&automation.effect),
                )
                .await;
            instance.fired_automations.push(automation.id);
            dirty = true;
        }

        if dirty {
            return self.persist_sweep_flags(instance, now).await;
        }
        Ok(false)
    }

    /// Persist the flags a sweep set, through a fresh read of the
    /// instance. A transition may have committed while the sweep held
    /// its snapshot; writing that snapshot back whole would silently
    /// revert the state change, so only the bookkeeping flags are
    /// merged — and dropped entirely if the instance already left the
    /// state entry they were computed for.
    async fn persist_sweep_flags(
        &self,
        snapshot: WorkflowInstance,
        now: Timestamp,
    ) -> Result<bool, CoreError> {
        let mut fresh = self
            .engine
            .instances
            .get(snapshot.id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| CoreError::not_found("workflow_instance", snapshot.id))?;

        if fresh.current_state != snapshot.current_state
            || fresh.entered_state_at != snapshot.entered_state_at
        {
            tracing::debug!(
                instance_id = %snapshot.id,
                "Instance moved during sweep, dropping stale SLA flags"
            );
            return Ok(false);
        }

        fresh.sla_warning_sent |= snapshot.sla_warning_sent;
        fresh.sla_escalation_sent |= snapshot.sla_escalation_sent;
        for automation_id in &snapshot.fired_automations {
            if !fresh.fired_automations.contains(automation_id) {
                fresh.fired_automations.push(automation_id.clone());
            }
        }
        fresh.updated_at = now;
        self.engine
            .instances
            .update(fresh)
            .await
            .map_err(map_store_error)?;
        Ok(true)
    }

    /// Send an SLA notification. Escalations go to the declared role;
    /// everything else to the assigned committee, falling back to the
    /// definition's allowed roles.
    async fn notify_sla(
        &self,
        definition: &WorkflowDefinition,
        instance: &WorkflowInstance,
        message: String,
        escalate_to: Option<&str>,
    ) {
        let recipients = match (escalate_to, &instance.assigned_committee) {
            (Some(role), _) => Recipients::Roles(vec![role.to_string()]),
            (None, Some(committee)) => Recipients::Committee(committee.clone()),
            (None, None) => Recipients::Roles(definition.settings.allowed_roles.clone()),
        };
        let notification =
            Notification::new(recipients, message).with_context(serde_json::json!({
                "instance_id": instance.id,
                "state": instance.current_state,
            }));
        self.engine.effects.dispatch_notification(notification).await;
    }
}

use std::sync::Arc;

use drift_core::{update, DrainOutcome, Effect, Msg, OrchestratorEvent, ScanStatus, StatusUpdate, UnknownEvent};
use drift_logging::{drift_info, drift_warn};
use serde_json::Value;
use thiserror::Error;

use crate::types::store_timestamp;
use crate::{BacklogStore, Clock, Invocation, StoreError, Trigger, TriggerError, TriggerTargets};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error(transparent)]
    UnknownEvent(#[from] UnknownEvent),
}

/// Self-draining scan queue over the backlog store.
///
/// Each drain starts at most one job and ends; the job's completion fires the
/// next drain. The store holds all state between invocations.
pub struct QueueOrchestrator {
    store: Arc<dyn BacklogStore>,
    trigger: Arc<dyn Trigger>,
    targets: TriggerTargets,
    clock: Clock,
}

impl QueueOrchestrator {
    pub fn new(
        store: Arc<dyn BacklogStore>,
        trigger: Arc<dyn Trigger>,
        targets: TriggerTargets,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            trigger,
            targets,
            clock,
        }
    }

    /// Routes an inbound `{"eventName": ...}` payload.
    pub async fn handle(&self, payload: &Value) -> Result<DrainOutcome, OrchestratorError> {
        match OrchestratorEvent::from_payload(payload)? {
            OrchestratorEvent::Reset => self.reset().await,
            OrchestratorEvent::Scan => self.drain().await,
        }
    }

    /// Marks every active row PENDING and starts one drain lineage.
    pub async fn reset(&self) -> Result<DrainOutcome, OrchestratorError> {
        drift_info!("Resetting scan status of active repositories");
        let active = self.store.scan_active().await?;
        self.step(Msg::Reset { active }).await
    }

    /// Claims the first pending row and starts its job, or ends the lineage.
    pub async fn drain(&self) -> Result<DrainOutcome, OrchestratorError> {
        let pending = self
            .store
            .query_active_by_status(ScanStatus::Pending)
            .await?;
        drift_info!("Drain: {} pending repositories", pending.len());
        self.step(Msg::Drain { pending }).await
    }

    /// Completion path of a job: marks the row DONE and continues the lineage.
    /// A row no longer IN_PROGRESS is left untouched and nothing is fired.
    pub async fn finish_repo(&self, repo_url: &str) -> Result<DrainOutcome, OrchestratorError> {
        self.step(Msg::JobFinished {
            repo_url: repo_url.to_string(),
        })
        .await
    }

    async fn step(&self, msg: Msg) -> Result<DrainOutcome, OrchestratorError> {
        let mut next = Some(msg);
        let mut outcome = DrainOutcome::QueueEmpty;
        while let Some(msg) = next.take() {
            let (step_outcome, effects) = update(msg);
            outcome = step_outcome;
            for effect in effects {
                if let Some(reply) = self.execute(effect).await? {
                    next = Some(reply);
                }
            }
        }
        Ok(outcome)
    }

    async fn execute(&self, effect: Effect) -> Result<Option<Msg>, OrchestratorError> {
        match effect {
            Effect::SetStatus {
                repo_url,
                status,
                stamp_last_scan,
            } => {
                let update = self.status_update(&repo_url, status, stamp_last_scan);
                self.store.update_status(&update).await?;
                drift_info!("{} -> {}", repo_url, status);
                Ok(None)
            }
            Effect::Claim { repo_url } => {
                let update = self.status_update(&repo_url, ScanStatus::InProgress, false);
                let won = self
                    .store
                    .update_status_if(ScanStatus::Pending, &update)
                    .await?;
                if !won {
                    drift_warn!("{} was claimed by another drain", repo_url);
                }
                Ok(Some(Msg::Claimed { repo_url, won }))
            }
            Effect::Finish { repo_url } => {
                let update = self.status_update(&repo_url, ScanStatus::Done, true);
                let applied = self
                    .store
                    .update_status_if(ScanStatus::InProgress, &update)
                    .await?;
                if applied {
                    drift_info!("{} -> {}", repo_url, ScanStatus::Done);
                } else {
                    drift_warn!(
                        "{} is no longer {}; dropping stale completion",
                        repo_url,
                        ScanStatus::InProgress
                    );
                }
                Ok(Some(Msg::Finished { repo_url, applied }))
            }
            Effect::StartJob { repo_url, payload } => {
                self.trigger
                    .fire(Invocation::new(&self.targets.workflow, payload.to_value()))
                    .await?;
                drift_info!("Started {} for {}", self.targets.workflow, repo_url);
                Ok(None)
            }
            Effect::TriggerDrain => {
                self.trigger
                    .fire(Invocation::new(
                        &self.targets.orchestrator,
                        OrchestratorEvent::Scan.to_payload(),
                    ))
                    .await?;
                Ok(None)
            }
        }
    }

    fn status_update(&self, repo_url: &str, status: ScanStatus, stamp_last_scan: bool) -> StatusUpdate {
        StatusUpdate {
            repo_url: repo_url.to_string(),
            status,
            at: store_timestamp((self.clock)()),
            stamp_last_scan,
        }
    }
}

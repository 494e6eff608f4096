use std::sync::Arc;

use drift_core::{extract_job_inputs, JobInputs, JobPayload, JobType};
use drift_logging::{drift_error, drift_info, drift_warn};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    ArtifactPublisher, Invocation, OrchestratorError, PersistError, PipelineError, PipelineRunner,
    QueueOrchestrator, Trigger, TriggerError, TriggerTargets,
};

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("artifact upload failed: {0}")]
    Persist(#[from] PersistError),
    #[error("queue continuation failed: {0}")]
    Orchestrator(#[from] OrchestratorError),
}

/// Result of one finished job, as reported to its invoker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub key: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    pub report_recovered: bool,
}

/// Per-job workflow: pipeline, artifact upload, then queue continuation.
pub struct JobRunner {
    pipeline: PipelineRunner,
    publisher: ArtifactPublisher,
    orchestrator: Arc<QueueOrchestrator>,
}

impl JobRunner {
    pub fn new(
        pipeline: PipelineRunner,
        publisher: ArtifactPublisher,
        orchestrator: Arc<QueueOrchestrator>,
    ) -> Self {
        Self {
            pipeline,
            publisher,
            orchestrator,
        }
    }

    /// Runs the job described by `event`, however deeply its fields are nested.
    ///
    /// A full scan hands its repository back to the queue whether or not the
    /// job succeeded, so one failing repository never stalls the backlog.
    pub async fn handle(&self, event: &Value) -> Result<JobReport, JobError> {
        let inputs = extract_job_inputs(event);
        let repo_url = inputs.repo_url();
        if inputs.job_type == Some(JobType::FullScan) && repo_url.is_none() {
            drift_warn!("Full scan names no repository; the queue will not be advanced");
        }

        let result = self.render_and_publish(&inputs).await;
        if let Err(err) = &result {
            drift_error!("Job failed: {}", err);
        }

        if let Some(repo_url) = &repo_url {
            self.orchestrator.finish_repo(repo_url).await?;
        }
        result
    }

    async fn render_and_publish(&self, inputs: &JobInputs) -> Result<JobReport, JobError> {
        let output = self
            .pipeline
            .run(
                inputs.update_remediation.as_deref().unwrap_or_default(),
                inputs.remove_remediation.as_deref().unwrap_or_default(),
            )
            .await?;
        let artifact = self
            .publisher
            .publish(&inputs.artifact_prefix(), &output.body)
            .await?;
        drift_info!("Report available at {}", artifact.url);
        Ok(JobReport {
            key: artifact.key,
            url: artifact.url,
            repo_url: inputs.repo_url(),
            report_recovered: !output.report.is_empty(),
        })
    }
}

/// Starts a workflow run for a CI/CD log. The queue is not involved.
pub async fn submit_cicd_log(
    trigger: &dyn Trigger,
    targets: &TriggerTargets,
    log_text: &str,
) -> Result<JobPayload, TriggerError> {
    let payload = JobPayload::cicd_log(log_text);
    trigger
        .fire(Invocation::new(&targets.workflow, payload.to_value()))
        .await?;
    drift_info!("Started {} for a CI/CD log of {} chars", targets.workflow, log_text.len());
    Ok(payload)
}

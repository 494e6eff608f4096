use serde_json::Value;
use thiserror::Error;

/// One asynchronous invocation: a target name and its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub target: String,
    pub payload: Value,
}

impl Invocation {
    pub fn new(target: impl Into<String>, payload: Value) -> Self {
        Self {
            target: target.into(),
            payload,
        }
    }
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("trigger service unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget invocation service. Success means the invocation was
/// accepted, not that it ran.
#[async_trait::async_trait]
pub trait Trigger: Send + Sync {
    async fn fire(&self, invocation: Invocation) -> Result<(), TriggerError>;
}

/// Names the orchestrator and per-job workflow are reachable under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerTargets {
    pub orchestrator: String,
    pub workflow: String,
}

impl Default for TriggerTargets {
    fn default() -> Self {
        Self {
            orchestrator: "iacScanOrchestrator".to_string(),
            workflow: "DriftReportWorkflow".to_string(),
        }
    }
}

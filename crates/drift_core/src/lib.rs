//! Drift core: pure backlog state machine, payload traversal and output recovery.
mod artifact;
mod backlog;
mod effect;
mod event;
mod msg;
mod payload;
mod prompt;
mod recovery;
mod update;

pub use artifact::{artifact_key, artifact_url, ARTIFACT_CONTENT_TYPE};
pub use backlog::{ActiveFlag, BacklogItem, ScanStatus, StatusUpdate, UnknownStatus};
pub use effect::Effect;
pub use event::{OrchestratorEvent, UnknownEvent};
pub use msg::Msg;
pub use payload::{
    extract_job_inputs, extract_repo_url, repo_name, JobInputs, JobPayload, JobType, CICD_PREFIX,
};
pub use prompt::{analysis_prompt, render_prompt, report_payload, THROTTLING_FALLBACK};
pub use recovery::{
    recover, RecoveredDocument, RecoveryParser, DEFAULT_KNOWN_FIELD, INCOMPLETE_SENTINEL,
};
pub use update::{update, DrainOutcome};

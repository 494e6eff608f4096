use crate::{JobPayload, ScanStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Unconditional point update of one row.
    SetStatus {
        repo_url: String,
        status: ScanStatus,
        stamp_last_scan: bool,
    },
    /// Conditional PENDING -> IN_PROGRESS transition; reported back as `Msg::Claimed`.
    Claim { repo_url: String },
    /// Conditional IN_PROGRESS -> DONE transition stamping `lastScanAt`;
    /// reported back as `Msg::Finished`.
    Finish { repo_url: String },
    /// Fire-and-forget start of the per-job workflow.
    StartJob { repo_url: String, payload: JobPayload },
    /// Fire-and-forget re-invocation of the orchestrator's drain entry point.
    TriggerDrain,
}

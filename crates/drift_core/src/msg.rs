use crate::BacklogItem;

/// Inputs to the drain orchestrator, each carrying what the store returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Every row whose `active` flag is set, any status.
    Reset { active: Vec<BacklogItem> },
    /// Rows returned by the `(active, scanStatus = PENDING)` index query, in store order.
    Drain { pending: Vec<BacklogItem> },
    /// Outcome of the conditional PENDING -> IN_PROGRESS claim.
    Claimed { repo_url: String, won: bool },
    /// The downstream job for `repo_url` has finished, successfully or not.
    JobFinished { repo_url: String },
    /// Outcome of the conditional IN_PROGRESS -> DONE transition.
    Finished { repo_url: String, applied: bool },
}

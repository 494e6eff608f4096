use serde::Serialize;

use crate::{Effect, JobPayload, Msg, ScanStatus};

/// What one orchestrator step reports back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DrainOutcome {
    ResetDone {
        reset: usize,
    },
    /// No eligible row left; this lineage ends here.
    #[serde(rename = "done")]
    QueueEmpty,
    /// A row was chosen and its claim is in flight.
    Claiming {
        #[serde(rename = "repo")]
        repo_url: String,
    },
    Started {
        #[serde(rename = "repo")]
        repo_url: String,
    },
    /// Another drain claimed the row first.
    Skipped {
        #[serde(rename = "repo")]
        repo_url: String,
    },
    /// The job's completion is being recorded.
    Finishing {
        #[serde(rename = "repo")]
        repo_url: String,
    },
    Completed {
        #[serde(rename = "repo")]
        repo_url: String,
    },
    /// The row left IN_PROGRESS while its job ran (a reset); the completion
    /// is dropped and the lineage the reset started carries on.
    Superseded {
        #[serde(rename = "repo")]
        repo_url: String,
    },
}

/// Pure orchestrator step: maps a message to an outcome and the effects the
/// caller must carry out, in order.
pub fn update(msg: Msg) -> (DrainOutcome, Vec<Effect>) {
    match msg {
        Msg::Reset { active } => {
            let mut effects: Vec<Effect> = active
                .iter()
                .filter(|item| item.is_active())
                .map(|item| Effect::SetStatus {
                    repo_url: item.repo_url.clone(),
                    status: ScanStatus::Pending,
                    stamp_last_scan: false,
                })
                .collect();
            let reset = effects.len();
            // One drain for the whole batch, never one per row.
            effects.push(Effect::TriggerDrain);
            (DrainOutcome::ResetDone { reset }, effects)
        }
        Msg::Drain { pending } => match pending.into_iter().find(|item| item.is_drainable()) {
            Some(item) => (
                DrainOutcome::Claiming {
                    repo_url: item.repo_url.clone(),
                },
                vec![Effect::Claim {
                    repo_url: item.repo_url,
                }],
            ),
            None => (DrainOutcome::QueueEmpty, Vec::new()),
        },
        Msg::Claimed { repo_url, won } => {
            if won {
                let payload = JobPayload::full_scan(&repo_url);
                (
                    DrainOutcome::Started {
                        repo_url: repo_url.clone(),
                    },
                    vec![Effect::StartJob { repo_url, payload }],
                )
            } else {
                (DrainOutcome::Skipped { repo_url }, Vec::new())
            }
        }
        Msg::JobFinished { repo_url } => (
            DrainOutcome::Finishing {
                repo_url: repo_url.clone(),
            },
            vec![Effect::Finish { repo_url }],
        ),
        Msg::Finished { repo_url, applied } => {
            if applied {
                (
                    DrainOutcome::Completed { repo_url },
                    vec![Effect::TriggerDrain],
                )
            } else {
                (DrainOutcome::Superseded { repo_url }, Vec::new())
            }
        }
    }
}

mod support;

use std::sync::Arc;

use drift_core::{BacklogItem, DrainOutcome, ScanStatus, StatusUpdate};
use drift_engine::{
    BacklogStore, InMemoryBacklogStore, OrchestratorError, QueueOrchestrator, StoreError,
    TriggerTargets,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use support::{fixed_clock, init_logging, RecordingTrigger};

const REPO_A: &str = "https://github.com/acme/network";
const REPO_B: &str = "https://github.com/acme/storage";
const REPO_C: &str = "https://github.com/acme/compute";

fn orchestrator(
    rows: Vec<BacklogItem>,
) -> (QueueOrchestrator, Arc<InMemoryBacklogStore>, Arc<RecordingTrigger>) {
    let store = Arc::new(InMemoryBacklogStore::new(rows));
    let trigger = Arc::new(RecordingTrigger::default());
    let orchestrator = QueueOrchestrator::new(
        store.clone(),
        trigger.clone(),
        TriggerTargets::default(),
        fixed_clock(),
    );
    (orchestrator, store, trigger)
}

fn status_of(store: &InMemoryBacklogStore, repo: &str) -> ScanStatus {
    store.get(repo).unwrap().unwrap().scan_status
}

#[tokio::test]
async fn drain_with_nothing_pending_ends_the_lineage() {
    init_logging();
    let (orchestrator, _store, trigger) = orchestrator(vec![
        BacklogItem::new(REPO_A).with_status(ScanStatus::Done),
        BacklogItem::new(REPO_B).inactive(),
    ]);

    let outcome = orchestrator.drain().await.unwrap();

    assert_eq!(outcome, DrainOutcome::QueueEmpty);
    assert!(trigger.fired().is_empty());
}

#[tokio::test]
async fn drain_claims_first_pending_row_and_starts_one_job() {
    init_logging();
    let (orchestrator, store, trigger) = orchestrator(vec![
        BacklogItem::new(REPO_A).with_status(ScanStatus::Done),
        BacklogItem::new(REPO_B),
        BacklogItem::new(REPO_C),
    ]);

    let outcome = orchestrator.drain().await.unwrap();

    assert_eq!(
        outcome,
        DrainOutcome::Started {
            repo_url: REPO_B.to_string()
        }
    );
    assert_eq!(status_of(&store, REPO_B), ScanStatus::InProgress);
    assert_eq!(status_of(&store, REPO_C), ScanStatus::Pending);

    let fired = trigger.fired();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].target, "DriftReportWorkflow");
    assert_eq!(
        fired[0].payload,
        json!({
            "query": format!("Compare drift for every resource in repository {REPO_B}"),
            "type": "full_scan"
        })
    );
    let row = store.get(REPO_B).unwrap().unwrap();
    assert_eq!(row.updated_at.as_deref(), Some("2024-05-17 09:30:00"));
    assert_eq!(row.last_scan_at, None);
}

#[tokio::test]
async fn reset_marks_active_rows_pending_and_drains_once() {
    init_logging();
    let (orchestrator, store, trigger) = orchestrator(vec![
        BacklogItem::new(REPO_A).with_status(ScanStatus::Done),
        BacklogItem::new(REPO_B).with_status(ScanStatus::InProgress),
        BacklogItem::new(REPO_C).with_status(ScanStatus::Done),
        BacklogItem::new("https://github.com/acme/legacy")
            .with_status(ScanStatus::Done)
            .inactive(),
    ]);

    let outcome = orchestrator.reset().await.unwrap();

    assert_eq!(outcome, DrainOutcome::ResetDone { reset: 3 });
    for repo in [REPO_A, REPO_B, REPO_C] {
        assert_eq!(status_of(&store, repo), ScanStatus::Pending);
    }
    assert_eq!(
        status_of(&store, "https://github.com/acme/legacy"),
        ScanStatus::Done
    );

    let fired = trigger.fired();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].target, "iacScanOrchestrator");
    assert_eq!(fired[0].payload, json!({ "eventName": "scan" }));
}

#[tokio::test]
async fn finishing_a_repo_marks_it_done_and_drains_again() {
    init_logging();
    let (orchestrator, store, trigger) = orchestrator(vec![
        BacklogItem::new(REPO_A).with_status(ScanStatus::InProgress),
        BacklogItem::new(REPO_B),
    ]);

    let outcome = orchestrator.finish_repo(REPO_A).await.unwrap();

    assert_eq!(
        outcome,
        DrainOutcome::Completed {
            repo_url: REPO_A.to_string()
        }
    );
    let row = store.get(REPO_A).unwrap().unwrap();
    assert_eq!(row.scan_status, ScanStatus::Done);
    assert_eq!(row.last_scan_at.as_deref(), Some("2024-05-17 09:30:00"));
    assert_eq!(trigger.targets(), vec!["iacScanOrchestrator".to_string()]);
}

#[tokio::test]
async fn completion_after_a_reset_is_dropped() {
    init_logging();
    let (orchestrator, store, trigger) =
        orchestrator(vec![BacklogItem::new(REPO_A).with_status(ScanStatus::InProgress)]);

    orchestrator.reset().await.unwrap();
    assert_eq!(status_of(&store, REPO_A), ScanStatus::Pending);
    let fired_by_reset = trigger.fired().len();

    let outcome = orchestrator.finish_repo(REPO_A).await.unwrap();

    assert_eq!(
        outcome,
        DrainOutcome::Superseded {
            repo_url: REPO_A.to_string()
        }
    );
    let row = store.get(REPO_A).unwrap().unwrap();
    assert_eq!(row.scan_status, ScanStatus::Pending);
    assert_eq!(row.last_scan_at, None);
    assert_eq!(trigger.fired().len(), fired_by_reset);
}

/// Store where a rival drain claims every row right after it is queried.
struct RacingStore {
    inner: InMemoryBacklogStore,
}

#[async_trait::async_trait]
impl BacklogStore for RacingStore {
    async fn scan_active(&self) -> Result<Vec<BacklogItem>, StoreError> {
        self.inner.scan_active().await
    }

    async fn query_active_by_status(
        &self,
        status: ScanStatus,
    ) -> Result<Vec<BacklogItem>, StoreError> {
        let rows = self.inner.query_active_by_status(status).await?;
        for row in &rows {
            let rival = StatusUpdate {
                repo_url: row.repo_url.clone(),
                status: ScanStatus::InProgress,
                at: "2024-05-17 09:29:59".to_string(),
                stamp_last_scan: false,
            };
            self.inner.update_status(&rival).await?;
        }
        Ok(rows)
    }

    async fn update_status(&self, update: &StatusUpdate) -> Result<(), StoreError> {
        self.inner.update_status(update).await
    }

    async fn update_status_if(
        &self,
        expected: ScanStatus,
        update: &StatusUpdate,
    ) -> Result<bool, StoreError> {
        self.inner.update_status_if(expected, update).await
    }
}

#[tokio::test]
async fn a_lost_claim_starts_nothing() {
    init_logging();
    let store = Arc::new(RacingStore {
        inner: InMemoryBacklogStore::new(vec![BacklogItem::new(REPO_A)]),
    });
    let trigger = Arc::new(RecordingTrigger::default());
    let orchestrator = QueueOrchestrator::new(
        store.clone(),
        trigger.clone(),
        TriggerTargets::default(),
        fixed_clock(),
    );

    let outcome = orchestrator.drain().await.unwrap();

    assert_eq!(
        outcome,
        DrainOutcome::Skipped {
            repo_url: REPO_A.to_string()
        }
    );
    assert!(trigger.fired().is_empty());
    let row = store.inner.get(REPO_A).unwrap().unwrap();
    assert_eq!(row.updated_at.as_deref(), Some("2024-05-17 09:29:59"));
}

#[tokio::test]
async fn events_route_by_name() {
    init_logging();
    let (orchestrator, _store, trigger) = orchestrator(vec![BacklogItem::new(REPO_A)]);

    let outcome = orchestrator
        .handle(&json!({ "eventName": "ScanNextRepo" }))
        .await
        .unwrap();
    assert!(matches!(outcome, DrainOutcome::Started { .. }));
    assert_eq!(trigger.targets(), vec!["DriftReportWorkflow".to_string()]);

    let err = orchestrator
        .handle(&json!({ "eventName": "rescan" }))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownEvent(_)));
    assert_eq!(err.to_string(), "Unknown eventName: rescan");
}
